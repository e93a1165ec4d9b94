//! Terminal handlers.

use crate::context::{Payload, RequestEnvelope};
use crate::errors::PipelineResult;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::marker::PhantomData;

/// The innermost call of a pipeline, supplied by the caller.
///
/// The pipeline never inspects a handler's internals. Long-running handlers
/// should await I/O rather than block; the pipeline races the call against the
/// request's cancellation token.
#[async_trait]
pub trait Handler<Req: Payload, Res: Payload>: Send + Sync {
    /// Produces the response for `request`.
    async fn handle(&self, request: &RequestEnvelope<Req>) -> PipelineResult<Res>;
}

/// An async closure-based handler.
pub struct FnHandler<F, Req, Res> {
    func: F,
    _types: PhantomData<fn(Req) -> Res>,
}

impl<F, Req, Res> FnHandler<F, Req, Res>
where
    Req: Payload,
    Res: Payload,
    F: for<'a> Fn(&'a RequestEnvelope<Req>) -> BoxFuture<'a, PipelineResult<Res>> + Send + Sync,
{
    /// Creates a new handler from an async closure.
    pub fn new(func: F) -> Self {
        Self {
            func,
            _types: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Req, Res> Handler<Req, Res> for FnHandler<F, Req, Res>
where
    Req: Payload,
    Res: Payload,
    F: for<'a> Fn(&'a RequestEnvelope<Req>) -> BoxFuture<'a, PipelineResult<Res>> + Send + Sync,
{
    async fn handle(&self, request: &RequestEnvelope<Req>) -> PipelineResult<Res> {
        (self.func)(request).await
    }
}

/// A synchronous closure-based handler.
pub struct SyncFnHandler<F, Req, Res> {
    func: F,
    _types: PhantomData<fn(Req) -> Res>,
}

impl<F, Req, Res> SyncFnHandler<F, Req, Res>
where
    Req: Payload,
    Res: Payload,
    F: Fn(&RequestEnvelope<Req>) -> PipelineResult<Res> + Send + Sync,
{
    /// Creates a new handler from a plain closure.
    pub fn new(func: F) -> Self {
        Self {
            func,
            _types: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Req, Res> Handler<Req, Res> for SyncFnHandler<F, Req, Res>
where
    Req: Payload,
    Res: Payload,
    F: Fn(&RequestEnvelope<Req>) -> PipelineResult<Res> + Send + Sync,
{
    async fn handle(&self, request: &RequestEnvelope<Req>) -> PipelineResult<Res> {
        (self.func)(request)
    }
}
