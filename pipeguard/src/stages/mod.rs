//! Stage trait and the built-in stages.
//!
//! A stage is one unit of request interception. It may pass the request
//! through, short-circuit with a failure, or post-process the downstream
//! response. Stages are constructed once and shared by every request.

mod authorization;
mod logging;
mod next;
mod validation;

pub use authorization::AuthorizationStage;
pub use logging::LoggingStage;
pub use next::Next;
pub use validation::{FnValidator, RuleValidator, ValidationStage, Validator};

use crate::context::{Payload, RequestEnvelope};
use crate::errors::PipelineResult;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt::Debug;
use std::marker::PhantomData;

/// Trait for pipeline stages bound to a request/response type pair.
///
/// # Invariants
///
/// - `next.run()` is called at most once (a second call panics)
/// - The request, `next` and `self` share one lifetime because `Next` is
///   invariant over it
/// - Side effects are observational; the envelope is only ever borrowed
/// - Failures from downstream are propagated, never swallowed
/// - No per-request state is stored on `self`
#[async_trait]
pub trait Stage<Req: Payload, Res: Payload>: Send + Sync + Debug {
    /// Returns the name of the stage, used in logs and failure records.
    fn name(&self) -> &str;

    /// Processes the request.
    ///
    /// # Arguments
    ///
    /// * `request` - The request envelope
    /// * `next` - Continuation into the rest of the pipeline
    async fn invoke<'a>(
        &'a self,
        request: &'a RequestEnvelope<Req>,
        next: Next<'a, Req, Res>,
    ) -> PipelineResult<Res>;
}

/// A closure-based stage.
///
/// ```rust,ignore
/// let stage = FnStage::<_, Req, Res>::new("timing", |_req, next| {
///     Box::pin(async move {
///         let start = Instant::now();
///         let result = next.run().await;
///         println!("took {:?}", start.elapsed());
///         result
///     })
/// });
/// ```
pub struct FnStage<F, Req, Res> {
    name: String,
    func: F,
    _types: PhantomData<fn(Req) -> Res>,
}

impl<F, Req, Res> FnStage<F, Req, Res>
where
    Req: Payload,
    Res: Payload,
    F: for<'a> Fn(&'a RequestEnvelope<Req>, Next<'a, Req, Res>) -> BoxFuture<'a, PipelineResult<Res>>
        + Send
        + Sync,
{
    /// Creates a new closure-based stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
            _types: PhantomData,
        }
    }
}

impl<F, Req, Res> Debug for FnStage<F, Req, Res> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F, Req, Res> Stage<Req, Res> for FnStage<F, Req, Res>
where
    Req: Payload,
    Res: Payload,
    F: for<'a> Fn(&'a RequestEnvelope<Req>, Next<'a, Req, Res>) -> BoxFuture<'a, PipelineResult<Res>>
        + Send
        + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke<'a>(
        &'a self,
        request: &'a RequestEnvelope<Req>,
        next: Next<'a, Req, Res>,
    ) -> PipelineResult<Res> {
        (self.func)(request, next).await
    }
}
