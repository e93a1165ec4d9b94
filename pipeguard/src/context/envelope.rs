//! Request and response envelopes.

use super::metadata::{Principal, RequestMetadata};
use crate::cancellation::CancellationToken;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Bound shared by request and response payload types.
///
/// Stages are shared across concurrently executing requests, so payloads must
/// be safe to borrow from other tasks.
pub trait Payload: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Payload for T {}

/// An inbound request: payload plus correlation id, cancellation signal and
/// metadata.
///
/// Envelopes are assembled by the caller before invocation. The pipeline only
/// ever borrows them, so they cannot change while in flight.
#[derive(Debug, Clone)]
pub struct RequestEnvelope<Req> {
    payload: Req,
    correlation_id: String,
    cancellation: Arc<CancellationToken>,
    metadata: RequestMetadata,
}

impl<Req> RequestEnvelope<Req> {
    /// Wraps `payload` with a fresh correlation id and cancellation token.
    pub fn new(payload: Req) -> Self {
        Self {
            payload,
            correlation_id: Uuid::new_v4().to_string(),
            cancellation: Arc::new(CancellationToken::new()),
            metadata: RequestMetadata::default(),
        }
    }

    /// Overrides the correlation id (e.g. one propagated from an upstream header).
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    /// Shares an externally owned cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancellation = token;
        self
    }

    /// Replaces the metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: RequestMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Marks the request as exempt from authorization.
    #[must_use]
    pub fn allow_anonymous(mut self) -> Self {
        self.metadata.allow_anonymous = true;
        self
    }

    /// Attaches the authenticated caller.
    #[must_use]
    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.metadata.principal = Some(principal);
        self
    }

    /// Returns the payload.
    pub fn payload(&self) -> &Req {
        &self.payload
    }

    /// Returns the correlation id.
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Returns the cancellation token.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Returns a shared handle to the cancellation token.
    pub fn cancellation_handle(&self) -> Arc<CancellationToken> {
        Arc::clone(&self.cancellation)
    }

    /// Returns the metadata.
    pub fn metadata(&self) -> &RequestMetadata {
        &self.metadata
    }

    /// Returns the unqualified type name of the payload.
    pub fn type_name(&self) -> &'static str {
        short_type_name::<Req>()
    }
}

/// A successful response, tagged with the request's correlation id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseEnvelope<Res> {
    /// The handler's (or a short-circuiting stage's) response.
    pub payload: Res,
    /// Correlation id of the originating request.
    pub correlation_id: String,
}

impl<Res> ResponseEnvelope<Res> {
    /// Creates a new response envelope.
    pub fn new(payload: Res, correlation_id: impl Into<String>) -> Self {
        Self {
            payload,
            correlation_id: correlation_id.into(),
        }
    }

    /// Unwraps the payload.
    pub fn into_payload(self) -> Res {
        self.payload
    }
}

/// Returns the type name of `T` without its module path.
///
/// Generic arguments are kept as written: `alloc::vec::Vec<alloc::string::String>`
/// becomes `Vec<alloc::string::String>`.
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let head = full.split('<').next().unwrap_or(full);
    match head.rfind("::") {
        Some(idx) => &full[idx + 2..],
        None => full,
    }
}
