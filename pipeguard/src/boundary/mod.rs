//! The error boundary.
//!
//! The boundary wraps a whole pipeline invocation and guarantees exactly one
//! structured result per request. Failures (and panics) are logged with full
//! internal detail, then translated into a [`ProblemDetails`] that carries
//! nothing but a status, a fixed title and, for validation failures, the field
//! errors.
//!
//! # Status mapping
//!
//! | Failure kind   | Status | Title                                     |
//! |----------------|--------|-------------------------------------------|
//! | validation     | 400    | One or more validation errors occurred.   |
//! | unauthorized   | 401    | Unauthorized                              |
//! | forbidden      | 403    | Forbidden                                 |
//! | cancellation   | 499    | The request was cancelled.                |
//! | unhandled      | 500    | An unexpected error occurred.             |

mod problem;

pub use problem::{ClientResponse, ProblemDetails};

use crate::config::BoundaryConfig;
use crate::context::{Payload, RequestEnvelope, ResponseEnvelope};
use crate::errors::{Failure, FailureKind, PipelineResult};
use crate::events::{LogFields, LogSink, Severity};
use crate::pipeline::Pipeline;
use futures::FutureExt;
use serde_json::json;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Status used for cancelled requests (client closed request).
pub const STATUS_CLIENT_CLOSED_REQUEST: u16 = 499;

/// The public face of a failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicError {
    /// HTTP status code.
    pub status: u16,
    /// Fixed, non-revealing title.
    pub title: &'static str,
    /// Problem type URI.
    pub type_uri: &'static str,
}

/// Terminal fallback converting every pipeline outcome into a client response.
pub struct Boundary {
    sink: Arc<dyn LogSink>,
    config: BoundaryConfig,
}

impl Boundary {
    /// Creates a boundary logging failures to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn LogSink>, config: BoundaryConfig) -> Self {
        Self { sink, config }
    }

    /// Maps a failure kind to its public status, title and type.
    ///
    /// Depends on nothing but `kind`, so internal messages cannot leak.
    #[must_use]
    pub const fn translate(kind: FailureKind) -> PublicError {
        match kind {
            FailureKind::Validation => PublicError {
                status: 400,
                title: "One or more validation errors occurred.",
                type_uri: "https://tools.ietf.org/html/rfc9110#section-15.5.1",
            },
            FailureKind::Unauthorized => PublicError {
                status: 401,
                title: "Unauthorized",
                type_uri: "https://tools.ietf.org/html/rfc9110#section-15.5.2",
            },
            FailureKind::Forbidden => PublicError {
                status: 403,
                title: "Forbidden",
                type_uri: "https://tools.ietf.org/html/rfc9110#section-15.5.4",
            },
            FailureKind::Cancellation => PublicError {
                status: STATUS_CLIENT_CLOSED_REQUEST,
                title: "The request was cancelled.",
                type_uri: "about:blank",
            },
            FailureKind::Unhandled => PublicError {
                status: 500,
                title: "An unexpected error occurred.",
                type_uri: "https://tools.ietf.org/html/rfc9110#section-15.6.1",
            },
        }
    }

    /// Builds the client-safe problem for `failure`.
    #[must_use]
    pub fn to_problem(&self, correlation_id: &str, failure: &Failure) -> ProblemDetails {
        let public = Self::translate(failure.kind);
        let errors = if failure.kind == FailureKind::Validation {
            failure.field_errors.clone()
        } else {
            Vec::new()
        };

        ProblemDetails {
            type_uri: public.type_uri.to_string(),
            title: public.title.to_string(),
            status: public.status,
            correlation_id: self
                .config
                .include_correlation_id
                .then(|| correlation_id.to_string()),
            errors,
        }
    }

    /// Awaits `invocation` and converts its outcome into a client response.
    ///
    /// Never fails: failures and panics alike become a [`ProblemDetails`].
    pub async fn handle<Res, F>(&self, correlation_id: &str, invocation: F) -> ClientResponse<Res>
    where
        F: Future<Output = PipelineResult<Res>>,
    {
        let outcome = AssertUnwindSafe(invocation)
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(Failure::from_panic(payload.as_ref())));

        match outcome {
            Ok(payload) => ClientResponse::Success(ResponseEnvelope::new(payload, correlation_id)),
            Err(failure) => {
                self.log_failure(correlation_id, &failure).await;
                ClientResponse::Problem(self.to_problem(correlation_id, &failure))
            }
        }
    }

    /// Executes `request` through `pipeline` inside this boundary.
    pub async fn run<Req: Payload, Res: Payload>(
        &self,
        pipeline: &Pipeline<Req, Res>,
        request: &RequestEnvelope<Req>,
    ) -> ClientResponse<Res> {
        self.handle(request.correlation_id(), pipeline.execute(request))
            .await
    }

    async fn log_failure(&self, correlation_id: &str, failure: &Failure) {
        let mut fields = LogFields::new();
        fields.insert("CorrelationId".to_string(), json!(correlation_id));
        fields.insert("Kind".to_string(), json!(failure.kind));
        fields.insert("Message".to_string(), json!(failure.message));
        fields.insert("Failure".to_string(), failure.to_log_value());

        self.sink
            .emit(
                Severity::Error,
                "Request {CorrelationId} failed with {Kind}: {Message}",
                fields,
            )
            .await;
    }
}

impl std::fmt::Debug for Boundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Boundary")
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FieldError;
    use crate::events::CollectingLogSink;
    use pretty_assertions::assert_eq;

    fn boundary() -> (Boundary, Arc<CollectingLogSink>) {
        let sink = Arc::new(CollectingLogSink::new());
        (Boundary::new(sink.clone(), BoundaryConfig::default()), sink)
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let (boundary, sink) = boundary();
        let response = boundary.handle("c-1", async { Ok::<_, Failure>(41 + 1) }).await;

        assert_eq!(
            response,
            ClientResponse::Success(ResponseEnvelope::new(42, "c-1"))
        );
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_unhandled_detail_never_reaches_client() {
        let (boundary, sink) = boundary();
        let response: ClientResponse<()> = boundary
            .handle("c-2", async { Err(Failure::unhandled("null reference at line 42")) })
            .await;

        let problem = response.problem().unwrap();
        assert_eq!(problem.status, 500);
        assert!(!problem.title.contains("null reference"));
        assert!(!problem.title.contains("line 42"));
        assert!(problem.errors.is_empty());

        let serialized = serde_json::to_string(&response).unwrap();
        assert!(!serialized.contains("null reference"));

        let errors = sink.records_at(Severity::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("null reference at line 42"));
    }

    #[tokio::test]
    async fn test_validation_exposes_exact_field_list() {
        let (boundary, _sink) = boundary();
        let fields = vec![FieldError::new("Username", "required")];
        let response: ClientResponse<()> = boundary
            .handle("c-3", async { Err(Failure::validation(fields.clone())) })
            .await;

        let problem = response.problem().unwrap();
        assert_eq!(problem.status, 400);
        assert_eq!(problem.errors, fields);
        assert_eq!(problem.correlation_id.as_deref(), Some("c-3"));
    }

    async fn explode() -> PipelineResult<()> {
        panic!("index out of bounds: secret")
    }

    #[tokio::test]
    async fn test_panic_becomes_unhandled() {
        let (boundary, sink) = boundary();
        let response = boundary.handle("c-4", explode()).await;

        let problem = response.problem().unwrap();
        assert_eq!(problem.status, 500);
        assert!(!problem.title.contains("secret"));
        assert!(sink.records()[0].message.contains("index out of bounds"));
    }

    #[test]
    fn test_translate_is_distinct_per_kind() {
        let cancellation = Boundary::translate(FailureKind::Cancellation);
        let unhandled = Boundary::translate(FailureKind::Unhandled);

        assert_eq!(cancellation.status, STATUS_CLIENT_CLOSED_REQUEST);
        assert_ne!(cancellation.status, unhandled.status);
        assert_eq!(Boundary::translate(FailureKind::Unauthorized).status, 401);
        assert_eq!(Boundary::translate(FailureKind::Forbidden).status, 403);
    }

    #[test]
    fn test_correlation_id_can_be_suppressed() {
        let sink = Arc::new(CollectingLogSink::new());
        let boundary = Boundary::new(
            sink,
            BoundaryConfig {
                include_correlation_id: false,
            },
        );

        let problem = boundary.to_problem("c-5", &Failure::cancelled("bye"));
        assert!(problem.correlation_id.is_none());
        assert_eq!(problem.status, STATUS_CLIENT_CLOSED_REQUEST);
    }
}
