//! Mock stages, handlers and validators for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use crate::context::{Payload, RequestEnvelope};
use crate::errors::{Failure, FieldError, PipelineResult};
use crate::pipeline::Handler;
use crate::stages::{Next, Stage, Validator};

/// A shared, ordered log of calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    /// Returns a copy of every entry in order.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing was logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// A stage that records `before:<name>` and `after:<name>` around `next`.
#[derive(Debug)]
pub struct RecordingStage {
    name: String,
    log: CallLog,
}

impl RecordingStage {
    /// Creates a new recording stage writing to `log`.
    #[must_use]
    pub fn new(name: impl Into<String>, log: CallLog) -> Self {
        Self {
            name: name.into(),
            log,
        }
    }
}

#[async_trait]
impl<Req: Payload, Res: Payload> Stage<Req, Res> for RecordingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke<'a>(
        &'a self,
        _request: &'a RequestEnvelope<Req>,
        next: Next<'a, Req, Res>,
    ) -> PipelineResult<Res> {
        self.log.push(format!("before:{}", self.name));
        let result = next.run().await;
        self.log.push(format!("after:{}", self.name));
        result
    }
}

/// A misbehaving stage that runs the downstream chain twice.
#[derive(Debug, Default)]
pub struct DoubleNextStage;

#[async_trait]
impl<Req: Payload, Res: Payload> Stage<Req, Res> for DoubleNextStage {
    fn name(&self) -> &str {
        "double-next"
    }

    async fn invoke<'a>(
        &'a self,
        _request: &'a RequestEnvelope<Req>,
        next: Next<'a, Req, Res>,
    ) -> PipelineResult<Res> {
        let _ = next.run().await;
        next.run().await
    }
}

/// A handler that returns a fixed response.
#[derive(Debug, Clone)]
pub struct StaticHandler<Res> {
    response: Res,
}

impl<Res: Clone> StaticHandler<Res> {
    /// Creates a handler always returning `response`.
    #[must_use]
    pub fn new(response: Res) -> Self {
        Self { response }
    }
}

#[async_trait]
impl<Req: Payload, Res: Payload + Clone> Handler<Req, Res> for StaticHandler<Res> {
    async fn handle(&self, _request: &RequestEnvelope<Req>) -> PipelineResult<Res> {
        Ok(self.response.clone())
    }
}

/// A handler that returns a fixed response and counts its invocations.
#[derive(Debug)]
pub struct CountingHandler<Res> {
    response: Res,
    calls: Mutex<usize>,
}

impl<Res: Clone> CountingHandler<Res> {
    /// Creates a counting handler returning `response`.
    #[must_use]
    pub fn new(response: Res) -> Self {
        Self {
            response,
            calls: Mutex::new(0),
        }
    }

    /// Returns the number of times the handler was called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl<Req: Payload, Res: Payload + Clone> Handler<Req, Res> for CountingHandler<Res> {
    async fn handle(&self, _request: &RequestEnvelope<Req>) -> PipelineResult<Res> {
        *self.calls.lock() += 1;
        Ok(self.response.clone())
    }
}

/// A handler that always fails with a clone of the configured failure.
#[derive(Debug, Clone)]
pub struct FailingHandler {
    failure: Failure,
}

impl FailingHandler {
    /// Creates a handler failing with `failure`.
    #[must_use]
    pub fn new(failure: Failure) -> Self {
        Self { failure }
    }

    /// Creates a handler failing with an unhandled error carrying `message`.
    #[must_use]
    pub fn unhandled(message: impl Into<String>) -> Self {
        Self::new(Failure::unhandled(message))
    }
}

#[async_trait]
impl<Req: Payload, Res: Payload> Handler<Req, Res> for FailingHandler {
    async fn handle(&self, _request: &RequestEnvelope<Req>) -> PipelineResult<Res> {
        Err(self.failure.clone())
    }
}

/// A handler that sleeps before responding.
#[derive(Debug, Clone)]
pub struct SlowHandler<Res> {
    delay: Duration,
    response: Res,
}

impl<Res: Clone> SlowHandler<Res> {
    /// Creates a slow handler.
    #[must_use]
    pub fn new(delay: Duration, response: Res) -> Self {
        Self { delay, response }
    }

    /// Creates a slow handler with delay in milliseconds.
    #[must_use]
    pub fn with_delay_ms(ms: u64, response: Res) -> Self {
        Self::new(Duration::from_millis(ms), response)
    }
}

#[async_trait]
impl<Req: Payload, Res: Payload + Clone> Handler<Req, Res> for SlowHandler<Res> {
    async fn handle(&self, _request: &RequestEnvelope<Req>) -> PipelineResult<Res> {
        tokio::time::sleep(self.delay).await;
        Ok(self.response.clone())
    }
}

/// A validator that reports a fixed list of field errors.
#[derive(Debug, Clone, Default)]
pub struct StaticValidator {
    errors: Vec<FieldError>,
}

impl StaticValidator {
    /// Creates a validator reporting `errors`.
    #[must_use]
    pub fn new(errors: Vec<FieldError>) -> Self {
        Self { errors }
    }

    /// Creates a validator that never reports anything.
    #[must_use]
    pub fn passing() -> Self {
        Self::default()
    }
}

#[async_trait]
impl<Req: Payload> Validator<Req> for StaticValidator {
    async fn validate(&self, _request: &Req) -> Vec<FieldError> {
        self.errors.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FailureKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_call_log_is_shared() {
        let log = CallLog::new();
        let clone = log.clone();
        clone.push("a");
        log.push("b");

        assert_eq!(log.entries(), vec!["a", "b"]);
        assert_eq!(clone.len(), 2);
    }

    #[tokio::test]
    async fn test_counting_handler() {
        let handler = CountingHandler::new(7_u32);
        let request = RequestEnvelope::new(());

        assert_eq!(Handler::<(), u32>::handle(&handler, &request).await, Ok(7));
        assert_eq!(Handler::<(), u32>::handle(&handler, &request).await, Ok(7));
        assert_eq!(handler.call_count(), 2);
    }

    #[tokio::test]
    async fn test_failing_handler() {
        let handler = FailingHandler::unhandled("boom");
        let request = RequestEnvelope::new(());

        let failure = Handler::<(), ()>::handle(&handler, &request).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::Unhandled);
        assert_eq!(failure.message, "boom");
    }

    #[tokio::test]
    async fn test_slow_handler() {
        let handler = SlowHandler::with_delay_ms(10, "done");
        let request = RequestEnvelope::new(());

        let start = std::time::Instant::now();
        let result = Handler::<(), &str>::handle(&handler, &request).await;

        assert_eq!(result, Ok("done"));
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_static_validator() {
        let validator = StaticValidator::new(vec![FieldError::new("Name", "required")]);

        assert_eq!(Validator::<()>::validate(&validator, &()).await.len(), 1);
        assert!(Validator::<()>::validate(&StaticValidator::passing(), &())
            .await
            .is_empty());
    }
}
