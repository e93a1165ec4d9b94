//! Request logging stage.
//!
//! Emits an informational entry on the way in and on the way out. Request and
//! response bodies are only serialized into detailed entries when
//! `log_payloads` is enabled, since they may contain sensitive data.

use super::{Next, Stage};
use crate::config::LoggingConfig;
use crate::context::{short_type_name, Payload, RequestEnvelope};
use crate::errors::PipelineResult;
use crate::events::{LogFields, LogSink, Severity};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

const UNSERIALIZABLE: &str = "<unserializable>";

/// Stage that logs each request and its outcome.
pub struct LoggingStage<Req, Res> {
    sink: Arc<dyn LogSink>,
    config: LoggingConfig,
    _types: PhantomData<fn(Req) -> Res>,
}

impl<Req: Payload + Serialize, Res: Payload + Serialize> LoggingStage<Req, Res> {
    /// Creates a logging stage writing to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn LogSink>, config: LoggingConfig) -> Self {
        Self {
            sink,
            config,
            _types: PhantomData,
        }
    }

    fn base_fields(request: &RequestEnvelope<Req>) -> LogFields {
        let mut fields = LogFields::new();
        fields.insert("RequestName".to_string(), json!(short_type_name::<Req>()));
        fields.insert("CorrelationId".to_string(), json!(request.correlation_id()));
        fields
    }

    fn detailed_enabled(&self) -> bool {
        self.config.log_payloads && self.sink.enabled(Severity::Detailed)
    }

    async fn log_start(&self, request: &RequestEnvelope<Req>) {
        self.sink
            .emit(
                Severity::Informational,
                "Handling {RequestName}",
                Self::base_fields(request),
            )
            .await;

        if self.detailed_enabled() {
            let mut fields = Self::base_fields(request);
            fields.insert("Request".to_string(), to_json(request.payload()));
            self.sink
                .emit(
                    Severity::Detailed,
                    "Handling {RequestName} with payload {Request}",
                    fields,
                )
                .await;
        }
    }

    async fn log_finish(&self, request: &RequestEnvelope<Req>, result: &PipelineResult<Res>, started: Instant) {
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let outcome = match result {
            Ok(_) => "success",
            Err(failure) => failure.kind.as_str(),
        };

        let mut fields = Self::base_fields(request);
        fields.insert("Outcome".to_string(), json!(outcome));
        fields.insert("ElapsedMs".to_string(), json!(elapsed_ms));
        self.sink
            .emit(
                Severity::Informational,
                "Handled {RequestName} with outcome {Outcome} in {ElapsedMs} ms",
                fields,
            )
            .await;

        if let Ok(response) = result {
            if self.detailed_enabled() {
                let mut fields = Self::base_fields(request);
                fields.insert("ResponseName".to_string(), json!(short_type_name::<Res>()));
                fields.insert("Response".to_string(), to_json(response));
                self.sink
                    .emit(
                        Severity::Detailed,
                        "Handled {RequestName} with response {Response}",
                        fields,
                    )
                    .await;
            }
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or_else(|_| json!(UNSERIALIZABLE))
}

impl<Req, Res> std::fmt::Debug for LoggingStage<Req, Res> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingStage")
            .field("config", &self.config)
            .finish()
    }
}

#[async_trait]
impl<Req, Res> Stage<Req, Res> for LoggingStage<Req, Res>
where
    Req: Payload + Serialize,
    Res: Payload + Serialize,
{
    fn name(&self) -> &str {
        "logging"
    }

    async fn invoke<'a>(
        &'a self,
        request: &'a RequestEnvelope<Req>,
        next: Next<'a, Req, Res>,
    ) -> PipelineResult<Res> {
        let started = Instant::now();
        self.log_start(request).await;
        let result = next.run().await;
        self.log_finish(request, &result, started).await;
        result
    }
}
