//! Error types for the pipeguard pipeline.
//!
//! Runtime failures raised by stages and handlers are carried as [`Failure`]
//! values through the pipeline's return channel. Construction and
//! configuration problems use their own error enums.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Result type returned by stages, handlers and the pipeline.
pub type PipelineResult<T> = Result<T, Failure>;

/// Classification of a [`Failure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// One or more field-level rule violations. Recoverable by the caller.
    Validation,
    /// No authenticated principal was supplied.
    Unauthorized,
    /// The principal lacks a required scope.
    Forbidden,
    /// The request was abandoned before completion.
    Cancellation,
    /// Any other failure, including defects in a stage or handler.
    Unhandled,
}

impl FailureKind {
    /// Returns the snake_case name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::Cancellation => "cancellation",
            Self::Unhandled => "unhandled",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field-level rule violation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldError {
    /// The offending field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl FieldError {
    /// Creates a new field error.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A structured description of why a stage or handler did not produce a
/// normal response.
///
/// The `message`, `stage` and `context` fields are internal detail. They are
/// logged by the boundary and never returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} failure: {message}")]
pub struct Failure {
    /// The failure classification.
    pub kind: FailureKind,
    /// Human-readable internal message.
    pub message: String,
    /// Field-level errors (populated for validation failures).
    pub field_errors: Vec<FieldError>,
    /// Name of the stage that raised the failure, if known.
    pub stage: Option<String>,
    /// Additional internal context.
    pub context: BTreeMap<String, String>,
}

impl Failure {
    /// Creates a failure of the given kind.
    #[must_use]
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            field_errors: Vec::new(),
            stage: None,
            context: BTreeMap::new(),
        }
    }

    /// Creates a validation failure carrying the given field errors.
    #[must_use]
    pub fn validation(field_errors: Vec<FieldError>) -> Self {
        let message = format!("{} validation error(s)", field_errors.len());
        Self {
            field_errors,
            ..Self::new(FailureKind::Validation, message)
        }
    }

    /// Creates an unauthorized failure.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Unauthorized, message)
    }

    /// Creates a forbidden failure.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Forbidden, message)
    }

    /// Creates a cancellation failure.
    #[must_use]
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::new(FailureKind::Cancellation, reason)
    }

    /// Creates an unhandled failure.
    #[must_use]
    pub fn unhandled(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Unhandled, message)
    }

    /// Converts a caught panic payload into an unhandled failure.
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self::unhandled(format!("panic: {message}")).with_context("panicked", "true")
    }

    /// Records the stage that raised the failure.
    #[must_use]
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Returns true if this is a validation failure.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        self.kind == FailureKind::Validation
    }

    /// Returns true if this is a cancellation failure.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        self.kind == FailureKind::Cancellation
    }

    /// Converts to a JSON object with the full internal detail, for logging.
    #[must_use]
    pub fn to_log_value(&self) -> serde_json::Value {
        serde_json::json!({
            "kind": self.kind,
            "message": self.message,
            "stage": self.stage,
            "context": self.context,
            "field_errors": self.field_errors,
        })
    }
}

impl From<anyhow::Error> for Failure {
    fn from(err: anyhow::Error) -> Self {
        Self::unhandled(format!("{err:#}"))
    }
}

impl From<serde_json::Error> for Failure {
    fn from(err: serde_json::Error) -> Self {
        Self::unhandled(format!("serialization error: {err}"))
    }
}

/// Errors raised while assembling a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// `build` was called without a terminal handler.
    #[error("pipeline '{pipeline}' has no terminal handler")]
    MissingHandler {
        /// The pipeline name.
        pipeline: String,
    },

    /// Two stages share a name.
    #[error("pipeline '{pipeline}' already contains a stage named '{stage}'")]
    DuplicateStage {
        /// The pipeline name.
        pipeline: String,
        /// The duplicated stage name.
        stage: String,
    },
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration document could not be parsed.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_failure_carries_errors() {
        let failure = Failure::validation(vec![
            FieldError::new("Username", "required"),
            FieldError::new("Email", "invalid"),
        ]);

        assert!(failure.is_validation());
        assert_eq!(failure.field_errors.len(), 2);
        assert_eq!(failure.message, "2 validation error(s)");
    }

    #[test]
    fn test_failure_display() {
        let failure = Failure::unhandled("boom");
        assert_eq!(failure.to_string(), "unhandled failure: boom");
    }

    #[test]
    fn test_failure_from_anyhow() {
        let err = anyhow::anyhow!("disk full").context("saving order");
        let failure: Failure = err.into();

        assert_eq!(failure.kind, FailureKind::Unhandled);
        assert!(failure.message.contains("saving order"));
        assert!(failure.message.contains("disk full"));
    }

    #[test]
    fn test_from_panic_payloads() {
        let static_payload: Box<dyn Any + Send> = Box::new("static message");
        let failure = Failure::from_panic(static_payload.as_ref());
        assert_eq!(failure.message, "panic: static message");

        let owned_payload: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        let failure = Failure::from_panic(owned_payload.as_ref());
        assert_eq!(failure.message, "panic: owned message");
        assert_eq!(failure.context.get("panicked"), Some(&"true".to_string()));
    }

    #[test]
    fn test_to_log_value_includes_detail() {
        let failure = Failure::unhandled("db timeout")
            .with_stage("logging")
            .with_context("attempt", "3");
        let value = failure.to_log_value();

        assert_eq!(value["kind"], "unhandled");
        assert_eq!(value["stage"], "logging");
        assert_eq!(value["context"]["attempt"], "3");
    }

    #[test]
    fn test_pipeline_error_messages() {
        let err = PipelineError::DuplicateStage {
            pipeline: "orders".to_string(),
            stage: "logging".to_string(),
        };
        assert!(err.to_string().contains("'logging'"));
    }
}
