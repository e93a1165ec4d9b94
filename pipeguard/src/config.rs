//! Configuration types.
//!
//! Every field has a default, so an empty JSON object is a valid document.

use crate::errors::ConfigError;
use crate::events::{Severity, TracingLogSink};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipeguardConfig {
    /// Logging stage and sink settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Error boundary settings.
    #[serde(default)]
    pub boundary: BoundaryConfig,
}

impl PipeguardConfig {
    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed input.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Reads and parses a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read and
    /// [`ConfigError::Parse`] for malformed input.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}

/// Settings for the logging stage and the tracing sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Serialize request and response bodies into detailed entries.
    ///
    /// Off by default; bodies may carry credentials or personal data.
    #[serde(default)]
    pub log_payloads: bool,

    /// Entries below this severity are dropped by the tracing sink.
    #[serde(default = "default_min_severity")]
    pub min_severity: Severity,
}

fn default_min_severity() -> Severity {
    Severity::Informational
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_payloads: false,
            min_severity: default_min_severity(),
        }
    }
}

impl From<&LoggingConfig> for TracingLogSink {
    fn from(config: &LoggingConfig) -> Self {
        Self::new(config.min_severity)
    }
}

/// Settings for the error boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryConfig {
    /// Echo the correlation id in problem responses.
    #[serde(default = "default_include_correlation_id")]
    pub include_correlation_id: bool,
}

fn default_include_correlation_id() -> bool {
    true
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            include_correlation_id: default_include_correlation_id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = PipeguardConfig::from_json_str("{}").unwrap();

        assert_eq!(config, PipeguardConfig::default());
        assert!(!config.logging.log_payloads);
        assert_eq!(config.logging.min_severity, Severity::Informational);
        assert!(config.boundary.include_correlation_id);
    }

    #[test]
    fn test_partial_document() {
        let config = PipeguardConfig::from_json_str(
            r#"{"logging": {"log_payloads": true, "min_severity": "detailed"}}"#,
        )
        .unwrap();

        assert!(config.logging.log_payloads);
        assert_eq!(config.logging.min_severity, Severity::Detailed);
        assert!(config.boundary.include_correlation_id);
    }

    #[test]
    fn test_tracing_sink_honours_min_severity() {
        use crate::events::LogSink;

        let config = LoggingConfig {
            min_severity: Severity::Warning,
            ..LoggingConfig::default()
        };
        let sink = TracingLogSink::from(&config);

        assert!(!sink.enabled(Severity::Informational));
        assert!(sink.enabled(Severity::Error));
    }

    #[test]
    fn test_malformed_document() {
        let err = PipeguardConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"boundary": {{"include_correlation_id": false}}}}"#).unwrap();

        let config = PipeguardConfig::from_path(file.path()).unwrap();
        assert!(!config.boundary.include_correlation_id);
    }

    #[test]
    fn test_missing_file() {
        let err = PipeguardConfig::from_path("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
