//! Logger sink trait and implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, error, info, warn};

/// Structured fields attached to a log entry.
pub type LogFields = BTreeMap<String, serde_json::Value>;

/// Severity of a log entry, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Verbose diagnostic output (may embed payloads).
    Detailed,
    /// Normal operational messages.
    Informational,
    /// Unexpected but recoverable conditions.
    Warning,
    /// Failures.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Detailed => "detailed",
            Self::Informational => "informational",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Trait for sinks that receive structured log entries.
///
/// Sinks are shared across concurrent pipeline executions. Emitting must never
/// fail or panic outward; transport errors are the sink's own concern.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Emits an entry asynchronously.
    ///
    /// # Arguments
    ///
    /// * `severity` - The entry severity
    /// * `template` - A message template with `{Name}` placeholders
    /// * `fields` - Structured fields, also used to fill the template
    async fn emit(&self, severity: Severity, template: &str, fields: LogFields) {
        self.try_emit(severity, template, fields);
    }

    /// Emits an entry without blocking.
    fn try_emit(&self, severity: Severity, template: &str, fields: LogFields);

    /// Returns whether entries of `severity` would be recorded.
    ///
    /// Callers use this to avoid building expensive fields.
    fn enabled(&self, _severity: Severity) -> bool {
        true
    }
}

/// A sink that discards all entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpLogSink;

#[async_trait]
impl LogSink for NoOpLogSink {
    fn try_emit(&self, _severity: Severity, _template: &str, _fields: LogFields) {}

    fn enabled(&self, _severity: Severity) -> bool {
        false
    }
}

/// A sink that forwards entries to the `tracing` framework.
#[derive(Debug, Clone)]
pub struct TracingLogSink {
    min_severity: Severity,
}

impl Default for TracingLogSink {
    fn default() -> Self {
        Self {
            min_severity: Severity::Informational,
        }
    }
}

impl TracingLogSink {
    /// Creates a sink that drops entries below `min_severity`.
    #[must_use]
    pub fn new(min_severity: Severity) -> Self {
        Self { min_severity }
    }

    /// Creates a sink that records everything, including detailed entries.
    #[must_use]
    pub fn detailed() -> Self {
        Self::new(Severity::Detailed)
    }
}

#[async_trait]
impl LogSink for TracingLogSink {
    fn try_emit(&self, severity: Severity, template: &str, fields: LogFields) {
        if !self.enabled(severity) {
            return;
        }
        let message = render_template(template, &fields);
        let fields = serde_json::Value::Object(fields.into_iter().collect());
        match severity {
            Severity::Detailed => debug!(template = %template, fields = %fields, "{}", message),
            Severity::Informational => info!(template = %template, fields = %fields, "{}", message),
            Severity::Warning => warn!(template = %template, fields = %fields, "{}", message),
            Severity::Error => error!(template = %template, fields = %fields, "{}", message),
        }
    }

    fn enabled(&self, severity: Severity) -> bool {
        severity >= self.min_severity
    }
}

/// A single entry captured by [`CollectingLogSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// The entry severity.
    pub severity: Severity,
    /// The raw template.
    pub template: String,
    /// The rendered message.
    pub message: String,
    /// The structured fields.
    pub fields: LogFields,
    /// When the entry was emitted.
    pub timestamp: DateTime<Utc>,
}

/// A collecting sink for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingLogSink {
    records: parking_lot::RwLock<Vec<LogRecord>>,
}

impl CollectingLogSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected records.
    #[must_use]
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.read().clone()
    }

    /// Returns the records at exactly `severity`.
    #[must_use]
    pub fn records_at(&self, severity: Severity) -> Vec<LogRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| r.severity == severity)
            .cloned()
            .collect()
    }

    /// Returns the rendered messages in emission order.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.records.read().iter().map(|r| r.message.clone()).collect()
    }

    /// Returns the number of collected records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Clears all collected records.
    pub fn clear(&self) {
        self.records.write().clear();
    }
}

#[async_trait]
impl LogSink for CollectingLogSink {
    fn try_emit(&self, severity: Severity, template: &str, fields: LogFields) {
        let record = LogRecord {
            severity,
            template: template.to_string(),
            message: render_template(template, &fields),
            fields,
            timestamp: Utc::now(),
        };
        self.records.write().push(record);
    }
}

/// Fills `{Name}` placeholders in `template` from `fields`.
///
/// String values are inserted without quotes; other values use their JSON
/// form. Placeholders with no matching field are left as-is.
#[must_use]
pub fn render_template(template: &str, fields: &LogFields) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match fields.get(name) {
                    Some(serde_json::Value::String(s)) => out.push_str(s),
                    Some(value) => out.push_str(&value.to_string()),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
