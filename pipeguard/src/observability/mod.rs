//! Tracing subscriber setup.
//!
//! The library itself only emits through `tracing`; binaries and tests call
//! [`init_tracing`] once to route those events somewhere.

use serde::{Deserialize, Serialize};
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter directive used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Plain,
    /// One JSON object per event.
    Json,
}

/// Errors raised while installing the subscriber.
#[derive(Debug, thiserror::Error)]
pub enum ObservabilityError {
    /// A global subscriber was already installed.
    #[error("tracing subscriber already initialized: {0}")]
    AlreadyInitialized(#[from] TryInitError),
}

/// Builds the filter from `RUST_LOG`, falling back to [`DEFAULT_FILTER`].
#[must_use]
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs a global `fmt` subscriber.
///
/// # Errors
///
/// Returns [`ObservabilityError::AlreadyInitialized`] if a global subscriber
/// is already set.
pub fn init_tracing(format: LogFormat) -> Result<(), ObservabilityError> {
    let registry = tracing_subscriber::registry().with(env_filter());
    match format {
        LogFormat::Plain => registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .try_init()?,
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init()?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails_instead_of_panicking() {
        let _ = init_tracing(LogFormat::Plain);
        let err = init_tracing(LogFormat::Json).unwrap_err();
        assert!(err.to_string().contains("already initialized"));
    }

    #[test]
    fn test_log_format_deserializes() {
        let format: LogFormat = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(format, LogFormat::Json);
        assert_eq!(LogFormat::default(), LogFormat::Plain);
    }
}
