//! Logger sink abstraction.
//!
//! Stages and the boundary report what they observe through a [`LogSink`].
//! The sink decides the transport; the pipeline only assumes `emit` never
//! fails.

mod sink;

pub use sink::{
    render_template, CollectingLogSink, LogFields, LogRecord, LogSink, NoOpLogSink, Severity,
    TracingLogSink,
};
