//! # Pipeguard
//!
//! A composable request pipeline with a guaranteed error boundary.
//!
//! Pipeguard runs each typed request through an ordered list of stages before
//! it reaches a terminal handler:
//!
//! - **Stage composition**: each stage wraps the rest of the chain and may
//!   pass through, short-circuit, or post-process the response
//! - **Validation**: every validator's field errors are collected before the
//!   handler is ever called
//! - **Logging**: structured entries around each request, with payload bodies
//!   only when explicitly enabled
//! - **Error boundary**: every failure (and panic) becomes a client-safe
//!   problem response while the full detail goes to the log sink
//! - **Cancellation**: cooperative, observed between stages and raced against
//!   the handler
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pipeguard::prelude::*;
//!
//! let pipeline = Pipeline::<CreateUser, UserCreated>::builder("users")
//!     .stage(Arc::new(LoggingStage::new(sink.clone(), LoggingConfig::default())))
//!     .stage(Arc::new(ValidationStage::new(vec![Arc::new(validator)])))
//!     .handler(Arc::new(CreateUserHandler::new(repo)))
//!     .build()?;
//!
//! let boundary = Boundary::new(sink, BoundaryConfig::default());
//! let response = boundary.run(&pipeline, &RequestEnvelope::new(request)).await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod boundary;
pub mod cancellation;
pub mod config;
pub mod context;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::boundary::{Boundary, ClientResponse, ProblemDetails};
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{BoundaryConfig, LoggingConfig, PipeguardConfig};
    pub use crate::context::{Payload, Principal, RequestEnvelope, RequestMetadata, ResponseEnvelope};
    pub use crate::errors::{ConfigError, Failure, FailureKind, FieldError, PipelineError, PipelineResult};
    pub use crate::events::{CollectingLogSink, LogSink, NoOpLogSink, Severity, TracingLogSink};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{FnHandler, Handler, Pipeline, PipelineBuilder, SyncFnHandler};
    pub use crate::stages::{
        AuthorizationStage, FnStage, FnValidator, LoggingStage, Next, RuleValidator, Stage,
        ValidationStage, Validator,
    };
}
