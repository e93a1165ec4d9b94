//! Pipeline building and execution.
//!
//! This module provides:
//! - The terminal handler trait and closure adapters
//! - The pipeline builder with validation
//! - The composed pipeline

mod builder;
mod engine;
mod handler;

pub use builder::PipelineBuilder;
pub use engine::Pipeline;
pub use handler::{FnHandler, Handler, SyncFnHandler};
