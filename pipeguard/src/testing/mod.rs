//! Testing utilities for pipelines.
//!
//! This module provides:
//! - A shared call log and a recording stage for ordering assertions
//! - Canned handlers (static, counting, failing, slow)
//! - A misbehaving stage and a fixed-output validator

mod mocks;

pub use mocks::{
    CallLog, CountingHandler, DoubleNextStage, FailingHandler, RecordingStage, SlowHandler,
    StaticHandler, StaticValidator,
};
