//! Request context carried through the pipeline.
//!
//! This module provides:
//! - The request envelope (payload, correlation id, cancellation, metadata)
//! - The response envelope handed to the transport on success
//! - Capability flags and caller identity

mod envelope;
mod metadata;

pub use envelope::{short_type_name, Payload, RequestEnvelope, ResponseEnvelope};
pub use metadata::{Principal, RequestMetadata};
