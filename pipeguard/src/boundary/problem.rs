//! Client-facing response types.

use crate::context::ResponseEnvelope;
use crate::errors::FieldError;
use serde::Serialize;
use std::collections::BTreeMap;

/// A client-safe description of a failed request, shaped after RFC 7807.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProblemDetails {
    /// A URI reference identifying the problem type.
    #[serde(rename = "type")]
    pub type_uri: String,
    /// A short, fixed summary of the problem type.
    pub title: String,
    /// The HTTP status code.
    pub status: u16,
    /// Correlation id of the failed request.
    #[serde(rename = "traceId", skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Field-level errors (validation failures only).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

impl ProblemDetails {
    /// Groups the field errors by field, preserving message order.
    #[must_use]
    pub fn errors_by_field(&self) -> BTreeMap<String, Vec<String>> {
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for error in &self.errors {
            grouped
                .entry(error.field.clone())
                .or_default()
                .push(error.message.clone());
        }
        grouped
    }

    /// Returns true for 4xx statuses.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// Returns true for 5xx statuses.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }
}

/// What the boundary hands to the response transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ClientResponse<Res> {
    /// The pipeline produced a response.
    Success(ResponseEnvelope<Res>),
    /// The pipeline failed; only client-safe detail is included.
    Problem(ProblemDetails),
}

impl<Res> ClientResponse<Res> {
    /// The status code to send: 200 on success.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::Success(_) => 200,
            Self::Problem(problem) => problem.status,
        }
    }

    /// Returns true on success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns the problem details, if the request failed.
    #[must_use]
    pub fn problem(&self) -> Option<&ProblemDetails> {
        match self {
            Self::Success(_) => None,
            Self::Problem(problem) => Some(problem),
        }
    }

    /// Returns the successful payload, if any.
    #[must_use]
    pub fn payload(&self) -> Option<&Res> {
        match self {
            Self::Success(envelope) => Some(&envelope.payload),
            Self::Problem(_) => None,
        }
    }
}
