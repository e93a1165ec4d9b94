//! Authorization stage.
//!
//! Requests flagged with `allow_anonymous` bypass the check. Everything else
//! needs a principal holding every required scope.

use super::{Next, Stage};
use crate::context::{Payload, RequestEnvelope};
use crate::errors::{Failure, PipelineResult};
use async_trait::async_trait;
use std::collections::BTreeSet;
use tracing::debug;

/// Stage that rejects requests without a sufficiently scoped principal.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationStage {
    required_scopes: BTreeSet<String>,
}

impl AuthorizationStage {
    /// Creates a stage that only requires an authenticated principal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a scope every principal must hold.
    #[must_use]
    pub fn require_scope(mut self, scope: impl Into<String>) -> Self {
        self.required_scopes.insert(scope.into());
        self
    }

    fn authorize<Req>(&self, request: &RequestEnvelope<Req>) -> PipelineResult<()> {
        let metadata = request.metadata();
        if metadata.allow_anonymous {
            return Ok(());
        }

        let Some(principal) = &metadata.principal else {
            return Err(Failure::unauthorized("request carries no principal").with_stage("authorization"));
        };

        let missing: Vec<&str> = self
            .required_scopes
            .iter()
            .filter(|scope| !principal.has_scope(scope))
            .map(String::as_str)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Failure::forbidden(format!(
                "principal '{}' lacks scope(s): {}",
                principal.subject,
                missing.join(", ")
            ))
            .with_stage("authorization")
            .with_context("subject", principal.subject.clone()))
        }
    }
}

#[async_trait]
impl<Req: Payload, Res: Payload> Stage<Req, Res> for AuthorizationStage {
    fn name(&self) -> &str {
        "authorization"
    }

    async fn invoke<'a>(
        &'a self,
        request: &'a RequestEnvelope<Req>,
        next: Next<'a, Req, Res>,
    ) -> PipelineResult<Res> {
        if let Err(failure) = self.authorize(request) {
            debug!(kind = %failure.kind, "Request rejected by authorization");
            return Err(failure);
        }
        next.run().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Principal;
    use crate::errors::FailureKind;

    fn stage() -> AuthorizationStage {
        AuthorizationStage::new().require_scope("orders:write")
    }

    #[test]
    fn test_anonymous_flag_bypasses_checks() {
        let request = RequestEnvelope::new(()).allow_anonymous();
        assert!(stage().authorize(&request).is_ok());
    }

    #[test]
    fn test_missing_principal_is_unauthorized() {
        let request = RequestEnvelope::new(());
        let failure = stage().authorize(&request).unwrap_err();
        assert_eq!(failure.kind, FailureKind::Unauthorized);
    }

    #[test]
    fn test_missing_scope_is_forbidden() {
        let request = RequestEnvelope::new(()).with_principal(Principal::new("bob").with_scope("orders:read"));
        let failure = stage().authorize(&request).unwrap_err();

        assert_eq!(failure.kind, FailureKind::Forbidden);
        assert!(failure.message.contains("orders:write"));
    }

    #[test]
    fn test_scoped_principal_passes() {
        let request = RequestEnvelope::new(()).with_principal(Principal::new("alice").with_scope("orders:write"));
        assert!(stage().authorize(&request).is_ok());
    }
}
