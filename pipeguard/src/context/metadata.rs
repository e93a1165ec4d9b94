//! Per-request metadata carried alongside the payload.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// The subject identifier (user or service id).
    pub subject: String,
    /// Scopes granted to the subject.
    #[serde(default)]
    pub scopes: BTreeSet<String>,
}

impl Principal {
    /// Creates a principal with no scopes.
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            scopes: BTreeSet::new(),
        }
    }

    /// Grants a scope.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.insert(scope.into());
        self
    }

    /// Returns true if the principal holds `scope`.
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }
}

/// Capability flags and caller information for a single request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMetadata {
    /// Opts the request out of the authorization stage.
    #[serde(default)]
    pub allow_anonymous: bool,

    /// The authenticated caller, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,

    /// Free-form string items (route name, client address, ...).
    #[serde(default)]
    pub items: HashMap<String, String>,
}

impl RequestMetadata {
    /// Creates empty metadata.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the anonymous-access flag.
    #[must_use]
    pub fn with_allow_anonymous(mut self, allow: bool) -> Self {
        self.allow_anonymous = allow;
        self
    }

    /// Sets the principal.
    #[must_use]
    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    /// Adds an item.
    #[must_use]
    pub fn with_item(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.items.insert(key.into(), value.into());
        self
    }

    /// Looks up an item.
    #[must_use]
    pub fn item(&self, key: &str) -> Option<&str> {
        self.items.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_scopes() {
        let principal = Principal::new("alice").with_scope("orders:write");

        assert!(principal.has_scope("orders:write"));
        assert!(!principal.has_scope("orders:read"));
    }

    #[test]
    fn test_metadata_builder() {
        let metadata = RequestMetadata::new()
            .with_allow_anonymous(true)
            .with_item("route", "/health");

        assert!(metadata.allow_anonymous);
        assert!(metadata.principal.is_none());
        assert_eq!(metadata.item("route"), Some("/health"));
        assert_eq!(metadata.item("missing"), None);
    }

    #[test]
    fn test_metadata_deserialize_defaults() {
        let metadata: RequestMetadata =
            serde_json::from_str(r#"{"principal":{"subject":"svc"}}"#).unwrap();

        assert!(!metadata.allow_anonymous);
        assert_eq!(metadata.principal.unwrap().subject, "svc");
        assert!(metadata.items.is_empty());
    }
}
