//! Request validation stage and validator collaborators.
//!
//! The validation stage runs every applicable validator, gathers all field
//! errors (not just the first) and short-circuits before the handler when any
//! are found.

use super::{Next, Stage};
use crate::context::{Payload, RequestEnvelope};
use crate::errors::{Failure, FieldError, PipelineResult};
use async_trait::async_trait;
use futures::future::join_all;
use regex::Regex;
use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// A validator for one request type.
#[async_trait]
pub trait Validator<Req: Payload>: Send + Sync {
    /// Returns whether this validator should run for `request`.
    fn applies_to(&self, _request: &Req) -> bool {
        true
    }

    /// Returns every rule violation found in `request`.
    ///
    /// Implementations may await I/O (e.g. a uniqueness lookup).
    async fn validate(&self, request: &Req) -> Vec<FieldError>;
}

/// A validator backed by a synchronous closure.
pub struct FnValidator<F, Req> {
    func: F,
    _types: PhantomData<fn(&Req)>,
}

impl<F, Req> FnValidator<F, Req>
where
    Req: Payload,
    F: Fn(&Req) -> Vec<FieldError> + Send + Sync,
{
    /// Creates a new closure-based validator.
    pub fn new(func: F) -> Self {
        Self {
            func,
            _types: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Req> Validator<Req> for FnValidator<F, Req>
where
    Req: Payload,
    F: Fn(&Req) -> Vec<FieldError> + Send + Sync,
{
    async fn validate(&self, request: &Req) -> Vec<FieldError> {
        (self.func)(request)
    }
}

type Check<Req> = Box<dyn Fn(&Req) -> bool + Send + Sync>;

struct Rule<Req> {
    field: String,
    message: String,
    check: Check<Req>,
}

/// A declarative set of field rules.
///
/// ```rust,ignore
/// let validator = RuleValidator::<CreateUser>::new()
///     .not_empty("Username", |r| r.username.as_str())
///     .max_length("Username", |r| r.username.as_str(), 32)
///     .matches("Email", |r| r.email.as_str(), email_regex, "'Email' is not a valid address.");
/// ```
pub struct RuleValidator<Req> {
    rules: Vec<Rule<Req>>,
}

impl<Req: Payload> Default for RuleValidator<Req> {
    fn default() -> Self {
        Self { rules: Vec::new() }
    }
}

impl<Req: Payload> RuleValidator<Req> {
    /// Creates an empty rule set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule: `predicate` must hold, otherwise `message` is reported
    /// against `field`.
    #[must_use]
    pub fn rule_for<P>(mut self, field: impl Into<String>, predicate: P, message: impl Into<String>) -> Self
    where
        P: Fn(&Req) -> bool + Send + Sync + 'static,
    {
        self.rules.push(Rule {
            field: field.into(),
            message: message.into(),
            check: Box::new(predicate),
        });
        self
    }

    /// Requires a non-blank string field.
    #[must_use]
    pub fn not_empty<A>(self, field: impl Into<String>, accessor: A) -> Self
    where
        A: Fn(&Req) -> &str + Send + Sync + 'static,
    {
        let field = field.into();
        let message = format!("'{field}' must not be empty.");
        self.rule_for(field, move |r| !accessor(r).trim().is_empty(), message)
    }

    /// Limits a string field to `max` characters.
    #[must_use]
    pub fn max_length<A>(self, field: impl Into<String>, accessor: A, max: usize) -> Self
    where
        A: Fn(&Req) -> &str + Send + Sync + 'static,
    {
        let field = field.into();
        let message = format!("'{field}' must be {max} characters or fewer.");
        self.rule_for(field, move |r| accessor(r).chars().count() <= max, message)
    }

    /// Requires a string field to match `pattern`.
    #[must_use]
    pub fn matches<A>(
        self,
        field: impl Into<String>,
        accessor: A,
        pattern: Regex,
        message: impl Into<String>,
    ) -> Self
    where
        A: Fn(&Req) -> &str + Send + Sync + 'static,
    {
        self.rule_for(field, move |r| pattern.is_match(accessor(r)), message)
    }

    /// Returns the number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if no rules are defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[async_trait]
impl<Req: Payload> Validator<Req> for RuleValidator<Req> {
    async fn validate(&self, request: &Req) -> Vec<FieldError> {
        self.rules
            .iter()
            .filter(|rule| !(rule.check)(request))
            .map(|rule| FieldError::new(&rule.field, &rule.message))
            .collect()
    }
}

/// Stage that rejects invalid requests before they reach the handler.
pub struct ValidationStage<Req: Payload> {
    name: String,
    validators: Vec<Arc<dyn Validator<Req>>>,
}

impl<Req: Payload> ValidationStage<Req> {
    /// Creates a stage running `validators`.
    #[must_use]
    pub fn new(validators: Vec<Arc<dyn Validator<Req>>>) -> Self {
        Self {
            name: "validation".to_string(),
            validators,
        }
    }

    /// Creates a stage with no validators (a pass-through).
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Adds a validator.
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn Validator<Req>>) -> Self {
        self.validators.push(validator);
        self
    }

    /// Overrides the stage name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Returns the number of registered validators.
    #[must_use]
    pub fn validator_count(&self) -> usize {
        self.validators.len()
    }

    /// Runs every applicable validator concurrently and returns the
    /// deduplicated errors in first-seen order.
    ///
    /// Fails only if the request is cancelled while validators are running.
    pub async fn collect_errors(&self, request: &RequestEnvelope<Req>) -> PipelineResult<Vec<FieldError>> {
        let payload = request.payload();
        let pending: Vec<_> = self
            .validators
            .iter()
            .filter(|v| v.applies_to(payload))
            .map(|v| v.validate(payload))
            .collect();

        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let results = request
            .cancellation()
            .run_until_cancelled(async { Ok(join_all(pending).await) })
            .await?;

        Ok(dedupe(results.into_iter().flatten()))
    }
}

/// Drops exact (field, message) repeats, keeping the first occurrence.
fn dedupe(errors: impl IntoIterator<Item = FieldError>) -> Vec<FieldError> {
    let mut seen = HashSet::new();
    errors
        .into_iter()
        .filter(|e| seen.insert((e.field.clone(), e.message.clone())))
        .collect()
}

impl<Req: Payload> std::fmt::Debug for ValidationStage<Req> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationStage")
            .field("name", &self.name)
            .field("validators", &self.validators.len())
            .finish()
    }
}

#[async_trait]
impl<Req: Payload, Res: Payload> Stage<Req, Res> for ValidationStage<Req> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke<'a>(
        &'a self,
        request: &'a RequestEnvelope<Req>,
        next: Next<'a, Req, Res>,
    ) -> PipelineResult<Res> {
        let errors = self
            .collect_errors(request)
            .await
            .map_err(|failure| failure.with_stage(&self.name))?;

        if errors.is_empty() {
            return next.run().await;
        }

        debug!(
            stage = %self.name,
            error_count = errors.len(),
            "Request failed validation"
        );
        Err(Failure::validation(errors).with_stage(&self.name))
    }
}
