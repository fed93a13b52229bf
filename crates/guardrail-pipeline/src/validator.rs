//! Validator trait definition

use async_trait::async_trait;

use crate::{
    error::ValidatorError,
    request::{Request, ValidationContext},
    Verdict,
};

/// Trait for implementing validators
///
/// A validator judges one aspect of a request and returns a [`Verdict`].
/// It must judge `context.payload` (which already carries repairs from
/// earlier validators) rather than `request.text`, and must not keep
/// per-request mutable state.
#[async_trait]
pub trait Validator: Send + Sync {
    /// Stable identity, used on verdicts and in configuration
    fn name(&self) -> &str;

    /// Judge the payload
    ///
    /// # Returns
    /// A verdict, or an error when no judgement could be made. Transient
    /// errors are retried by the caller's retry policy; anything else is
    /// treated as a validator bug.
    async fn check(
        &self,
        request: &Request,
        context: &ValidationContext,
    ) -> Result<Verdict, ValidatorError>;

    /// Rate-limit cost of one check
    ///
    /// `Some(cost)` marks the validator as calling an external model; the
    /// chain takes `cost` tokens from the shared limiter before each check.
    fn cost(&self) -> Option<f64> {
        None
    }

    /// Re-apply this validator's repair to arbitrary text
    ///
    /// Used to compose repairs from validators that ran concurrently over the
    /// same input. Validators that never repair keep the default.
    fn repair(&self, _text: &str) -> Option<String> {
        None
    }
}
