//! Bounded retry with exponential backoff around one validator call

use backoff::{future::retry, ExponentialBackoff};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::{
    error::{FaultKind, ValidatorError},
    request::{Request, ValidationContext},
    validator::Validator,
    Verdict,
};

/// Retry policy for a single validator invocation
///
/// Only transient faults whose kind is listed in `retry_on` are retried.
/// Semantic outcomes (`fail`, `warn`) are verdicts, not faults, and are
/// never retried.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one (at least 1)
    max_attempts: u32,
    /// Delay before the second attempt
    base_delay: Duration,
    /// Growth factor between consecutive delays (at least 1.0)
    backoff_multiplier: f64,
    /// Upper bound for any single delay
    max_delay: Duration,
    /// Fault kinds worth retrying
    retry_on: Vec<FaultKind>,
    /// Upper bound for a single attempt; exceeding it is a timeout fault
    attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(5),
            retry_on: vec![FaultKind::Timeout, FaultKind::Connection],
            attempt_timeout: None,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with `max_attempts` and default backoff
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// A policy that makes exactly one attempt
    pub fn no_retry() -> Self {
        Self::new(1)
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the backoff multiplier (values below 1.0 are raised to 1.0)
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = if multiplier.is_finite() {
            multiplier.max(1.0)
        } else {
            1.0
        };
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Replace the set of retryable fault kinds
    pub fn retry_on(mut self, kinds: Vec<FaultKind>) -> Self {
        self.retry_on = kinds;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout
    }

    pub fn retryable_kinds(&self) -> &[FaultKind] {
        &self.retry_on
    }

    /// Delay slept after failed attempt number `attempt` (1-based)
    ///
    /// `base_delay * backoff_multiplier^(attempt - 1)`, capped by `max_delay`.
    /// This is the schedule [`execute`](Self::execute) follows.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);

        match Duration::try_from_secs_f64(secs) {
            Ok(delay) if delay < self.max_delay => delay,
            _ => self.max_delay,
        }
    }

    /// Check if an error should be retried under this policy
    pub fn is_retryable(&self, error: &ValidatorError) -> bool {
        error
            .fault_kind()
            .map_or(false, |kind| self.retry_on.contains(&kind))
    }

    /// Backoff schedule without jitter or an overall time limit
    fn backoff(&self) -> ExponentialBackoff {
        let initial = self.base_delay.min(self.max_delay);
        ExponentialBackoff {
            current_interval: initial,
            initial_interval: initial,
            randomization_factor: 0.0,
            multiplier: self.backoff_multiplier,
            max_interval: self.max_delay,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        }
    }

    /// Run `validator` under this policy
    ///
    /// # Returns
    /// * `Ok(verdict)` from the first successful attempt, stamped with the
    ///   total elapsed time and attempt count
    /// * `Ok(error verdict)` when transient faults exhausted the attempts or
    ///   the fault kind is not retryable
    /// * `Err` immediately for bugs and invalid input
    pub async fn execute(
        &self,
        validator: &dyn Validator,
        request: &Request,
        context: &ValidationContext,
    ) -> Result<Verdict, ValidatorError> {
        let started = Instant::now();
        let max_attempts = self.max_attempts.max(1);
        let attempts = AtomicU32::new(0);

        let operation = || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                match self.attempt(validator, request, context).await {
                    Ok(verdict) => Ok(verdict),
                    Err(error) if self.is_retryable(&error) && attempt < max_attempts => {
                        tracing::debug!(
                            "Validator {} attempt {}/{} failed ({}), retrying in {:?}",
                            validator.name(),
                            attempt,
                            max_attempts,
                            error,
                            self.delay_for(attempt)
                        );
                        Err(backoff::Error::Transient {
                            err: error,
                            retry_after: None,
                        })
                    }
                    Err(error) => Err(backoff::Error::Permanent(error)),
                }
            }
        };

        let result = retry(self.backoff(), operation).await;
        let attempts = attempts.load(Ordering::SeqCst);

        match result {
            Ok(mut verdict) => {
                if verdict.validator != validator.name() {
                    verdict.validator = validator.name().to_string();
                }
                Ok(verdict
                    .with_elapsed(started.elapsed())
                    .with_attempts(attempts))
            }
            Err(error) if !error.is_transient() => Err(error),
            Err(error) if !self.is_retryable(&error) => {
                tracing::warn!(
                    "Validator {} raised non-retryable fault: {}",
                    validator.name(),
                    error
                );
                Ok(Verdict::error(validator.name(), error.to_string())
                    .with_elapsed(started.elapsed())
                    .with_attempts(attempts))
            }
            Err(error) => {
                tracing::warn!(
                    "Validator {} gave up after {} attempt(s): {}",
                    validator.name(),
                    attempts,
                    error
                );
                Ok(Verdict::error(
                    validator.name(),
                    format!("{} (after {} attempts)", error, attempts),
                )
                .with_elapsed(started.elapsed())
                .with_attempts(attempts))
            }
        }
    }

    async fn attempt(
        &self,
        validator: &dyn Validator,
        request: &Request,
        context: &ValidationContext,
    ) -> Result<Verdict, ValidatorError> {
        match self.attempt_timeout {
            Some(limit) => tokio::time::timeout(limit, validator.check(request, context))
                .await
                .unwrap_or_else(|_| {
                    Err(ValidatorError::timeout(format!(
                        "attempt exceeded {:?}",
                        limit
                    )))
                }),
            None => validator.check(request, context).await,
        }
    }
}
