//! Validation chain: ordering, short-circuit, concurrency and aggregation

use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;
use tokio::time::Instant;

use crate::{
    decision::Decision,
    error::ValidatorError,
    rate_limiter::RateLimiter,
    request::{Request, ValidationContext},
    retry::RetryPolicy,
    validator::Validator,
    verdict::{Verdict, VerdictStatus},
};

/// How the chain schedules its validators
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One validator at a time, in declared order
    #[default]
    Sequential,
    /// Consecutive non-fail-fast validators run concurrently
    Parallel,
}

/// What happens when the limiter has no tokens for a model-backed validator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialPolicy {
    /// Skip the check with a `warn` verdict
    #[default]
    Skip,
    /// Fail the check, blocking the request
    Block,
    /// Wait up to the acquire timeout, then skip
    Wait,
}

/// Rate-limit gate in front of model-backed validators
#[derive(Debug, Clone)]
pub struct RateLimitGate {
    limiter: Arc<RateLimiter>,
    on_denied: DenialPolicy,
    acquire_timeout: Duration,
}

impl RateLimitGate {
    pub fn new(limiter: Arc<RateLimiter>, on_denied: DenialPolicy, acquire_timeout: Duration) -> Self {
        Self {
            limiter,
            on_denied,
            acquire_timeout,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn on_denied(&self) -> DenialPolicy {
        self.on_denied
    }

    pub fn acquire_timeout(&self) -> Duration {
        self.acquire_timeout
    }

    async fn admit(&self, cost: f64) -> bool {
        match self.on_denied {
            DenialPolicy::Skip | DenialPolicy::Block => self.limiter.try_acquire(cost),
            DenialPolicy::Wait => {
                self.limiter
                    .acquire_blocking(cost, self.acquire_timeout)
                    .await
            }
        }
    }

    fn denied(&self, validator: &str) -> Verdict {
        tracing::warn!("Rate limiter denied validator {}", validator);
        match self.on_denied {
            DenialPolicy::Block => Verdict::fail(validator, "rate limit exceeded"),
            DenialPolicy::Skip | DenialPolicy::Wait => {
                Verdict::warn(validator, "rate-limited, skipped")
            }
        }
    }
}

/// One validator slot in a chain
#[derive(Clone)]
pub struct ChainEntry {
    validator: Arc<dyn Validator>,
    retry: Option<RetryPolicy>,
    fail_fast: bool,
    critical: bool,
}

impl ChainEntry {
    pub fn new<V: Validator + 'static>(validator: V) -> Self {
        Self::from_arc(Arc::new(validator))
    }

    pub fn from_arc(validator: Arc<dyn Validator>) -> Self {
        Self {
            validator,
            retry: None,
            fail_fast: false,
            critical: false,
        }
    }

    /// Stop the chain when this validator fails
    pub fn fail_fast(mut self, enabled: bool) -> Self {
        self.fail_fast = enabled;
        self
    }

    /// Escalate this validator's errors to a block
    pub fn critical(mut self, enabled: bool) -> Self {
        self.critical = enabled;
        self
    }

    /// Override the chain's default retry policy for this validator
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn name(&self) -> &str {
        self.validator.name()
    }
}

/// Introspection view of one chain entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntrySpec {
    pub validator: String,
    pub fail_fast: bool,
    pub critical: bool,
    pub rate_limited: bool,
}

/// Introspection view of a chain
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainSpec {
    pub mode: ExecutionMode,
    pub entries: Vec<EntrySpec>,
}

enum Outcome {
    Completed(Result<Verdict, ValidatorError>),
    Panicked(String),
    DeadlineExceeded,
}

/// Ordered chain of validators
///
/// In sequential mode a `fail` from a fail-fast entry stops evaluation; the
/// remaining validators never run and are absent from the decision. In
/// parallel mode the declared order is cut into stages: each fail-fast entry
/// runs alone and the entries between them run concurrently. Either way the
/// verdicts come back in declared order.
#[derive(Clone, Default)]
pub struct ValidationChain {
    entries: Vec<ChainEntry>,
    mode: ExecutionMode,
    default_retry: RetryPolicy,
    gate: Option<RateLimitGate>,
}

impl ValidationChain {
    /// Create an empty sequential chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a validator with default flags
    pub fn with_validator<V: Validator + 'static>(self, validator: V) -> Self {
        self.with_entry(ChainEntry::new(validator))
    }

    /// Append a configured entry
    pub fn with_entry(mut self, entry: ChainEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Set the execution mode
    pub fn mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Retry policy for entries without their own
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.default_retry = policy;
        self
    }

    /// Gate model-backed validators behind a shared limiter
    pub fn with_rate_limit(mut self, gate: RateLimitGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn rate_limit(&self) -> Option<&RateLimitGate> {
        self.gate.as_ref()
    }

    /// Describe the chain's configuration
    pub fn spec(&self) -> ChainSpec {
        ChainSpec {
            mode: self.mode,
            entries: self
                .entries
                .iter()
                .map(|e| EntrySpec {
                    validator: e.name().to_string(),
                    fail_fast: e.fail_fast,
                    critical: e.critical,
                    rate_limited: e.validator.cost().is_some(),
                })
                .collect(),
        }
    }

    /// Evaluate a request with a fresh context and no deadline
    pub async fn evaluate(&self, request: &Request) -> Decision {
        self.evaluate_with(request, &ValidationContext::new(request))
            .await
    }

    /// Evaluate a request under a caller-built context
    pub async fn evaluate_with(&self, request: &Request, context: &ValidationContext) -> Decision {
        let request = Arc::new(request.clone());
        let mut payload = context.payload.clone();
        let mut verdicts = Vec::with_capacity(self.entries.len());

        for stage in self.stages() {
            if context.is_expired() {
                for entry in &self.entries[stage.start..] {
                    verdicts.push(self.resolve(entry, Outcome::DeadlineExceeded, &request.id).0);
                }
                break;
            }

            let stage_input = payload.clone();
            let stage_context = Arc::new(context.with_payload(stage_input.clone()));
            let outcomes = self.run_stage(stage.clone(), &request, &stage_context).await;

            let mut stop = false;
            for (entry, outcome) in self.entries[stage].iter().zip(outcomes) {
                let (mut verdict, fatal) = self.resolve(entry, outcome, &request.id);

                if let Some(repaired) = verdict.repaired_payload.clone() {
                    if payload == stage_input {
                        payload = repaired;
                    } else if let Some(rederived) = entry.validator.repair(&payload) {
                        payload = rederived;
                    } else {
                        tracing::warn!(
                            "Repair from {} could not be composed with earlier repairs",
                            entry.name()
                        );
                        if verdict.status == VerdictStatus::Pass {
                            verdict.status = VerdictStatus::Warn;
                        }
                        verdict.message = format!(
                            "{}; repair not applied (conflicts with an earlier repair)",
                            verdict.message
                        );
                    }
                }

                if entry.fail_fast && verdict.is_fail() {
                    tracing::info!(
                        "Fail-fast validator {} stopped the chain for request {}",
                        entry.name(),
                        request.id
                    );
                    stop = true;
                }
                stop |= fatal;
                verdicts.push(verdict);
            }

            if stop {
                break;
            }
        }

        let decision = Decision::new(
            context.request_id.clone(),
            verdicts,
            payload,
            context.started_at.elapsed(),
        );
        tracing::debug!(
            "Request {} decided {:?} after {} verdict(s)",
            decision.request_id,
            decision.final_status,
            decision.verdicts.len()
        );
        decision
    }

    fn stages(&self) -> Vec<Range<usize>> {
        let count = self.entries.len();
        match self.mode {
            ExecutionMode::Sequential => (0..count).map(|i| i..i + 1).collect(),
            ExecutionMode::Parallel => {
                let mut stages = Vec::new();
                let mut start = 0;
                for (i, entry) in self.entries.iter().enumerate() {
                    if entry.fail_fast {
                        if start < i {
                            stages.push(start..i);
                        }
                        stages.push(i..i + 1);
                        start = i + 1;
                    }
                }
                if start < count {
                    stages.push(start..count);
                }
                stages
            }
        }
    }

    /// Spawn every entry of the stage, then collect in declared order
    ///
    /// Tasks still running at the deadline are detached, not aborted.
    async fn run_stage(
        &self,
        stage: Range<usize>,
        request: &Arc<Request>,
        context: &Arc<ValidationContext>,
    ) -> Vec<Outcome> {
        let handles: Vec<_> = self.entries[stage]
            .iter()
            .map(|entry| {
                let validator = Arc::clone(&entry.validator);
                let retry = entry.retry.clone().unwrap_or_else(|| self.default_retry.clone());
                let gate = self.gate.clone();
                let request = Arc::clone(request);
                let context = Arc::clone(context);

                tokio::spawn(async move {
                    invoke(validator, retry, gate, request, context).await
                })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            let joined = match context.deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, handle).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        outcomes.push(Outcome::DeadlineExceeded);
                        continue;
                    }
                },
                None => handle.await,
            };

            outcomes.push(match joined {
                Ok(result) => Outcome::Completed(result),
                Err(e) => Outcome::Panicked(panic_message(e)),
            });
        }
        outcomes
    }

    /// Turn an outcome into the recorded verdict; the flag marks a validator bug
    fn resolve(&self, entry: &ChainEntry, outcome: Outcome, request_id: &str) -> (Verdict, bool) {
        let name = entry.name();

        let (verdict, fatal) = match outcome {
            Outcome::Completed(Ok(verdict)) => (verdict, false),
            Outcome::Completed(Err(error)) => {
                tracing::error!(
                    "Validator {} is broken, blocking request {}: {}",
                    name,
                    request_id,
                    error
                );
                (Verdict::error(name, error.to_string()).with_attempts(1).escalate(), true)
            }
            Outcome::Panicked(message) => {
                tracing::error!(
                    "Validator {} panicked, blocking request {}: {}",
                    name,
                    request_id,
                    message
                );
                (
                    Verdict::error(name, format!("validator panicked: {}", message))
                        .with_attempts(1)
                        .escalate(),
                    true,
                )
            }
            Outcome::DeadlineExceeded => {
                tracing::warn!("Validator {} missed the deadline for request {}", name, request_id);
                (Verdict::error(name, "deadline exceeded"), false)
            }
        };

        let verdict = if verdict.status == VerdictStatus::Error && entry.critical {
            verdict.escalate()
        } else {
            verdict
        };

        match verdict.status {
            VerdictStatus::Fail => tracing::warn!(
                "Validator {} failed request {}: {}",
                name,
                request_id,
                verdict.message
            ),
            status => tracing::debug!(
                "Validator {} -> {:?} for request {}: {}",
                name,
                status,
                request_id,
                verdict.message
            ),
        }

        (verdict, fatal)
    }
}

async fn invoke(
    validator: Arc<dyn Validator>,
    retry: RetryPolicy,
    gate: Option<RateLimitGate>,
    request: Arc<Request>,
    context: Arc<ValidationContext>,
) -> Result<Verdict, ValidatorError> {
    let started = Instant::now();

    if let (Some(gate), Some(cost)) = (gate, validator.cost()) {
        if !gate.admit(cost).await {
            return Ok(gate
                .denied(validator.name())
                .with_elapsed(started.elapsed()));
        }
    }

    retry.execute(validator.as_ref(), &request, &context).await
}

fn panic_message(error: JoinError) -> String {
    if !error.is_panic() {
        return error.to_string();
    }

    let payload = error.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
