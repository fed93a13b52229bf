//! Verdicts produced by individual validators

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome class of one validator check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictStatus {
    /// Nothing to report
    Pass,
    /// The content violates the check
    Fail,
    /// Suspicious, or the check was skipped or repaired something
    Warn,
    /// The check itself could not produce a judgement
    Error,
}

/// Result of one validator over one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Name of the validator that produced it
    pub validator: String,

    /// Outcome class
    pub status: VerdictStatus,

    /// Confidence in 0.0..=1.0; meaning is validator-specific
    pub score: f64,

    /// Human-readable reason
    pub message: String,

    /// Replacement text, e.g. the payload with PII redacted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repaired_payload: Option<String>,

    /// Wall time spent producing the verdict, retries and backoff included
    #[serde(with = "duration_ms", default)]
    pub elapsed: Duration,

    /// Number of times the validator was invoked (0 when it never ran)
    #[serde(default)]
    pub attempts: u32,

    /// Set by the chain when this error blocks the decision
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub escalated: bool,

    /// When the verdict was produced
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl Verdict {
    /// Create a verdict with the given status
    pub fn new<N: Into<String>, M: Into<String>>(
        validator: N,
        status: VerdictStatus,
        message: M,
    ) -> Self {
        let score = match status {
            VerdictStatus::Pass => 1.0,
            _ => 0.0,
        };

        Self {
            validator: validator.into(),
            status,
            score,
            message: message.into(),
            repaired_payload: None,
            elapsed: Duration::ZERO,
            attempts: 0,
            escalated: false,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn pass<N: Into<String>, M: Into<String>>(validator: N, message: M) -> Self {
        Self::new(validator, VerdictStatus::Pass, message)
    }

    pub fn fail<N: Into<String>, M: Into<String>>(validator: N, message: M) -> Self {
        Self::new(validator, VerdictStatus::Fail, message)
    }

    pub fn warn<N: Into<String>, M: Into<String>>(validator: N, message: M) -> Self {
        Self::new(validator, VerdictStatus::Warn, message)
    }

    pub fn error<N: Into<String>, M: Into<String>>(validator: N, message: M) -> Self {
        Self::new(validator, VerdictStatus::Error, message)
    }

    /// Set the confidence score, clamped to 0.0..=1.0 (NaN becomes 0.0)
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = if score.is_nan() {
            0.0
        } else {
            score.clamp(0.0, 1.0)
        };
        self
    }

    /// Attach a repaired payload
    pub fn with_repair<S: Into<String>>(mut self, payload: S) -> Self {
        self.repaired_payload = Some(payload.into());
        self
    }

    /// Record how long the verdict took
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    /// Record how many invocations it took
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Mark an error verdict as blocking
    pub fn escalate(mut self) -> Self {
        self.escalated = true;
        self
    }

    pub fn is_pass(&self) -> bool {
        self.status == VerdictStatus::Pass
    }

    pub fn is_fail(&self) -> bool {
        self.status == VerdictStatus::Fail
    }
}

pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
