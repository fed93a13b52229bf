//! Aggregated decisions over a whole chain

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::verdict::{Verdict, VerdictStatus};

/// Final outcome for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalStatus {
    /// Every check passed
    Allow,
    /// At least one check failed, or a blocking error occurred
    Block,
    /// Nothing blocked, but something warned or errored non-critically
    AllowWithWarnings,
}

/// Fold verdicts into a final status
///
/// `fail` or an escalated `error` blocks; any `warn` or plain `error`
/// downgrades to `allow_with_warnings`; an empty chain allows.
pub fn aggregate(verdicts: &[Verdict]) -> FinalStatus {
    let mut warned = false;

    for verdict in verdicts {
        match verdict.status {
            VerdictStatus::Fail => return FinalStatus::Block,
            VerdictStatus::Error if verdict.escalated => return FinalStatus::Block,
            VerdictStatus::Error | VerdictStatus::Warn => warned = true,
            VerdictStatus::Pass => {}
        }
    }

    if warned {
        FinalStatus::AllowWithWarnings
    } else {
        FinalStatus::Allow
    }
}

/// The aggregated outcome of a chain for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Id of the request this decision answers
    pub request_id: String,

    /// Aggregated status
    pub final_status: FinalStatus,

    /// Verdicts in declared chain order; validators that never ran are absent
    pub verdicts: Vec<Verdict>,

    /// Text after every repair has been applied in order
    pub payload: String,

    /// Total wall time of the run
    #[serde(with = "crate::verdict::duration_ms", default)]
    pub elapsed: Duration,
}

impl Decision {
    /// Build a decision, deriving the final status from the verdicts
    pub fn new<S: Into<String>>(
        request_id: S,
        verdicts: Vec<Verdict>,
        payload: String,
        elapsed: Duration,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            final_status: aggregate(&verdicts),
            verdicts,
            payload,
            elapsed,
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.final_status == FinalStatus::Block
    }

    pub fn is_allowed(&self) -> bool {
        !self.is_blocked()
    }

    /// Verdicts that caused a block
    pub fn blocking_reasons(&self) -> Vec<&Verdict> {
        self.verdicts
            .iter()
            .filter(|v| {
                v.status == VerdictStatus::Fail
                    || (v.status == VerdictStatus::Error && v.escalated)
            })
            .collect()
    }

    /// Verdicts that warned, including non-blocking errors
    pub fn warnings(&self) -> Vec<&Verdict> {
        self.verdicts
            .iter()
            .filter(|v| {
                v.status == VerdictStatus::Warn
                    || (v.status == VerdictStatus::Error && !v.escalated)
            })
            .collect()
    }

    /// Look up the verdict of a validator by name
    pub fn verdict(&self, validator: &str) -> Option<&Verdict> {
        self.verdicts.iter().find(|v| v.validator == validator)
    }

    /// One-line summary for audit logs
    pub fn summary(&self) -> String {
        match self.final_status {
            FinalStatus::Allow => "allowed".to_string(),
            FinalStatus::AllowWithWarnings => format!(
                "allowed with {} warning(s)",
                self.warnings().len()
            ),
            FinalStatus::Block => {
                let reasons: Vec<String> = self
                    .blocking_reasons()
                    .iter()
                    .map(|v| format!("{}: {}", v.validator, v.message))
                    .collect();
                format!("blocked ({})", reasons.join("; "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_chain_allows() {
        assert_eq!(aggregate(&[]), FinalStatus::Allow);
    }

    #[test]
    fn test_all_pass_allows() {
        let verdicts = vec![Verdict::pass("a", "ok"), Verdict::pass("b", "ok")];
        assert_eq!(aggregate(&verdicts), FinalStatus::Allow);
    }

    #[test]
    fn test_warn_downgrades() {
        let verdicts = vec![Verdict::pass("a", "ok"), Verdict::warn("b", "hmm")];
        assert_eq!(aggregate(&verdicts), FinalStatus::AllowWithWarnings);
    }

    #[test]
    fn test_fail_blocks_regardless_of_position() {
        let verdicts = vec![
            Verdict::warn("a", "hmm"),
            Verdict::pass("b", "ok"),
            Verdict::fail("c", "bad"),
        ];
        assert_eq!(aggregate(&verdicts), FinalStatus::Block);
    }

    #[test]
    fn test_error_depends_on_escalation() {
        let plain = vec![Verdict::error("a", "timeout fault")];
        assert_eq!(aggregate(&plain), FinalStatus::AllowWithWarnings);

        let escalated = vec![Verdict::error("a", "timeout fault").escalate()];
        assert_eq!(aggregate(&escalated), FinalStatus::Block);
    }

    #[test]
    fn test_blocking_reasons_and_summary() {
        let decision = Decision::new(
            "req-1",
            vec![
                Verdict::warn("pii", "redacted"),
                Verdict::fail("toxicity", "Matched blocked pattern"),
                Verdict::error("semantic", "deadline exceeded").escalate(),
            ],
            "text".to_string(),
            Duration::from_millis(5),
        );

        assert!(decision.is_blocked());
        let reasons = decision.blocking_reasons();
        assert_eq!(reasons.len(), 2);
        assert_eq!(reasons[0].validator, "toxicity");
        assert_eq!(decision.warnings().len(), 1);
        assert!(decision.summary().contains("toxicity: Matched blocked pattern"));
        assert!(decision.verdict("semantic").is_some());
        assert!(decision.verdict("format").is_none());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&FinalStatus::AllowWithWarnings).unwrap();
        assert_eq!(json, "\"allow_with_warnings\"");
    }
}
