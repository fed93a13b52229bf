//! End-to-end behaviour of the validation pipeline

use async_trait::async_trait;
use guardrail_pipeline::{
    validators::{FormatValidator, HallucinationValidator, PiiValidator, SemanticValidator},
    ChainEntry, DenialPolicy, ExecutionMode, FaultKind, FinalStatus, ModelClient, ModelInput,
    ModelOutput, PipelineEngine, RateLimitGate, RateLimiter, Request, RequestContext,
    RetryPolicy, ValidationChain, ValidationContext, Validator, ValidatorError, Verdict,
    VerdictStatus,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Validator that always returns the same status
struct Fixed {
    name: &'static str,
    status: VerdictStatus,
    calls: AtomicU32,
}

impl Fixed {
    fn new(name: &'static str, status: VerdictStatus) -> Arc<Self> {
        Arc::new(Self {
            name,
            status,
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Validator for Fixed {
    fn name(&self) -> &str {
        self.name
    }

    async fn check(
        &self,
        _request: &Request,
        _context: &ValidationContext,
    ) -> Result<Verdict, ValidatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Verdict::new(self.name, self.status, "fixed"))
    }
}

/// Model that times out a set number of times before answering
struct FlakyModel {
    timeouts: u32,
    calls: AtomicU32,
}

#[async_trait]
impl ModelClient for FlakyModel {
    async fn call_model(&self, _input: &ModelInput) -> Result<ModelOutput, ValidatorError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.timeouts {
            Err(ValidatorError::timeout("model did not answer"))
        } else {
            Ok(ModelOutput::new("entailment", 0.95))
        }
    }
}

fn engine(chain: ValidationChain) -> PipelineEngine {
    PipelineEngine::new(chain, Arc::new(RateLimiter::new(100.0, 10.0)))
}

#[tokio::test]
async fn test_fail_fast_short_circuit_records_one_verdict() {
    let a = Fixed::new("a", VerdictStatus::Fail);
    let b = Fixed::new("b", VerdictStatus::Pass);

    let chain = ValidationChain::new()
        .with_entry(ChainEntry::from_arc(a.clone()).fail_fast(true))
        .with_entry(ChainEntry::from_arc(b.clone()));

    let decision = engine(chain).run(&Request::new("x")).await.unwrap();

    assert_eq!(decision.final_status, FinalStatus::Block);
    assert_eq!(decision.verdicts.len(), 1);
    assert_eq!(decision.blocking_reasons().len(), 1);
    assert_eq!(b.calls(), 0);
}

#[tokio::test]
async fn test_all_pass_allows_unchanged_payload() {
    let chain = ValidationChain::new()
        .with_validator(FormatValidator::new(1, 100).unwrap())
        .with_validator(PiiValidator::new());

    let decision = engine(chain).run(&Request::new("plain text")).await.unwrap();

    assert_eq!(decision.final_status, FinalStatus::Allow);
    assert_eq!(decision.payload, "plain text");
    assert!(decision.verdicts.iter().all(|v| v.is_pass()));
}

#[tokio::test]
async fn test_mode_does_not_change_the_decision() {
    for mode in [ExecutionMode::Sequential, ExecutionMode::Parallel] {
        let chain = ValidationChain::new()
            .mode(mode)
            .with_entry(ChainEntry::from_arc(Fixed::new("a", VerdictStatus::Pass)))
            .with_entry(ChainEntry::from_arc(Fixed::new("b", VerdictStatus::Warn)))
            .with_entry(ChainEntry::from_arc(Fixed::new("c", VerdictStatus::Error)))
            .with_entry(ChainEntry::from_arc(Fixed::new("d", VerdictStatus::Pass)));

        let decision = engine(chain).run(&Request::new("x")).await.unwrap();

        assert_eq!(decision.final_status, FinalStatus::AllowWithWarnings, "{:?}", mode);
        let names: Vec<&str> = decision.verdicts.iter().map(|v| v.validator.as_str()).collect();
        assert_eq!(names, ["a", "b", "c", "d"]);
        assert_eq!(decision.warnings().len(), 2);
    }
}

#[tokio::test]
async fn test_critical_error_blocks() {
    let chain = ValidationChain::new()
        .with_entry(ChainEntry::from_arc(Fixed::new("a", VerdictStatus::Pass)))
        .with_entry(ChainEntry::from_arc(Fixed::new("b", VerdictStatus::Error)).critical(true));

    let decision = engine(chain).run(&Request::new("x")).await.unwrap();

    assert_eq!(decision.final_status, FinalStatus::Block);
    assert!(decision.verdict("b").unwrap().escalated);
}

#[tokio::test]
async fn test_repaired_payload_flows_downstream() {
    let chain = ValidationChain::new()
        .with_validator(PiiValidator::new())
        .with_validator(FormatValidator::new(1, 40).unwrap());

    let decision = engine(chain)
        .run(&Request::new("My SSN is 123-45-6789"))
        .await
        .unwrap();

    assert_eq!(decision.payload, "My SSN is <REDACTED_SSN>");
    assert_eq!(decision.final_status, FinalStatus::AllowWithWarnings);
    assert!(decision.verdict("format").unwrap().is_pass());
}

#[tokio::test(start_paused = true)]
async fn test_transient_model_faults_are_retried() {
    let model = Arc::new(FlakyModel {
        timeouts: 2,
        calls: AtomicU32::new(0),
    });
    let chain = ValidationChain::new()
        .with_entry(
            ChainEntry::new(HallucinationValidator::new(model.clone())).with_retry(
                RetryPolicy::new(3)
                    .with_base_delay(Duration::from_millis(100))
                    .retry_on(vec![FaultKind::Timeout]),
            ),
        );
    let request = Request::new("Armstrong walked on the Moon.")
        .with_context(RequestContext::new().with_document("Apollo 11 landed in 1969."));

    let start = Instant::now();
    let decision = engine(chain).run(&request).await.unwrap();

    assert_eq!(decision.final_status, FinalStatus::Allow);
    assert_eq!(decision.verdicts[0].attempts, 3);
    assert_eq!(model.calls.load(Ordering::SeqCst), 3);
    assert_eq!(start.elapsed(), Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_is_shared_across_concurrent_runs() {
    let model: Arc<dyn ModelClient> = Arc::new(guardrail_pipeline::StaticModel::new("similarity", 0.9));
    let limiter = Arc::new(RateLimiter::new(3.0, 0.0));
    let chain = ValidationChain::new()
        .with_rate_limit(RateLimitGate::new(
            Arc::clone(&limiter),
            DenialPolicy::Skip,
            Duration::ZERO,
        ))
        .with_validator(SemanticValidator::new(model));
    let engine = Arc::new(PipelineEngine::new(chain, limiter));

    let runs = (0..8).map(|i| {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            let request = Request::new(format!("answer {}", i))
                .with_context(RequestContext::new().with_query("question"));
            engine.run(&request).await.unwrap()
        })
    });
    let decisions: Vec<_> = futures::future::join_all(runs)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let allowed = decisions
        .iter()
        .filter(|d| d.final_status == FinalStatus::Allow)
        .count();
    let skipped = decisions
        .iter()
        .filter(|d| d.verdicts[0].message == "rate-limited, skipped")
        .count();

    assert_eq!(allowed, 3);
    assert_eq!(skipped, 5);
    assert_eq!(engine.rate_limiter().available(), 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_returns_partial_decision() {
    struct Stuck;

    #[async_trait]
    impl Validator for Stuck {
        fn name(&self) -> &str {
            "stuck"
        }

        async fn check(
            &self,
            _request: &Request,
            _context: &ValidationContext,
        ) -> Result<Verdict, ValidatorError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Verdict::pass("stuck", "eventually"))
        }
    }

    let chain = ValidationChain::new()
        .mode(ExecutionMode::Parallel)
        .with_validator(PiiValidator::new())
        .with_validator(Stuck);
    let engine = engine(chain).with_deadline(Duration::from_millis(500));

    let start = Instant::now();
    let decision = engine.run(&Request::new("call 555-123-4567")).await.unwrap();

    assert_eq!(start.elapsed(), Duration::from_millis(500));
    assert_eq!(decision.verdicts[0].status, VerdictStatus::Warn);
    assert_eq!(decision.verdicts[1].status, VerdictStatus::Error);
    assert_eq!(decision.verdicts[1].message, "deadline exceeded");
    assert_eq!(decision.payload, "call <REDACTED_PHONE>");
    assert_eq!(decision.final_status, FinalStatus::AllowWithWarnings);
}

#[tokio::test]
async fn test_decision_serializes_for_audit() {
    let chain = ValidationChain::new().with_validator(PiiValidator::new());
    let decision = engine(chain)
        .run(&Request::new("a@b.io").with_id("req-42"))
        .await
        .unwrap();

    let json = serde_json::to_value(&decision).unwrap();

    assert_eq!(json["request_id"], "req-42");
    assert_eq!(json["final_status"], "allow_with_warnings");
    assert_eq!(json["verdicts"][0]["status"], "warn");
    assert_eq!(json["payload"], "<REDACTED_EMAIL>");
}
