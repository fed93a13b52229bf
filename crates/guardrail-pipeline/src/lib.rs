//! Guardrail Validation Pipeline
//!
//! Runs requests through an ordered chain of validators and folds their
//! verdicts into one decision: allow, allow with warnings, or block.
//! Model-backed validators share a token-bucket rate limiter, transient
//! faults are retried with exponential backoff, and repairs (redactions,
//! masking, sanitizing) flow down the chain.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use guardrail_pipeline::{
//!     ChainEntry, PipelineEngine, RateLimiter, Request, ValidationChain,
//!     validators::{InjectionValidator, PiiValidator},
//! };
//!
//! # tokio_test();
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn tokio_test() {
//! let chain = ValidationChain::new()
//!     .with_entry(ChainEntry::new(InjectionValidator::new()).fail_fast(true))
//!     .with_validator(PiiValidator::new());
//! let engine = PipelineEngine::new(chain, Arc::new(RateLimiter::new(10.0, 1.0)));
//!
//! let decision = engine.run(&Request::new("mail me: a@b.io")).await.unwrap();
//! assert_eq!(decision.payload, "mail me: <REDACTED_EMAIL>");
//! # }
//! ```

pub mod chain;
pub mod config;
pub mod decision;
pub mod engine;
pub mod error;
pub mod model;
pub mod rate_limiter;
pub mod registry;
pub mod request;
pub mod retry;
pub mod validator;
pub mod validators;
pub mod verdict;

// Re-exports
pub use chain::{ChainEntry, ChainSpec, DenialPolicy, ExecutionMode, RateLimitGate, ValidationChain};
pub use config::PipelineConfig;
pub use decision::{aggregate, Decision, FinalStatus};
pub use engine::PipelineEngine;
pub use error::{FaultKind, PipelineError, Result, ValidatorError};
pub use model::{ModelClient, ModelInput, ModelOutput, StaticModel};
pub use rate_limiter::RateLimiter;
pub use registry::ValidatorRegistry;
pub use request::{MetadataValue, Request, RequestContext, ValidationContext};
pub use retry::RetryPolicy;
pub use validator::Validator;
pub use verdict::{Verdict, VerdictStatus};
