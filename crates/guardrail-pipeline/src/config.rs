//! Configuration for the validation pipeline

use guardrail_core::{load_config, LoggingConfig, ENV_PREFIX};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use crate::{
    chain::{DenialPolicy, ExecutionMode},
    engine::PipelineEngine,
    registry::ValidatorRegistry,
    retry::RetryPolicy,
    validators::{PiiMode, ToxicityMode},
    PipelineError, Result,
};

/// Configuration for the validation pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Which validators run, and how
    #[serde(default)]
    pub chain: ChainConfig,

    /// Shared token bucket for model-backed validators
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Retry policy applied to every validator
    #[serde(default)]
    pub retry: RetryConfig,

    /// Per-request deadline in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_seconds: Option<f64>,

    /// Settings for the built-in validators
    #[serde(default)]
    pub builtins: BuiltinsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Chain layout
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default)]
    pub mode: ExecutionMode,

    /// Validators in evaluation order
    #[serde(default)]
    pub validators: Vec<EntryConfig>,
}

/// One chain entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryConfig {
    /// Registry id of the validator
    pub id: String,

    /// Stop the chain when this validator fails
    #[serde(default)]
    pub fail_fast: bool,

    /// Block the request when this validator errors
    #[serde(default)]
    pub critical: bool,
}

impl EntryConfig {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self {
            id: id.into(),
            fail_fast: false,
            critical: false,
        }
    }
}

/// Rate limiter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Bucket size in tokens
    #[serde(default = "default_capacity")]
    pub capacity: f64,

    /// Tokens added per second
    #[serde(default = "default_refill_rate")]
    pub refill_rate: f64,

    #[serde(default)]
    pub on_denied: DenialPolicy,

    /// How long the `wait` policy may wait for tokens
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

fn default_capacity() -> f64 {
    10.0
}

fn default_refill_rate() -> f64 {
    1.0
}

fn default_acquire_timeout_ms() -> u64 {
    1000
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            refill_rate: default_refill_rate(),
            on_denied: DenialPolicy::default(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
        }
    }
}

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Upper bound for a single attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_timeout_ms: Option<u64>,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    100
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    5000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_delay_ms: default_max_delay_ms(),
            attempt_timeout_ms: None,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        let policy = RetryPolicy::new(self.max_attempts)
            .with_base_delay(Duration::from_millis(self.base_delay_ms))
            .with_backoff_multiplier(self.backoff_multiplier)
            .with_max_delay(Duration::from_millis(self.max_delay_ms));

        match self.attempt_timeout_ms {
            Some(ms) => policy.with_attempt_timeout(Duration::from_millis(ms)),
            None => policy,
        }
    }
}

/// Settings for the built-in validators
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuiltinsConfig {
    #[serde(default)]
    pub format: FormatConfig,
    #[serde(default)]
    pub injection: InjectionConfig,
    #[serde(default)]
    pub toxicity: ToxicityConfig,
    #[serde(default)]
    pub pii: PiiConfig,
    #[serde(default)]
    pub bias: BiasConfig,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub semantic: SemanticConfig,
    #[serde(default)]
    pub hallucination: HallucinationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatConfig {
    #[serde(default = "default_min_length")]
    pub min_length: usize,

    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Extra forbidden regex patterns
    #[serde(default)]
    pub patterns: Vec<String>,
}

fn default_min_length() -> usize {
    1
}

fn default_max_length() -> usize {
    10_000
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            min_length: default_min_length(),
            max_length: default_max_length(),
            patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InjectionConfig {
    /// Extra injection regex patterns
    #[serde(default)]
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToxicityConfig {
    /// Blocked phrases
    #[serde(default)]
    pub phrases: Vec<String>,

    /// Blocked regex patterns
    #[serde(default)]
    pub patterns: Vec<String>,

    #[serde(default)]
    pub case_sensitive: bool,

    #[serde(default)]
    pub mode: ToxicityMode,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PiiConfig {
    #[serde(default)]
    pub mode: PiiMode,

    /// Extra detectors, keyed by the kind used in the redaction token
    #[serde(default)]
    pub patterns: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BiasConfig {
    /// Extra phrases per category, merged with the built-in categories
    #[serde(default)]
    pub categories: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub strict: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityConfig {
    #[serde(default = "default_min_words")]
    pub min_words: usize,

    /// Largest tolerated share of repeated words
    #[serde(default = "default_max_repetition_ratio")]
    pub max_repetition_ratio: f64,

    /// Extra uncertainty phrases
    #[serde(default)]
    pub markers: Vec<String>,

    /// Fail rather than warn on uncertainty phrases
    #[serde(default)]
    pub strict_uncertainty: bool,
}

fn default_min_words() -> usize {
    3
}

fn default_max_repetition_ratio() -> f64 {
    0.5
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_words: default_min_words(),
            max_repetition_ratio: default_max_repetition_ratio(),
            markers: Vec::new(),
            strict_uncertainty: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticConfig {
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    #[serde(default)]
    pub strict: bool,

    #[serde(default = "default_model_cost")]
    pub cost: f64,
}

fn default_threshold() -> f64 {
    0.5
}

fn default_model_cost() -> f64 {
    1.0
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            strict: false,
            cost: default_model_cost(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HallucinationConfig {
    #[serde(default)]
    pub strict: bool,

    #[serde(default = "default_model_cost")]
    pub cost: f64,
}

impl Default for HallucinationConfig {
    fn default() -> Self {
        Self {
            strict: false,
            cost: default_model_cost(),
        }
    }
}

impl PipelineConfig {
    /// Load and validate a config file, with `GUARDRAIL__*` overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: Self = load_config(path, ENV_PREFIX)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values the type system cannot
    pub fn validate(&self) -> Result<()> {
        let rate = &self.rate_limit;
        if !(rate.capacity.is_finite() && rate.capacity > 0.0) {
            return Err(PipelineError::config(format!(
                "rate_limit.capacity must be positive, got {}",
                rate.capacity
            )));
        }
        if !(rate.refill_rate.is_finite() && rate.refill_rate >= 0.0) {
            return Err(PipelineError::config(format!(
                "rate_limit.refill_rate must not be negative, got {}",
                rate.refill_rate
            )));
        }

        if self.retry.max_attempts < 1 {
            return Err(PipelineError::config("retry.max_attempts must be at least 1"));
        }
        if !(self.retry.backoff_multiplier.is_finite() && self.retry.backoff_multiplier >= 1.0) {
            return Err(PipelineError::config(format!(
                "retry.backoff_multiplier must be at least 1.0, got {}",
                self.retry.backoff_multiplier
            )));
        }

        if let Some(seconds) = self.deadline_seconds {
            if !(seconds.is_finite() && seconds > 0.0) {
                return Err(PipelineError::config(format!(
                    "deadline_seconds must be positive, got {}",
                    seconds
                )));
            }
            if Duration::try_from_secs_f64(seconds).is_err() {
                return Err(PipelineError::config(format!(
                    "deadline_seconds is out of range, got {}",
                    seconds
                )));
            }
        }

        let ratio = self.builtins.quality.max_repetition_ratio;
        if !(0.0..=1.0).contains(&ratio) {
            return Err(PipelineError::config(format!(
                "builtins.quality.max_repetition_ratio must be within [0, 1], got {}",
                ratio
            )));
        }

        let semantic = &self.builtins.semantic;
        if !(0.0..=1.0).contains(&semantic.threshold) {
            return Err(PipelineError::config(format!(
                "builtins.semantic.threshold must be within [0, 1], got {}",
                semantic.threshold
            )));
        }
        self.validate_cost("builtins.semantic.cost", semantic.cost)?;
        self.validate_cost("builtins.hallucination.cost", self.builtins.hallucination.cost)?;

        let mut seen = HashSet::new();
        for entry in &self.chain.validators {
            if entry.id.trim().is_empty() {
                return Err(PipelineError::config("chain.validators contains an empty id"));
            }
            if !seen.insert(entry.id.as_str()) {
                return Err(PipelineError::config(format!(
                    "validator '{}' appears more than once in the chain",
                    entry.id
                )));
            }
        }

        Ok(())
    }

    /// A model cost must fit in the bucket, or the validator could never run
    fn validate_cost(&self, field: &str, cost: f64) -> Result<()> {
        if !(cost.is_finite() && cost >= 0.0) {
            return Err(PipelineError::config(format!(
                "{} must be a non-negative number, got {}",
                field, cost
            )));
        }
        if cost > self.rate_limit.capacity {
            return Err(PipelineError::config(format!(
                "{} {} exceeds rate_limit.capacity {}",
                field, cost, self.rate_limit.capacity
            )));
        }
        Ok(())
    }

    /// Per-request deadline; `None` when unset or out of range
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_seconds
            .and_then(|seconds| Duration::try_from_secs_f64(seconds).ok())
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.rate_limit.acquire_timeout_ms)
    }

    /// Build an engine whose chain draws validators from `registry`
    pub fn build_engine(&self, registry: &ValidatorRegistry) -> Result<PipelineEngine> {
        PipelineEngine::from_config(self, registry)
    }
}
