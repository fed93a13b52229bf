//! Personally identifiable information detection and redaction

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    error::{PipelineError, ValidatorError},
    request::{Request, ValidationContext},
    validator::Validator,
    Result, Verdict,
};

/// What the PII validator does with a match
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiMode {
    /// Replace matches with `<REDACTED_KIND>` and warn
    #[default]
    Redact,
    /// Fail the payload
    Block,
}

struct PiiPattern {
    kind: String,
    regex: Regex,
}

/// PII validator
///
/// Ships with email, phone and SSN detectors; more can be added by name.
/// Patterns are applied in insertion order, so SSNs are redacted before
/// the looser phone pattern can claim their digits.
pub struct PiiValidator {
    patterns: Vec<PiiPattern>,
    mode: PiiMode,
}

impl PiiValidator {
    pub fn new() -> Self {
        let builtin = [
            ("ssn", r"\b\d{3}-\d{2}-\d{4}\b"),
            ("email", r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}"),
            ("phone", r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b"),
        ];

        Self {
            patterns: builtin
                .iter()
                .filter_map(|(kind, p)| {
                    Regex::new(p).ok().map(|regex| PiiPattern {
                        kind: kind.to_string(),
                        regex,
                    })
                })
                .collect(),
            mode: PiiMode::Redact,
        }
    }

    /// Add a named detector; `kind` names the redaction token
    pub fn with_pattern(mut self, kind: &str, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| PipelineError::config(format!("Invalid PII pattern '{}': {}", kind, e)))?;
        self.patterns.push(PiiPattern {
            kind: kind.to_string(),
            regex,
        });
        Ok(self)
    }

    pub fn mode(mut self, mode: PiiMode) -> Self {
        self.mode = mode;
        self
    }

    /// Kinds of PII present in `text`, in detector order
    pub fn detect(&self, text: &str) -> Vec<&str> {
        self.patterns
            .iter()
            .filter(|p| p.regex.is_match(text))
            .map(|p| p.kind.as_str())
            .collect()
    }

    /// Replace every match with its redaction token
    pub fn redact(&self, text: &str) -> String {
        let mut redacted = text.to_string();
        for pattern in &self.patterns {
            let token = format!("<REDACTED_{}>", pattern.kind.to_uppercase());
            redacted = pattern
                .regex
                .replace_all(&redacted, regex::NoExpand(&token))
                .into_owned();
        }
        redacted
    }
}

impl Default for PiiValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Validator for PiiValidator {
    fn name(&self) -> &str {
        "pii"
    }

    async fn check(
        &self,
        _request: &Request,
        context: &ValidationContext,
    ) -> std::result::Result<Verdict, ValidatorError> {
        let found = self.detect(&context.payload);
        if found.is_empty() {
            return Ok(Verdict::pass(self.name(), "no PII detected"));
        }

        let kinds = found.join(", ");
        Ok(match self.mode {
            PiiMode::Block => Verdict::fail(self.name(), format!("PII detected: {}", kinds)),
            PiiMode::Redact => Verdict::warn(self.name(), format!("redacted PII: {}", kinds))
                .with_score(0.5)
                .with_repair(self.redact(&context.payload)),
        })
    }

    fn repair(&self, text: &str) -> Option<String> {
        match self.mode {
            PiiMode::Redact => Some(self.redact(text)),
            PiiMode::Block => None,
        }
    }
}
