//! Toxic language filtering

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::{
    error::{PipelineError, ValidatorError},
    request::{Request, ValidationContext},
    validator::Validator,
    Result, Verdict,
};

const TOXIC_PATTERNS: &[&str] = &[
    r"\b(?:fuck|shit|bitch|cunt)\b",
    r"\b(?:kill|murder|rape|terrorist)\b",
    r"\b(?:hate|racist|bigot)\b",
];

/// Replacement for masked matches
pub const MASK: &str = "***";

/// What the toxicity validator does with a match
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToxicityMode {
    /// Fail the payload
    #[default]
    Block,
    /// Replace matches with `***` and warn
    Mask,
}

/// Toxicity validator
///
/// Matches blocked phrases and regex patterns against the payload.
pub struct ToxicityValidator {
    /// Blocked patterns (regex)
    patterns: Vec<Regex>,
    /// Blocked exact phrases
    blocked_phrases: Vec<String>,
    /// Case sensitive matching
    case_sensitive: bool,
    mode: ToxicityMode,
}

impl ToxicityValidator {
    /// Create a validator with the built-in word list
    pub fn new() -> Self {
        Self {
            patterns: TOXIC_PATTERNS
                .iter()
                .filter_map(|p| build(p, false).ok())
                .collect(),
            blocked_phrases: Vec::new(),
            case_sensitive: false,
            mode: ToxicityMode::Block,
        }
    }

    /// Add blocked words/phrases
    pub fn with_phrases(mut self, phrases: Vec<String>) -> Self {
        self.blocked_phrases.extend(phrases);
        self
    }

    /// Add a regex pattern to block
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self> {
        self.patterns.push(build(pattern, self.case_sensitive)?);
        Ok(self)
    }

    /// Set case sensitivity for phrases and patterns added afterwards
    pub fn case_sensitive(mut self, enabled: bool) -> Self {
        self.case_sensitive = enabled;
        self
    }

    pub fn mode(mut self, mode: ToxicityMode) -> Self {
        self.mode = mode;
        self
    }

    /// First offending phrase or pattern, if any
    fn check_text(&self, text: &str) -> Option<String> {
        let text_to_check = if self.case_sensitive {
            text.to_string()
        } else {
            text.to_lowercase()
        };

        for phrase in &self.blocked_phrases {
            let phrase_to_check = if self.case_sensitive {
                phrase.clone()
            } else {
                phrase.to_lowercase()
            };

            if text_to_check.contains(&phrase_to_check) {
                return Some(format!("contains blocked phrase: {}", phrase));
            }
        }

        self.patterns
            .iter()
            .find(|p| p.is_match(text))
            .map(|p| format!("matches blocked pattern: {}", p.as_str()))
    }

    fn mask(&self, text: &str) -> String {
        let mut masked = text.to_string();
        for phrase in &self.blocked_phrases {
            if let Ok(regex) = build(&regex::escape(phrase), self.case_sensitive) {
                masked = regex.replace_all(&masked, MASK).into_owned();
            }
        }
        for pattern in &self.patterns {
            masked = pattern.replace_all(&masked, MASK).into_owned();
        }
        masked
    }
}

impl Default for ToxicityValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn build(pattern: &str, case_sensitive: bool) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(!case_sensitive)
        .build()
        .map_err(|e| PipelineError::config(format!("Invalid regex: {}", e)))
}

#[async_trait]
impl Validator for ToxicityValidator {
    fn name(&self) -> &str {
        "toxicity"
    }

    async fn check(
        &self,
        _request: &Request,
        context: &ValidationContext,
    ) -> std::result::Result<Verdict, ValidatorError> {
        let Some(reason) = self.check_text(&context.payload) else {
            return Ok(Verdict::pass(self.name(), "no toxic content"));
        };

        Ok(match self.mode {
            ToxicityMode::Block => Verdict::fail(self.name(), reason),
            ToxicityMode::Mask => Verdict::warn(self.name(), format!("masked: {}", reason))
                .with_score(0.5)
                .with_repair(self.mask(&context.payload)),
        })
    }

    fn repair(&self, text: &str) -> Option<String> {
        match self.mode {
            ToxicityMode::Mask => Some(self.mask(text)),
            ToxicityMode::Block => None,
        }
    }
}
