//! Stereotype phrase detection, grouped by bias category

use async_trait::async_trait;
use regex::Regex;
use std::collections::BTreeMap;

use crate::{
    error::{PipelineError, ValidatorError},
    request::{Request, ValidationContext},
    validator::Validator,
    Result, Verdict,
};

const BIAS_PHRASES: &[(&str, &[&str])] = &[
    (
        "gender",
        &[
            "man works",
            "woman cooks",
            "he is a doctor",
            "she is a nurse",
            "man is strong",
            "woman is weak",
        ],
    ),
    ("religion", &["radical", "extremist", "cult"]),
];

/// Bias validator
///
/// Flags payloads containing phrases from any configured category. A match
/// is a warning unless the validator is strict.
pub struct BiasValidator {
    phrases: BTreeMap<String, Vec<String>>,
    matchers: Vec<(String, Regex)>,
    strict: bool,
}

impl BiasValidator {
    /// Create a validator with the built-in gender and religion phrases
    pub fn new() -> Self {
        let phrases = BIAS_PHRASES
            .iter()
            .map(|(category, terms)| {
                (
                    category.to_string(),
                    terms.iter().map(|t| t.to_string()).collect(),
                )
            })
            .collect();

        let mut validator = Self {
            phrases,
            matchers: Vec::new(),
            strict: false,
        };
        // built-in phrases are escaped literals
        validator.matchers = validator.compile().unwrap_or_default();
        validator
    }

    /// Add phrases to `category`, creating it if needed
    pub fn with_phrases<S: Into<String>>(mut self, category: S, phrases: Vec<String>) -> Result<Self> {
        let category = category.into();
        if category.trim().is_empty() {
            return Err(PipelineError::config("bias: category name is empty"));
        }

        self.phrases
            .entry(category)
            .or_default()
            .extend(phrases.into_iter().filter(|p| !p.trim().is_empty()));
        self.matchers = self.compile()?;
        Ok(self)
    }

    /// Fail instead of warn on a match
    pub fn strict(mut self, enabled: bool) -> Self {
        self.strict = enabled;
        self
    }

    pub fn categories(&self) -> Vec<&str> {
        self.phrases.keys().map(String::as_str).collect()
    }

    fn compile(&self) -> Result<Vec<(String, Regex)>> {
        self.phrases
            .iter()
            .filter(|(_, terms)| !terms.is_empty())
            .map(|(category, terms)| {
                let alternation = terms
                    .iter()
                    .map(|t| regex::escape(t.trim()))
                    .collect::<Vec<_>>()
                    .join("|");
                Regex::new(&format!(r"(?i)\b(?:{})\b", alternation))
                    .map(|regex| (category.clone(), regex))
                    .map_err(|e| PipelineError::config(format!("Invalid regex: {}", e)))
            })
            .collect()
    }

    /// Matched phrases per category, lowercased and deduplicated
    pub fn detect(&self, text: &str) -> BTreeMap<String, Vec<String>> {
        let mut found = BTreeMap::new();
        for (category, regex) in &self.matchers {
            let mut hits: Vec<String> = regex
                .find_iter(text)
                .map(|m| m.as_str().to_lowercase())
                .collect();
            hits.dedup();
            if !hits.is_empty() {
                found.insert(category.clone(), hits);
            }
        }
        found
    }
}

impl Default for BiasValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Validator for BiasValidator {
    fn name(&self) -> &str {
        "bias"
    }

    async fn check(
        &self,
        _request: &Request,
        context: &ValidationContext,
    ) -> std::result::Result<Verdict, ValidatorError> {
        let found = self.detect(&context.payload);
        if found.is_empty() {
            return Ok(Verdict::pass(self.name(), "no biased phrasing"));
        }

        let message = format!(
            "potential bias: {}",
            found
                .iter()
                .map(|(category, hits)| format!("{} ({})", category, hits.join(", ")))
                .collect::<Vec<_>>()
                .join("; ")
        );
        let score = 1.0 - found.len() as f64 / self.matchers.len().max(1) as f64;

        Ok(if self.strict {
            Verdict::fail(self.name(), message)
        } else {
            Verdict::warn(self.name(), message).with_score(score)
        })
    }
}
