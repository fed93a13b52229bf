//! Response quality heuristics: length, repetition, hedging

use async_trait::async_trait;
use regex::Regex;
use std::collections::HashSet;

use crate::{
    error::{PipelineError, ValidatorError},
    request::{Request, ValidationContext},
    validator::Validator,
    Result, Verdict,
};

const UNCERTAINTY_MARKERS: &[&str] = &[
    "I don't know",
    "I am not sure",
    "I cannot answer",
    "As an AI language model",
];

/// Quality validator
///
/// Fails payloads with fewer than `min_words` words or with too small a
/// share of distinct words. Refusal and hedging phrases are a warning, or a
/// failure when uncertainty is strict.
pub struct QualityValidator {
    min_words: usize,
    max_repetition_ratio: f64,
    markers: Vec<String>,
    uncertainty: Regex,
    words: Regex,
    strict_uncertainty: bool,
}

impl QualityValidator {
    /// `max_repetition_ratio` is the largest tolerated share of repeated
    /// words, in [0, 1]
    pub fn new(min_words: usize, max_repetition_ratio: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&max_repetition_ratio) {
            return Err(PipelineError::config(format!(
                "quality: max_repetition_ratio must be within [0, 1], got {}",
                max_repetition_ratio
            )));
        }

        let markers: Vec<String> = UNCERTAINTY_MARKERS.iter().map(|m| m.to_string()).collect();
        Ok(Self {
            min_words,
            max_repetition_ratio,
            uncertainty: compile_markers(&markers)?,
            markers,
            words: Regex::new(r"[\w']+")
                .map_err(|e| PipelineError::config(format!("Invalid regex: {}", e)))?,
            strict_uncertainty: false,
        })
    }

    /// Add uncertainty phrases (matched case-insensitively)
    pub fn with_markers(mut self, markers: Vec<String>) -> Result<Self> {
        self.markers
            .extend(markers.into_iter().filter(|m| !m.trim().is_empty()));
        self.uncertainty = compile_markers(&self.markers)?;
        Ok(self)
    }

    /// Fail instead of warn on an uncertainty phrase
    pub fn strict_uncertainty(mut self, enabled: bool) -> Self {
        self.strict_uncertainty = enabled;
        self
    }

    /// Share of distinct words, 1.0 for an empty text
    fn unique_ratio(words: &[String]) -> f64 {
        if words.is_empty() {
            return 1.0;
        }
        let unique: HashSet<&str> = words.iter().map(String::as_str).collect();
        unique.len() as f64 / words.len() as f64
    }
}

fn compile_markers(markers: &[String]) -> Result<Regex> {
    let alternation = markers
        .iter()
        .map(|m| regex::escape(m.trim()))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?i)(?:{})", alternation))
        .map_err(|e| PipelineError::config(format!("Invalid regex: {}", e)))
}

#[async_trait]
impl Validator for QualityValidator {
    fn name(&self) -> &str {
        "quality"
    }

    async fn check(
        &self,
        _request: &Request,
        context: &ValidationContext,
    ) -> std::result::Result<Verdict, ValidatorError> {
        let words: Vec<String> = self
            .words
            .find_iter(&context.payload)
            .map(|m| m.as_str().to_lowercase())
            .collect();

        if words.len() < self.min_words {
            return Ok(Verdict::fail(
                self.name(),
                format!("{} word(s), below minimum {}", words.len(), self.min_words),
            ));
        }

        let unique = Self::unique_ratio(&words);
        if unique < 1.0 - self.max_repetition_ratio {
            return Ok(Verdict::fail(
                self.name(),
                format!("repetitive: {:.0}% distinct words", unique * 100.0),
            )
            .with_score(unique));
        }

        if let Some(found) = self.uncertainty.find(&context.payload) {
            let message = format!("uncertain response: \"{}\"", found.as_str());
            return Ok(if self.strict_uncertainty {
                Verdict::fail(self.name(), message)
            } else {
                Verdict::warn(self.name(), message).with_score(0.5)
            });
        }

        Ok(Verdict::pass(self.name(), "quality ok").with_score(unique))
    }
}
