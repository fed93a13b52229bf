//! Length bounds and markup screening

use async_trait::async_trait;
use regex::Regex;

use crate::{
    error::{PipelineError, ValidatorError},
    request::{Request, ValidationContext},
    validator::Validator,
    Result, Verdict,
};

const FORBIDDEN_MARKUP: &[&str] = &[
    r"(?is)<script.*?>.*?</script>",
    r"(?i)javascript:",
    r"(?i)\bon\w+\s*=",
    r"(?i)\beval\s*\(",
    r"(?i)\bexec\s*\(",
];

/// Format validator
///
/// Rejects payloads outside the configured character-length bounds and
/// sanitizes payloads carrying script-like markup.
pub struct FormatValidator {
    min_length: usize,
    max_length: usize,
    forbidden: Vec<Regex>,
    script_blocks: Regex,
    event_handlers: Regex,
    tags: Regex,
}

impl FormatValidator {
    /// Create a format validator with the given length bounds
    pub fn new(min_length: usize, max_length: usize) -> Result<Self> {
        if min_length > max_length {
            return Err(PipelineError::config(format!(
                "format: min_length {} exceeds max_length {}",
                min_length, max_length
            )));
        }

        Ok(Self {
            min_length,
            max_length,
            forbidden: FORBIDDEN_MARKUP
                .iter()
                .map(|p| compile(p))
                .collect::<Result<_>>()?,
            script_blocks: compile(r"(?is)<script.*?</script>")?,
            event_handlers: compile(r#"(?i)\bon\w+\s*=\s*["'].*?["']"#)?,
            tags: compile(r"<[^>]+>")?,
        })
    }

    /// Add a forbidden regex pattern
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self> {
        self.forbidden.push(compile(pattern)?);
        Ok(self)
    }

    /// Strip markup, then every forbidden match until none are left
    ///
    /// Removing one match can splice together another
    /// (`javajavascript:script:`), so passes repeat while the text shrinks.
    fn sanitize(&self, text: &str) -> String {
        let text = self.script_blocks.replace_all(text, "");
        let text = self.event_handlers.replace_all(&text, "");
        let mut text = self.tags.replace_all(&text, "").into_owned();

        loop {
            let before = text.len();
            for pattern in &self.forbidden {
                text = pattern.replace_all(&text, "").into_owned();
            }
            if text.len() == before {
                break;
            }
        }

        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn is_clean(&self, text: &str) -> bool {
        !self.forbidden.iter().any(|p| p.is_match(text))
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| PipelineError::config(format!("Invalid regex: {}", e)))
}

#[async_trait]
impl Validator for FormatValidator {
    fn name(&self) -> &str {
        "format"
    }

    async fn check(
        &self,
        _request: &Request,
        context: &ValidationContext,
    ) -> std::result::Result<Verdict, ValidatorError> {
        let text = &context.payload;
        let length = text.chars().count();

        if length < self.min_length {
            return Ok(Verdict::fail(
                self.name(),
                format!("length {} below minimum {}", length, self.min_length),
            ));
        }
        if length > self.max_length {
            return Ok(Verdict::fail(
                self.name(),
                format!("length {} above maximum {}", length, self.max_length),
            ));
        }

        let matched: Vec<&str> = self
            .forbidden
            .iter()
            .filter(|p| p.is_match(text))
            .map(|p| p.as_str())
            .collect();
        if matched.is_empty() {
            return Ok(Verdict::pass(self.name(), "format ok"));
        }

        let sanitized = self.sanitize(text);
        if sanitized.is_empty() {
            return Ok(Verdict::fail(
                self.name(),
                "payload is nothing but forbidden markup",
            ));
        }
        if !self.is_clean(&sanitized) {
            return Ok(Verdict::fail(
                self.name(),
                "forbidden content survives sanitizing",
            ));
        }

        Ok(Verdict::warn(
            self.name(),
            format!("sanitized {} forbidden pattern(s)", matched.len()),
        )
        .with_score(0.5)
        .with_repair(sanitized))
    }

    fn repair(&self, text: &str) -> Option<String> {
        Some(self.sanitize(text))
    }
}
