//! Model-backed relevance check

use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    error::ValidatorError,
    model::{ModelClient, ModelInput},
    request::{Request, ValidationContext},
    validator::Validator,
    Verdict,
};

/// Semantic relevance validator
///
/// Asks a similarity model how close the payload is to the request's query,
/// or to its first retrieved document when there is no query.
pub struct SemanticValidator {
    model: Arc<dyn ModelClient>,
    threshold: f64,
    strict: bool,
    cost: f64,
}

impl SemanticValidator {
    /// Create a validator with a 0.5 similarity threshold
    pub fn new(model: Arc<dyn ModelClient>) -> Self {
        Self {
            model,
            threshold: 0.5,
            strict: false,
            cost: 1.0,
        }
    }

    /// Minimum similarity for a pass, clamped to [0, 1]
    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = if threshold.is_nan() {
            0.0
        } else {
            threshold.clamp(0.0, 1.0)
        };
        if self.threshold != threshold {
            tracing::warn!(
                "Semantic threshold {} is outside [0, 1], using {}",
                threshold,
                self.threshold
            );
        }
        self
    }

    /// Fail instead of warn below the threshold
    pub fn strict(mut self, enabled: bool) -> Self {
        self.strict = enabled;
        self
    }

    /// Rate-limit tokens consumed per check
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    fn reference<'a>(request: &'a Request) -> Option<&'a str> {
        request
            .query()
            .or_else(|| request.documents().first().map(String::as_str))
    }
}

#[async_trait]
impl Validator for SemanticValidator {
    fn name(&self) -> &str {
        "semantic"
    }

    async fn check(
        &self,
        request: &Request,
        context: &ValidationContext,
    ) -> Result<Verdict, ValidatorError> {
        let Some(reference) = Self::reference(request) else {
            return Ok(Verdict::pass(self.name(), "no reference"));
        };

        let input = ModelInput::new(context.payload.as_str()).with_reference(reference);
        let output = self.model.call_model(&input).await?;

        if !output.score.is_finite() {
            return Ok(Verdict::error(
                self.name(),
                format!("model returned unusable score {}", output.score),
            ));
        }

        let message = format!(
            "similarity {:.2} (threshold {:.2})",
            output.score, self.threshold
        );
        let verdict = if output.score >= self.threshold {
            Verdict::pass(self.name(), message)
        } else if self.strict {
            Verdict::fail(self.name(), message)
        } else {
            Verdict::warn(self.name(), message)
        };

        Ok(verdict.with_score(output.score))
    }

    fn cost(&self) -> Option<f64> {
        Some(self.cost)
    }
}
