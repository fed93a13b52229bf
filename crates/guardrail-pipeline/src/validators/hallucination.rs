//! Model-backed grounding check against retrieved documents

use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    error::ValidatorError,
    model::{ModelClient, ModelInput},
    request::{Request, ValidationContext},
    validator::Validator,
    Verdict,
};

/// Hallucination validator
///
/// Sends the retrieved documents (premise) and the payload (hypothesis) to an
/// NLI model. `contradiction` fails, `neutral` warns, `entailment` passes.
pub struct HallucinationValidator {
    model: Arc<dyn ModelClient>,
    strict: bool,
    cost: f64,
}

impl HallucinationValidator {
    pub fn new(model: Arc<dyn ModelClient>) -> Self {
        Self {
            model,
            strict: false,
            cost: 1.0,
        }
    }

    /// Fail unsupported (neutral) claims as well as contradictions
    pub fn strict(mut self, enabled: bool) -> Self {
        self.strict = enabled;
        self
    }

    /// Rate-limit tokens consumed per check
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }
}

#[async_trait]
impl Validator for HallucinationValidator {
    fn name(&self) -> &str {
        "hallucination"
    }

    async fn check(
        &self,
        request: &Request,
        context: &ValidationContext,
    ) -> Result<Verdict, ValidatorError> {
        let documents = request.documents();
        if documents.is_empty() {
            return Ok(Verdict::pass(self.name(), "no context"));
        }

        let input = ModelInput::new(context.payload.as_str()).with_reference(documents.join("\n"));
        let output = self.model.call_model(&input).await?;

        let verdict = match output.label.to_lowercase().as_str() {
            "entailment" => Verdict::pass(self.name(), "supported by context"),
            "neutral" if self.strict => Verdict::fail(self.name(), "not supported by context"),
            "neutral" => Verdict::warn(self.name(), "not supported by context"),
            "contradiction" => Verdict::fail(self.name(), "contradicts context"),
            other => {
                return Ok(Verdict::error(
                    self.name(),
                    format!("unrecognised model label '{}'", other),
                ))
            }
        };

        Ok(if output.score.is_finite() {
            verdict.with_score(output.score)
        } else {
            verdict
        })
    }

    fn cost(&self) -> Option<f64> {
        Some(self.cost)
    }
}
