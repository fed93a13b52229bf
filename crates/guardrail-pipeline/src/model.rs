//! Boundary to external classification models
//!
//! Model-backed validators (semantic relevance, hallucination) talk to an
//! embedding or NLI model through [`ModelClient`]. The pipeline treats the
//! call as opaque; rate limiting and retries wrap it from outside.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ValidatorError;

/// What a model is asked to judge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInput {
    /// Text under judgement (the hypothesis for NLI models)
    pub text: String,
    /// Text to compare against (the premise for NLI models)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl ModelInput {
    pub fn new<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            reference: None,
        }
    }

    pub fn with_reference<S: Into<String>>(mut self, reference: S) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// Label and confidence returned by a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelOutput {
    pub label: String,
    pub score: f64,
}

impl ModelOutput {
    pub fn new<S: Into<String>>(label: S, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Client for an external model
///
/// Implementations report timeouts and transport problems as
/// [`ValidatorError::Transient`] so the retry policy can tell them apart
/// from bad input.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn call_model(&self, input: &ModelInput) -> Result<ModelOutput, ValidatorError>;
}

/// Model client that always answers the same thing
///
/// Useful for demos, for tests, and as a fail-open stand-in when no model
/// is deployed.
#[derive(Debug, Clone)]
pub struct StaticModel {
    output: ModelOutput,
}

impl StaticModel {
    pub fn new<S: Into<String>>(label: S, score: f64) -> Self {
        Self {
            output: ModelOutput::new(label, score),
        }
    }
}

#[async_trait]
impl ModelClient for StaticModel {
    async fn call_model(&self, _input: &ModelInput) -> Result<ModelOutput, ValidatorError> {
        Ok(self.output.clone())
    }
}
