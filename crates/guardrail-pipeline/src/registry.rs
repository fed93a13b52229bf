//! Validator lookup by configuration id

use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    config::BuiltinsConfig,
    model::ModelClient,
    validator::Validator,
    validators::{
        BiasValidator, FormatValidator, HallucinationValidator, InjectionValidator, PiiValidator,
        QualityValidator, SemanticValidator, ToxicityValidator,
    },
    Result,
};

/// Maps the ids used in `chain.validators` to validator instances
#[derive(Clone, Default)]
pub struct ValidatorRegistry {
    validators: HashMap<String, Arc<dyn Validator>>,
}

impl ValidatorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in validators
    ///
    /// The model-backed validators (`semantic`, `hallucination`) are only
    /// registered when a model client is supplied.
    pub fn with_builtins(
        builtins: &BuiltinsConfig,
        model: Option<Arc<dyn ModelClient>>,
    ) -> Result<Self> {
        let mut registry = Self::new();

        let mut format =
            FormatValidator::new(builtins.format.min_length, builtins.format.max_length)?;
        for pattern in &builtins.format.patterns {
            format = format.with_pattern(pattern)?;
        }
        registry.register("format", Arc::new(format));

        let mut injection = InjectionValidator::new();
        for pattern in &builtins.injection.patterns {
            injection = injection.with_pattern(pattern)?;
        }
        registry.register("injection", Arc::new(injection));

        let mut toxicity = ToxicityValidator::new()
            .case_sensitive(builtins.toxicity.case_sensitive)
            .with_phrases(builtins.toxicity.phrases.clone())
            .mode(builtins.toxicity.mode);
        for pattern in &builtins.toxicity.patterns {
            toxicity = toxicity.with_pattern(pattern)?;
        }
        registry.register("toxicity", Arc::new(toxicity));

        let mut pii = PiiValidator::new().mode(builtins.pii.mode);
        for (kind, pattern) in &builtins.pii.patterns {
            pii = pii.with_pattern(kind, pattern)?;
        }
        registry.register("pii", Arc::new(pii));

        let mut bias = BiasValidator::new().strict(builtins.bias.strict);
        for (category, phrases) in &builtins.bias.categories {
            bias = bias.with_phrases(category.as_str(), phrases.clone())?;
        }
        registry.register("bias", Arc::new(bias));

        let quality = QualityValidator::new(
            builtins.quality.min_words,
            builtins.quality.max_repetition_ratio,
        )?
        .with_markers(builtins.quality.markers.clone())?
        .strict_uncertainty(builtins.quality.strict_uncertainty);
        registry.register("quality", Arc::new(quality));

        if let Some(model) = model {
            registry.register(
                "semantic",
                Arc::new(
                    SemanticValidator::new(Arc::clone(&model))
                        .threshold(builtins.semantic.threshold)
                        .strict(builtins.semantic.strict)
                        .with_cost(builtins.semantic.cost),
                ),
            );
            registry.register(
                "hallucination",
                Arc::new(
                    HallucinationValidator::new(model)
                        .strict(builtins.hallucination.strict)
                        .with_cost(builtins.hallucination.cost),
                ),
            );
        }

        Ok(registry)
    }

    /// Register a validator under `id`, replacing any previous one
    pub fn register<S: Into<String>>(&mut self, id: S, validator: Arc<dyn Validator>) -> &mut Self {
        let id = id.into();
        if self.validators.insert(id.clone(), validator).is_some() {
            tracing::debug!("Replaced validator registered as {}", id);
        }
        self
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Validator>> {
        self.validators.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.validators.contains_key(id)
    }

    /// Registered ids, sorted
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.validators.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}
