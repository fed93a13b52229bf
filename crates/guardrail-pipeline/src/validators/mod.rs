//! Built-in validators
//!
//! The heuristic validators (`format`, `injection`, `toxicity`, `pii`,
//! `bias`, `quality`) are pure regex checks. `semantic` and `hallucination` call a [`ModelClient`]
//! and report a rate-limit cost.
//!
//! [`ModelClient`]: crate::model::ModelClient

pub mod bias;
pub mod format;
pub mod hallucination;
pub mod injection;
pub mod pii;
pub mod quality;
pub mod semantic;
pub mod toxicity;

pub use bias::BiasValidator;
pub use format::FormatValidator;
pub use hallucination::HallucinationValidator;
pub use injection::InjectionValidator;
pub use pii::{PiiMode, PiiValidator};
pub use quality::QualityValidator;
pub use semantic::SemanticValidator;
pub use toxicity::{ToxicityMode, ToxicityValidator};
