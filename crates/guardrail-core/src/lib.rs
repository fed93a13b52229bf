//! Guardrail Core
//!
//! Shared plumbing for the guardrail workspace: error handling,
//! layered configuration loading, and logging setup.

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{load_config, load_config_or_default, LoggingConfig, ENV_PREFIX};
pub use error::{CoreError, Result};
pub use logging::{init_logging, LogConfig};
