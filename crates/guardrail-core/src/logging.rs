//! Logging setup
//!
//! Structured logging through `tracing`. `RUST_LOG` takes precedence over
//! the configured level when it is set.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{CoreError, Result};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (e.g., "info", "debug", "trace")
    pub level: String,
    /// Whether to use JSON format (vs. human-readable)
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl From<&LoggingConfig> for LogConfig {
    fn from(config: &LoggingConfig) -> Self {
        Self {
            level: config.level.clone(),
            json: config.json,
        }
    }
}

/// Initialize logging for the application
///
/// Call once at startup. A second call returns an error instead of
/// replacing the installed subscriber.
///
/// # Example
///
/// ```
/// use guardrail_core::logging::{init_logging, LogConfig};
///
/// let config = LogConfig {
///     level: "debug".to_string(),
///     json: false,
/// };
/// let _ = init_logging(config);
/// ```
pub fn init_logging(config: LogConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let installed = if config.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty())
            .try_init()
    };

    installed.map_err(|e| CoreError::logging(e.to_string()))?;

    tracing::info!("Logging initialized at level: {}", config.level);
    Ok(())
}
