//! Layered configuration loading
//!
//! Settings are read from a file (TOML, JSON or YAML, chosen by extension)
//! and then overridden by environment variables sharing a prefix, e.g.
//! `GUARDRAIL__RATE_LIMIT__CAPACITY=20`.

use crate::error::{CoreError, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::Path;

/// Default environment prefix for overrides
pub const ENV_PREFIX: &str = "GUARDRAIL";

/// Logging section shared by every config file in the workspace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON format
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Load configuration from a file, with environment overrides
///
/// # Example
///
/// ```no_run
/// use guardrail_core::config::{load_config, LoggingConfig, ENV_PREFIX};
///
/// let logging: LoggingConfig = load_config("logging.toml", ENV_PREFIX).unwrap();
/// println!("level: {}", logging.level);
/// ```
pub fn load_config<T, P>(path: P, env_prefix: &str) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    if !path.exists() {
        return Err(CoreError::config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    let settings = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(
            config::Environment::with_prefix(env_prefix)
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;

    let loaded: T = settings.try_deserialize()?;

    tracing::info!("Configuration loaded from {}", path.display());

    Ok(loaded)
}

/// Load configuration, falling back to defaults if the file is missing or invalid
pub fn load_config_or_default<T, P>(path: P, env_prefix: &str) -> T
where
    T: DeserializeOwned + Default,
    P: AsRef<Path>,
{
    match load_config(path, env_prefix) {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[derive(Debug, Default, Deserialize)]
    struct Sample {
        #[serde(default)]
        logging: LoggingConfig,
        #[serde(default)]
        name: String,
    }

    #[test]
    fn test_default_logging_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert!(!config.json);
    }

    #[test]
    fn test_logging_config_from_json() {
        let config: LoggingConfig = serde_json::from_str(r#"{"json": true}"#).unwrap();
        assert_eq!(config.level, "info");
        assert!(config.json);
    }

    #[test]
    fn test_load_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "name = \"checks\"\n\n[logging]\nlevel = \"debug\"\n"
        )
        .unwrap();

        let sample: Sample = load_config(file.path(), "GUARDRAIL_CORE_TEST").unwrap();
        assert_eq!(sample.name, "checks");
        assert_eq!(sample.logging.level, "debug");
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result: Result<Sample> = load_config("nonexistent.toml", ENV_PREFIX);
        assert!(matches!(result, Err(CoreError::Config(_))));
    }

    #[test]
    fn test_load_or_default() {
        let sample: Sample = load_config_or_default("nonexistent.toml", ENV_PREFIX);
        assert!(sample.name.is_empty());
        assert_eq!(sample.logging, LoggingConfig::default());
    }
}
