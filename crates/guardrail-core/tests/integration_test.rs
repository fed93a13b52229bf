//! Integration tests for the shared config and error plumbing

use std::io::Write;

use guardrail_core::{
    config::{load_config, load_config_or_default, LoggingConfig},
    error::{CoreError, Result},
    logging::LogConfig,
};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct Settings {
    #[serde(default)]
    logging: LoggingConfig,
    #[serde(default)]
    capacity: u32,
}

fn write_temp(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("Failed to create temp file");
    file.write_all(contents.as_bytes())
        .expect("Failed to write temp file");
    file
}

#[test]
fn test_load_json_file() {
    let file = write_temp(".json", r#"{"capacity": 12, "logging": {"level": "trace"}}"#);

    let settings: Settings = load_config(file.path(), "GUARDRAIL_IT_JSON").unwrap();
    assert_eq!(settings.capacity, 12);
    assert_eq!(settings.logging.level, "trace");
    assert!(!settings.logging.json);
}

#[test]
fn test_load_yaml_file() {
    let file = write_temp(".yaml", "capacity: 3\nlogging:\n  json: true\n");

    let settings: Settings = load_config(file.path(), "GUARDRAIL_IT_YAML").unwrap();
    assert_eq!(settings.capacity, 3);
    assert_eq!(settings.logging.level, "info");
    assert!(settings.logging.json);
}

#[test]
fn test_malformed_file_is_a_parse_error() {
    let file = write_temp(".toml", "capacity = [unterminated");

    let result: Result<Settings> = load_config(file.path(), "GUARDRAIL_IT_BAD");
    assert!(matches!(result, Err(CoreError::ConfigParse(_))));
}

#[test]
fn test_defaults_when_missing() {
    let settings: Settings = load_config_or_default("does-not-exist.toml", "GUARDRAIL_IT_MISSING");
    assert_eq!(settings.capacity, 0);
    assert_eq!(settings.logging.level, "info");
}

#[test]
fn test_log_config_from_loaded_section() {
    let file = write_temp(".toml", "[logging]\nlevel = \"warn\"\njson = true\n");

    let settings: Settings = load_config(file.path(), "GUARDRAIL_IT_LOG").unwrap();
    let log_config = LogConfig::from(&settings.logging);
    assert_eq!(log_config.level, "warn");
    assert!(log_config.json);
}
