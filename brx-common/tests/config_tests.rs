//! Configuration loading and environment override tests
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate BRX_* or GEMINI_API_KEY are marked with #[serial].

use brx_common::config::{load_toml_config, resolve_config_path, TomlConfig};
use brx_common::Error;
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

const ENV_VARS: [&str; 7] = [
    "BRX_CONFIG",
    "BRX_HOST",
    "BRX_PORT",
    "BRX_TEMP_DIR",
    "BRX_MODEL_PATH",
    "BRX_LOG_LEVEL",
    "GEMINI_API_KEY",
];

fn clear_env() {
    for var in ENV_VARS {
        env::remove_var(var);
    }
}

#[test]
fn test_missing_file_yields_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("does-not-exist.toml");

    let config = load_toml_config(&missing).unwrap();

    assert_eq!(config.server.port, 5000);
    assert_eq!(config.paths.model_path, PathBuf::from("respiratory_classifier.json"));
}

#[test]
fn test_malformed_file_is_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.toml");
    std::fs::write(&path, "[server]\nport = \"not a number\"\n").unwrap();

    let result = load_toml_config(&path);

    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_file_values_are_loaded() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("brx-ai.toml");
    std::fs::write(
        &path,
        r#"
[paths]
temp_dir = "/var/tmp/brx"
model_path = "/opt/brx/model.json"

[cleanup]
max_age_hours = 6

[logging]
level = "debug"
file = "/var/log/brx.log"
"#,
    )
    .unwrap();

    let config = load_toml_config(&path).unwrap();

    assert_eq!(config.paths.temp_dir, PathBuf::from("/var/tmp/brx"));
    assert_eq!(config.paths.model_path, PathBuf::from("/opt/brx/model.json"));
    assert_eq!(config.cleanup.max_age_hours, 6);
    assert_eq!(config.cleanup.sweep_interval_minutes, 60);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.file, Some(PathBuf::from("/var/log/brx.log")));
}

#[test]
#[serial]
fn test_cli_path_wins_over_env() {
    clear_env();
    env::set_var("BRX_CONFIG", "/from/env.toml");

    let cli = PathBuf::from("/from/cli.toml");
    assert_eq!(resolve_config_path(Some(&cli)), Some(cli.clone()));
    assert_eq!(resolve_config_path(None), Some(PathBuf::from("/from/env.toml")));

    clear_env();
}

#[test]
#[serial]
fn test_env_overrides_file_values() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("brx-ai.toml");
    std::fs::write(
        &path,
        "[server]\nport = 7000\n\n[explanation]\napi_key = \"toml-key\"\n",
    )
    .unwrap();

    env::set_var("BRX_PORT", "9100");
    env::set_var("BRX_MODEL_PATH", "/models/forest.json");
    env::set_var("GEMINI_API_KEY", "env-key");

    let config = TomlConfig::resolve(Some(&path)).unwrap();

    assert_eq!(config.server.port, 9100);
    assert_eq!(config.paths.model_path, PathBuf::from("/models/forest.json"));
    assert_eq!(config.explanation.usable_api_key(), Some("env-key"));

    clear_env();
}

#[test]
#[serial]
fn test_invalid_port_env_is_ignored() {
    clear_env();
    env::set_var("BRX_PORT", "not-a-port");

    let mut config = TomlConfig::default();
    config.apply_env_overrides();

    assert_eq!(config.server.port, 5000);

    clear_env();
}

#[test]
#[serial]
fn test_blank_api_key_env_is_ignored() {
    clear_env();
    env::set_var("GEMINI_API_KEY", "  ");

    let mut config = TomlConfig::default();
    config.apply_env_overrides();

    assert_eq!(config.explanation.usable_api_key(), None);

    clear_env();
}
