//! Configuration resolution and graceful degradation
//!
//! Covers:
//! - Missing TOML files SHALL NOT cause termination (warning + defaults)
//! - Priority order: command line → environment → TOML → compiled default
//! - Chat endpoint derived from the backend URL unless set explicitly
//! - TOML write/read round trip
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate CRM_* variables are marked with #[serial].

use crm_common::config::{
    load_toml_config, write_toml_config, CompiledDefaults, ConfigOverrides, CrmConfig,
    LoggingConfig, TomlConfig, ENV_ANON_KEY, ENV_BACKEND_URL, ENV_CHAT_ENDPOINT, ENV_CONFIG,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;

fn clear_env() {
    for var in [ENV_CONFIG, ENV_BACKEND_URL, ENV_ANON_KEY, ENV_CHAT_ENDPOINT, "CRM_BIND_ADDRESS"] {
        env::remove_var(var);
    }
}

#[test]
fn test_compiled_defaults() {
    let defaults = CompiledDefaults::default();
    assert_eq!(defaults.bind_address, "127.0.0.1:5730");
    assert_eq!(defaults.export_row_limit, 10_000);
    assert_eq!(defaults.import_error_limit, 5);
    assert_eq!(defaults.log_level, "info");
}

#[test]
#[serial]
fn test_defaults_when_nothing_configured() {
    clear_env();
    let config = CrmConfig::merge(
        &ConfigOverrides::default(),
        &TomlConfig::default(),
        &CompiledDefaults::default(),
    );
    assert_eq!(config.backend_url, CompiledDefaults::default().backend_url);
    assert_eq!(
        config.chat_endpoint,
        format!("{}/functions/v1/crm-chat", config.backend_url)
    );
    assert!(config.anon_key.is_empty());
    // No anon key: the service must refuse to start
    assert!(config.validate().is_err());
}

#[test]
#[serial]
fn test_priority_cli_over_env_over_toml() {
    clear_env();
    let toml_config = TomlConfig {
        backend_url: Some("https://toml.example.com".to_string()),
        anon_key: Some("toml-key".to_string()),
        ..TomlConfig::default()
    };

    let config = CrmConfig::merge(&ConfigOverrides::default(), &toml_config, &CompiledDefaults::default());
    assert_eq!(config.backend_url, "https://toml.example.com");
    assert_eq!(config.anon_key, "toml-key");

    env::set_var(ENV_BACKEND_URL, "https://env.example.com/");
    let config = CrmConfig::merge(&ConfigOverrides::default(), &toml_config, &CompiledDefaults::default());
    assert_eq!(config.backend_url, "https://env.example.com");
    assert_eq!(config.chat_endpoint, "https://env.example.com/functions/v1/crm-chat");

    let overrides = ConfigOverrides {
        backend_url: Some("https://cli.example.com".to_string()),
        ..ConfigOverrides::default()
    };
    let config = CrmConfig::merge(&overrides, &toml_config, &CompiledDefaults::default());
    assert_eq!(config.backend_url, "https://cli.example.com");
    assert!(config.validate().is_ok());

    clear_env();
}

#[test]
#[serial]
fn test_explicit_chat_endpoint_kept() {
    clear_env();
    env::set_var(ENV_CHAT_ENDPOINT, "https://chat.example.com/stream");
    let config = CrmConfig::merge(
        &ConfigOverrides::default(),
        &TomlConfig::default(),
        &CompiledDefaults::default(),
    );
    assert_eq!(config.chat_endpoint, "https://chat.example.com/stream");
    clear_env();
}

#[test]
fn test_missing_toml_file_yields_defaults() {
    let path = PathBuf::from("/nonexistent/crm/config.toml");
    let config = load_toml_config(&path).expect("missing file must not be an error");
    assert_eq!(config, TomlConfig::default());
}

#[test]
fn test_invalid_toml_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "backend_url = [unterminated").unwrap();
    assert!(load_toml_config(&path).is_err());
}

#[test]
fn test_toml_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let original = TomlConfig {
        backend_url: Some("https://project.example.com".to_string()),
        anon_key: Some("anon".to_string()),
        export_row_limit: Some(500),
        logging: LoggingConfig {
            level: Some("debug".to_string()),
            file: Some(PathBuf::from("/var/log/crm.log")),
        },
        ..TomlConfig::default()
    };
    write_toml_config(&original, &path).unwrap();

    let loaded = load_toml_config(&path).unwrap();
    assert_eq!(loaded, original);
}

#[test]
#[serial]
fn test_resolve_reads_config_from_env_path() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "backend_url = \"https://file.example.com\"\nanon_key = \"file-key\"\nimport_error_limit = 3\n\n[logging]\nlevel = \"warn\"\n",
    )
    .unwrap();
    env::set_var(ENV_CONFIG, &path);

    let config = CrmConfig::resolve(&ConfigOverrides::default()).unwrap();
    assert_eq!(config.backend_url, "https://file.example.com");
    assert_eq!(config.anon_key, "file-key");
    assert_eq!(config.import_error_limit, 3);
    assert_eq!(config.log_level, "warn");

    clear_env();
}
