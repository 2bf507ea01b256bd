//! Configuration loading and resolution
//!
//! Every setting resolves in the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is not an error: the service logs a warning and
//! starts on defaults. A TOML file that exists but does not parse is.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const ENV_CONFIG: &str = "CRM_CONFIG";
pub const ENV_BACKEND_URL: &str = "CRM_BACKEND_URL";
pub const ENV_ANON_KEY: &str = "CRM_ANON_KEY";
pub const ENV_CHAT_ENDPOINT: &str = "CRM_CHAT_ENDPOINT";
pub const ENV_BIND_ADDRESS: &str = "CRM_BIND_ADDRESS";

/// Path of the chat function relative to the backend URL
const CHAT_FUNCTION_PATH: &str = "/functions/v1/crm-chat";

/// Compiled fallback values
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub backend_url: String,
    pub bind_address: String,
    pub export_row_limit: usize,
    pub import_error_limit: usize,
    pub log_level: String,
}

impl Default for CompiledDefaults {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:54321".to_string(),
            bind_address: "127.0.0.1:5730".to_string(),
            export_row_limit: crate::export::EXPORT_ROW_LIMIT,
            import_error_limit: crate::import::ERROR_DETAIL_LIMIT,
            log_level: "info".to_string(),
        }
    }
}

/// `[logging]` section of the TOML file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

/// On-disk TOML configuration; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anon_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_row_limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_error_limit: Option<usize>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub backend_url: Option<String>,
    pub anon_key: Option<String>,
    pub chat_endpoint: Option<String>,
    pub bind_address: Option<String>,
}

/// Fully resolved configuration
#[derive(Debug, Clone)]
pub struct CrmConfig {
    pub backend_url: String,
    pub anon_key: String,
    pub chat_endpoint: String,
    pub bind_address: String,
    pub export_row_limit: usize,
    pub import_error_limit: usize,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl CrmConfig {
    /// Resolve configuration from CLI overrides, environment, TOML and defaults
    pub fn resolve(overrides: &ConfigOverrides) -> Result<Self> {
        let toml_config = match config_file_path(overrides) {
            Some(path) => load_toml_config(&path)?,
            None => {
                warn!("No config file found, using defaults");
                TomlConfig::default()
            }
        };

        Ok(Self::merge(overrides, &toml_config, &CompiledDefaults::default()))
    }

    /// Merge the four tiers; exposed for tests that avoid the filesystem
    pub fn merge(
        overrides: &ConfigOverrides,
        toml_config: &TomlConfig,
        defaults: &CompiledDefaults,
    ) -> Self {
        let backend_url = pick(
            overrides.backend_url.as_deref(),
            ENV_BACKEND_URL,
            toml_config.backend_url.as_deref(),
        )
        .unwrap_or_else(|| defaults.backend_url.clone());
        let backend_url = backend_url.trim_end_matches('/').to_string();

        let anon_key = pick(
            overrides.anon_key.as_deref(),
            ENV_ANON_KEY,
            toml_config.anon_key.as_deref(),
        )
        .unwrap_or_default();

        let chat_endpoint = pick(
            overrides.chat_endpoint.as_deref(),
            ENV_CHAT_ENDPOINT,
            toml_config.chat_endpoint.as_deref(),
        )
        .unwrap_or_else(|| format!("{}{}", backend_url, CHAT_FUNCTION_PATH));

        let bind_address = pick(
            overrides.bind_address.as_deref(),
            ENV_BIND_ADDRESS,
            toml_config.bind_address.as_deref(),
        )
        .unwrap_or_else(|| defaults.bind_address.clone());

        Self {
            backend_url,
            anon_key,
            chat_endpoint,
            bind_address,
            export_row_limit: toml_config
                .export_row_limit
                .unwrap_or(defaults.export_row_limit),
            import_error_limit: toml_config
                .import_error_limit
                .unwrap_or(defaults.import_error_limit),
            log_level: toml_config
                .logging
                .level
                .clone()
                .unwrap_or_else(|| defaults.log_level.clone()),
            log_file: toml_config.logging.file.clone(),
        }
    }

    /// Reject configurations the service cannot start with
    pub fn validate(&self) -> Result<()> {
        if !(self.backend_url.starts_with("http://") || self.backend_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "backend_url must be an http(s) URL, got '{}'",
                self.backend_url
            )));
        }
        if self.anon_key.trim().is_empty() {
            return Err(Error::Config(format!(
                "Backend anon key not configured. Set one of:\n\
                 1. Command line: --anon-key <key>\n\
                 2. Environment: {}=<key>\n\
                 3. TOML config: anon_key = \"<key>\"",
                ENV_ANON_KEY
            )));
        }
        if self.export_row_limit == 0 {
            return Err(Error::Config("export_row_limit must be positive".to_string()));
        }
        Ok(())
    }
}

/// First non-blank value among CLI, environment and TOML
fn pick(cli: Option<&str>, env_var: &str, toml_value: Option<&str>) -> Option<String> {
    if let Some(value) = cli.filter(|v| !v.trim().is_empty()) {
        return Some(value.to_string());
    }
    if let Ok(value) = std::env::var(env_var) {
        if !value.trim().is_empty() {
            debug!("{} taken from environment", env_var);
            return Some(value);
        }
    }
    toml_value
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
}

/// Locate the TOML file: CLI, then `CRM_CONFIG`, then `<config_dir>/crm/config.toml`
pub fn config_file_path(overrides: &ConfigOverrides) -> Option<PathBuf> {
    if let Some(path) = &overrides.config_path {
        return Some(path.clone());
    }
    if let Ok(path) = std::env::var(ENV_CONFIG) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    dirs::config_dir()
        .map(|d| d.join("crm").join("config.toml"))
        .filter(|p| p.exists())
}

/// Load a TOML config; a missing file yields defaults with a warning
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!("Config file {} not found, using defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML {} failed: {}", path.display(), e)))?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Write a TOML config, creating the parent directory if needed
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    // Write to a sibling temp file first so readers never see a torn file
    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_prefers_cli_over_toml() {
        let value = pick(Some("cli"), "CRM_TEST_UNSET_VARIABLE", Some("toml"));
        assert_eq!(value.as_deref(), Some("cli"));
    }

    #[test]
    fn test_pick_skips_blank_values() {
        let value = pick(Some("  "), "CRM_TEST_UNSET_VARIABLE", Some("toml"));
        assert_eq!(value.as_deref(), Some("toml"));
        assert!(pick(None, "CRM_TEST_UNSET_VARIABLE", Some("")).is_none());
    }

    #[test]
    fn test_validate_rejects_non_http_url() {
        let mut config = CrmConfig::merge(
            &ConfigOverrides::default(),
            &TomlConfig::default(),
            &CompiledDefaults::default(),
        );
        config.anon_key = "key".to_string();
        config.backend_url = "ftp://example.com".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
