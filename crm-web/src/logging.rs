//! Tracing setup
//!
//! The log level and log file come from the resolved config, so config
//! resolution itself logs through a short-lived bootstrap subscriber.

use anyhow::{Context, Result};
use crm_common::config::{ConfigOverrides, CrmConfig};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

fn env_filter_or(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Resolve the config with its warnings written to `make_writer`
pub fn resolve_config_with<W>(
    overrides: &ConfigOverrides,
    filter: EnvFilter,
    make_writer: W,
) -> crm_common::Result<CrmConfig>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(make_writer)
        .finish();
    tracing::subscriber::with_default(bootstrap, || CrmConfig::resolve(overrides))
}

/// Resolve the config, logging to stderr (`RUST_LOG` or `info`)
pub fn resolve_config(overrides: &ConfigOverrides) -> crm_common::Result<CrmConfig> {
    resolve_config_with(overrides, env_filter_or("info"), std::io::stderr)
}

/// Install the global subscriber: `RUST_LOG`, else the configured level
pub fn init_tracing(config: &CrmConfig) -> Result<()> {
    let filter = env_filter_or(config.log_level.as_str());

    match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Cannot open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
    Ok(())
}
