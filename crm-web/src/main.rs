//! crm-web - CRM application service
//!
//! Serves the CRM's JSON API on top of the managed backend. Configuration
//! resolves CLI > environment > TOML > compiled defaults; `--offline` swaps
//! the backend for seeded in-memory data.

use anyhow::{Context, Result};
use clap::Parser;
use crm_common::backend::{Backend, MemoryBackend, RestBackend};
use crm_common::chat::ChatClient;
use crm_common::config::ConfigOverrides;
use crm_web::{build_router, demo, logging, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "crm-web", version, about = "CRM application service")]
struct Args {
    /// TOML config file
    #[arg(short, long, env = "CRM_CONFIG")]
    config: Option<PathBuf>,

    /// Backend base URL
    #[arg(long)]
    backend_url: Option<String>,

    /// Backend anon (publishable) key
    #[arg(long)]
    anon_key: Option<String>,

    /// Streaming assistant endpoint
    #[arg(long)]
    chat_endpoint: Option<String>,

    /// Listen address (default 127.0.0.1:5730)
    #[arg(long)]
    bind: Option<String>,

    /// Serve seeded in-memory data instead of the backend
    #[arg(long, env = "CRM_OFFLINE")]
    offline: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let overrides = ConfigOverrides {
        config_path: args.config,
        backend_url: args.backend_url,
        anon_key: args.anon_key,
        chat_endpoint: args.chat_endpoint,
        bind_address: args.bind,
    };
    let config = logging::resolve_config(&overrides)?;
    logging::init_tracing(&config)?;

    // Build identification first, before any network work
    info!(
        "Starting CRM service (crm-web) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let backend: Arc<dyn Backend> = if args.offline {
        warn!("Offline mode: serving in-memory demo data");
        let memory = MemoryBackend::new();
        demo::seed(&memory).await;
        Arc::new(memory)
    } else {
        config.validate()?;
        info!("Backend: {}", config.backend_url);
        Arc::new(RestBackend::new(&config.backend_url, &config.anon_key)?)
    };

    let mut state = AppState::new(backend, config.clone());
    match ChatClient::new(&config.chat_endpoint) {
        Ok(client) if !args.offline => {
            info!("Assistant endpoint: {}", client.endpoint());
            state = state.with_chat(client);
        }
        Ok(_) => info!("Assistant disabled in offline mode"),
        Err(e) => warn!("Assistant disabled: {}", e),
    }

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Cannot bind {}", config.bind_address))?;
    info!("crm-web listening on http://{}", config.bind_address);
    info!("Health check: http://{}/health", config.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
