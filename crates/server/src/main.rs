//! cask server binary.

use anyhow::{Context, Result};
use cask_core::config::AppConfig;
use cask_server::{AppState, create_router};
use cask_storage::VersionRepository;
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// cask - signs browser extensions and serves their update feed
#[derive(Parser, Debug)]
#[command(name = "caskd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "CASK_CONFIG", default_value = "config/server.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("cask v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    if config.signing.key_bits < 2048 {
        tracing::warn!(
            key_bits = config.signing.key_bits,
            "new application keys will be weaker than 2048 bits"
        );
    }

    cask_server::metrics::register_metrics();
    tracing::info!("Prometheus metrics registered");

    let storage = cask_storage::from_config(&config.storage, &config.signing)
        .await
        .context("failed to initialize storage")?;
    storage
        .health_check()
        .await
        .context("storage health check failed")?;
    tracing::info!(data_dir = %config.storage.data_dir.display(), "Storage initialized");

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    tracing::info!(feed_url = %config.server.feed_url(), "Serving update feed");

    let state = AppState::with_backend(config, storage);
    let app = create_router(state);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Load configuration from the optional TOML file and `CASK_` environment variables.
fn load_config(path: &str) -> Result<AppConfig> {
    let mut figment = Figment::new();

    if std::path::Path::new(path).exists() {
        tracing::info!(config_path = %path, "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::info!("No config file at {path}, using defaults and environment");
    }

    figment
        .merge(Env::prefixed("CASK_").split("__"))
        .extract()
        .context("failed to load configuration")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
