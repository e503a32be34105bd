//! adbroker Daemon
//!
//! HTTP service that connects an Amazon Ads account through Login with
//! Amazon and keeps its access token fresh.
//!
//! # Running
//!
//! ```bash
//! cargo run -p adbroker-daemon
//! # or after install:
//! adbrokerd
//! ```

use adbroker_daemon::{api, config};
use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load_config()?;

    init_logging(&config.log_level);

    info!("Starting adbroker daemon...");
    info!("Loaded configuration from {:?}", config.config_path);

    run_daemon(config).await
}

fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run_daemon(config: config::DaemonConfig) -> Result<()> {
    let state = api::ApiState::from_config(&config).await?;

    let server_handle = api::start_server(config.listen_addr, state).await?;

    info!(
        "Daemon running on http://{}. Press Ctrl+C to stop.",
        server_handle.local_addr()
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received, stopping server...");

    server_handle.stop().await?;

    info!("Daemon stopped");
    Ok(())
}
