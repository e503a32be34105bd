//! adbroker CLI
//!
//! Command-line interface for inspecting the credentials held by adbroker.
//! It reads the same configuration and credential store as the daemon.
//!
//! # Usage
//!
//! ```bash
//! # Show whether the Amazon Ads account is connected
//! adbroker status
//!
//! # Print a valid access token, refreshing it if needed
//! adbroker token --format json
//! ```

use adbroker_core::{
    oauth::TokenEndpoint,
    store::create_store,
    token::{TokenInfo, TokenManager},
    token_manager::DefaultTokenManager,
    CredentialStore,
};
use adbroker_daemon::config::{self, DaemonConfig};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "adbroker")]
#[command(about = "Inspect Amazon Ads OAuth credentials managed by adbroker")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to the daemon's)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the state of the stored credentials
    Status {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Print a valid access token, refreshing it if necessary
    ///
    /// Assumes a single writer: a refresh done here is not seen by a running
    /// `adbrokerd`, which keeps serving its cached token until that expires.
    Token {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct TokenOutput<'a> {
    access_token: &'a str,
    expires_at: Option<DateTime<Utc>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        FmtSubscriber::builder()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(std::io::stderr)
            .init();
    }

    let config = match &cli.config {
        Some(path) => config::load_config_at(path)?,
        None => config::load_config()?,
    };

    let output = match cli.command {
        Commands::Status { format } => status(&config, format).await?,
        Commands::Token { format } => token(&config, format).await?,
    };

    println!("{}", output);
    Ok(())
}

async fn open_manager(
    config: &DaemonConfig,
) -> Result<DefaultTokenManager<Box<dyn CredentialStore>>> {
    let store = create_store(&config.store_backend()).context("Failed to open credential store")?;
    let endpoint = TokenEndpoint::new(config.provider_config(), config.request_timeout())
        .context("Failed to create token endpoint client")?;

    DefaultTokenManager::load(store, endpoint)
        .await
        .context("Failed to load stored credentials")
}

async fn status(config: &DaemonConfig, format: OutputFormat) -> Result<String> {
    let manager = open_manager(config).await?;
    render_status(&manager.token_info(), format)
}

/// Refreshes through the shared store without notifying a running daemon.
async fn token(config: &DaemonConfig, format: OutputFormat) -> Result<String> {
    let manager = open_manager(config).await?;

    let access_token = manager.get_valid_access_token().await.map_err(|e| {
        if e.requires_reauthentication() {
            anyhow::anyhow!("{}\nConnect the account through the daemon's /auth/login", e)
        } else {
            anyhow::Error::new(e)
        }
    })?;

    render_token(access_token.expose(), manager.cache().expires_at(), format)
}

fn render_status(info: &TokenInfo, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(info)?),
        OutputFormat::Text => {
            let mut lines = vec![format!(
                "Connected:          {}",
                if info.authenticated { "yes" } else { "no" }
            )];
            lines.push(format!(
                "Access token valid: {}",
                if info.access_token_valid { "yes" } else { "no" }
            ));
            if let Some(expires_at) = info.expires_at {
                lines.push(format!("Expires at:         {}", expires_at.to_rfc3339()));
            }
            Ok(lines.join("\n"))
        }
    }
}

fn render_token(
    access_token: &str,
    expires_at: Option<DateTime<Utc>>,
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(&TokenOutput {
            access_token,
            expires_at,
        })?),
        OutputFormat::Text => Ok(access_token.to_string()),
    }
}
