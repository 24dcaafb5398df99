//! Nara Chess - Unified CLI
//!
//! Runs the coach backend or the terminal client.

#![warn(missing_docs)]

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use nara_chess::{Config, LlmProvider, run_terminal, serve};
use tracing::{info, instrument};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { host, port, provider } => {
            initialize_tracing(false);
            run_server(&cli.config, host, port, provider).await
        }
        Command::Play { server_url } => {
            initialize_tracing(true);
            run_client(&cli.config, server_url).await
        }
    }
}

/// Run the coach backend
#[instrument(skip_all, fields(config_path = %config_path.display()))]
async fn run_server(
    config_path: &std::path::Path,
    host: Option<String>,
    port: Option<u16>,
    provider: Option<LlmProvider>,
) -> Result<()> {
    let mut config = Config::load_or_default(config_path)?;
    if let Some(host) = host {
        config.server_mut().set_host(host);
    }
    if let Some(port) = port {
        config.server_mut().set_port(port);
    }
    if let Some(provider) = provider {
        config.server_mut().set_llm_provider(provider);
    }

    info!("Starting Nara Chess coach server");
    serve(config.server()).await
}

/// Run the terminal client
#[instrument(skip_all, fields(config_path = %config_path.display()))]
async fn run_client(config_path: &std::path::Path, server_url: Option<String>) -> Result<()> {
    let mut config = Config::load_or_default(config_path)?;
    if let Some(url) = server_url {
        config.client_mut().set_server_url(url);
    }

    info!(server_url = %config.client().server_url(), "Starting terminal client");
    run_terminal(config.client()).await
}

/// Logs go to stderr; the terminal client keeps stdout for the board.
fn initialize_tracing(quiet: bool) {
    let default = if quiet { "warn,nara_chess=info" } else { "info,nara_chess=debug" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
