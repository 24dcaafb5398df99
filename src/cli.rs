//! Command-line interface for nara_chess.

use clap::{Parser, Subcommand};
use nara_chess::LlmProvider;

/// Nara Chess - play against an LLM chess coach
#[derive(Parser, Debug)]
#[command(name = "nara_chess")]
#[command(about = "Chess against an LLM coach that explains its moves", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the TOML config file (defaults apply if it does not exist)
    #[arg(short, long, global = true, default_value = "nara_chess.toml")]
    pub config: std::path::PathBuf,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the coach backend (LLM proxy over HTTP)
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,

        /// LLM provider (gemini, openai, anthropic)
        #[arg(long)]
        provider: Option<LlmProvider>,
    },

    /// Play in the terminal against a running backend
    Play {
        /// Coach backend URL
        #[arg(long)]
        server_url: Option<String>,
    },
}
