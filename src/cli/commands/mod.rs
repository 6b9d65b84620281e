//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod config_cmd;
mod scrape;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings, LoadOptions};

#[derive(Parser)]
#[command(name = "roastbattle")]
#[command(about = "Profile acquisition for the roast battle game")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape a profile URL or slug, an article URL or title, or any web page
    Scrape {
        /// What to scrape
        target: String,
        /// Print the typed record as JSON instead of a summary
        #[arg(long)]
        json: bool,
        /// Treat the target as an article title rather than classifying it
        #[arg(long, conflicts_with = "page")]
        article: bool,
        /// Treat the target as a generic web page rather than classifying it
        #[arg(long)]
        page: bool,
    },

    /// Start the HTTP API
    Serve {
        /// Address to bind to: PORT, HOST, or HOST:PORT (default from config, then 0.0.0.0:8000)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Show the effective configuration
    Config,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
    };
    let (settings, config) = load_settings(options).await;

    match cli.command {
        Commands::Scrape {
            target,
            json,
            article,
            page,
        } => {
            let mode = if article {
                scrape::TargetMode::Article
            } else if page {
                scrape::TargetMode::Page
            } else {
                scrape::TargetMode::Auto
            };
            scrape::cmd_scrape(&settings, &target, mode, json).await
        }
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| settings.bind.clone());
            serve::cmd_serve(&settings, &bind).await
        }
        Commands::Config => config_cmd::cmd_config_show(&settings, &config),
    }
}
