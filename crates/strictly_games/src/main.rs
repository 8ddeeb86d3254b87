//! Strictly Games - command-line driver for the session engine.

#![warn(missing_docs)]

mod cli;
mod config;
mod demo;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use config::GamesConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Demo {
            config,
            games,
            think_ms,
        } => {
            let config = match config {
                Some(path) => GamesConfig::from_file(path)?,
                None => GamesConfig::default(),
            };
            info!(games, think_ms, "Running self-play demo");
            demo::run(config, games, think_ms).await
        }
        Command::PrintConfig => {
            print!("{}", GamesConfig::default().to_toml()?);
            Ok(())
        }
    }
}
