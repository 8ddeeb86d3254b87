//! Command-line interface for strictly_games.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Strictly Games - local driver for the session engine
#[derive(Parser, Debug)]
#[command(name = "strictly_games")]
#[command(about = "Runs tic-tac-toe matches through the strictly_session engine", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play self-play matches and print events, replays and summaries as JSON
    Demo {
        /// Path to a TOML file with [engine] and [tictactoe] tables
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of matches to play
        #[arg(short, long, default_value = "1")]
        games: usize,

        /// Milliseconds each player thinks before moving
        #[arg(long, default_value = "0")]
        think_ms: u64,
    },

    /// Print the default configuration as TOML
    PrintConfig,
}
