//! CLI argument parsing and command dispatch

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod run;
mod validate;

#[derive(Parser)]
#[command(name = "cachebench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a stress test against the in-memory cache
    Run {
        /// Path to configuration file
        #[arg(short, long)]
        config: PathBuf,
        /// Also write the report as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Execute one subcommand
pub async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Run { config, output } => run::run(&config, output.as_deref()).await,
        Commands::Validate { config } => validate::validate(&config),
    }
}
