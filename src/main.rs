//! cachebench - Multi-threaded load generator for key-value cache engines

use anyhow::Result;
use clap::{CommandFactory, Parser};

mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Some(command) => cli::dispatch(command).await,
        None => {
            cli::Cli::command().print_help()?;
            Ok(())
        }
    }
}
