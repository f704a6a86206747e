mod cli;
mod commands;
mod config;
mod format;
mod util;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, ScanArgs};
use crate::commands::{cmd_config, cmd_scan};
use crate::config::{Config, resolve_scan};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    // When quiet mode is enabled, suppress info-level logging
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load();

    match cli.command.unwrap_or_else(|| Commands::Scan(ScanArgs::default())) {
        Commands::Scan(args) => {
            let settings = resolve_scan(&args, &config)?;
            tracing::debug!("Scan settings: {:?}", settings);
            cmd_scan(&settings, args.format, args.output.as_ref(), cli.quiet).await?;
        }
        Commands::Config { action } => cmd_config(action, &config)?,
    }

    Ok(())
}
