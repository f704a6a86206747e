//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

#[derive(Debug, Parser)]
#[command(name = "nearby")]
#[command(author, version, about = "Log nearby Bluetooth devices", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Log bonded and nearby devices until interrupted
    Scan(ScanArgs),

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Clone, Copy, Subcommand)]
pub enum ConfigAction {
    /// Print the configuration file path
    Path,
    /// Print the effective configuration
    Show,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Output format for the session summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Where sighting lines are written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Standard output
    #[default]
    Console,
    /// Append to a file (requires --log-file)
    File,
    /// Through the diagnostic log at INFO level
    Tracing,
}

#[derive(Debug, Clone, Default, Args)]
pub struct ScanArgs {
    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(short, long)]
    pub duration: Option<u64>,

    /// Sighting line destination
    #[arg(short, long, value_enum, env = "NEARBY_SINK")]
    pub sink: Option<SinkKind>,

    /// File to append sighting lines to (implies --sink file)
    #[arg(short, long, env = "NEARBY_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Lines that may wait for a slow sink before being dropped
    #[arg(long)]
    pub queue_capacity: Option<usize>,

    /// Sighting events buffered for slow subscribers
    #[arg(long)]
    pub event_capacity: Option<usize>,

    /// Summary format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Write the summary to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_subcommand_parses() {
        let cli = Cli::try_parse_from(["nearby"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_scan_args() {
        let cli = Cli::try_parse_from([
            "nearby",
            "scan",
            "--duration",
            "30",
            "--sink",
            "tracing",
            "--event-capacity",
            "8",
            "-f",
            "json",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Scan(args)) => {
                assert_eq!(args.duration, Some(30));
                assert_eq!(args.sink, Some(SinkKind::Tracing));
                assert_eq!(args.event_capacity, Some(8));
                assert_eq!(args.format, OutputFormat::Json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["nearby", "-v", "-q"]).is_err());
    }
}
