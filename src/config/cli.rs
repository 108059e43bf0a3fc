//! Command-line arguments

use super::DEFAULT_CONFIG_FILE;
use crate::sync::SyncOptions;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Declarative git module synchronizer
#[derive(Debug, Parser)]
#[command(name = "demod", version)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Log format
    #[arg(short, long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub format: LogFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Show git commands and their output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the version
    Version,

    /// Sync all modules defined in config
    Sync(SyncArgs),
}

#[derive(Debug, Clone, Args)]
pub struct SyncArgs {
    /// Show what would be synced without making changes
    #[arg(long)]
    pub dry_run: bool,

    /// Maximum number of modules synced at once (default: all)
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

/// Output format for log events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl From<&SyncArgs> for SyncOptions {
    fn from(args: &SyncArgs) -> Self {
        SyncOptions {
            dry_run: args.dry_run,
            jobs: args.jobs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_defaults() {
        let cli = Cli::try_parse_from(["demod", "sync"]).expect("parse");
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_FILE));
        assert_eq!(cli.format, LogFormat::Text);
        assert!(!cli.no_color);
        match cli.command {
            Command::Sync(args) => {
                assert!(!args.dry_run);
                assert_eq!(args.jobs, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "demod", "sync", "--dry-run", "-c", "other.toml", "--format", "json", "--no-color",
            "-j", "2",
        ])
        .expect("parse");
        assert_eq!(cli.config, PathBuf::from("other.toml"));
        assert_eq!(cli.format, LogFormat::Json);
        assert!(cli.no_color);

        let Command::Sync(args) = cli.command else {
            panic!("expected sync command");
        };
        let options = SyncOptions::from(&args);
        assert!(options.dry_run);
        assert_eq!(options.jobs, Some(2));
    }

    #[test]
    fn test_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["demod", "--format", "xml", "sync"]).is_err());
    }

    #[test]
    fn test_version_subcommand() {
        let cli = Cli::try_parse_from(["demod", "version"]).expect("parse");
        assert!(matches!(cli.command, Command::Version));
    }
}
