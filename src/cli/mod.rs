//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for the exporter using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/orthanc/orthanc-export.toml";

/// Orthanc change feed exporter
#[derive(Parser, Debug)]
#[command(name = "orthanc-export")]
#[command(version, about, long_about = None)]
#[command(author = "Orthanc Export Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, env = "ORTHANC_EXPORT_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "ORTHANC_EXPORT_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Follow the change feed and export new instances until interrupted
    Run(commands::run::RunArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Show the persisted cursor and failed instances
    Status(commands::status::StatusArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_run() {
        let cli = Cli::parse_from(["orthanc-export", "run"]);
        assert_eq!(cli.config, DEFAULT_CONFIG_PATH);
        assert!(matches!(cli.command, Commands::Run(_)));
    }

    #[test]
    fn test_cli_parse_run_overrides() {
        let cli = Cli::parse_from([
            "orthanc-export",
            "--config",
            "custom.toml",
            "run",
            "-s",
            "/tmp/state.json",
            "--last",
            "6100",
        ]);
        assert_eq!(cli.config, "custom.toml");
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.state.as_deref(), Some(std::path::Path::new("/tmp/state.json")));
                assert_eq!(args.last, Some(6100));
                assert!(!args.skip_health_check);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_with_log_level() {
        let cli = Cli::parse_from(["orthanc-export", "--log-level", "debug", "status"]);
        assert_eq!(cli.log_level, Some("debug".to_string()));
        assert!(matches!(cli.command, Commands::Status(_)));
    }

    #[test]
    fn test_cli_parse_validate_config() {
        let cli = Cli::parse_from(["orthanc-export", "validate-config", "--check-connection"]);
        match cli.command {
            Commands::ValidateConfig(args) => assert!(args.check_connection),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_init() {
        let cli = Cli::parse_from(["orthanc-export", "init"]);
        assert!(matches!(cli.command, Commands::Init(_)));
    }
}
