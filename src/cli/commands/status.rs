//! Status command implementation
//!
//! This module implements the `status` command for displaying the persisted
//! cursor and the failed-instance ledger.

use crate::config::load_config;
use crate::core::state::{CursorState, StateManager};
use clap::Args;
use std::path::PathBuf;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Read this state file instead of the configured one
    #[arg(short, long, value_name = "PATH")]
    pub state: Option<PathBuf>,

    /// Print the state file as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking export status");

        let path = match &self.state {
            Some(path) => path.clone(),
            None => match load_config(config_path) {
                Ok(c) => c.state.path,
                Err(e) => {
                    println!("❌ Failed to load configuration file");
                    println!("   Error: {e}");
                    return Ok(2); // Configuration error exit code
                }
            },
        };

        let state = match StateManager::read(&path).await {
            Ok(Some(state)) => state,
            Ok(None) => {
                println!("No export state found at {}.", path.display());
                println!("Run 'orthanc-export run' to start exporting.");
                return Ok(0);
            }
            Err(e) => {
                println!("❌ Failed to read export state");
                println!("   Error: {e}");
                return Ok(5); // Fatal error exit code
            }
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&state)?);
        } else {
            print_state(&path, &state);
        }
        Ok(0)
    }
}

fn print_state(path: &std::path::Path, state: &CursorState) {
    println!("📊 Export Status");
    println!();
    println!("  State File: {}", path.display());
    println!("  Last Update: {}", state.last_update);
    println!("  Failed Instances: {}", state.failed_instances.len());

    if state.failed_instances.is_empty() {
        println!();
        return;
    }

    println!();
    println!(
        "{:<48} {:<10} {:<20} {}",
        "Instance ID", "Seq", "Failed At", "Error"
    );
    println!("{}", "-".repeat(110));
    for failure in &state.failed_instances {
        println!(
            "{:<48} {:<10} {:<20} {}",
            failure.id,
            failure.seq,
            failure.failed_at.format("%Y-%m-%d %H:%M:%S"),
            failure.error
        );
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_status_without_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let args = StatusArgs {
            state: Some(dir.path().join("missing.json")),
            json: false,
        };
        assert_eq!(args.execute("unused.toml").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_status_with_corrupt_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{").unwrap();

        let args = StatusArgs {
            state: Some(path),
            json: true,
        };
        assert_eq!(args.execute("unused.toml").await.unwrap(), 5);
    }
}
