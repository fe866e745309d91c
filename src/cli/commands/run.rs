//! Run command implementation
//!
//! This module implements the `run` command: follow the archive change feed
//! and export every new instance until a shutdown signal arrives.

use crate::adapters::orthanc::OrthancClient;
use crate::adapters::process::ProcessRunner;
use crate::config::{load_config, ExporterConfig};
use crate::core::export::{Exporter, RunSummary};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Override the state file path
    #[arg(short, long, value_name = "PATH")]
    pub state: Option<PathBuf>,

    /// Start after this change sequence, ignoring the persisted cursor
    #[arg(long, value_name = "SEQ")]
    pub last: Option<i64>,

    /// Do not query the archive's /system endpoint before starting
    #[arg(long)]
    pub skip_health_check: bool,
}

impl RunArgs {
    /// Apply CLI overrides to a loaded configuration
    pub fn apply_overrides(&self, config: &mut ExporterConfig) {
        if let Some(state) = &self.state {
            tracing::info!(path = %state.display(), "Overriding state file from CLI");
            config.state.path = state.clone();
        }
        if let Some(last) = self.last {
            tracing::info!(last_update = last, "Overriding cursor from CLI");
            config.state.last_update = Some(last);
        }
    }

    /// Execute the run command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting run command");

        let mut config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load configuration");
                eprintln!("Failed to load configuration: {e}");
                return Ok(2); // Configuration error exit code
            }
        };
        self.apply_overrides(&mut config);

        let client = match OrthancClient::new(config.archive.clone()) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Invalid archive configuration: {e}");
                return Ok(2);
            }
        };

        if !self.skip_health_check {
            if let Err(e) = client.health_check().await {
                tracing::error!(error = %e, base_url = %config.archive.base_url, "Archive unreachable");
                eprintln!("Cannot reach archive at {}: {e}", config.archive.base_url);
                return Ok(4); // Connection error exit code
            }
        }

        let runner = ProcessRunner::new(
            config
                .export
                .command_timeout_seconds
                .map(Duration::from_secs),
        );
        let shutdown_timeout = Duration::from_secs(config.export.shutdown_timeout_secs);

        let exporter = match Exporter::new(config, Arc::new(client), Arc::new(runner)).await {
            Ok(e) => e,
            Err(e) => {
                crate::log_error_with_context!(&e, "Failed to initialize exporter");
                eprintln!("Failed to initialize exporter: {e}");
                return Ok(5); // Fatal error exit code
            }
        };

        println!("🚀 Following change feed from sequence {}...", exporter.cursor());

        let mut handle = tokio::spawn(exporter.run(shutdown_signal.clone()));

        let joined = tokio::select! {
            joined = &mut handle => joined,
            _ = wait_for_shutdown(shutdown_signal) => {
                tracing::debug!(
                    timeout_secs = shutdown_timeout.as_secs(),
                    "Waiting for the current item to finish"
                );
                match tokio::time::timeout(shutdown_timeout, &mut handle).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        tracing::warn!(
                            timeout_secs = shutdown_timeout.as_secs(),
                            "Shutdown timeout exceeded, aborting export worker"
                        );
                        handle.abort();
                        eprintln!("Shutdown timed out; the current instance will be exported again on restart");
                        return Ok(130);
                    }
                }
            }
        };

        let summary = match joined {
            Ok(Ok(summary)) => summary,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Export worker failed");
                eprintln!("Export failed: {e}");
                return Ok(5);
            }
            Err(e) => {
                tracing::error!(error = %e, "Export worker panicked or was cancelled");
                eprintln!("Export failed: {e}");
                return Ok(5);
            }
        };

        print_summary(&summary);

        let exit_code = if summary.interrupted {
            println!("⚠️  Exporter stopped. Progress saved; run the same command to resume.");
            130 // SIGINT exit code (standard Unix convention)
        } else if summary.is_successful() {
            0
        } else {
            1 // Partial success
        };
        Ok(exit_code)
    }
}

/// Resolves once shutdown is requested; never resolves if the sender is gone
async fn wait_for_shutdown(mut signal: watch::Receiver<bool>) {
    while !*signal.borrow() {
        if signal.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("📊 Export Summary:");
    println!("  Instances Processed: {}", summary.instances_processed);
    println!("  Exported: {}", summary.instances_exported);
    println!("  Failed: {}", summary.instances_failed);
    println!("  Artifacts Written: {}", summary.artifacts_written);
    println!("  Destinations Skipped: {}", summary.destinations_skipped);
    println!("  Checkpoints: {}", summary.checkpoints);
    if let Some(cursor) = summary.last_cursor {
        println!("  Last Cursor: {cursor}");
    }
    println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
    println!();

    if !summary.failures.is_empty() {
        println!("⚠️  Failed instances:");
        for failure in summary.failures.iter().take(10) {
            println!("  - {} (seq {}): {}", failure.id, failure.seq, failure.message);
        }
        if summary.failures.len() > 10 {
            println!("  ... and {} more", summary.failures.len() - 10);
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_overrides() {
        let args = RunArgs {
            state: Some(PathBuf::from("/tmp/state.json")),
            last: Some(7000),
            skip_health_check: false,
        };
        let mut config = ExporterConfig::default();
        args.apply_overrides(&mut config);

        assert_eq!(config.state.path, PathBuf::from("/tmp/state.json"));
        assert_eq!(config.state.last_update, Some(7000));
    }

    #[test]
    fn test_no_overrides_keeps_config() {
        let args = RunArgs {
            state: None,
            last: None,
            skip_health_check: true,
        };
        let mut config = ExporterConfig::default();
        let before = config.state.path.clone();
        args.apply_overrides(&mut config);

        assert_eq!(config.state.path, before);
        assert_eq!(config.state.last_update, None);
    }

    #[tokio::test]
    async fn test_wait_for_shutdown_resolves_on_signal() {
        let (tx, rx) = watch::channel(false);
        let waiter = tokio::spawn(wait_for_shutdown(rx));
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
