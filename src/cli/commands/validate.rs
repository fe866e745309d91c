//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the exporter configuration file.

use crate::adapters::orthanc::OrthancClient;
use crate::config::{load_config, ExporterConfig};
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Also query the archive's /system endpoint
    #[arg(long)]
    pub check_connection: bool,
}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // load_config validates, including every destination template
        let config = match load_config(config_path) {
            Ok(c) => {
                println!("✅ Configuration is valid");
                c
            }
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        print_summary(&config);

        if self.check_connection {
            let client = match OrthancClient::new(config.archive.clone()) {
                Ok(c) => c,
                Err(e) => {
                    println!("❌ Invalid archive settings");
                    println!("   Error: {e}");
                    return Ok(2);
                }
            };
            match client.health_check().await {
                Ok(info) => {
                    println!(
                        "✅ Connected to {} {}",
                        info.name.as_deref().unwrap_or("Orthanc"),
                        info.version.as_deref().unwrap_or("(unknown version)")
                    );
                }
                Err(e) => {
                    println!("❌ Cannot reach archive at {}", config.archive.base_url);
                    println!("   Error: {e}");
                    return Ok(4); // Connection error exit code
                }
            }
        }

        println!();
        Ok(0)
    }
}

fn print_summary(config: &ExporterConfig) {
    println!();
    println!("Configuration Summary:");
    println!("  Log Level: {}", config.application.log_level);
    println!("  Archive: {}", config.archive.base_url);
    println!(
        "  Authentication: {}",
        if config.archive.username.is_some() {
            "basic"
        } else {
            "none"
        }
    );
    println!("  Poll Period: {} ms", config.listener.period_ms);
    println!("  Temporary Directory: {}", config.export.tmp_dir.display());
    println!(
        "  Concurrent Destinations: {}",
        config.export.max_concurrent_destinations
    );
    println!("  State File: {}", config.state.path.display());
    println!("  Checkpoint Policy: {:?}", config.state.checkpoint_policy);
    println!("  Destinations: {}", config.destinations.len());
    for (index, destination) in config.destinations.iter().enumerate() {
        println!(
            "    #{index} {} ({}) -> {}/{}",
            destination.name.as_deref().unwrap_or("unnamed"),
            destination.kind.as_deref().unwrap_or("no conversion"),
            destination
                .topdir
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            destination.dir
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_config_error() {
        let args = ValidateArgs {
            check_connection: false,
        };
        let code = args
            .execute("/nonexistent/orthanc-export.toml")
            .await
            .unwrap();
        assert_eq!(code, 2);
    }

    #[tokio::test]
    async fn test_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[[destinations]]
type = "copy"
dir = "/export/{name.0}"
filename = "{ID}.dcm"
"#,
        )
        .unwrap();

        let args = ValidateArgs {
            check_connection: false,
        };
        assert_eq!(args.execute(path.to_str().unwrap()).await.unwrap(), 0);
    }
}
