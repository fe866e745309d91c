// orthanc-export - Orthanc change feed exporter
// Copyright (c) 2025 Orthanc Export Contributors
// Licensed under the MIT License

use clap::Parser;
use orthanc_export::cli::{Cli, Commands};
use orthanc_export::config::{load_config, LoggingConfig};
use orthanc_export::logging::init_logging;
use std::process;
use tokio::sync::watch;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Only `run` logs to files; other commands log to the console
    let (config_level, logging_config) = logging_settings(&cli);
    let log_level = cli.log_level.clone().unwrap_or(config_level);
    let guard = match init_logging(&log_level, &logging_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(5);
        }
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "orthanc-export - Orthanc change feed exporter"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        wait_for_signal().await;
        println!("\n⚠️  Shutdown signal received, finishing current instance...");
        let _ = shutdown_tx.send(true);
    });

    let exit_code = match execute_command(&cli, shutdown_rx).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command execution failed");
            eprintln!("Error: {e}");
            5 // Fatal error exit code
        }
    };

    // process::exit skips destructors
    drop(guard);
    process::exit(exit_code);
}

/// Log level and logging configuration for the selected command
fn logging_settings(cli: &Cli) -> (String, LoggingConfig) {
    let console = ("info".to_string(), LoggingConfig::console_only());
    match &cli.command {
        // A broken config is reported by the command itself
        Commands::Run(_) => load_config(&cli.config)
            .map(|c| (c.application.log_level, c.logging))
            .unwrap_or(console),
        _ => console,
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to install SIGTERM handler");
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
            }
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
        }
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
}

/// Execute the CLI command
async fn execute_command(cli: &Cli, shutdown_signal: watch::Receiver<bool>) -> anyhow::Result<i32> {
    match &cli.command {
        Commands::Run(args) => args.execute(&cli.config, shutdown_signal).await,
        Commands::ValidateConfig(args) => args.execute(&cli.config).await,
        Commands::Status(args) => args.execute(&cli.config).await,
        Commands::Init(args) => args.execute().await,
    }
}
