// orthanc-export - Orthanc change feed exporter
// Copyright (c) 2025 Orthanc Export Contributors
// Licensed under the MIT License

//! # orthanc-export - Orthanc change feed exporter
//!
//! orthanc-export follows the change feed of an Orthanc DICOM archive and
//! exports every new instance to one or more configured destinations.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Polling** the archive's `/changes` feed with a persisted cursor
//! - **Downloading** each new instance and its simplified tags
//! - **Routing** instances to destinations through match predicates
//! - **Converting** them with external utilities (dcm4che `dcm2*`, copy)
//! - **Naming** outputs with templates over DICOM and derived attributes
//! - **Linking** exported files into secondary directory trees
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Listener, work queue, exporter, destinations and state
//! - [`adapters`] - External integrations (Orthanc REST API, OS processes)
//! - [`domain`] - Core domain types and models
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging and observability
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use orthanc_export::adapters::orthanc::OrthancClient;
//! use orthanc_export::adapters::process::ProcessRunner;
//! use orthanc_export::config::load_config;
//! use orthanc_export::core::export::Exporter;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("/etc/orthanc/orthanc-export.toml")?;
//!     let client = Arc::new(OrthancClient::new(config.archive.clone())?);
//!     let runner = Arc::new(ProcessRunner::default());
//!
//!     let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!     let exporter = Exporter::new(config, client, runner).await?;
//!     let summary = exporter.run(shutdown_rx).await?;
//!
//!     println!("Exported {} instances", summary.instances_exported);
//!     Ok(())
//! }
//! ```
//!
//! ## Resuming
//!
//! The cursor is persisted to a JSON state file. A checkpoint is queued
//! behind the instances of its poll batch, so after a restart the exporter
//! resumes from the last batch whose instances were all attempted. Payloads
//! left in the temporary directory by an interrupted run are reused.
//!
//! ## Error Handling
//!
//! The library uses [`domain::ExportError`] for all errors:
//!
//! ```rust,no_run
//! use orthanc_export::domain::ExportError;
//!
//! fn example() -> Result<(), ExportError> {
//!     let config = orthanc_export::config::load_config("orthanc-export.toml")?;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
