//! Core business logic for the exporter.
//!
//! # Modules
//!
//! - [`listener`] - Change feed polling and the cursor it reports
//! - [`export`] - Work queue, export worker and run summary
//! - [`destination`] - Per-destination matching, conversion and linking
//! - [`template`] - Path and command templates rendered from instance attributes
//! - [`metadata`] - Metadata derived from raw DICOM tags
//! - [`state`] - Cursor persistence and the failed-instance ledger
//!
//! # Export Workflow
//!
//! 1. **Load State**: Read the persisted cursor (or start from the configured one)
//! 2. **Poll**: Query the archive change feed since the cursor
//! 3. **Queue**: Enqueue one item per new instance, then one checkpoint per batch
//! 4. **Download**: Fetch simplified tags and the payload of each instance
//! 5. **Fan Out**: Export to every destination with bounded concurrency
//! 6. **Checkpoint**: Persist the cursor once the batch's items were handled
//! 7. **Report**: Log the run summary at shutdown
//!
//! # Example
//!
//! ```rust,no_run
//! use orthanc_export::adapters::orthanc::OrthancClient;
//! use orthanc_export::adapters::process::ProcessRunner;
//! use orthanc_export::config::load_config;
//! use orthanc_export::core::export::Exporter;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("orthanc-export.toml")?;
//! let client = Arc::new(OrthancClient::new(config.archive.clone())?);
//! let runner = Arc::new(ProcessRunner::default());
//!
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! let exporter = Exporter::new(config, client, runner).await?;
//! let summary = exporter.run(shutdown_rx).await?;
//!
//! println!("Exported: {}", summary.instances_exported);
//! println!("Failed: {}", summary.instances_failed);
//! # Ok(())
//! # }
//! ```

pub mod destination;
pub mod export;
pub mod listener;
pub mod metadata;
pub mod state;
pub mod template;
