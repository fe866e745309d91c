//! Configuration management for the exporter.
//!
//! This module provides TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! The exporter uses a TOML configuration file with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `ORTHANC_EXPORT_<SECTION>_<KEY>` environment overrides
//! - Default values for optional settings
//! - Load-time validation, including destination templates
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use orthanc_export::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("/etc/orthanc/orthanc-export.toml")?;
//!
//! println!("Archive: {}", config.archive.base_url);
//! println!("Destinations: {}", config.destinations.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level
//! - [`ArchiveConfig`] - Orthanc connection and authentication
//! - [`ListenerConfig`] - Change feed poll period
//! - [`ExportConfig`] - Payload directory, fan-out and command limits
//! - [`ConverterConfig`] - dcm4che location
//! - [`StateConfig`] - Cursor state file and checkpoint policy
//! - [`LoggingConfig`] - Logging configuration
//! - [`DestinationConfig`] - One `[[destinations]]` entry
//!
//! # Example Configuration
//!
//! ```toml
//! [archive]
//! base_url = "http://localhost:8042"
//! username = "orthanc"
//! password = "${ORTHANC_PASSWORD}"
//!
//! [state]
//! path = "/var/orthanc/orthanc-export-state.json"
//!
//! [[destinations]]
//! name = "jpeg-preview"
//! type = "dcm2jpg"
//! topdir = "/srv/export/jpeg"
//! dir = "{name.0}/{timestamp:%Y-%m-%d}/{desc_snake}"
//! filename = "{SeriesNumber}-{InstanceNumber}.jpg"
//! match = { Modality = "^(CT|MR)$" }
//! link = "by-date/{timestamp:%Y%m%d}"
//! postprocess = "chmod 0640"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, load_config_from_str};
pub use schema::{
    ApplicationConfig, ArchiveConfig, CheckpointPolicy, ConverterConfig, DestinationConfig,
    ExportConfig, ExporterConfig, LinkConfig, ListenerConfig, LoggingConfig, PostProcessConfig,
    StateConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
