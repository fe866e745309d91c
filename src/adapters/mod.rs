//! External system integrations.
//!
//! - [`orthanc`] - Orthanc archive REST client
//! - [`process`] - External command execution (converters, post-processing)
//!
//! # Design Pattern
//!
//! Adapters isolate external dependencies behind traits
//! ([`orthanc::ArchiveClient`], [`process::CommandRunner`]) so the pipeline
//! can be exercised against in-memory implementations in tests.
//!
//! ```rust,no_run
//! use orthanc_export::adapters::orthanc::OrthancClient;
//! use orthanc_export::config::{secret_string, ArchiveConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ArchiveConfig {
//!     base_url: "http://localhost:8042".to_string(),
//!     username: Some("orthanc".to_string()),
//!     password: Some(secret_string("orthanc".to_string())),
//!     ..ArchiveConfig::default()
//! };
//!
//! let client = OrthancClient::new(config)?;
//! client.health_check().await?;
//! # Ok(())
//! # }
//! ```

pub mod orthanc;
pub mod process;
