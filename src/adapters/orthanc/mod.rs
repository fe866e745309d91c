//! Orthanc adapter implementation
//!
//! Integration with the Orthanc archive: the [`ArchiveClient`] trait, its
//! HTTP implementation, and the REST API models.

pub mod client;
pub mod models;

pub use client::{ArchiveClient, OrthancClient};
pub use models::{ChangesPage, SystemInfo};
