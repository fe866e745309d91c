//! Domain models and types for the exporter.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`InstanceId`], [`Cursor`])
//! - **Change feed entries** ([`ChangeEvent`], [`ChangeType`])
//! - **The unit of work** ([`Instance`]) and its [`DerivedMetadata`]
//! - **Error types** ([`ExportError`], [`ArchiveError`], [`CommandError`], [`TemplateError`])
//! - **Result type alias** ([`Result`])
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, ExportError>`]:
//!
//! ```rust
//! use orthanc_export::domain::{ExportError, Result};
//!
//! fn example() -> Result<()> {
//!     let config = orthanc_export::config::load_config("orthanc-export.toml")?;
//!     Ok(())
//! }
//! ```

pub mod change;
pub mod errors;
pub mod ids;
pub mod instance;
pub mod result;

// Re-export commonly used types for convenience
pub use change::{ChangeEvent, ChangeType};
pub use errors::{ArchiveError, CommandError, ExportError, TemplateError};
pub use ids::{Cursor, InstanceId};
pub use instance::{AcquisitionTime, AttributeValue, DerivedMetadata, Instance};
pub use result::Result;
