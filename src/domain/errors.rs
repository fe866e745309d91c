//! Domain error types
//!
//! This module defines the error hierarchy for the exporter.
//! All errors are domain-specific and don't expose third-party types.

use thiserror::Error;

/// Main exporter error type
///
/// This is the primary error type used throughout the application.
/// It wraps specific error types and provides context for error handling.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Orthanc archive errors
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// External command errors
    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    /// Path/filename template errors
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// Destination export errors
    #[error("Destination error: {0}")]
    Destination(String),

    /// State management errors
    #[error("State management error: {0}")]
    State(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// Orthanc archive errors
///
/// Errors that occur when interacting with the archive REST API.
/// These errors don't expose third-party HTTP client types.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Failed to connect to the archive
    #[error("Failed to connect to archive: {0}")]
    ConnectionFailed(String),

    /// Invalid response from server
    #[error("Invalid response from archive: {0}")]
    InvalidResponse(String),

    /// Instance not found
    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    /// Change feed query failed
    #[error("Change feed query failed: {0}")]
    ChangesFailed(String),

    /// Server error (5xx)
    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    /// Client error (4xx)
    #[error("Client error: {status} - {message}")]
    ClientError { status: u16, message: String },

    /// Timeout
    #[error("Request timeout: {0}")]
    Timeout(String),
}

/// External command errors
#[derive(Debug, Error)]
pub enum CommandError {
    /// The process could not be started
    #[error("Failed to spawn '{program}': {message}")]
    Spawn { program: String, message: String },

    /// The process exited with a non-zero status
    #[error("'{command}' exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },

    /// The process did not finish within the configured timeout
    #[error("'{command}' timed out after {seconds}s")]
    Timeout { command: String, seconds: u64 },

    /// The command line could not be parsed
    #[error("Invalid command line '{0}'")]
    Invalid(String),
}

/// Template compile and render errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// Malformed template syntax
    #[error("Invalid template '{template}': {message}")]
    Syntax { template: String, message: String },

    /// Attribute name outside the known schema
    #[error("Unknown attribute '{0}'")]
    UnknownAttribute(String),

    /// Invalid strftime format for the timestamp
    #[error("Invalid timestamp format '{0}'")]
    InvalidFormat(String),

    /// Attribute absent on the instance being rendered
    #[error("Attribute '{0}' is not set on this instance")]
    MissingAttribute(String),

    /// Attribute present but not renderable as text
    #[error("Attribute '{0}' cannot be rendered as text")]
    NotRenderable(String),

    /// Acquisition timestamp could not be parsed
    #[error("Acquisition timestamp is invalid: {0}")]
    InvalidTimestamp(String),
}

// Conversion from std::io::Error
impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        ExportError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        ExportError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for ExportError {
    fn from(err: toml::de::Error) -> Self {
        ExportError::Configuration(format!("TOML parse error: {err}"))
    }
}
