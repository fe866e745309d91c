//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - JSON-formatted logs
//! - Configurable log levels
//! - Local file logging with rotation
//!
//! # Example
//!
//! ```no_run
//! use orthanc_export::logging::init_logging;
//! use orthanc_export::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! // Use tracing macros for logging
//! tracing::info!("Application started");
//! tracing::error!(error = "Something went wrong", "Error occurred");
//! ```

pub mod structured;

// Re-export commonly used items
pub use structured::{init_logging, parse_log_level, LoggingGuard};

/// Log the start of an instance export
///
/// # Example
///
/// ```no_run
/// use orthanc_export::log_instance_start;
/// use orthanc_export::domain::{Cursor, InstanceId};
///
/// let id = InstanceId::new("8a8cf898-ca27c490-d0c7058c-929d0581-2bbf104d").unwrap();
/// log_instance_start!(&id, Cursor::new(42));
/// ```
#[macro_export]
macro_rules! log_instance_start {
    ($instance_id:expr, $seq:expr) => {
        tracing::info!(
            instance_id = %$instance_id,
            seq = %$seq,
            "Exporting instance"
        );
    };
}

/// Log the completion of an instance export
///
/// # Example
///
/// ```no_run
/// use orthanc_export::log_instance_complete;
/// use std::time::Duration;
///
/// log_instance_complete!("8a8cf898", 42, 2, Duration::from_millis(850));
/// ```
#[macro_export]
macro_rules! log_instance_complete {
    ($instance_id:expr, $seq:expr, $artifacts:expr, $duration:expr) => {
        tracing::info!(
            instance_id = %$instance_id,
            seq = %$seq,
            artifacts = $artifacts,
            duration_ms = $duration.as_millis() as u64,
            "Instance exported"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use orthanc_export::log_error_with_context;
/// use orthanc_export::domain::ExportError;
///
/// let error = ExportError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}

#[cfg(test)]
mod tests {
    use crate::domain::{Cursor, ExportError, InstanceId};
    use std::time::Duration;

    #[test]
    fn test_macros_expand() {
        let id = InstanceId::new("abc").unwrap();
        log_instance_start!(&id, Cursor::new(1));
        log_instance_complete!(&id, Cursor::new(1), 2usize, Duration::from_millis(5));
        log_error_with_context!(ExportError::Other("x".into()), "test");
    }
}
