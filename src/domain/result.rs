//! Result type alias for the exporter
//!
//! This module provides a convenient Result type alias that uses ExportError
//! as the error type.

use super::errors::ExportError;

/// Result type alias for exporter operations
///
/// # Examples
///
/// ```
/// use orthanc_export::domain::result::Result;
/// use orthanc_export::domain::errors::ExportError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(ExportError::State("state file is corrupt".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, ExportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_with_question_mark() -> Result<()> {
        fn inner() -> Result<i32> {
            Ok(42)
        }

        let value = inner()?;
        assert_eq!(value, 42);
        Ok(())
    }
}
