//! Orthanc REST API models
//!
//! Wire types for the endpoints the exporter reads. Field names follow the
//! archive's JSON.

use crate::domain::{ChangeEvent, Cursor};
use serde::{Deserialize, Serialize};

/// One page of the `/changes` feed
///
/// # Examples
///
/// ```
/// use orthanc_export::adapters::orthanc::ChangesPage;
///
/// let page: ChangesPage = serde_json::from_str(
///     r#"{"Changes": [], "Done": true, "Last": 6000}"#,
/// ).unwrap();
/// assert!(page.done);
/// assert_eq!(page.last.value(), 6000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangesPage {
    /// Changes after the requested cursor, in feed order
    #[serde(rename = "Changes", default)]
    pub changes: Vec<ChangeEvent>,

    /// Sequence number of the last change in this page
    #[serde(rename = "Last")]
    pub last: Cursor,

    /// Whether the feed has no more changes after `last`
    #[serde(rename = "Done")]
    pub done: bool,
}

/// Subset of `/system`, used for health checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct SystemInfo {
    /// Archive instance name
    #[serde(default)]
    pub name: Option<String>,

    /// Archive version
    #[serde(default)]
    pub version: Option<String>,

    /// REST API version
    #[serde(default)]
    pub api_version: Option<u32>,

    /// DICOM application entity title
    #[serde(default)]
    pub dicom_aet: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChangeType;

    #[test]
    fn test_changes_page_from_wire() {
        let json = r#"{
            "Changes": [
                {"ChangeType": "NewPatient", "ID": "p1", "Seq": 7, "ResourceType": "Patient"},
                {"ChangeType": "NewInstance", "ID": "i1", "Seq": 8, "ResourceType": "Instance"},
                {"ChangeType": "StableSeries", "ID": "s1", "Seq": 9, "ResourceType": "Series"}
            ],
            "Done": false,
            "Last": 9
        }"#;
        let page: ChangesPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.changes.len(), 3);
        assert_eq!(page.changes[1].change_type, ChangeType::NewInstance);
        assert_eq!(page.changes[2].change_type, ChangeType::Other);
        assert_eq!(page.last, Cursor::new(9));
        assert!(!page.done);
    }

    #[test]
    fn test_system_info_from_wire() {
        let json = r#"{"ApiVersion": 18, "DicomAet": "ORTHANC", "Name": "MyOrthanc", "Version": "1.12.1"}"#;
        let info: SystemInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.api_version, Some(18));
        assert_eq!(info.dicom_aet.as_deref(), Some("ORTHANC"));
        assert_eq!(info.version.as_deref(), Some("1.12.1"));
    }
}
