//! Change feed model
//!
//! One entry of the archive's `/changes` log. Field names follow the
//! archive's JSON so entries deserialize straight off the wire.

use crate::domain::ids::{Cursor, InstanceId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of lifecycle change reported by the archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeType {
    /// A new DICOM instance was stored
    NewInstance,
    /// The first instance of a new series was stored
    NewSeries,
    /// The first instance of a new study was stored
    NewStudy,
    /// The first instance of a new patient was stored
    NewPatient,
    /// Any other change (stable resources, deletions, attachments, ...)
    #[serde(other)]
    Other,
}

impl ChangeType {
    /// Wire name of the change type
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::NewInstance => "NewInstance",
            ChangeType::NewSeries => "NewSeries",
            ChangeType::NewStudy => "NewStudy",
            ChangeType::NewPatient => "NewPatient",
            ChangeType::Other => "Other",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single change feed entry
///
/// # Examples
///
/// ```
/// use orthanc_export::domain::{ChangeEvent, ChangeType};
///
/// let change: ChangeEvent = serde_json::from_str(
///     r#"{"ID": "abc", "ChangeType": "NewInstance", "Seq": 42}"#,
/// ).unwrap();
/// assert_eq!(change.change_type, ChangeType::NewInstance);
/// assert_eq!(change.seq.value(), 42);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Identifier of the changed resource
    #[serde(rename = "ID")]
    pub id: String,

    /// Kind of change
    #[serde(rename = "ChangeType")]
    pub change_type: ChangeType,

    /// Sequence number of this change in the feed
    #[serde(rename = "Seq")]
    pub seq: Cursor,

    /// Resource level (Instance, Series, Study, Patient)
    #[serde(rename = "ResourceType", default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,

    /// REST path of the resource
    #[serde(rename = "Path", default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Archive-side timestamp of the change
    #[serde(rename = "Date", default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl ChangeEvent {
    /// Creates a change entry with only the mandatory fields
    pub fn new(id: impl Into<String>, change_type: ChangeType, seq: i64) -> Self {
        Self {
            id: id.into(),
            change_type,
            seq: Cursor::new(seq),
            resource_type: None,
            path: None,
            date: None,
        }
    }

    /// Resource ID as a validated instance identifier
    pub fn instance_id(&self) -> Result<InstanceId, String> {
        InstanceId::new(self.id.clone())
    }
}
