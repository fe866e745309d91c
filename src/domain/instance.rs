//! Instance model
//!
//! An [`Instance`] is the unit of export work. It starts as a bare change
//! entry and is enriched as it moves through the pipeline: simplified tags
//! are merged in, the payload is downloaded, and derived metadata is
//! computed. Templates and match predicates read it through
//! [`Instance::attribute`].

use crate::domain::change::ChangeEvent;
use crate::domain::ids::InstanceId;
use chrono::{DateTime, Local};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Parsed acquisition date-time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionTime {
    /// Successfully parsed in the local timezone
    Parsed(DateTime<Local>),
    /// Absent or unparseable; carries the normalized input when there was one
    Invalid(Option<String>),
}

impl AcquisitionTime {
    /// Parsed value, if valid
    pub fn as_datetime(&self) -> Option<&DateTime<Local>> {
        match self {
            AcquisitionTime::Parsed(dt) => Some(dt),
            AcquisitionTime::Invalid(_) => None,
        }
    }
}

/// Metadata computed locally from the raw tags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedMetadata {
    /// Patient name components, start-cased and underscore-joined per component
    pub name: Vec<String>,
    /// Series description, falling back to the modality
    pub desc: Option<String>,
    /// `desc` with whitespace runs replaced by underscores
    pub desc_snake: Option<String>,
    /// Acquisition timestamp
    pub timestamp: AcquisitionTime,
}

/// Borrowed view of one instance attribute
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue<'a> {
    /// Textual value
    Text(&'a str),
    /// Numeric value, pre-formatted
    Number(String),
    /// Name components
    Components(&'a [String]),
    /// Acquisition timestamp
    Timestamp(&'a AcquisitionTime),
    /// Sequences, objects, booleans and nulls
    Structured,
}

impl<'a> AttributeValue<'a> {
    /// The value as text, only for attributes that are textual
    pub fn as_text(&self) -> Option<&'a str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// A DICOM instance moving through the export pipeline
#[derive(Debug, Clone)]
pub struct Instance {
    /// Archive instance identifier
    pub id: InstanceId,

    /// Change entry that announced the instance
    pub change: ChangeEvent,

    /// Simplified DICOM tags keyed by keyword
    pub tags: Map<String, Value>,

    /// Locally derived metadata, set by the exporter before fan-out
    pub metadata: Option<DerivedMetadata>,

    /// Local payload path, set once the payload is on disk
    pub tmp_path: Option<PathBuf>,
}

impl Instance {
    /// Creates an instance from its change entry
    pub fn new(id: InstanceId, change: ChangeEvent) -> Self {
        Self {
            id,
            change,
            tags: Map::new(),
            metadata: None,
            tmp_path: None,
        }
    }

    /// Merges simplified tags onto the instance, later keys winning
    pub fn merge_tags(&mut self, tags: Map<String, Value>) {
        self.tags.extend(tags);
    }

    /// Raw tag as text, if present and textual
    pub fn tag_str(&self, keyword: &str) -> Option<&str> {
        self.tags.get(keyword).and_then(Value::as_str)
    }

    /// Looks up an attribute by name
    ///
    /// Resolution order is derived metadata, then raw tags, then the change
    /// entry fields (`ID`, `Seq`, `ChangeType`, `ResourceType`, `Path`, `Date`).
    pub fn attribute(&self, key: &str) -> Option<AttributeValue<'_>> {
        if let Some(meta) = &self.metadata {
            match key {
                "name" => return Some(AttributeValue::Components(&meta.name)),
                "desc" => return meta.desc.as_deref().map(AttributeValue::Text),
                "desc_snake" => return meta.desc_snake.as_deref().map(AttributeValue::Text),
                "timestamp" => return Some(AttributeValue::Timestamp(&meta.timestamp)),
                _ => {}
            }
        }

        if let Some(value) = self.tags.get(key) {
            return Some(match value {
                Value::String(s) => AttributeValue::Text(s),
                Value::Number(n) => AttributeValue::Number(n.to_string()),
                _ => AttributeValue::Structured,
            });
        }

        match key {
            "ID" => Some(AttributeValue::Text(self.change.id.as_str())),
            "Seq" => Some(AttributeValue::Number(self.change.seq.to_string())),
            "ChangeType" => Some(AttributeValue::Text(self.change.change_type.as_str())),
            "ResourceType" => self.change.resource_type.as_deref().map(AttributeValue::Text),
            "Path" => self.change.path.as_deref().map(AttributeValue::Text),
            "Date" => self.change.date.as_deref().map(AttributeValue::Text),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::change::ChangeType;
    use serde_json::json;

    fn instance() -> Instance {
        let change = ChangeEvent::new("abc", ChangeType::NewInstance, 42);
        Instance::new(InstanceId::new("abc").unwrap(), change)
    }

    #[test]
    fn test_change_fields_are_attributes() {
        let inst = instance();
        assert_eq!(inst.attribute("ID"), Some(AttributeValue::Text("abc")));
        assert_eq!(
            inst.attribute("Seq"),
            Some(AttributeValue::Number("42".to_string()))
        );
        assert_eq!(
            inst.attribute("ChangeType"),
            Some(AttributeValue::Text("NewInstance"))
        );
        assert_eq!(inst.attribute("Path"), None);
    }

    #[test]
    fn test_tags_are_attributes() {
        let mut inst = instance();
        let tags = json!({
            "Modality": "CT",
            "NumberOfFrames": 3,
            "ReferencedSeriesSequence": [{"SeriesInstanceUID": "1.2.3"}]
        });
        inst.merge_tags(tags.as_object().unwrap().clone());

        assert_eq!(inst.attribute("Modality"), Some(AttributeValue::Text("CT")));
        assert_eq!(
            inst.attribute("NumberOfFrames"),
            Some(AttributeValue::Number("3".to_string()))
        );
        assert_eq!(
            inst.attribute("ReferencedSeriesSequence"),
            Some(AttributeValue::Structured)
        );
        assert_eq!(inst.attribute("PatientName"), None);
        assert_eq!(inst.tag_str("Modality"), Some("CT"));
    }

    #[test]
    fn test_tags_override_change_fields() {
        let mut inst = instance();
        inst.merge_tags(json!({"ID": "from-tags"}).as_object().unwrap().clone());
        assert_eq!(inst.attribute("ID"), Some(AttributeValue::Text("from-tags")));
    }

    #[test]
    fn test_derived_metadata_attributes() {
        let mut inst = instance();
        inst.metadata = Some(DerivedMetadata {
            name: vec!["Doe".to_string(), "John".to_string()],
            desc: Some("Chest CT".to_string()),
            desc_snake: Some("Chest_CT".to_string()),
            timestamp: AcquisitionTime::Invalid(None),
        });

        assert!(matches!(
            inst.attribute("name"),
            Some(AttributeValue::Components(parts)) if parts.len() == 2
        ));
        assert_eq!(
            inst.attribute("desc_snake").and_then(|v| v.as_text()),
            Some("Chest_CT")
        );
        assert_eq!(inst.attribute("name").unwrap().as_text(), None);
    }
}
