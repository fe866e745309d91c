//! Derived instance metadata
//!
//! Computes the values that path templates use most often from the raw
//! simplified tags: patient name components, a series description and the
//! acquisition timestamp.
//!
//! # Example
//!
//! ```
//! use orthanc_export::core::metadata::split_patient_name;
//!
//! assert_eq!(split_patient_name("DOE^john paul"), vec!["DOE", "John_Paul"]);
//! ```

use crate::domain::{AcquisitionTime, DerivedMetadata, Instance};
use chrono::{Local, NaiveDate, NaiveDateTime, TimeZone};

/// Date-time layouts tried, in order, after normalization
const DATETIME_FORMATS: &[&str] = &[
    "%Y%m%dT%H%M%S%.f",
    "%Y%m%dT%H%M%S",
    "%Y%m%dT%H%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y%m%d", "%Y-%m-%d"];

/// Computes [`DerivedMetadata`] from an instance's tags
///
/// Never fails: a missing or unparseable `AcquisitionDateTime` yields
/// [`AcquisitionTime::Invalid`], which only becomes an error if a template
/// actually renders the timestamp.
pub fn derive_metadata(instance: &Instance) -> DerivedMetadata {
    let name = split_patient_name(instance.tag_str("PatientName").unwrap_or(""));

    let desc = instance
        .tag_str("SeriesDescription")
        .filter(|s| !s.is_empty())
        .or_else(|| instance.tag_str("Modality"))
        .map(str::to_string);
    let desc_snake = desc.as_deref().map(snake_whitespace);

    let raw = instance.tag_str("AcquisitionDateTime");
    let timestamp = parse_acquisition_time(raw);
    if let AcquisitionTime::Invalid(ref value) = timestamp {
        tracing::debug!(
            instance_id = %instance.id,
            value = value.as_deref().unwrap_or("<missing>"),
            "Acquisition date-time not parseable"
        );
    }

    DerivedMetadata {
        name,
        desc,
        desc_snake,
        timestamp,
    }
}

/// Splits a DICOM person name on `^` and start-cases each component
///
/// Every component is trimmed, split into words (non-alphanumeric
/// separators, lower-to-upper case changes, letter/digit changes), each word
/// gets an upper-cased first letter, and the words are joined with `_`.
/// An empty name yields a single empty component.
pub fn split_patient_name(raw: &str) -> Vec<String> {
    raw.trim().split('^').map(start_case).collect()
}

/// Start-cases one name component, joining words with `_`
pub fn start_case(component: &str) -> String {
    words(component)
        .iter()
        .map(|w| upper_first(w))
        .collect::<Vec<_>>()
        .join("_")
}

fn words(input: &str) -> Vec<String> {
    let cleaned: String = input
        .chars()
        .filter(|c| *c != '\'' && *c != '\u{2019}')
        .collect();

    let mut words = Vec::new();
    for run in cleaned.split(|c: char| !c.is_alphanumeric()) {
        let chars: Vec<char> = run.chars().collect();
        if chars.is_empty() {
            continue;
        }

        let mut start = 0;
        for i in 1..chars.len() {
            let (prev, cur) = (chars[i - 1], chars[i]);
            let acronym_end = prev.is_uppercase()
                && cur.is_uppercase()
                && chars.get(i + 1).is_some_and(|next| next.is_lowercase());
            let boundary = (prev.is_lowercase() && cur.is_uppercase())
                || prev.is_alphabetic() != cur.is_alphabetic()
                || acronym_end;
            if boundary {
                words.push(chars[start..i].iter().collect());
                start = i;
            }
        }
        words.push(chars[start..].iter().collect());
    }
    words
}

fn upper_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Replaces every run of whitespace with a single `_`
pub fn snake_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_space = false;
    for c in s.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push('_');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Normalizes a DICOM `DT` value before parsing
///
/// A 14 character value `YYYYMMDDHHMMSS` gets a `T` inserted after the
/// date. A 21 character value (`YYYYMMDDHHMMSS.FFFFFF`) is reduced to
/// `YYYYMMDDTHH`, keeping the hour only. Anything else is returned as is.
pub fn normalize_datetime(raw: &str) -> String {
    if !raw.is_ascii() {
        return raw.to_string();
    }
    match raw.len() {
        14 => format!("{}T{}", &raw[..8], &raw[8..]),
        21 => format!("{}T{}", &raw[..8], &raw[8..10]),
        _ => raw.to_string(),
    }
}

/// Parses an acquisition date-time in the local timezone
pub fn parse_acquisition_time(raw: Option<&str>) -> AcquisitionTime {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return AcquisitionTime::Invalid(None);
    };
    let normalized = normalize_datetime(raw);

    match parse_naive(&normalized).and_then(|naive| Local.from_local_datetime(&naive).earliest()) {
        Some(dt) => AcquisitionTime::Parsed(dt),
        None => AcquisitionTime::Invalid(Some(normalized)),
    }
}

fn parse_naive(value: &str) -> Option<NaiveDateTime> {
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }

    // YYYYMMDDTHH, as produced for values with fractional seconds
    if value.len() == 11 && value.as_bytes()[8] == b'T' {
        let date = NaiveDate::parse_from_str(&value[..8], "%Y%m%d").ok()?;
        let hour: u32 = value[9..].parse().ok()?;
        return date.and_hms_opt(hour, 0, 0);
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChangeEvent, ChangeType, InstanceId};
    use chrono::{Datelike, Timelike};
    use serde_json::json;
    use test_case::test_case;

    fn instance(tags: serde_json::Value) -> Instance {
        let mut inst = Instance::new(
            InstanceId::new("abc").unwrap(),
            ChangeEvent::new("abc", ChangeType::NewInstance, 42),
        );
        inst.merge_tags(tags.as_object().unwrap().clone());
        inst
    }

    #[test_case("doe", "Doe"; "lower word")]
    #[test_case("DOE", "DOE"; "upper word")]
    #[test_case("van der berg", "Van_Der_Berg"; "spaces")]
    #[test_case("  mary-jane ", "Mary_Jane"; "hyphen and padding")]
    #[test_case("O'Brien", "O_Brien"; "apostrophe dropped")]
    #[test_case("McDonald", "Mc_Donald"; "case change")]
    #[test_case("XMLHttp", "XML_Http"; "acronym")]
    #[test_case("abc123", "Abc_123"; "digits")]
    #[test_case("", ""; "empty")]
    fn test_start_case(input: &str, expected: &str) {
        assert_eq!(start_case(input), expected);
    }

    #[test]
    fn test_split_patient_name() {
        assert_eq!(split_patient_name("DOE^JOHN"), vec!["DOE", "JOHN"]);
        assert_eq!(
            split_patient_name(" smith^anna maria^^dr "),
            vec!["Smith", "Anna_Maria", "", "Dr"]
        );
        assert_eq!(split_patient_name(""), vec![""]);
    }

    #[test]
    fn test_snake_whitespace() {
        assert_eq!(snake_whitespace("Chest  CT\tAxial"), "Chest_CT_Axial");
        assert_eq!(snake_whitespace("CT"), "CT");
        assert_eq!(snake_whitespace(" x "), "_x_");
    }

    #[test_case("20230114093012", "20230114T093012"; "fourteen chars")]
    #[test_case("20230114093012.123456", "20230114T09"; "twenty one chars")]
    #[test_case("20230114", "20230114"; "date only")]
    #[test_case("2023-01-14T09:30:12", "2023-01-14T09:30:12"; "iso unchanged")]
    fn test_normalize_datetime(input: &str, expected: &str) {
        assert_eq!(normalize_datetime(input), expected);
    }

    #[test]
    fn test_parse_acquisition_time() {
        let parsed = parse_acquisition_time(Some("20230114093012"));
        let dt = parsed.as_datetime().unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2023, 1, 14));
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (9, 30, 12));

        let hour_only = parse_acquisition_time(Some("20230114093012.123456"));
        let dt = hour_only.as_datetime().unwrap();
        assert_eq!((dt.hour(), dt.minute()), (9, 0));

        let date_only = parse_acquisition_time(Some("20230114"));
        assert_eq!(date_only.as_datetime().unwrap().hour(), 0);
    }

    #[test]
    fn test_parse_acquisition_time_invalid() {
        assert_eq!(parse_acquisition_time(None), AcquisitionTime::Invalid(None));
        assert_eq!(parse_acquisition_time(Some("")), AcquisitionTime::Invalid(None));
        assert_eq!(
            parse_acquisition_time(Some("garbage")),
            AcquisitionTime::Invalid(Some("garbage".to_string()))
        );
        assert!(matches!(
            parse_acquisition_time(Some("20231399")),
            AcquisitionTime::Invalid(Some(_))
        ));
    }

    #[test]
    fn test_derive_metadata() {
        let inst = instance(json!({
            "PatientName": "DOE^jane",
            "SeriesDescription": "Chest  CT",
            "Modality": "CT",
            "AcquisitionDateTime": "20230114093012"
        }));
        let meta = derive_metadata(&inst);
        assert_eq!(meta.name, vec!["DOE", "Jane"]);
        assert_eq!(meta.desc.as_deref(), Some("Chest  CT"));
        assert_eq!(meta.desc_snake.as_deref(), Some("Chest_CT"));
        assert!(meta.timestamp.as_datetime().is_some());
    }

    #[test]
    fn test_derive_metadata_fallbacks() {
        let inst = instance(json!({"SeriesDescription": "", "Modality": "MR"}));
        let meta = derive_metadata(&inst);
        assert_eq!(meta.name, vec![""]);
        assert_eq!(meta.desc.as_deref(), Some("MR"));
        assert_eq!(meta.desc_snake.as_deref(), Some("MR"));
        assert_eq!(meta.timestamp, AcquisitionTime::Invalid(None));

        let bare = derive_metadata(&instance(json!({})));
        assert!(bare.desc.is_none());
        assert!(bare.desc_snake.is_none());
    }
}
