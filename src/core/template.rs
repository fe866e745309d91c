//! Path templates
//!
//! Destination directories, filenames, link paths and command arguments are
//! written as templates and compiled once, when the configuration is loaded.
//! Rendering an instance then only substitutes values.
//!
//! # Syntax
//!
//! | Placeholder           | Value                                               |
//! |-----------------------|-----------------------------------------------------|
//! | `{Keyword}`           | Raw tag (`{Modality}`) or change field (`{ID}`)     |
//! | `{name}`              | All patient name components joined with `_`         |
//! | `{name.N}`            | Patient name component `N` (0 = family name)        |
//! | `{desc}`              | Series description, falling back to the modality    |
//! | `{desc_snake}`        | `desc` with whitespace replaced by `_`              |
//! | `{timestamp}`         | Acquisition time as `%Y%m%dT%H%M%S`                 |
//! | `{timestamp:FORMAT}`  | Acquisition time with a strftime format             |
//!
//! `{{` and `}}` produce literal braces.
//!
//! Substituted tag values never add path components: `/`, `\` and NUL are
//! replaced by `_`, and a value of `.` or `..` renders as `_`.
//!
//! # Example
//!
//! ```
//! use orthanc_export::core::template::PathTemplate;
//!
//! let template = PathTemplate::parse("{name.0}/{timestamp:%Y-%m}/{SeriesNumber}").unwrap();
//! assert_eq!(template.source(), "{name.0}/{timestamp:%Y-%m}/{SeriesNumber}");
//!
//! assert!(PathTemplate::parse("{patient}").is_err());
//! ```

use crate::domain::{AcquisitionTime, AttributeValue, Instance, TemplateError};
use chrono::format::{Item, StrftimeItems};
use std::fmt;
use std::str::FromStr;

/// Format used by a bare `{timestamp}`
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Lower-case attribute names computed by the exporter
const DERIVED_ATTRIBUTES: &[&str] = &["name", "desc", "desc_snake", "timestamp"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Attribute(String),
    NameComponent(usize),
    Timestamp(String),
}

/// A compiled path template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Compiles a template
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Syntax`] for unbalanced braces or empty
    /// placeholders, [`TemplateError::UnknownAttribute`] for names outside the
    /// attribute schema and [`TemplateError::InvalidFormat`] for a bad
    /// timestamp format.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let syntax = |message: &str| TemplateError::Syntax {
            template: source.to_string(),
            message: message.to_string(),
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(syntax("unmatched '}'")),
                '{' => {
                    let mut placeholder = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        match c {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => return Err(syntax("nested '{'")),
                            c => placeholder.push(c),
                        }
                    }
                    if !closed {
                        return Err(syntax("unterminated placeholder"));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(compile_placeholder(placeholder.trim(), &syntax)?);
                }
                c => literal.push(c),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// Template text as configured
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the template contains no placeholders
    pub fn is_static(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, Segment::Literal(_)))
    }

    /// Renders the template for an instance
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::MissingAttribute`] when a referenced value is
    /// absent, [`TemplateError::NotRenderable`] for structured tag values and
    /// [`TemplateError::InvalidTimestamp`] when the acquisition time is used
    /// but could not be parsed.
    pub fn render(&self, instance: &Instance) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.source.len());

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Attribute(key) => match instance.attribute(key) {
                    None => return Err(TemplateError::MissingAttribute(key.clone())),
                    Some(AttributeValue::Text(s)) => push_value(&mut out, s),
                    Some(AttributeValue::Number(n)) => out.push_str(&n),
                    Some(AttributeValue::Components(parts)) => {
                        for (i, part) in parts.iter().enumerate() {
                            if i > 0 {
                                out.push('_');
                            }
                            push_value(&mut out, part);
                        }
                    }
                    Some(AttributeValue::Timestamp(ts)) => {
                        out.push_str(&format_timestamp(ts, DEFAULT_TIMESTAMP_FORMAT)?)
                    }
                    Some(AttributeValue::Structured) => {
                        return Err(TemplateError::NotRenderable(key.clone()))
                    }
                },
                Segment::NameComponent(index) => match instance.attribute("name") {
                    Some(AttributeValue::Components(parts)) if *index < parts.len() => {
                        push_value(&mut out, &parts[*index])
                    }
                    _ => return Err(TemplateError::MissingAttribute(format!("name.{index}"))),
                },
                Segment::Timestamp(format) => match instance.attribute("timestamp") {
                    Some(AttributeValue::Timestamp(ts)) => {
                        out.push_str(&format_timestamp(ts, format)?)
                    }
                    _ => return Err(TemplateError::MissingAttribute("timestamp".to_string())),
                },
            }
        }

        Ok(out)
    }
}

impl FromStr for PathTemplate {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn compile_placeholder(
    placeholder: &str,
    syntax: &dyn Fn(&str) -> TemplateError,
) -> Result<Segment, TemplateError> {
    if placeholder.is_empty() {
        return Err(syntax("empty placeholder"));
    }

    if let Some(format) = placeholder.strip_prefix("timestamp:") {
        if format.is_empty() {
            return Err(TemplateError::InvalidFormat(String::new()));
        }
        if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
            return Err(TemplateError::InvalidFormat(format.to_string()));
        }
        return Ok(Segment::Timestamp(format.to_string()));
    }

    if let Some(index) = placeholder.strip_prefix("name.") {
        return index
            .parse::<usize>()
            .map(Segment::NameComponent)
            .map_err(|_| TemplateError::UnknownAttribute(placeholder.to_string()));
    }

    if is_known_attribute(placeholder) {
        Ok(Segment::Attribute(placeholder.to_string()))
    } else {
        Err(TemplateError::UnknownAttribute(placeholder.to_string()))
    }
}

/// Whether `name` is a derived attribute or looks like a DICOM keyword
///
/// DICOM keywords and change feed fields are UpperCamelCase ASCII.
pub fn is_known_attribute(name: &str) -> bool {
    if DERIVED_ATTRIBUTES.contains(&name) {
        return true;
    }
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_uppercase())
        && chars.all(|c| c.is_ascii_alphanumeric())
}

/// Appends an external value with path separators neutralised
fn push_value(out: &mut String, value: &str) {
    if value == "." || value == ".." {
        out.push('_');
        return;
    }
    out.extend(value.chars().map(|c| match c {
        '/' | '\\' | '\0' => '_',
        c => c,
    }));
}

fn format_timestamp(ts: &AcquisitionTime, format: &str) -> Result<String, TemplateError> {
    match ts {
        AcquisitionTime::Parsed(dt) => Ok(dt.format(format).to_string()),
        AcquisitionTime::Invalid(raw) => Err(TemplateError::InvalidTimestamp(
            raw.clone().unwrap_or_else(|| "missing".to_string()),
        )),
    }
}
