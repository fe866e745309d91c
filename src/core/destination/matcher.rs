//! Destination match predicates
//!
//! Patterns use backtracking syntax, so lookaround and backreferences are
//! accepted alongside the usual regular expression features.

use crate::domain::{ExportError, Instance, Result};
use fancy_regex::Regex;
use std::collections::BTreeMap;

/// All-of set of case-insensitive field patterns
///
/// An instance matches when every configured field is present as text and
/// its pattern finds a match. An empty matcher accepts everything.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    rules: Vec<(String, Regex)>,
}

impl Matcher {
    /// Compiles the `match` table of a destination
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Configuration`] for an invalid pattern.
    pub fn new(patterns: &BTreeMap<String, String>) -> Result<Self> {
        let rules = patterns
            .iter()
            .map(|(field, pattern)| {
                Regex::new(&format!("(?i){pattern}"))
                    .map(|re| (field.clone(), re))
                    .map_err(|e| {
                        ExportError::Configuration(format!(
                            "invalid match pattern for '{field}': {e}"
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Whether the matcher has no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Tests an instance, returning the first failing field on mismatch
    pub fn check(&self, instance: &Instance) -> std::result::Result<(), &str> {
        for (field, re) in &self.rules {
            let value = instance
                .attribute(field)
                .and_then(|v| v.as_text())
                .filter(|s| !s.is_empty());
            let Some(text) = value else {
                return Err(field.as_str());
            };
            match re.is_match(text) {
                Ok(true) => {}
                Ok(false) => return Err(field.as_str()),
                Err(e) => {
                    tracing::warn!(field = %field, error = %e, "Match pattern failed to run");
                    return Err(field.as_str());
                }
            }
        }
        Ok(())
    }

    /// Whether every rule passes
    pub fn matches(&self, instance: &Instance) -> bool {
        self.check(instance).is_ok()
    }
}
