//! Domain identifier types with validation
//!
//! Newtype wrappers for archive identifiers and the change feed cursor.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Orthanc instance identifier newtype wrapper
///
/// Orthanc identifies resources by a SHA-1 derived string such as
/// `8a8cf898-ca27c490-d0c7058c-929d0581-2bbf104d`.
///
/// # Examples
///
/// ```
/// use orthanc_export::domain::ids::InstanceId;
/// use std::str::FromStr;
///
/// let id = InstanceId::from_str("8a8cf898-ca27c490-d0c7058c-929d0581-2bbf104d").unwrap();
/// assert_eq!(id.as_str(), "8a8cf898-ca27c490-d0c7058c-929d0581-2bbf104d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstanceId(String);

impl InstanceId {
    /// Creates a new InstanceId from a string
    ///
    /// Rejects empty identifiers and identifiers containing path separators,
    /// since the ID is used to name the local payload file.
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Instance ID cannot be empty".to_string());
        }
        if id.contains(['/', '\\']) || id == "." || id == ".." {
            return Err(format!("Instance ID contains a path component: {id}"));
        }
        Ok(Self(id))
    }

    /// Returns the instance ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for InstanceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for InstanceId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<InstanceId> for String {
    fn from(id: InstanceId) -> Self {
        id.0
    }
}

impl AsRef<str> for InstanceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Position in the archive change feed
///
/// The archive hands out monotonically increasing sequence numbers. A cursor
/// value `n` means every change with `Seq <= n` has been checkpointed; the
/// next poll asks for changes strictly after `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(i64);

impl Cursor {
    /// Creates a cursor at the given sequence number
    pub const fn new(seq: i64) -> Self {
        Self(seq)
    }

    /// Returns the raw sequence number
    pub const fn value(self) -> i64 {
        self.0
    }

    /// Cursor immediately before this one, so that a poll re-delivers `self`
    pub fn previous(self) -> Self {
        Self(self.0.saturating_sub(1))
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Cursor {
    fn from(seq: i64) -> Self {
        Self(seq)
    }
}
