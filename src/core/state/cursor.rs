//! Persisted cursor state
//!
//! The state file records the change feed position and the instances that
//! failed to export, so an operator can re-export them by hand.

use crate::domain::{Cursor, InstanceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Contents of the state file
///
/// # Examples
///
/// ```
/// use orthanc_export::core::state::CursorState;
///
/// // State files written before the failure ledger existed still load
/// let state: CursorState = serde_json::from_str(r#"{"last_update": 6042}"#).unwrap();
/// assert_eq!(state.last_update.value(), 6042);
/// assert!(state.failed_instances.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorState {
    /// Last checkpointed change feed position
    pub last_update: Cursor,

    /// Instances whose export failed and has not since succeeded
    #[serde(default)]
    pub failed_instances: Vec<FailedInstance>,
}

impl CursorState {
    /// Fresh state at the given position
    pub fn new(last_update: Cursor) -> Self {
        Self {
            last_update,
            failed_instances: Vec::new(),
        }
    }

    /// Adds or replaces the ledger entry for an instance
    ///
    /// The ledger keeps at most `limit` entries; the oldest are dropped
    /// first. Returns how many entries were dropped.
    pub fn record_failure(&mut self, failure: FailedInstance, limit: usize) -> usize {
        self.failed_instances.retain(|f| f.id != failure.id);
        self.failed_instances.push(failure);

        let excess = self.failed_instances.len().saturating_sub(limit);
        self.failed_instances.drain(..excess);
        excess
    }

    /// Removes the ledger entry for an instance, returning whether one existed
    pub fn clear_failure(&mut self, id: &InstanceId) -> bool {
        let before = self.failed_instances.len();
        self.failed_instances.retain(|f| &f.id != id);
        before != self.failed_instances.len()
    }
}

/// One failure ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedInstance {
    /// Instance identifier
    pub id: InstanceId,

    /// Feed position of the change that announced it
    pub seq: Cursor,

    /// Error message of the last failure
    pub error: String,

    /// When the last failure happened
    pub failed_at: DateTime<Utc>,
}

impl FailedInstance {
    /// Creates a ledger entry stamped with the current time
    pub fn new(id: InstanceId, seq: Cursor, error: impl Into<String>) -> Self {
        Self {
            id,
            seq,
            error: error.into(),
            failed_at: Utc::now(),
        }
    }
}
