//! State manager for cursor persistence
//!
//! The [`StateManager`] owns the cursor state for the lifetime of a run. It
//! is held by the export worker alone, so every change to the cursor happens
//! in queue order.

use super::cursor::{CursorState, FailedInstance};
use crate::config::{CheckpointPolicy, StateConfig};
use crate::domain::{Cursor, ExportError, InstanceId, Result};
use std::path::{Path, PathBuf};

/// State manager for the change feed cursor
pub struct StateManager {
    /// State file path
    path: PathBuf,

    /// Current state, mirrored to disk on every change
    state: CursorState,

    /// How failures affect checkpointing
    policy: CheckpointPolicy,

    /// Upper bound for the cursor after a failure under the strict policy
    hold_at: Option<Cursor>,

    /// Failure ledger capacity
    max_failed: usize,
}

impl StateManager {
    /// Loads state from the configured file
    ///
    /// A missing file starts from `initial_last_update`. A configured
    /// `last_update` replaces the persisted cursor.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load(config: &StateConfig) -> Result<Self> {
        let mut state = match Self::read(&config.path).await? {
            Some(state) => {
                tracing::info!(
                    path = %config.path.display(),
                    last_update = %state.last_update,
                    failed = state.failed_instances.len(),
                    "Loaded export state"
                );
                state
            }
            None => {
                tracing::info!(
                    path = %config.path.display(),
                    last_update = config.initial_last_update,
                    "No state file, starting from initial cursor"
                );
                CursorState::new(Cursor::new(config.initial_last_update))
            }
        };

        if let Some(last) = config.last_update {
            tracing::info!(
                from = %state.last_update,
                to = last,
                "Overriding persisted cursor"
            );
            state.last_update = Cursor::new(last);
        }

        let excess = state
            .failed_instances
            .len()
            .saturating_sub(config.max_failed_instances);
        if excess > 0 {
            tracing::warn!(
                dropped = excess,
                limit = config.max_failed_instances,
                "Failure ledger over limit, dropping oldest entries"
            );
            state.failed_instances.drain(..excess);
        }

        Ok(Self {
            path: config.path.clone(),
            state,
            policy: config.checkpoint_policy,
            hold_at: None,
            max_failed: config.max_failed_instances,
        })
    }

    /// Reads a state file without taking ownership of it
    ///
    /// Returns `Ok(None)` if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn read(path: &Path) -> Result<Option<CursorState>> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ExportError::State(format!(
                    "Failed to read state file {}: {e}",
                    path.display()
                )))
            }
        };

        serde_json::from_str(&contents).map(Some).map_err(|e| {
            ExportError::State(format!(
                "Failed to parse state file {}: {e}",
                path.display()
            ))
        })
    }

    /// Current cursor
    pub fn cursor(&self) -> Cursor {
        self.state.last_update
    }

    /// Current state
    pub fn state(&self) -> &CursorState {
        &self.state
    }

    /// Cursor ceiling in effect after a failure, if any
    pub fn held_at(&self) -> Option<Cursor> {
        self.hold_at
    }

    /// Persists a checkpoint from the change feed
    ///
    /// Returns the cursor actually persisted, which is lower than `cursor`
    /// when the strict policy is holding it back.
    ///
    /// # Errors
    ///
    /// Returns an error if the state file cannot be written.
    pub async fn checkpoint(&mut self, cursor: Cursor) -> Result<Cursor> {
        if self.advance(cursor) {
            self.save().await?;
        }
        Ok(self.state.last_update)
    }

    /// Records a successfully exported instance and advances to its sequence
    ///
    /// # Errors
    ///
    /// Returns an error if the state file cannot be written.
    pub async fn record_success(&mut self, id: &InstanceId, seq: Cursor) -> Result<()> {
        let cleared = self.state.clear_failure(id);
        if cleared {
            tracing::info!(instance_id = %id, "Previously failed instance exported");
        }
        if self.advance(seq) || cleared {
            self.save().await?;
        }
        Ok(())
    }

    /// Records a failed instance in the ledger
    ///
    /// Under the strict policy the cursor is held just below the first
    /// failure of the run, so the instance is delivered again after restart.
    ///
    /// # Errors
    ///
    /// Returns an error if the state file cannot be written.
    pub async fn record_failure(&mut self, id: &InstanceId, seq: Cursor, error: &str) -> Result<()> {
        let dropped = self
            .state
            .record_failure(FailedInstance::new(id.clone(), seq, error), self.max_failed);
        if dropped > 0 {
            tracing::debug!(
                dropped,
                limit = self.max_failed,
                "Failure ledger full, dropped oldest entry"
            );
        }

        if self.policy == CheckpointPolicy::Strict && self.hold_at.is_none() {
            let hold = seq.previous();
            tracing::warn!(
                instance_id = %id,
                hold_at = %hold,
                "Holding cursor below failed instance"
            );
            self.hold_at = Some(hold);
        }

        self.save().await
    }

    /// Moves the cursor forward, respecting the hold; returns whether it moved
    fn advance(&mut self, to: Cursor) -> bool {
        let target = match self.hold_at {
            Some(hold) => to.min(hold),
            None => to,
        };
        if target > self.state.last_update {
            self.state.last_update = target;
            true
        } else {
            false
        }
    }

    /// Writes the state file atomically
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or renamed into place.
    pub async fn save(&self) -> Result<()> {
        let json = serde_json::to_vec_pretty(&self.state)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ExportError::State(format!(
                    "Failed to create state directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, &json).await.map_err(|e| {
            ExportError::State(format!("Failed to write {}: {e}", tmp.display()))
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            ExportError::State(format!(
                "Failed to replace state file {}: {e}",
                self.path.display()
            ))
        })?;

        tracing::trace!(last_update = %self.state.last_update, "State saved");
        Ok(())
    }
}
