//! Run summary and reporting
//!
//! Counters for one exporter run, logged when the run ends.

use crate::domain::{Cursor, InstanceId};
use std::time::Duration;

/// Failures kept in memory for the final report; the count is unbounded
const MAX_RECORDED_FAILURES: usize = 100;

/// One failed instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceFailure {
    /// Instance identifier
    pub id: InstanceId,

    /// Feed position of the change
    pub seq: Cursor,

    /// Error message
    pub message: String,
}

/// Summary of an exporter run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Instance items taken off the queue
    pub instances_processed: usize,

    /// Instances exported to every applicable destination
    pub instances_exported: usize,

    /// Instances that failed
    pub instances_failed: usize,

    /// Artifacts written, across all destinations
    pub artifacts_written: usize,

    /// Destination exports skipped by match predicates
    pub destinations_skipped: usize,

    /// Checkpoint items processed
    pub checkpoints: usize,

    /// Last persisted cursor
    pub last_cursor: Option<Cursor>,

    /// Duration of the run
    pub duration: Duration,

    /// Whether the run ended because of a shutdown request
    pub interrupted: bool,

    /// Most recent failures
    pub failures: Vec<InstanceFailure>,
}

impl RunSummary {
    /// Create a new empty run summary
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful instance
    pub fn record_success(&mut self, written: usize, skipped: usize) {
        self.instances_processed += 1;
        self.instances_exported += 1;
        self.artifacts_written += written;
        self.destinations_skipped += skipped;
    }

    /// Records a failed instance
    pub fn record_failure(&mut self, id: InstanceId, seq: Cursor, message: String) {
        self.instances_processed += 1;
        self.instances_failed += 1;
        if self.failures.len() == MAX_RECORDED_FAILURES {
            self.failures.remove(0);
        }
        self.failures.push(InstanceFailure { id, seq, message });
    }

    /// Records a persisted checkpoint
    pub fn record_checkpoint(&mut self, persisted: Cursor) {
        self.checkpoints += 1;
        self.last_cursor = Some(persisted);
    }

    /// Check if the run had no failures
    pub fn is_successful(&self) -> bool {
        self.instances_failed == 0
    }

    /// Get success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.instances_processed == 0 {
            return 100.0;
        }
        (self.instances_exported as f64 / self.instances_processed as f64) * 100.0
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            processed = self.instances_processed,
            exported = self.instances_exported,
            failed = self.instances_failed,
            artifacts = self.artifacts_written,
            skipped = self.destinations_skipped,
            checkpoints = self.checkpoints,
            last_cursor = ?self.last_cursor.map(Cursor::value),
            duration_secs = self.duration.as_secs(),
            success_rate = format!("{:.2}%", self.success_rate()),
            interrupted = self.interrupted,
            "Export run finished"
        );

        if !self.failures.is_empty() {
            tracing::warn!(
                failed = self.instances_failed,
                "Run finished with failed instances"
            );
            for failure in &self.failures {
                tracing::warn!(
                    instance_id = %failure.id,
                    seq = %failure.seq,
                    error = %failure.message,
                    "Failed instance"
                );
            }
        }
    }
}
