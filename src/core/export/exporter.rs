//! Export worker
//!
//! The [`Exporter`] wires a [`ChangeListener`] into a single serialized
//! [`WorkQueue`] and processes its items one at a time:
//!
//! - a checkpoint item persists the cursor;
//! - an instance item is decorated with its simplified tags, downloaded to
//!   the temporary directory, given derived metadata and exported to every
//!   destination with bounded concurrency.
//!
//! Because a checkpoint is queued after every instance of its batch, the
//! cursor never moves past work that was not at least attempted.

use crate::adapters::orthanc::ArchiveClient;
use crate::adapters::process::CommandRunner;
use crate::config::ExporterConfig;
use crate::core::destination::{Destination, ExportOutcome};
use crate::core::export::queue::{route_events, WorkItem, WorkQueue};
use crate::core::export::summary::RunSummary;
use crate::core::listener::ChangeListener;
use crate::core::metadata::derive_metadata;
use crate::core::state::{CursorState, StateManager};
use crate::domain::{ArchiveError, ChangeEvent, Cursor, ExportError, Instance, InstanceId, Result};
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch, Semaphore};

/// Outcome of fanning one instance out to every destination
#[derive(Debug, Default)]
struct FanOutReport {
    written: usize,
    skipped: usize,
    errors: Vec<String>,
}

/// Change feed exporter
pub struct Exporter {
    client: Arc<dyn ArchiveClient>,
    runner: Arc<dyn CommandRunner>,
    destinations: Vec<Destination>,
    permits: Semaphore,
    state: StateManager,
    summary: RunSummary,
    tmp_dir: PathBuf,
    period: Duration,
    changes_limit: Option<u32>,
}

impl Exporter {
    /// Creates an exporter from validated configuration
    ///
    /// Builds every destination, creates the temporary directory and loads
    /// the persisted cursor.
    ///
    /// # Errors
    ///
    /// Returns an error if a destination is invalid, the temporary directory
    /// cannot be created or the state file cannot be read.
    pub async fn new(
        config: ExporterConfig,
        client: Arc<dyn ArchiveClient>,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self> {
        let destinations = config
            .destinations
            .iter()
            .enumerate()
            .map(|(index, d)| Destination::new(index, d, &config.converter))
            .collect::<Result<Vec<_>>>()?;

        tokio::fs::create_dir_all(&config.export.tmp_dir)
            .await
            .map_err(|e| {
                ExportError::Io(format!(
                    "Failed to create temporary directory {}: {e}",
                    config.export.tmp_dir.display()
                ))
            })?;

        let state = StateManager::load(&config.state).await?;

        tracing::info!(
            destinations = destinations.len(),
            tmp_dir = %config.export.tmp_dir.display(),
            max_concurrent_destinations = config.export.max_concurrent_destinations,
            cursor = %state.cursor(),
            "Exporter initialized"
        );

        Ok(Self {
            client,
            runner,
            destinations,
            permits: Semaphore::new(config.export.max_concurrent_destinations),
            state,
            summary: RunSummary::new(),
            tmp_dir: config.export.tmp_dir,
            period: Duration::from_millis(config.listener.period_ms),
            changes_limit: config.archive.changes_limit,
        })
    }

    /// Cursor currently persisted
    pub fn cursor(&self) -> Cursor {
        self.state.cursor()
    }

    /// Persisted state, including the failed-instance ledger
    pub fn state(&self) -> &CursorState {
        self.state.state()
    }

    /// Counters of the run so far
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Configured destinations
    pub fn destinations(&self) -> &[Destination] {
        &self.destinations
    }

    /// Runs until `shutdown` flips to `true` or its sender goes away
    ///
    /// The item being processed when shutdown is requested is finished;
    /// items still queued are left for the next run, which sees them again
    /// because the cursor has not moved past them.
    ///
    /// # Errors
    ///
    /// Returns an error if the state file cannot be written.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<RunSummary> {
        let started = Instant::now();

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let listener = Arc::new(
            ChangeListener::new(
                Arc::clone(&self.client),
                self.period,
                self.state.cursor(),
                events_tx,
            )
            .with_limit(self.changes_limit),
        );

        let (queue, mut items) = WorkQueue::new();
        let router = tokio::spawn(route_events(events_rx, queue));
        listener.start();

        let result = loop {
            if *shutdown.borrow() {
                self.summary.interrupted = true;
                break Ok(());
            }

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Shutdown requested, stopping exporter");
                        self.summary.interrupted = true;
                        break Ok(());
                    }
                }

                item = items.recv() => {
                    let Some(item) = item else {
                        tracing::warn!("Work queue closed");
                        break Ok(());
                    };
                    if let Err(e) = self.process(item).await {
                        crate::log_error_with_context!(&e, "Export worker stopped");
                        break Err(e);
                    }
                }
            }
        };

        listener.stop();
        drop(listener);
        router.abort();

        if !items.is_empty() {
            tracing::info!(pending = items.len(), "Leaving queued items for the next run");
        }

        self.summary.duration = started.elapsed();
        self.summary.log_summary();

        result.map(|()| self.summary)
    }

    /// Processes one work item
    ///
    /// A failed instance is recorded and logged, not returned: the worker
    /// moves on to the next item.
    ///
    /// # Errors
    ///
    /// Returns an error only if the state file cannot be written.
    pub async fn process(&mut self, item: WorkItem) -> Result<()> {
        match item {
            WorkItem::Checkpoint(cursor) => {
                let persisted = self.state.checkpoint(cursor).await?;
                tracing::debug!(requested = %cursor, persisted = %persisted, "Checkpoint");
                self.summary.record_checkpoint(persisted);
                Ok(())
            }
            WorkItem::Instance { id, change } => self.process_instance(id, change).await,
        }
    }

    async fn process_instance(&mut self, id: InstanceId, change: ChangeEvent) -> Result<()> {
        let started = Instant::now();
        let seq = change.seq;
        crate::log_instance_start!(&id, seq);

        let mut instance = Instance::new(id.clone(), change);
        match self.export(&mut instance).await {
            Ok(report) if report.errors.is_empty() => {
                self.state.record_success(&id, seq).await?;
                self.summary.record_success(report.written, report.skipped);
                if let Some(path) = &instance.tmp_path {
                    remove_payload(path).await;
                }
                crate::log_instance_complete!(&id, seq, report.written, started.elapsed());
                Ok(())
            }
            Ok(report) => {
                let message = report.errors.join("; ");
                self.fail(&id, seq, message).await
            }
            Err(e) => self.fail(&id, seq, e.to_string()).await,
        }
    }

    async fn fail(&mut self, id: &InstanceId, seq: Cursor, message: String) -> Result<()> {
        tracing::error!(
            instance_id = %id,
            seq = %seq,
            error = %message,
            "Failed to export instance"
        );
        self.state.record_failure(id, seq, &message).await?;
        self.summary.record_failure(id.clone(), seq, message);
        Ok(())
    }

    /// Decorate, download, derive metadata, then fan out
    async fn export(&self, instance: &mut Instance) -> Result<FanOutReport> {
        let tags = self.client.get_simplified_tags(&instance.id).await?;
        instance.merge_tags(tags);

        self.download_instance(instance).await?;
        instance.metadata = Some(derive_metadata(instance));

        Ok(self.fan_out(instance).await)
    }

    /// Downloads the payload of an instance to `<tmp_dir>/<id>.dcm`
    ///
    /// An existing file is reused, so an instance left behind by an earlier
    /// run is not fetched again. The body is written to a `.partial` file
    /// and renamed into place.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails or the file cannot be written.
    pub async fn download_instance(&self, instance: &mut Instance) -> Result<PathBuf> {
        let path = payload_path(&self.tmp_dir, &instance.id);

        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::debug!(
                instance_id = %instance.id,
                path = %path.display(),
                "Payload already downloaded"
            );
        } else {
            tracing::debug!(instance_id = %instance.id, "Downloading payload");
            let body = self.client.get_file(&instance.id).await?;
            if body.is_empty() {
                return Err(ArchiveError::InvalidResponse(format!(
                    "empty payload for instance {}",
                    instance.id
                ))
                .into());
            }

            let partial = path.with_extension("dcm.partial");
            tokio::fs::write(&partial, &body).await.map_err(|e| {
                ExportError::Io(format!("Failed to write {}: {e}", partial.display()))
            })?;
            tokio::fs::rename(&partial, &path).await.map_err(|e| {
                ExportError::Io(format!("Failed to move {} into place: {e}", path.display()))
            })?;
        }

        instance.tmp_path = Some(path.clone());
        Ok(path)
    }

    /// Exports to every destination, at most `max_concurrent_destinations`
    /// at a time; every destination runs to completion
    async fn fan_out(&self, instance: &Instance) -> FanOutReport {
        let permits = &self.permits;
        let runner = self.runner.as_ref();

        let exports = self.destinations.iter().map(|destination| async move {
            let _permit = permits
                .acquire()
                .await
                .map_err(|_| ExportError::Other("destination semaphore closed".to_string()))?;
            destination.export_instance(instance, runner).await
        });

        let mut report = FanOutReport::default();
        for (destination, result) in self.destinations.iter().zip(join_all(exports).await) {
            match result {
                Ok(ExportOutcome::Exported(path)) => {
                    tracing::debug!(
                        destination = destination.name(),
                        instance_id = %instance.id,
                        path = %path.display(),
                        "Exported"
                    );
                    report.written += 1;
                }
                Ok(ExportOutcome::Unconverted(path)) => {
                    tracing::debug!(
                        destination = destination.name(),
                        instance_id = %instance.id,
                        path = %path.display(),
                        "No conversion configured, nothing written"
                    );
                }
                Ok(ExportOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!(
                        destination = destination.name(),
                        instance_id = %instance.id,
                        error = %e,
                        "Destination export failed"
                    );
                    report.errors.push(format!("{}: {e}", destination.name()));
                }
            }
        }
        report
    }
}

/// Local payload path of an instance
pub fn payload_path(tmp_dir: &Path, id: &InstanceId) -> PathBuf {
    tmp_dir.join(format!("{}.dcm", id.as_str()))
}

async fn remove_payload(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove payload");
    }
}
