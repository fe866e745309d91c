//! Change feed listener
//!
//! Polls the archive's `/changes` feed and turns each page into an ordered
//! stream of [`ListenerEvent`]s: one event per relevant change, then a
//! checkpoint carrying the page's `Last` value. At most one feed query is in
//! flight at any time; a page that reports more changes is followed by an
//! immediate poll instead of waiting for the next tick.

use crate::adapters::orthanc::{ArchiveClient, ChangesPage};
use crate::domain::{ChangeEvent, ChangeType, Cursor, InstanceId};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Event emitted by the listener, in feed order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerEvent {
    /// A new instance was stored
    NewInstance { id: InstanceId, change: ChangeEvent },
    /// A new series, study or patient was created
    Resource(ChangeEvent),
    /// Every change up to this cursor has been emitted
    Checkpoint(Cursor),
    /// The feed query failed; polling continues
    Error(String),
}

/// Result of one poll attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Another poll was in flight
    Skipped,
    /// The feed answered
    Polled {
        /// Number of changes in the page
        changes: usize,
        /// Cursor after the page
        last: Cursor,
        /// Whether the feed is drained
        done: bool,
    },
    /// The feed query failed
    Failed,
}

/// Clears the in-flight flag when the poll ends, including on cancellation
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Change feed listener
///
/// # Example
///
/// ```rust,no_run
/// use orthanc_export::adapters::orthanc::OrthancClient;
/// use orthanc_export::config::ArchiveConfig;
/// use orthanc_export::core::listener::ChangeListener;
/// use orthanc_export::domain::Cursor;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # async fn example() -> orthanc_export::domain::Result<()> {
/// let client = Arc::new(OrthancClient::new(ArchiveConfig::default())?);
/// let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
/// let listener = Arc::new(ChangeListener::new(client, Duration::from_secs(60), Cursor::new(6000), tx));
///
/// listener.start();
/// while let Some(event) = rx.recv().await {
///     println!("{event:?}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct ChangeListener {
    client: Arc<dyn ArchiveClient>,
    period: Duration,
    limit: Option<u32>,
    cursor: AtomicI64,
    updating: AtomicBool,
    events: UnboundedSender<ListenerEvent>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ChangeListener {
    /// Creates a listener starting after `cursor`
    pub fn new(
        client: Arc<dyn ArchiveClient>,
        period: Duration,
        cursor: Cursor,
        events: UnboundedSender<ListenerEvent>,
    ) -> Self {
        Self {
            client,
            period,
            limit: None,
            cursor: AtomicI64::new(cursor.value()),
            updating: AtomicBool::new(false),
            events,
            task: Mutex::new(None),
        }
    }

    /// Sets the maximum number of changes requested per poll
    pub fn with_limit(mut self, limit: Option<u32>) -> Self {
        self.limit = limit;
        self
    }

    /// Cursor the next poll will query from
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self.cursor.load(Ordering::Acquire))
    }

    /// Whether the polling task is running
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .map(|task| task.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    /// Starts periodic polling; the first poll happens immediately
    ///
    /// Calling `start` on a running listener has no effect.
    pub fn start(self: &Arc<Self>) {
        let Ok(mut task) = self.task.lock() else {
            tracing::error!("Listener task lock poisoned, not starting");
            return;
        };
        if task.as_ref().is_some_and(|h| !h.is_finished()) {
            tracing::debug!("Listener already running");
            return;
        }

        tracing::info!(
            base_url = self.client.base_url(),
            period_ms = self.period.as_millis() as u64,
            cursor = %self.cursor(),
            "Starting change listener"
        );

        let weak = Arc::downgrade(self);
        let period = self.period;
        *task = Some(tokio::spawn(run_poll_loop(weak, period)));
    }

    /// Stops periodic polling
    ///
    /// An in-flight poll is cancelled; no further events are emitted.
    pub fn stop(&self) {
        if let Ok(mut task) = self.task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
                tracing::info!(cursor = %self.cursor(), "Change listener stopped");
            }
        }
    }

    /// Queries the feed once
    ///
    /// Emits one event per new instance and per new series/study/patient,
    /// then a checkpoint, then advances the cursor. Returns
    /// [`PollOutcome::Skipped`] without querying if a poll is in flight.
    pub async fn poll(&self) -> PollOutcome {
        if self
            .updating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Poll already in flight, skipping");
            return PollOutcome::Skipped;
        }
        let _guard = InFlight(&self.updating);

        let since = self.cursor();
        match self.client.get_changes(since, self.limit).await {
            Ok(page) => self.dispatch(page),
            Err(e) => {
                tracing::warn!(since = %since, error = %e, "Change feed query failed");
                self.emit(ListenerEvent::Error(e.to_string()));
                PollOutcome::Failed
            }
        }
    }

    fn dispatch(&self, page: ChangesPage) -> PollOutcome {
        let count = page.changes.len();

        for change in page.changes {
            match change.change_type {
                ChangeType::NewInstance => match change.instance_id() {
                    Ok(id) => self.emit(ListenerEvent::NewInstance { id, change }),
                    Err(e) => tracing::warn!(
                        seq = %change.seq,
                        error = %e,
                        "Ignoring new instance with invalid ID"
                    ),
                },
                ChangeType::NewSeries | ChangeType::NewStudy | ChangeType::NewPatient => {
                    self.emit(ListenerEvent::Resource(change))
                }
                ChangeType::Other => {}
            }
        }

        self.emit(ListenerEvent::Checkpoint(page.last));
        self.cursor.store(page.last.value(), Ordering::Release);

        if count > 0 {
            tracing::debug!(changes = count, last = %page.last, done = page.done, "Polled change feed");
        }

        PollOutcome::Polled {
            changes: count,
            last: page.last,
            done: page.done,
        }
    }

    fn emit(&self, event: ListenerEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("Event receiver dropped");
        }
    }
}

impl Drop for ChangeListener {
    fn drop(&mut self) {
        if let Ok(mut task) = self.task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
            }
        }
    }
}

async fn run_poll_loop(listener: Weak<ChangeListener>, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        loop {
            let Some(listener) = listener.upgrade() else {
                return;
            };
            // Keep draining while the feed reports more changes
            match listener.poll().await {
                PollOutcome::Polled {
                    done: false,
                    changes,
                    ..
                } if changes > 0 => continue,
                _ => break,
            }
        }
    }
}
