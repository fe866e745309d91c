//! Work queue between the listener and the export worker
//!
//! A FIFO of [`WorkItem`]s. The listener side pushes; exactly one worker
//! pops and processes items one at a time, so a checkpoint is only handled
//! after every instance enqueued before it.

use crate::core::listener::ListenerEvent;
use crate::domain::{ChangeEvent, Cursor, ExportError, InstanceId, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// One unit of work for the export worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    /// Persist the cursor
    Checkpoint(Cursor),
    /// Export a new instance
    Instance { id: InstanceId, change: ChangeEvent },
}

impl WorkItem {
    /// Maps a listener event to a work item
    ///
    /// Resource and error events carry no work and map to `None`.
    pub fn from_event(event: ListenerEvent) -> Option<Self> {
        match event {
            ListenerEvent::NewInstance { id, change } => Some(WorkItem::Instance { id, change }),
            ListenerEvent::Checkpoint(cursor) => Some(WorkItem::Checkpoint(cursor)),
            ListenerEvent::Resource(_) | ListenerEvent::Error(_) => None,
        }
    }
}

/// Producer handle of the work queue
#[derive(Debug, Clone)]
pub struct WorkQueue {
    tx: UnboundedSender<WorkItem>,
    depth: Arc<AtomicUsize>,
}

/// Consumer handle of the work queue
#[derive(Debug)]
pub struct WorkReceiver {
    rx: UnboundedReceiver<WorkItem>,
    depth: Arc<AtomicUsize>,
}

impl WorkQueue {
    /// Creates a queue and its single consumer
    pub fn new() -> (Self, WorkReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let depth = Arc::new(AtomicUsize::new(0));
        (
            Self {
                tx,
                depth: Arc::clone(&depth),
            },
            WorkReceiver { rx, depth },
        )
    }

    /// Appends an item
    ///
    /// # Errors
    ///
    /// Returns an error if the worker has gone away.
    pub fn push(&self, item: WorkItem) -> Result<()> {
        self.depth.fetch_add(1, Ordering::AcqRel);
        self.tx.send(item).map_err(|_| {
            self.depth.fetch_sub(1, Ordering::AcqRel);
            ExportError::Other("work queue closed".to_string())
        })
    }

    /// Items waiting to be processed
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    /// Whether no items are waiting
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl WorkReceiver {
    /// Takes the next item, waiting for one; `None` once every producer is gone
    pub async fn recv(&mut self) -> Option<WorkItem> {
        let item = self.rx.recv().await?;
        self.depth.fetch_sub(1, Ordering::AcqRel);
        Some(item)
    }

    /// Items waiting to be processed
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    /// Whether no items are waiting
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Forwards listener events into the work queue until either side closes
pub async fn route_events(mut events: UnboundedReceiver<ListenerEvent>, queue: WorkQueue) {
    while let Some(event) = events.recv().await {
        match &event {
            ListenerEvent::Resource(change) => {
                tracing::debug!(
                    change_type = %change.change_type,
                    id = %change.id,
                    seq = %change.seq,
                    "New resource"
                );
            }
            ListenerEvent::Error(message) => {
                tracing::debug!(error = %message, "Listener reported an error");
            }
            _ => {}
        }

        if let Some(item) = WorkItem::from_event(event) {
            if queue.push(item).is_err() {
                tracing::debug!("Work queue closed, stopping event routing");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChangeType;

    #[test]
    fn test_from_event() {
        let change = ChangeEvent::new("a", ChangeType::NewInstance, 3);
        let id = InstanceId::new("a").unwrap();
        assert_eq!(
            WorkItem::from_event(ListenerEvent::NewInstance {
                id: id.clone(),
                change: change.clone()
            }),
            Some(WorkItem::Instance { id, change })
        );
        assert_eq!(
            WorkItem::from_event(ListenerEvent::Checkpoint(Cursor::new(3))),
            Some(WorkItem::Checkpoint(Cursor::new(3)))
        );
        assert_eq!(
            WorkItem::from_event(ListenerEvent::Error("x".into())),
            None
        );
    }

    #[tokio::test]
    async fn test_queue_is_fifo_and_tracks_depth() {
        let (queue, mut rx) = WorkQueue::new();
        queue.push(WorkItem::Checkpoint(Cursor::new(1))).unwrap();
        queue.push(WorkItem::Checkpoint(Cursor::new(2))).unwrap();
        assert_eq!(queue.len(), 2);

        assert_eq!(rx.recv().await, Some(WorkItem::Checkpoint(Cursor::new(1))));
        assert_eq!(rx.len(), 1);
        assert_eq!(rx.recv().await, Some(WorkItem::Checkpoint(Cursor::new(2))));
        assert!(rx.is_empty());

        drop(queue);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_route_events() {
        let (events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();
        let (queue, mut rx) = WorkQueue::new();

        events_tx
            .send(ListenerEvent::Resource(ChangeEvent::new("s", ChangeType::NewStudy, 1)))
            .unwrap();
        events_tx.send(ListenerEvent::Checkpoint(Cursor::new(1))).unwrap();
        drop(events_tx);

        route_events(events_rx, queue).await;
        assert_eq!(rx.recv().await, Some(WorkItem::Checkpoint(Cursor::new(1))));
        assert_eq!(rx.recv().await, None);
    }
}
