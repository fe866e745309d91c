//! Export orchestration
//!
//! This module provides the export side of the pipeline:
//! - The serialized work queue fed by the change listener
//! - The export worker that downloads, decorates and fans out instances
//! - Run summary and reporting

pub mod exporter;
pub mod queue;
pub mod summary;

pub use exporter::{payload_path, Exporter};
pub use queue::{route_events, WorkItem, WorkQueue, WorkReceiver};
pub use summary::{InstanceFailure, RunSummary};
