//! Shared fakes for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use orthanc_export::adapters::orthanc::{ArchiveClient, ChangesPage, SystemInfo};
use orthanc_export::adapters::process::{CommandLine, CommandOutput, CommandRunner};
use orthanc_export::config::{DestinationConfig, ExporterConfig, StateConfig};
use orthanc_export::domain::{
    ArchiveError, ChangeEvent, ChangeType, CommandError, Cursor, InstanceId, Result,
};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// In-memory archive serving scripted change pages
#[derive(Default)]
pub struct FakeArchive {
    pages: Mutex<VecDeque<Result<ChangesPage>>>,
    tags: Mutex<HashMap<String, Map<String, Value>>>,
    pub changes_calls: AtomicUsize,
    pub tag_fetches: AtomicUsize,
    pub file_fetches: AtomicUsize,
    pub since: Mutex<Vec<Cursor>>,
    gate: Option<Arc<Semaphore>>,
}

impl FakeArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks every `get_changes` until a permit is added to the gate
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        (
            Self {
                gate: Some(Arc::clone(&gate)),
                ..Self::default()
            },
            gate,
        )
    }

    pub fn push_page(&self, changes: Vec<ChangeEvent>, last: i64, done: bool) {
        self.pages.lock().unwrap().push_back(Ok(ChangesPage {
            changes,
            last: Cursor::new(last),
            done,
        }));
    }

    pub fn push_error(&self) {
        self.pages
            .lock()
            .unwrap()
            .push_back(Err(ArchiveError::ConnectionFailed("connection refused".into()).into()));
    }

    pub fn set_tags(&self, id: &str, tags: Value) {
        let Value::Object(map) = tags else {
            panic!("tags must be an object");
        };
        self.tags.lock().unwrap().insert(id.to_string(), map);
    }
}

#[async_trait]
impl ArchiveClient for FakeArchive {
    async fn get_changes(&self, since: Cursor, _limit: Option<u32>) -> Result<ChangesPage> {
        self.changes_calls.fetch_add(1, Ordering::SeqCst);
        self.since.lock().unwrap().push(since);
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        let next = self.pages.lock().unwrap().pop_front();
        next.unwrap_or(Ok(ChangesPage {
            changes: Vec::new(),
            last: since,
            done: true,
        }))
    }

    async fn get_simplified_tags(&self, id: &InstanceId) -> Result<Map<String, Value>> {
        self.tag_fetches.fetch_add(1, Ordering::SeqCst);
        self.tags
            .lock()
            .unwrap()
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| ArchiveError::InstanceNotFound(id.to_string()).into())
    }

    async fn get_file(&self, id: &InstanceId) -> Result<Vec<u8>> {
        self.file_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(format!("DICM:{id}").into_bytes())
    }

    async fn system_info(&self) -> Result<SystemInfo> {
        Ok(SystemInfo::default())
    }

    fn base_url(&self) -> &str {
        "http://fake-archive"
    }
}

/// Command runner that records commands and writes the last argument as a file
#[derive(Default)]
pub struct RecordingRunner {
    pub calls: Mutex<Vec<CommandLine>>,
    failing_programs: Vec<String>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every command whose program ends with `program`
    pub fn failing(program: &str) -> Self {
        Self {
            failing_programs: vec![program.to_string()],
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<CommandLine> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, command: &CommandLine) -> std::result::Result<CommandOutput, CommandError> {
        self.calls.lock().unwrap().push(command.clone());

        if self
            .failing_programs
            .iter()
            .any(|p| command.program.ends_with(p.as_str()))
        {
            return Err(CommandError::Failed {
                command: command.to_string(),
                status: "exit status: 1".to_string(),
                stderr: "conversion failed".to_string(),
            });
        }

        if let Some(dest) = command.args.last() {
            if command.args.len() >= 2 {
                tokio::fs::write(dest, b"converted").await.unwrap();
            }
        }
        Ok(CommandOutput::default())
    }
}

pub fn new_instance(id: &str, seq: i64) -> ChangeEvent {
    ChangeEvent::new(id, ChangeType::NewInstance, seq)
}

pub fn change(id: &str, change_type: ChangeType, seq: i64) -> ChangeEvent {
    ChangeEvent::new(id, change_type, seq)
}

pub fn destination(kind: Option<&str>, topdir: &Path, dir: &str, filename: &str) -> DestinationConfig {
    DestinationConfig {
        name: None,
        kind: kind.map(str::to_string),
        args: String::new(),
        topdir: Some(topdir.to_path_buf()),
        dir: dir.to_string(),
        filename: filename.to_string(),
        matches: BTreeMap::new(),
        link: None,
        links: Vec::new(),
        postprocess: None,
    }
}

pub fn exporter_config(root: &Path, destinations: Vec<DestinationConfig>) -> ExporterConfig {
    let mut config = ExporterConfig::default();
    config.listener.period_ms = 50;
    config.export.tmp_dir = root.join("tmp");
    config.state = StateConfig {
        path: root.join("state.json"),
        ..StateConfig::default()
    };
    config.logging.local_enabled = false;
    config.destinations = destinations;
    config
}

pub fn payload(root: &Path, id: &str) -> PathBuf {
    root.join("tmp").join(format!("{id}.dcm"))
}
