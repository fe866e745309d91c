//! Configuration schema types
//!
//! This module defines the configuration structure for the exporter.

use crate::config::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// How checkpoint advancement relates to instance failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointPolicy {
    /// Checkpoints are persisted as soon as they are dequeued, even if an
    /// instance of the same batch failed. A failed instance is never retried.
    #[default]
    Decoupled,
    /// After a failure the persisted cursor is held just below the failed
    /// instance for the rest of the run, so it is re-delivered after restart.
    Strict,
}

/// Main exporter configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Orthanc archive connection
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Change feed polling
    #[serde(default)]
    pub listener: ListenerConfig,

    /// Export pipeline settings
    #[serde(default)]
    pub export: ExportConfig,

    /// External conversion utilities
    #[serde(default)]
    pub converter: ConverterConfig,

    /// Cursor state persistence
    #[serde(default)]
    pub state: StateConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Export destinations, applied to every new instance
    #[serde(default)]
    pub destinations: Vec<DestinationConfig>,
}

impl ExporterConfig {
    /// Validates the configuration
    ///
    /// Destination templates, match patterns and command lines are compiled
    /// here so that a broken descriptor is rejected before anything runs.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.archive.validate()?;
        self.listener.validate()?;
        self.export.validate()?;
        self.logging.validate()?;

        if self.destinations.is_empty() {
            return Err("at least one [[destinations]] entry is required".to_string());
        }
        for (index, destination) in self.destinations.iter().enumerate() {
            crate::core::destination::Destination::check(index, destination, &self.converter)
                .map_err(|e| format!("destinations[{index}]: {e}"))?;
        }
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Orthanc archive configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Base URL of the Orthanc REST API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Username for HTTP basic authentication (optional)
    #[serde(default)]
    pub username: Option<String>,

    /// Password for HTTP basic authentication (optional)
    /// Stored securely in memory and automatically zeroized on drop
    #[serde(default)]
    pub password: Option<SecretString>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// TLS certificate verification enabled
    #[serde(default = "default_true")]
    pub tls_verify: bool,

    /// Maximum number of changes requested per poll (archive default if unset)
    #[serde(default)]
    pub changes_limit: Option<u32>,
}

impl ArchiveConfig {
    fn validate(&self) -> Result<(), String> {
        if self.base_url.is_empty() {
            return Err("archive.base_url cannot be empty".to_string());
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err("archive.base_url must start with http:// or https://".to_string());
        }

        url::Url::parse(&self.base_url)
            .map_err(|e| format!("archive.base_url is not a valid URL: {e}"))?;

        if self.username.is_some() != self.password.is_some() {
            return Err(
                "archive.username and archive.password must be set together".to_string(),
            );
        }

        if self.timeout_seconds == 0 {
            return Err("archive.timeout_seconds must be > 0".to_string());
        }

        if let Some(limit) = self.changes_limit {
            if limit == 0 || limit > 10_000 {
                return Err(format!(
                    "archive.changes_limit must be between 1 and 10000, got {limit}"
                ));
            }
        }

        Ok(())
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            username: None,
            password: None,
            timeout_seconds: default_timeout_seconds(),
            tls_verify: true,
            changes_limit: None,
        }
    }
}

/// Change feed polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// Poll period in milliseconds
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,
}

impl ListenerConfig {
    fn validate(&self) -> Result<(), String> {
        if self.period_ms == 0 {
            return Err("listener.period_ms must be > 0".to_string());
        }
        Ok(())
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            period_ms: default_period_ms(),
        }
    }
}

/// Export pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory holding downloaded payloads until every destination is done
    #[serde(default = "default_tmp_dir")]
    pub tmp_dir: PathBuf,

    /// Maximum number of destinations exporting one instance concurrently
    #[serde(default = "default_max_concurrent_destinations")]
    pub max_concurrent_destinations: usize,

    /// Kill external commands that run longer than this (no limit if unset)
    #[serde(default)]
    pub command_timeout_seconds: Option<u64>,

    /// Graceful shutdown timeout in seconds (default: 30)
    /// This is the maximum time to wait for the current instance to finish
    /// before forcing shutdown.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl ExportConfig {
    fn validate(&self) -> Result<(), String> {
        if self.tmp_dir.as_os_str().is_empty() {
            return Err("export.tmp_dir cannot be empty".to_string());
        }

        if self.max_concurrent_destinations == 0 || self.max_concurrent_destinations > 64 {
            return Err(format!(
                "export.max_concurrent_destinations must be between 1 and 64, got {}",
                self.max_concurrent_destinations
            ));
        }

        if self.command_timeout_seconds == Some(0) {
            return Err("export.command_timeout_seconds must be > 0 when set".to_string());
        }

        Ok(())
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            tmp_dir: default_tmp_dir(),
            max_concurrent_destinations: default_max_concurrent_destinations(),
            command_timeout_seconds: None,
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

/// External conversion utility configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConverterConfig {
    /// dcm4che installation directory; `dcm2*` utilities are run from its
    /// `bin/` folder. When unset they are resolved through `PATH`.
    #[serde(default)]
    pub dcm4che_home: Option<PathBuf>,
}

/// Cursor state configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// State file path
    #[serde(default = "default_state_path")]
    pub path: PathBuf,

    /// Cursor used when no state file exists yet
    #[serde(default = "default_initial_last_update")]
    pub initial_last_update: i64,

    /// Cursor that replaces the persisted value at startup
    #[serde(default)]
    pub last_update: Option<i64>,

    /// Checkpoint policy
    #[serde(default)]
    pub checkpoint_policy: CheckpointPolicy,

    /// Most failed instances kept in the state file; the oldest go first
    #[serde(default = "default_max_failed_instances")]
    pub max_failed_instances: usize,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
            initial_last_update: default_initial_last_update(),
            last_update: None,
            checkpoint_policy: CheckpointPolicy::default(),
            max_failed_instances: default_max_failed_instances(),
        }
    }
}

/// One export destination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    /// Display name used in logs
    #[serde(default)]
    pub name: Option<String>,

    /// Conversion type: a dcm4che `dcm2*` utility, `copy`, or unset for none
    #[serde(rename = "type", default)]
    pub kind: Option<String>,

    /// Extra arguments for the conversion utility (command template)
    #[serde(default)]
    pub args: String,

    /// Static top-level directory
    #[serde(default)]
    pub topdir: Option<PathBuf>,

    /// Directory template, relative to `topdir`
    #[serde(default)]
    pub dir: String,

    /// Filename template
    pub filename: String,

    /// Field name to case-insensitive pattern; all must match
    #[serde(rename = "match", default)]
    pub matches: BTreeMap<String, String>,

    /// Shorthand for a single link with only a directory template
    #[serde(default)]
    pub link: Option<String>,

    /// Auxiliary symbolic links to the exported file
    #[serde(default)]
    pub links: Vec<LinkConfig>,

    /// Commands run against the exported file, in order
    #[serde(default)]
    pub postprocess: Option<PostProcessConfig>,
}

/// One auxiliary link
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LinkConfig {
    /// Top-level directory (destination `topdir` when unset)
    #[serde(default)]
    pub topdir: Option<PathBuf>,

    /// Directory template (destination `dir` when unset)
    #[serde(default)]
    pub dir: Option<String>,

    /// Filename template (exported filename when unset)
    #[serde(default)]
    pub filename: Option<String>,
}

/// Post-process command(s)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PostProcessConfig {
    /// A single command line
    One(String),
    /// Several command lines, run in order
    Many(Vec<String>),
}

impl PostProcessConfig {
    /// Command lines in execution order
    pub fn commands(&self) -> Vec<&str> {
        match self {
            PostProcessConfig::One(cmd) => vec![cmd.as_str()],
            PostProcessConfig::Many(cmds) => cmds.iter().map(String::as_str).collect(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default = "default_true")]
    pub local_enabled: bool,

    /// Local log file directory
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    /// Console-only logging, used by commands that don't run the pipeline
    pub fn console_only() -> Self {
        Self {
            local_enabled: false,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }

        if self.local_enabled && self.local_path.is_empty() {
            return Err("logging.local_path cannot be empty when local_enabled".to_string());
        }

        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: true,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_base_url() -> String {
    "http://localhost:8042".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout_seconds() -> u64 {
    120
}

fn default_period_ms() -> u64 {
    60_000
}

fn default_tmp_dir() -> PathBuf {
    PathBuf::from("/tmp/orthanc-export")
}

fn default_max_concurrent_destinations() -> usize {
    2
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

fn default_state_path() -> PathBuf {
    PathBuf::from("/var/orthanc/orthanc-export-state.json")
}

fn default_initial_last_update() -> i64 {
    6000
}

fn default_max_failed_instances() -> usize {
    1000
}

fn default_local_path() -> String {
    "/var/log/orthanc-export".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}
