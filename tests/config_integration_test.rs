//! Integration tests for configuration loading and validation
//!
//! Tests that touch environment variables hold `ENV_MUTEX`.

use orthanc_export::config::{load_config, CheckpointPolicy, PostProcessConfig};
use secrecy::ExposeSecret;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::NamedTempFile;

static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn cleanup_env_vars() {
    for key in [
        "ORTHANC_EXPORT_APPLICATION_LOG_LEVEL",
        "ORTHANC_EXPORT_ARCHIVE_PASSWORD",
        "ORTHANC_EXPORT_LISTENER_PERIOD_MS",
        "ORTHANC_EXPORT_STATE_LAST_UPDATE",
        "ORTHANC_EXPORT_STATE_CHECKPOINT_POLICY",
        "TEST_ORTHANC_PASSWORD",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

const COMPLETE: &str = r#"
[application]
log_level = "debug"

[archive]
base_url = "https://pacs.example.org:8043"
username = "exporter"
password = "${TEST_ORTHANC_PASSWORD}"
timeout_seconds = 60
tls_verify = false
changes_limit = 500

[listener]
period_ms = 15000

[export]
tmp_dir = "/var/tmp/orthanc-export"
max_concurrent_destinations = 4
command_timeout_seconds = 300
shutdown_timeout_secs = 10

[converter]
dcm4che_home = "/opt/dcm4che-5.31"

[state]
path = "/var/lib/orthanc-export/state.json"
initial_last_update = 100
checkpoint_policy = "strict"

[logging]
local_enabled = false

[[destinations]]
name = "previews"
type = "dcm2jpg"
args = "-q 0.8"
topdir = "/srv/jpeg"
dir = "{name.0}_{name.1}/{timestamp:%Y-%m-%d}"
filename = "{timestamp:%H%M%S}_{desc_snake}.jpg"
match = { Modality = "^(CR|DX)$", BodyPartExamined = "CHEST" }
link = "latest/{PatientID}"
postprocess = ["/usr/local/bin/autocrop", "/usr/bin/chmod 0644"]

[[destinations]]
type = "copy"
dir = "/srv/dicom/{PatientID}/{StudyInstanceUID}"
filename = "{SOPInstanceUID}.dcm"

[[destinations.links]]
topdir = "/srv/by-series"
dir = "{SeriesInstanceUID}"
filename = "{Seq}.dcm"
"#;

#[test]
fn test_load_complete_config() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    std::env::set_var("TEST_ORTHANC_PASSWORD", "s3cret");

    let file = write_config(COMPLETE);
    let config = load_config(file.path()).unwrap();

    assert_eq!(config.application.log_level, "debug");
    assert_eq!(config.archive.base_url, "https://pacs.example.org:8043");
    assert_eq!(config.archive.username.as_deref(), Some("exporter"));
    assert_eq!(
        config.archive.password.as_ref().unwrap().expose_secret().as_ref(),
        "s3cret"
    );
    assert!(!config.archive.tls_verify);
    assert_eq!(config.archive.changes_limit, Some(500));
    assert_eq!(config.listener.period_ms, 15000);
    assert_eq!(config.export.max_concurrent_destinations, 4);
    assert_eq!(config.export.command_timeout_seconds, Some(300));
    assert_eq!(
        config.converter.dcm4che_home,
        Some(PathBuf::from("/opt/dcm4che-5.31"))
    );
    assert_eq!(config.state.initial_last_update, 100);
    assert_eq!(config.state.checkpoint_policy, CheckpointPolicy::Strict);

    assert_eq!(config.destinations.len(), 2);
    let previews = &config.destinations[0];
    assert_eq!(previews.kind.as_deref(), Some("dcm2jpg"));
    assert_eq!(previews.matches.len(), 2);
    assert_eq!(
        previews.postprocess,
        Some(PostProcessConfig::Many(vec![
            "/usr/local/bin/autocrop".into(),
            "/usr/bin/chmod 0644".into()
        ]))
    );
    assert_eq!(config.destinations[1].links.len(), 1);

    cleanup_env_vars();
}

#[test]
fn test_defaults_applied() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let file = write_config(
        r#"
[[destinations]]
dir = "/srv/raw"
filename = "{ID}.dcm"
"#,
    );
    let config = load_config(file.path()).unwrap();

    assert_eq!(config.archive.base_url, "http://localhost:8042");
    assert_eq!(config.listener.period_ms, 60000);
    assert_eq!(config.export.tmp_dir, PathBuf::from("/tmp/orthanc-export"));
    assert_eq!(config.export.max_concurrent_destinations, 2);
    assert_eq!(config.state.initial_last_update, 6000);
    assert_eq!(config.state.last_update, None);
    assert_eq!(config.state.checkpoint_policy, CheckpointPolicy::Decoupled);
    assert!(config.destinations[0].kind.is_none());
}

#[test]
fn test_env_overrides() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    std::env::set_var("TEST_ORTHANC_PASSWORD", "from-file");
    std::env::set_var("ORTHANC_EXPORT_ARCHIVE_PASSWORD", "from-env");
    std::env::set_var("ORTHANC_EXPORT_LISTENER_PERIOD_MS", "5000");
    std::env::set_var("ORTHANC_EXPORT_STATE_LAST_UPDATE", "7777");
    std::env::set_var("ORTHANC_EXPORT_STATE_CHECKPOINT_POLICY", "decoupled");

    let file = write_config(COMPLETE);
    let config = load_config(file.path()).unwrap();

    assert_eq!(
        config.archive.password.as_ref().unwrap().expose_secret().as_ref(),
        "from-env"
    );
    assert_eq!(config.listener.period_ms, 5000);
    assert_eq!(config.state.last_update, Some(7777));
    assert_eq!(config.state.checkpoint_policy, CheckpointPolicy::Decoupled);

    cleanup_env_vars();
}

#[test]
fn test_missing_substitution_variable_fails() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let file = write_config(COMPLETE);
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("TEST_ORTHANC_PASSWORD"));
}

#[test]
fn test_invalid_destinations_rejected() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let cases = [
        // Unknown lower-case attribute
        (r#"dir = "{patient}""#, "patient"),
        // Bad strftime format
        (r#"dir = "{timestamp:%Q}""#, "timestamp"),
        // Unterminated placeholder
        (r#"dir = "{PatientID""#, "PatientID"),
    ];

    for (dir_line, needle) in cases {
        let file = write_config(&format!(
            "[[destinations]]\n{dir_line}\nfilename = \"{{ID}}.dcm\"\n"
        ));
        let err = load_config(file.path()).unwrap_err().to_string();
        assert!(err.contains("destinations[0]"), "{err}");
        assert!(err.contains(needle), "{err}");
    }

    let file = write_config(
        r#"
[[destinations]]
dir = "/srv"
filename = "{ID}.dcm"
match = { Modality = "(CT" }
"#,
    );
    assert!(load_config(file.path()).is_err());
}

#[test]
fn test_no_destinations_rejected() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let file = write_config("[archive]\nbase_url = \"http://localhost:8042\"\n");
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("destinations"));
}

#[test]
fn test_missing_file() {
    let err = load_config("/nonexistent/orthanc-export.toml").unwrap_err();
    assert!(err.to_string().contains("not found") || err.to_string().contains("nonexistent"));
}
