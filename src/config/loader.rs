//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{CheckpointPolicy, ExporterConfig};
use super::secret::secret_string;
use crate::domain::errors::ExportError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (`${VAR}` syntax)
/// 3. Parses the TOML into [`ExporterConfig`]
/// 4. Applies environment variable overrides (`ORTHANC_EXPORT_*` prefix)
/// 5. Validates the configuration, compiling every destination template
///
/// # Errors
///
/// Returns [`ExportError::Configuration`] if the file cannot be read, a
/// referenced environment variable is unset, parsing fails, or validation
/// fails.
///
/// # Examples
///
/// ```no_run
/// use orthanc_export::config::loader::load_config;
///
/// let config = load_config("/etc/orthanc/orthanc-export.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<ExporterConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(ExportError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        ExportError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    load_config_from_str(&contents)
}

/// Loads configuration from TOML text
///
/// Same pipeline as [`load_config`] without the file access.
///
/// # Errors
///
/// See [`load_config`].
pub fn load_config_from_str(contents: &str) -> Result<ExporterConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: ExporterConfig = toml::from_str(&contents)
        .map_err(|e| ExportError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        ExportError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format `${VAR_NAME}`
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error if a referenced environment variable is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| ExportError::Configuration(e.to_string()))?;
    let mut lines = Vec::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            lines.push(line.to_string());
            continue;
        }

        let processed = re.replace_all(line, |cap: &regex::Captures<'_>| {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                    String::new()
                }
            }
        });
        lines.push(processed.into_owned());
    }

    if !missing_vars.is_empty() {
        return Err(ExportError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(lines.join("\n"))
}

fn parse_env<T: std::str::FromStr>(name: &str, val: &str) -> Result<T> {
    val.parse().map_err(|_| {
        ExportError::Configuration(format!("Invalid value for {}: '{}'", name, val))
    })
}

/// Applies environment variable overrides using the `ORTHANC_EXPORT_*` prefix
///
/// Environment variables follow the pattern `ORTHANC_EXPORT_<SECTION>_<KEY>`,
/// for example `ORTHANC_EXPORT_ARCHIVE_BASE_URL`.
fn apply_env_overrides(config: &mut ExporterConfig) -> Result<()> {
    const PREFIX: &str = "ORTHANC_EXPORT_";
    let var = |key: &str| std::env::var(format!("{PREFIX}{key}")).ok();

    // Application overrides
    if let Some(val) = var("APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    // Archive overrides
    if let Some(val) = var("ARCHIVE_BASE_URL") {
        config.archive.base_url = val;
    }
    if let Some(val) = var("ARCHIVE_USERNAME") {
        config.archive.username = Some(val);
    }
    if let Some(val) = var("ARCHIVE_PASSWORD") {
        config.archive.password = Some(secret_string(val));
    }
    if let Some(val) = var("ARCHIVE_TLS_VERIFY") {
        config.archive.tls_verify = parse_env("ARCHIVE_TLS_VERIFY", &val)?;
    }

    // Listener overrides
    if let Some(val) = var("LISTENER_PERIOD_MS") {
        config.listener.period_ms = parse_env("LISTENER_PERIOD_MS", &val)?;
    }

    // Export overrides
    if let Some(val) = var("EXPORT_TMP_DIR") {
        config.export.tmp_dir = PathBuf::from(val);
    }
    if let Some(val) = var("EXPORT_MAX_CONCURRENT_DESTINATIONS") {
        config.export.max_concurrent_destinations =
            parse_env("EXPORT_MAX_CONCURRENT_DESTINATIONS", &val)?;
    }

    // Converter overrides
    if let Some(val) = var("CONVERTER_DCM4CHE_HOME") {
        config.converter.dcm4che_home = Some(PathBuf::from(val));
    }

    // State overrides
    if let Some(val) = var("STATE_PATH") {
        config.state.path = PathBuf::from(val);
    }
    if let Some(val) = var("STATE_LAST_UPDATE") {
        config.state.last_update = Some(parse_env("STATE_LAST_UPDATE", &val)?);
    }
    if let Some(val) = var("STATE_CHECKPOINT_POLICY") {
        config.state.checkpoint_policy = match val.as_str() {
            "decoupled" => CheckpointPolicy::Decoupled,
            "strict" => CheckpointPolicy::Strict,
            other => {
                return Err(ExportError::Configuration(format!(
                    "Invalid value for STATE_CHECKPOINT_POLICY: '{}'",
                    other
                )))
            }
        };
    }
    if let Some(val) = var("STATE_MAX_FAILED_INSTANCES") {
        config.state.max_failed_instances = parse_env("STATE_MAX_FAILED_INSTANCES", &val)?;
    }

    // Logging overrides
    if let Some(val) = var("LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = parse_env("LOGGING_LOCAL_ENABLED", &val)?;
    }
    if let Some(val) = var("LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}
