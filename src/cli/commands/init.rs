//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "orthanc-export.toml")]
    pub output: String,

    /// Include example destinations and comments for every setting
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing orthanc-export configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2); // Configuration error exit code
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your archive and destinations", self.output);
                println!("  2. Put credentials in a .env file:");
                println!("     - ORTHANC_EXPORT_ARCHIVE_USERNAME");
                println!("     - ORTHANC_EXPORT_ARCHIVE_PASSWORD");
                println!(
                    "  3. Validate configuration: orthanc-export --config {} validate-config --check-connection",
                    self.output
                );
                println!("  4. Start exporting: orthanc-export --config {} run", self.output);
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {e}");
                Ok(5) // Fatal error exit code
            }
        }
    }

    /// Generate minimal configuration
    fn generate_minimal_config() -> String {
        r#"# orthanc-export configuration

[archive]
base_url = "http://localhost:8042"

[state]
path = "/var/orthanc/orthanc-export-state.json"

[[destinations]]
name = "dicom copy"
type = "copy"
topdir = "/srv/export"
dir = "{name.0}_{name.1}/{desc_snake}"
filename = "{timestamp:%Y%m%dT%H%M%S}_{SOPInstanceUID}.dcm"
"#
        .to_string()
    }

    /// Generate configuration with every section documented
    fn generate_config_with_examples() -> String {
        r#"# orthanc-export configuration
#
# Values may reference environment variables as ${VAR}. Any setting can also
# be overridden with ORTHANC_EXPORT_<SECTION>_<KEY>, for example
# ORTHANC_EXPORT_STATE_LAST_UPDATE=6000.

[application]
# trace | debug | info | warn | error
log_level = "info"

# ============================================================================
# Orthanc archive
# ============================================================================
[archive]
base_url = "http://localhost:8042"
# username = "${ORTHANC_EXPORT_ARCHIVE_USERNAME}"
# password = "${ORTHANC_EXPORT_ARCHIVE_PASSWORD}"
timeout_seconds = 120
tls_verify = true
# Maximum number of changes per /changes request (Orthanc default when unset)
# changes_limit = 100

# ============================================================================
# Change feed polling
# ============================================================================
[listener]
period_ms = 60000

# ============================================================================
# Export pipeline
# ============================================================================
[export]
# Downloaded payloads live here until every destination succeeded
tmp_dir = "/tmp/orthanc-export"
max_concurrent_destinations = 2
# Kill conversion and post-process commands running longer than this
# command_timeout_seconds = 300
shutdown_timeout_secs = 30

[converter]
# dcm2* destination types run <dcm4che_home>/bin/<type>
dcm4che_home = "/opt/dcm4che"

# ============================================================================
# Cursor state
# ============================================================================
[state]
path = "/var/orthanc/orthanc-export-state.json"
# Cursor used when no state file exists
initial_last_update = 6000
# Uncomment to restart from a given change sequence
# last_update = 6000
# decoupled: checkpoints move the cursor even past failed instances
# strict: after a failure the cursor stays just below it for the rest of the run
checkpoint_policy = "decoupled"
# Failed instances kept in the state file; the oldest are dropped first
max_failed_instances = 1000

# ============================================================================
# Logging
# ============================================================================
[logging]
local_enabled = true
local_path = "/var/log/orthanc-export"
# daily | hourly | never
local_rotation = "daily"

# ============================================================================
# Destinations
# ============================================================================
# Templates use {Attribute} placeholders. Attributes are DICOM keywords from
# the simplified tags (PatientID, Modality, ...), change fields (ID, Seq) and
# derived values:
#   {name}          patient name components joined with "_"
#   {name.0}        first patient name component (family name)
#   {desc}          series description, else modality
#   {desc_snake}    desc with whitespace replaced by "_"
#   {timestamp:FMT} acquisition date-time formatted with strftime
# Use {{ and }} for literal braces.

[[destinations]]
name = "jpeg previews"
type = "dcm2jpg"
args = "-q 0.9"
topdir = "/srv/export/jpeg"
dir = "{name.0}_{name.1}/{timestamp:%Y-%m-%d}"
filename = "{timestamp:%Y%m%dT%H%M%S}_{desc_snake}.jpg"
# Only export CT and MR
match = { Modality = "^(CT|MR)$" }
# Also link the file under a by-date tree
link = "by-date/{timestamp:%Y/%m/%d}"
# Run after conversion with the exported file appended
postprocess = "/usr/local/bin/autocrop"

[[destinations]]
name = "dicom archive"
type = "copy"
topdir = "/srv/export/dicom"
dir = "{PatientID}/{StudyInstanceUID}"
filename = "{SOPInstanceUID}.dcm"

[[destinations.links]]
topdir = "/srv/export/by-modality"
dir = "{Modality}"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    #[test]
    fn test_init_args_defaults() {
        let args = InitArgs {
            output: "orthanc-export.toml".to_string(),
            with_examples: false,
            force: false,
        };

        assert_eq!(args.output, "orthanc-export.toml");
        assert!(!args.with_examples);
        assert!(!args.force);
    }

    #[test]
    fn test_generated_configs_are_valid() {
        let minimal = load_config_from_str(&InitArgs::generate_minimal_config()).unwrap();
        assert_eq!(minimal.destinations.len(), 1);

        let full = load_config_from_str(&InitArgs::generate_config_with_examples()).unwrap();
        assert_eq!(full.destinations.len(), 2);
        assert_eq!(full.destinations[1].links.len(), 1);
    }

    #[tokio::test]
    async fn test_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("existing.toml");
        std::fs::write(&path, "").unwrap();

        let args = InitArgs {
            output: path.to_string_lossy().to_string(),
            with_examples: false,
            force: false,
        };
        assert_eq!(args.execute().await.unwrap(), 2);
    }
}
