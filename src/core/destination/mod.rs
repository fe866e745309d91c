//! Export destinations
//!
//! A [`Destination`] is one compiled `[[destinations]]` entry. For each
//! instance it decides whether the instance applies, renders the target
//! path, runs the conversion and post-process commands and creates the
//! auxiliary links.
//!
//! # Example
//!
//! ```rust,no_run
//! use orthanc_export::config::load_config;
//! use orthanc_export::core::destination::Destination;
//!
//! # fn example() -> orthanc_export::domain::Result<()> {
//! let config = load_config("/etc/orthanc/orthanc-export.toml")?;
//! let destinations = config
//!     .destinations
//!     .iter()
//!     .enumerate()
//!     .map(|(i, d)| Destination::new(i, d, &config.converter))
//!     .collect::<orthanc_export::domain::Result<Vec<_>>>()?;
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod link;
pub mod matcher;

pub use command::{CommandTemplate, ConversionKind};
pub use link::LinkSpec;
pub use matcher::Matcher;

use crate::adapters::process::CommandRunner;
use crate::config::{ConverterConfig, DestinationConfig};
use crate::core::template::PathTemplate;
use crate::domain::{ExportError, Instance, Result};
use std::path::{Path, PathBuf};

/// Result of exporting one instance to one destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// The artifact was written to this path
    Exported(PathBuf),
    /// No conversion is configured; post-process commands and links ran
    /// against this rendered path but nothing was written to it
    Unconverted(PathBuf),
    /// A match predicate rejected the instance
    Skipped,
}

/// A compiled export destination
#[derive(Debug, Clone)]
pub struct Destination {
    name: String,
    topdir: Option<PathBuf>,
    dir: PathTemplate,
    filename: PathTemplate,
    conversion: Option<CommandTemplate>,
    matcher: Matcher,
    links: Vec<LinkSpec>,
    postprocess: Vec<CommandTemplate>,
}

impl Destination {
    /// Compiles a destination descriptor
    ///
    /// # Arguments
    ///
    /// * `index` - Position in the configuration, used when the entry has no name
    /// * `config` - The descriptor
    /// * `converter` - Location of the conversion utilities
    ///
    /// # Errors
    ///
    /// Returns an error if a template, pattern or command line is invalid.
    pub fn new(index: usize, config: &DestinationConfig, converter: &ConverterConfig) -> Result<Self> {
        let kind = ConversionKind::from_type(config.kind.as_deref());
        let name = config.name.clone().unwrap_or_else(|| {
            format!("#{index} ({})", config.kind.as_deref().unwrap_or("none"))
        });

        if kind == ConversionKind::None {
            if let Some(other) = config.kind.as_deref() {
                tracing::warn!(
                    destination = %name,
                    kind = other,
                    "Unknown destination type, no conversion will run"
                );
            }
        }

        let mut links = Vec::new();
        if let Some(dir) = &config.link {
            links.push(LinkSpec::from_dir(dir)?);
        }
        for link in &config.links {
            links.push(LinkSpec::from_config(link)?);
        }

        let postprocess = config
            .postprocess
            .as_ref()
            .map(|pp| pp.commands())
            .unwrap_or_default()
            .into_iter()
            .map(CommandTemplate::parse)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            conversion: command::conversion_command(&kind, &config.args, converter)?,
            topdir: config.topdir.clone(),
            dir: PathTemplate::parse(&config.dir)?,
            filename: PathTemplate::parse(&config.filename)?,
            matcher: Matcher::new(&config.matches)?,
            links,
            postprocess,
            name,
        })
    }

    /// Compiles a descriptor and discards it, for configuration validation
    ///
    /// # Errors
    ///
    /// Same as [`Destination::new`].
    pub fn check(index: usize, config: &DestinationConfig, converter: &ConverterConfig) -> Result<()> {
        Self::new(index, config, converter).map(|_| ())
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the match predicates accept the instance
    pub fn applies_to(&self, instance: &Instance) -> bool {
        self.matcher.matches(instance)
    }

    /// Renders the target directory for an instance
    ///
    /// # Errors
    ///
    /// Returns an error if the directory template fails to render.
    pub fn target_dir(&self, instance: &Instance) -> Result<PathBuf> {
        let dir = self.dir.render(instance)?;
        link::join_under(self.topdir.as_deref(), &dir)
    }

    /// Exports one instance
    ///
    /// Steps, in order: payload check, match predicates, target directory,
    /// conversion command, post-process commands, links. Link failures are
    /// logged and ignored; every other failure fails the export.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is missing, a template fails to
    /// render, the target directory cannot be created, or a command fails.
    pub async fn export_instance(
        &self,
        instance: &Instance,
        runner: &dyn CommandRunner,
    ) -> Result<ExportOutcome> {
        let source = match &instance.tmp_path {
            Some(path) if tokio::fs::try_exists(path).await.unwrap_or(false) => path,
            _ => {
                return Err(ExportError::Destination(format!(
                    "{}: payload for instance {} does not exist",
                    self.name, instance.id
                )))
            }
        };

        if let Err(field) = self.matcher.check(instance) {
            tracing::debug!(
                destination = %self.name,
                instance_id = %instance.id,
                field,
                "Instance does not match destination, skipping"
            );
            return Ok(ExportOutcome::Skipped);
        }

        let dst_dir = self.target_dir(instance)?;
        let dst_filename = self.filename.render(instance)?;
        link::ensure_contained(&dst_filename)?;
        tokio::fs::create_dir_all(&dst_dir).await.map_err(|e| {
            ExportError::Io(format!(
                "Failed to create directory {}: {e}",
                dst_dir.display()
            ))
        })?;
        let dst_path = dst_dir.join(&dst_filename);

        tracing::debug!(
            destination = %self.name,
            instance_id = %instance.id,
            path = %dst_path.display(),
            "Exporting instance"
        );

        let converted = match &self.conversion {
            Some(conversion) => {
                let command =
                    conversion.render(instance, &[source.as_path(), dst_path.as_path()])?;
                runner.run(&command).await?;
                true
            }
            None => false,
        };

        for step in &self.postprocess {
            let command = step.render(instance, &[dst_path.as_path()])?;
            tracing::debug!(destination = %self.name, command = %command, "Post-processing");
            runner.run(&command).await?;
        }

        self.make_links(instance, &dst_filename, &dst_path).await;

        Ok(if converted {
            ExportOutcome::Exported(dst_path)
        } else {
            ExportOutcome::Unconverted(dst_path)
        })
    }

    async fn make_links(&self, instance: &Instance, dst_filename: &str, dst_path: &Path) {
        for link in &self.links {
            let link_path =
                match link.resolve(instance, self.topdir.as_deref(), &self.dir, dst_filename) {
                    Ok(path) => path,
                    Err(e) => {
                        tracing::warn!(
                            destination = %self.name,
                            instance_id = %instance.id,
                            error = %e,
                            "Failed to resolve link path"
                        );
                        continue;
                    }
                };

            tracing::debug!(link = %link_path.display(), "Linking");
            if let Err(e) = link::create_symlink(dst_path, &link_path).await {
                tracing::warn!(
                    destination = %self.name,
                    link = %link_path.display(),
                    error = %e,
                    "Failed to create symlink"
                );
            }
        }
    }
}
