//! Command templates
//!
//! A configured command line is split into words once; every argument word
//! is then compiled as a [`PathTemplate`] so it can reference instance
//! attributes. The program word is used verbatim.

use crate::adapters::process::{split_command_line, CommandLine};
use crate::config::ConverterConfig;
use crate::core::template::PathTemplate;
use crate::domain::{CommandError, Instance, Result};
use std::path::{Path, PathBuf};

/// A compiled command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    program: String,
    args: Vec<PathTemplate>,
}

impl CommandTemplate {
    /// Compiles a full command line (program followed by arguments)
    ///
    /// # Errors
    ///
    /// Returns an error for an empty line, an unterminated quote, or an
    /// argument that is not a valid template.
    pub fn parse(line: &str) -> Result<Self> {
        let mut words = split_command_line(line)?.into_iter();
        let program = words
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| CommandError::Invalid(line.to_string()))?;
        Self::with_program(program, &words.collect::<Vec<_>>())
    }

    /// Compiles arguments for a fixed program
    ///
    /// # Errors
    ///
    /// Returns an error if an argument is not a valid template.
    pub fn with_program(program: impl Into<String>, args: &[String]) -> Result<Self> {
        let args = args
            .iter()
            .map(|a| PathTemplate::parse(a))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            program: program.into(),
            args,
        })
    }

    /// Program to execute
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Renders the command for an instance with trailing path arguments
    ///
    /// # Errors
    ///
    /// Returns an error if an argument template fails to render.
    pub fn render(&self, instance: &Instance, trailing: &[&Path]) -> Result<CommandLine> {
        let mut args = self
            .args
            .iter()
            .map(|a| a.render(instance))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        args.extend(trailing.iter().map(|p| p.to_string_lossy().into_owned()));
        Ok(CommandLine::new(self.program.clone(), args))
    }
}

/// How a destination produces its artifact from the payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionKind {
    /// A dcm4che `dcm2*` utility
    Dcm4che(String),
    /// Plain file copy
    Copy,
    /// No conversion command
    None,
}

impl ConversionKind {
    /// Interprets a destination `type`
    pub fn from_type(kind: Option<&str>) -> Self {
        match kind {
            Some(k) if k.starts_with("dcm2") => ConversionKind::Dcm4che(k.to_string()),
            Some("copy") => ConversionKind::Copy,
            _ => ConversionKind::None,
        }
    }
}

/// Path of a dcm4che utility
///
/// Resolved under `<dcm4che_home>/bin/` when a home is configured, otherwise
/// left to `PATH`. Windows installs ship `.bat` wrappers.
pub fn dcm4che_program(util: &str, converter: &ConverterConfig) -> PathBuf {
    let name = if cfg!(windows) {
        format!("{util}.bat")
    } else {
        util.to_string()
    };
    match &converter.dcm4che_home {
        Some(home) => home.join("bin").join(name),
        None => PathBuf::from(name),
    }
}

/// Builds the conversion command for a destination, if it has one
///
/// # Errors
///
/// Returns an error if `args` cannot be compiled.
pub fn conversion_command(
    kind: &ConversionKind,
    args: &str,
    converter: &ConverterConfig,
) -> Result<Option<CommandTemplate>> {
    match kind {
        ConversionKind::Dcm4che(util) => {
            let program = dcm4che_program(util, converter);
            let args = split_command_line(args)?;
            CommandTemplate::with_program(program.to_string_lossy(), &args).map(Some)
        }
        ConversionKind::Copy if cfg!(windows) => {
            CommandTemplate::with_program("cmd", &["/C".to_string(), "copy".to_string()])
                .map(Some)
        }
        ConversionKind::Copy => CommandTemplate::with_program("cp", &[]).map(Some),
        ConversionKind::None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChangeEvent, ChangeType, InstanceId};
    use serde_json::json;

    fn instance() -> Instance {
        let mut inst = Instance::new(
            InstanceId::new("abc").unwrap(),
            ChangeEvent::new("abc", ChangeType::NewInstance, 42),
        );
        inst.merge_tags(json!({"Modality": "CT"}).as_object().unwrap().clone());
        inst
    }

    #[test]
    fn test_conversion_kind_from_type() {
        assert_eq!(
            ConversionKind::from_type(Some("dcm2jpg")),
            ConversionKind::Dcm4che("dcm2jpg".to_string())
        );
        assert_eq!(ConversionKind::from_type(Some("copy")), ConversionKind::Copy);
        assert_eq!(ConversionKind::from_type(Some("zip")), ConversionKind::None);
        assert_eq!(ConversionKind::from_type(None), ConversionKind::None);
    }

    #[cfg(unix)]
    #[test]
    fn test_dcm4che_program_path() {
        let converter = ConverterConfig {
            dcm4che_home: Some(PathBuf::from("/opt/dcm4che")),
        };
        assert_eq!(
            dcm4che_program("dcm2jpg", &converter),
            PathBuf::from("/opt/dcm4che/bin/dcm2jpg")
        );
        assert_eq!(
            dcm4che_program("dcm2dcm", &ConverterConfig::default()),
            PathBuf::from("dcm2dcm")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_conversion_command_render() {
        let converter = ConverterConfig {
            dcm4che_home: Some(PathBuf::from("/opt/dcm4che")),
        };
        let cmd = conversion_command(
            &ConversionKind::Dcm4che("dcm2jpg".to_string()),
            "-q 0.9 --title {Modality}",
            &converter,
        )
        .unwrap()
        .unwrap();

        let line = cmd
            .render(
                &instance(),
                &[Path::new("/tmp/abc.dcm"), Path::new("/srv/out/abc.jpg")],
            )
            .unwrap();
        assert_eq!(line.program, "/opt/dcm4che/bin/dcm2jpg");
        assert_eq!(
            line.args,
            vec!["-q", "0.9", "--title", "CT", "/tmp/abc.dcm", "/srv/out/abc.jpg"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_command() {
        let cmd = conversion_command(&ConversionKind::Copy, "ignored", &ConverterConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(cmd.program(), "cp");
        let line = cmd
            .render(&instance(), &[Path::new("a"), Path::new("b")])
            .unwrap();
        assert_eq!(line.args, vec!["a", "b"]);
    }

    #[test]
    fn test_no_conversion() {
        assert!(
            conversion_command(&ConversionKind::None, "", &ConverterConfig::default())
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_parse_postprocess_line() {
        let cmd = CommandTemplate::parse("chmod 0640").unwrap();
        let line = cmd.render(&instance(), &[Path::new("/srv/x")]).unwrap();
        assert_eq!(line.program, "chmod");
        assert_eq!(line.args, vec!["0640", "/srv/x"]);

        assert!(CommandTemplate::parse("   ").is_err());
        assert!(CommandTemplate::parse("touch {bogus}").is_err());
    }
}
