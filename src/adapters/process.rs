//! External command execution
//!
//! Conversion utilities and post-process hooks are run as child processes.
//! Commands are passed to the OS as a program plus an argument vector, never
//! through a shell, so rendered values cannot inject extra commands.

use crate::domain::CommandError;
use async_trait::async_trait;
use std::fmt;
use std::process::Stdio;
use std::time::Duration;

/// Maximum number of stderr bytes kept in error messages
const STDERR_TAIL: usize = 2048;

/// A fully rendered command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    /// Program to execute
    pub program: String,
    /// Arguments, one element per argv entry
    pub args: Vec<String>,
}

impl CommandLine {
    /// Creates a command line
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

fn quote(s: &str) -> String {
    if s.is_empty() || s.contains(char::is_whitespace) {
        format!("\"{s}\"")
    } else {
        s.to_string()
    }
}

/// Splits a configured command line into words
///
/// Words are separated by whitespace. Single or double quotes group a word
/// containing whitespace; the quotes themselves are removed.
///
/// # Errors
///
/// Returns [`CommandError::Invalid`] on an unterminated quote.
///
/// # Examples
///
/// ```
/// use orthanc_export::adapters::process::split_command_line;
///
/// let words = split_command_line(r#"gzip -k "my file""#).unwrap();
/// assert_eq!(words, vec!["gzip", "-k", "my file"]);
/// ```
pub fn split_command_line(line: &str) -> Result<Vec<String>, CommandError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_word = true;
            }
            None if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if quote.is_some() {
        return Err(CommandError::Invalid(line.to_string()));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

/// Output of a successful command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

/// Runs external commands
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs the command to completion
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be started, exits non-zero, or
    /// exceeds the runner's timeout.
    async fn run(&self, command: &CommandLine) -> Result<CommandOutput, CommandError>;
}

/// [`CommandRunner`] backed by OS processes
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    /// Creates a runner; commands exceeding `timeout` are killed
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &CommandLine) -> Result<CommandOutput, CommandError> {
        tracing::debug!(command = %command, "Running external command");

        let child = tokio::process::Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CommandError::Spawn {
                program: command.program.clone(),
                message: e.to_string(),
            })?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| CommandError::Timeout {
                    command: command.to_string(),
                    seconds: limit.as_secs(),
                })?,
            None => child.wait_with_output().await,
        }
        .map_err(|e| CommandError::Spawn {
            program: command.program.clone(),
            message: e.to_string(),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(CommandError::Failed {
                command: command.to_string(),
                status: output.status.to_string(),
                stderr: tail(stderr.trim(), STDERR_TAIL).to_string(),
            });
        }

        Ok(CommandOutput { stdout, stderr })
    }
}

fn tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}
