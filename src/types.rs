// src/types.rs

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::errors::ExecError;
use crate::exec::{InputSource, standard_input};

/// Textual description of a stdin source, as given on the command line or in
/// a pipeline config.
///
/// - `none`: no input
/// - `stdin`: forward this process's stdin
/// - `file:<path>`: redirect from a file
/// - `text:<literal>`: feed the literal text (everything after the first `:`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum InputSpec {
    #[default]
    None,
    Stdin,
    File(PathBuf),
    Text(String),
}

impl InputSpec {
    /// Turn the description into a live source. Files are opened later, by
    /// the launcher.
    pub fn into_source(self) -> InputSource {
        match self {
            InputSpec::None => InputSource::Absent,
            InputSpec::Stdin => standard_input(),
            InputSpec::File(path) => InputSource::File(path),
            InputSpec::Text(text) => InputSource::Text(text),
        }
    }
}

impl FromStr for InputSpec {
    type Err = ExecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, value) = split_descriptor(s);
        match (kind.as_str(), value) {
            ("none", None) => Ok(InputSpec::None),
            ("stdin", None) => Ok(InputSpec::Stdin),
            ("file", Some(path)) if !path.is_empty() => Ok(InputSpec::File(PathBuf::from(path))),
            ("file", _) => Err(ExecError::ConfigError(format!(
                "invalid input {s:?}: file input needs a path (file:<path>)"
            ))),
            ("text", Some(text)) => Ok(InputSpec::Text(text.to_string())),
            ("text", None) => Err(ExecError::ConfigError(format!(
                "invalid input {s:?}: text input needs a value (text:<literal>)"
            ))),
            ("none" | "stdin", Some(_)) => Err(ExecError::ConfigError(format!(
                "invalid input {s:?}: {kind} takes no value"
            ))),
            (other, _) => Err(ExecError::UnsupportedInputKind(other.to_string())),
        }
    }
}

impl fmt::Display for InputSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSpec::None => f.write_str("none"),
            InputSpec::Stdin => f.write_str("stdin"),
            InputSpec::File(path) => write!(f, "file:{}", path.display()),
            InputSpec::Text(text) => write!(f, "text:{text}"),
        }
    }
}

/// Textual description of a stdout target.
///
/// - `capture`: keep the output in memory (the launch returns it)
/// - `stdout`: stream into this process's stdout
/// - `file:<path>`: redirect into a file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OutputSpec {
    Capture,
    #[default]
    Stdout,
    File(PathBuf),
}

impl FromStr for OutputSpec {
    type Err = ExecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, value) = split_descriptor(s);
        match (kind.as_str(), value) {
            ("capture", None) => Ok(OutputSpec::Capture),
            ("stdout", None) => Ok(OutputSpec::Stdout),
            ("file", Some(path)) if !path.is_empty() => Ok(OutputSpec::File(PathBuf::from(path))),
            ("file", _) => Err(ExecError::ConfigError(format!(
                "invalid output {s:?}: file output needs a path (file:<path>)"
            ))),
            ("capture" | "stdout", Some(_)) => Err(ExecError::ConfigError(format!(
                "invalid output {s:?}: {kind} takes no value"
            ))),
            (other, _) => Err(ExecError::UnsupportedOutputKind(other.to_string())),
        }
    }
}

impl fmt::Display for OutputSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputSpec::Capture => f.write_str("capture"),
            OutputSpec::Stdout => f.write_str("stdout"),
            OutputSpec::File(path) => write!(f, "file:{}", path.display()),
        }
    }
}

/// `kind[:value]`; the kind is matched case-insensitively, the value verbatim.
fn split_descriptor(s: &str) -> (String, Option<&str>) {
    match s.split_once(':') {
        Some((kind, value)) => (kind.trim().to_lowercase(), Some(value)),
        None => (s.trim().to_lowercase(), None),
    }
}
