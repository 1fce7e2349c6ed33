// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! A nonzero exit status is *not* an error here: it is reported as data in
//! [`crate::exec::ProcessResult`]. Only [`crate::exec::try_launch`] folds it
//! into [`ExecError::NonZeroExit`].

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::exec::PumpKind;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("Unsupported input kind: {0}")]
    UnsupportedInputKind(String),

    #[error("Unsupported output kind: {0}")]
    UnsupportedOutputKind(String),

    #[error("Empty command: no program to execute")]
    EmptyCommand,

    #[error("Failed to launch '{program}': {source}")]
    LaunchFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot open input file {path:?}: {source}")]
    InputFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot open output file {path:?}: {source}")]
    OutputFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{pump} pump failed: {source}")]
    PumpIo {
        pump: PumpKind,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with code {code}: {stderr}")]
    NonZeroExit {
        program: String,
        code: i32,
        stderr: String,
    },

    #[error("'{program}' timed out after {after:?}")]
    TimedOut { program: String, after: Duration },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ExecError>;
