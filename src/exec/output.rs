// src/exec/output.rs

//! Stdout binding.
//!
//! - file path → direct redirection into the created/truncated file
//! - sink → pipe drained into the caller's writer while waiting
//! - absent → pipe collected into memory and handed back as an
//!   [`super::OutputHandle`]

use std::fmt;
use std::fs::File;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::AsyncWrite;
use tracing::debug;

use crate::errors::{ExecError, Result};

/// Borrowed async writer owned by the caller.
pub type ByteSink<'a> = &'a mut (dyn AsyncWrite + Send + Unpin);

/// Where the child's stdout goes.
#[derive(Default)]
pub enum OutputTarget<'a> {
    /// Capture stdout and return it in the result's success stream.
    #[default]
    Absent,
    /// Redirect stdout into this file.
    File(PathBuf),
    /// Copy stdout into this writer. It is flushed but never closed.
    Sink(ByteSink<'a>),
}

impl<'a> OutputTarget<'a> {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    pub fn sink<W>(writer: &'a mut W) -> Self
    where
        W: AsyncWrite + Send + Unpin,
    {
        Self::Sink(writer)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::File(_) => "file",
            Self::Sink(_) => "sink",
        }
    }
}

impl fmt::Debug for OutputTarget<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("Absent"),
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::Sink(_) => f.write_str("Sink(..)"),
        }
    }
}

/// How stdout is serviced after spawn.
pub(crate) enum OutputBinding<'a> {
    Capture,
    Redirect,
    Drain(ByteSink<'a>),
}

pub(crate) struct BoundOutput<'a> {
    pub(crate) stdio: Stdio,
    pub(crate) binding: OutputBinding<'a>,
}

/// Resolve the stdout strategy. Target files are created here, before
/// spawning.
pub(crate) fn bind_output(target: OutputTarget<'_>) -> Result<BoundOutput<'_>> {
    match target {
        OutputTarget::Absent => Ok(BoundOutput {
            stdio: Stdio::piped(),
            binding: OutputBinding::Capture,
        }),
        OutputTarget::File(path) => {
            debug!(path = %path.display(), "redirect output to file");
            let file = File::create(&path).map_err(|source| ExecError::OutputFile { path, source })?;
            Ok(BoundOutput {
                stdio: Stdio::from(file),
                binding: OutputBinding::Redirect,
            })
        }
        OutputTarget::Sink(sink) => {
            debug!("drain output into sink");
            Ok(BoundOutput {
                stdio: Stdio::piped(),
                binding: OutputBinding::Drain(sink),
            })
        }
    }
}
