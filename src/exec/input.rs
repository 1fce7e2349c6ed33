// src/exec/input.rs

//! Stdin binding.
//!
//! Decides, before the process starts, how the child's stdin is wired:
//!
//! - file path → direct redirection (the child reads the file itself)
//! - byte stream / literal text → OS pipe fed by a [`super::pump`] task
//! - small literal text with a staging threshold → temporary file, then
//!   direct redirection
//! - absent → null device

use std::fmt;
use std::fs::File;
use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::process::Stdio;

use tempfile::NamedTempFile;
use tokio::io::AsyncRead;
use tracing::debug;

use crate::errors::{ExecError, Result};

/// Owned async byte source fed into a child's stdin.
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// What the child reads on stdin.
#[derive(Default)]
pub enum InputSource {
    /// Nothing; stdin is the null device.
    #[default]
    Absent,
    /// Redirect stdin from this file.
    File(PathBuf),
    /// Pump this stream into stdin. Ownership moves into the launch; the
    /// stream is read to the end (or until the child stops reading) and
    /// dropped exactly once.
    Stream(ByteStream),
    /// Pump this UTF-8 text into stdin.
    Text(String),
}

impl InputSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    pub fn stream<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self::Stream(Box::new(reader))
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Short name of the active variant, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::File(_) => "file",
            Self::Stream(_) => "stream",
            Self::Text(_) => "text",
        }
    }
}

impl fmt::Debug for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("Absent"),
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
            Self::Text(text) => f.debug_tuple("Text").field(&text.len()).finish(),
        }
    }
}

impl From<&str> for InputSource {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for InputSource {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// Stdin of the current process as an input source.
pub fn standard_input() -> InputSource {
    InputSource::stream(tokio::io::stdin())
}

/// Result of binding an [`InputSource`].
pub(crate) struct BoundInput {
    /// Descriptor handed to the child.
    pub(crate) stdio: Stdio,
    /// Source to pump into the stdin pipe once the child is running.
    pub(crate) feed: Option<ByteStream>,
    /// Keeps a staged temp file alive until the launch is torn down.
    pub(crate) staged: Option<NamedTempFile>,
}

impl BoundInput {
    fn direct(stdio: Stdio) -> Self {
        Self {
            stdio,
            feed: None,
            staged: None,
        }
    }

    fn piped(feed: ByteStream) -> Self {
        Self {
            stdio: Stdio::piped(),
            feed: Some(feed),
            staged: None,
        }
    }
}

/// Resolve the stdin strategy. Any file is opened here, before spawning.
pub(crate) fn bind_input(source: InputSource, staging_threshold: Option<usize>) -> Result<BoundInput> {
    match source {
        InputSource::Absent => Ok(BoundInput::direct(Stdio::null())),
        InputSource::File(path) => {
            debug!(path = %path.display(), "accept file input");
            let file = File::open(&path).map_err(|source| ExecError::InputFile { path, source })?;
            Ok(BoundInput::direct(Stdio::from(file)))
        }
        InputSource::Stream(reader) => {
            debug!("accept stream input");
            Ok(BoundInput::piped(reader))
        }
        InputSource::Text(text) => match staging_threshold {
            Some(limit) if text.len() <= limit => {
                debug!(bytes = text.len(), limit, "accept text input (staged)");
                stage_text(&text)
            }
            _ => {
                debug!(bytes = text.len(), "accept text input");
                Ok(BoundInput::piped(Box::new(Cursor::new(text.into_bytes()))))
            }
        },
    }
}

fn stage_text(text: &str) -> Result<BoundInput> {
    let mut staged = NamedTempFile::new()?;
    staged.write_all(text.as_bytes())?;
    staged.flush()?;

    // Fresh handle so the child starts reading at offset 0.
    let file = staged.reopen()?;

    Ok(BoundInput {
        stdio: Stdio::from(file),
        feed: None,
        staged: Some(staged),
    })
}
