// src/exec/result.rs

//! Launch outcome and the readable handle it carries.

use std::io::{self, Cursor, Write};
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use tempfile::NamedTempFile;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};

use super::command::CommandSpec;
use super::input::InputSource;
use super::launcher;
use super::output::OutputTarget;
use super::pump::PumpFailure;
use crate::errors::Result;

/// Buffered output of a finished process.
///
/// The bytes are fully read from the pipe before the process handle is
/// released, so nothing is lost when the child goes away. The handle is an
/// [`AsyncRead`] and can be fed into another launch via
/// [`InputSource::from`].
#[derive(Debug, Default)]
pub struct OutputHandle {
    inner: Cursor<Vec<u8>>,
}

impl OutputHandle {
    /// Unread bytes.
    pub fn bytes(&self) -> &[u8] {
        let data = self.inner.get_ref();
        let pos = usize::try_from(self.inner.position()).unwrap_or(data.len()).min(data.len());
        &data[pos..]
    }

    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        let pos = usize::try_from(self.inner.position()).unwrap_or(usize::MAX);
        let mut data = self.inner.into_inner();
        data.drain(..pos.min(data.len()));
        data
    }

    /// All remaining output as text. Invalid UTF-8 is replaced.
    pub fn into_string(self) -> String {
        match String::from_utf8(self.into_bytes()) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }
    }

    /// Write the output into `path`, replacing any existing file.
    pub async fn to_file(self, path: impl AsRef<Path>) -> Result<u64> {
        let data = self.into_bytes();
        tokio::fs::write(path, &data).await?;
        Ok(data.len() as u64)
    }

    /// Copy the output into a caller-owned writer. The writer is flushed,
    /// not closed.
    pub async fn to_sink<W>(self, sink: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let data = self.into_bytes();
        sink.write_all(&data).await?;
        sink.flush().await?;
        Ok(data.len() as u64)
    }

    /// Write the output to this process's stdout.
    pub async fn print(self) -> Result<u64> {
        self.to_sink(&mut tokio::io::stdout()).await
    }

    /// Persist the output into a fresh temporary file. The file is removed
    /// when the returned value is dropped.
    pub fn to_temp_file(self) -> Result<NamedTempFile> {
        let mut file = NamedTempFile::new()?;
        file.write_all(self.bytes())?;
        file.flush()?;
        Ok(file)
    }
}

impl From<Vec<u8>> for OutputHandle {
    fn from(data: Vec<u8>) -> Self {
        Self {
            inner: Cursor::new(data),
        }
    }
}

impl AsyncRead for OutputHandle {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl From<OutputHandle> for InputSource {
    fn from(handle: OutputHandle) -> Self {
        InputSource::stream(handle)
    }
}

/// Outcome of one launch.
///
/// Exit code 0 carries at most a success stream (absent when stdout went to a
/// file or sink); any other code carries only the error stream (the child's
/// stderr). Both are never populated together.
#[derive(Debug)]
pub struct ProcessResult {
    exit_code: i32,
    success_stream: Option<OutputHandle>,
    error_stream: Option<OutputHandle>,
    pump_failures: Vec<PumpFailure>,
}

impl ProcessResult {
    pub(crate) fn from_exit(
        exit_code: i32,
        stdout: Option<Vec<u8>>,
        stderr: Vec<u8>,
        pump_failures: Vec<PumpFailure>,
    ) -> Self {
        if exit_code == 0 {
            Self {
                exit_code,
                success_stream: stdout.map(OutputHandle::from),
                error_stream: None,
                pump_failures,
            }
        } else {
            Self {
                exit_code,
                success_stream: None,
                error_stream: Some(OutputHandle::from(stderr)),
                pump_failures,
            }
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn success_stream(&self) -> Option<&OutputHandle> {
        self.success_stream.as_ref()
    }

    pub fn error_stream(&self) -> Option<&OutputHandle> {
        self.error_stream.as_ref()
    }

    /// Pump failures observed while the process still exited 0.
    pub fn pump_failures(&self) -> &[PumpFailure] {
        &self.pump_failures
    }

    pub fn into_success_stream(self) -> Option<OutputHandle> {
        self.success_stream
    }

    pub fn into_error_stream(self) -> Option<OutputHandle> {
        self.error_stream
    }

    /// Captured stdout as text, or `None` on failure / when not captured.
    pub fn success_text(&self) -> Option<String> {
        self.success_stream
            .as_ref()
            .map(|h| String::from_utf8_lossy(h.bytes()).into_owned())
    }

    /// Captured stderr as text, or `None` on success.
    pub fn error_text(&self) -> Option<String> {
        self.error_stream
            .as_ref()
            .map(|h| String::from_utf8_lossy(h.bytes()).into_owned())
    }

    /// Feed this result's success stream into `next`.
    ///
    /// A failed result is returned unchanged and `next` is not launched.
    pub async fn pipe(self, next: &CommandSpec, output: OutputTarget<'_>) -> Result<ProcessResult> {
        if !self.success() {
            return Ok(self);
        }
        let input = self
            .success_stream
            .map_or(InputSource::Absent, InputSource::from);
        launcher::launch(next, input, output).await
    }

    /// Shell-mode variant of [`ProcessResult::pipe`].
    pub async fn pipe_shell(self, text: &str, output: OutputTarget<'_>) -> Result<ProcessResult> {
        self.pipe(&CommandSpec::shell(text), output).await
    }
}

/// Outcome of [`super::LaunchHandle::handle`]: the exit code plus whatever
/// the caller's stdout and stderr consumers produced.
///
/// A consumer that never ran (its pipe was bound elsewhere) or that failed
/// leaves its field `None`; the failure itself is in `pump_failures`.
#[derive(Debug)]
pub struct HandledExit<O, E> {
    pub exit_code: i32,
    pub stdout: Option<O>,
    pub stderr: Option<E>,
    pub pump_failures: Vec<PumpFailure>,
}

impl<O, E> HandledExit<O, E> {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}
