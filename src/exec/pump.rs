// src/exec/pump.rs

//! Byte pumps between a child's pipes and the caller's endpoints.
//!
//! Feeding stdin and collecting stderr/stdout each run on their own Tokio
//! task so that no direction can stall another: a child blocked on a full
//! stdout pipe is always being drained while its stdin is being written.

use std::fmt;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Which standard stream a pump services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PumpKind {
    Stdin,
    Stdout,
    Stderr,
}

impl fmt::Display for PumpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PumpKind::Stdin => "stdin",
            PumpKind::Stdout => "stdout",
            PumpKind::Stderr => "stderr",
        };
        f.write_str(name)
    }
}

/// A pump that failed while the process itself exited successfully.
///
/// Kept on [`super::ProcessResult`] as an annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PumpFailure {
    pub pump: PumpKind,
    pub kind: io::ErrorKind,
    pub message: String,
}

impl PumpFailure {
    pub(crate) fn new(pump: PumpKind, err: &io::Error) -> Self {
        Self {
            pump,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for PumpFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} pump failed: {}", self.pump, self.message)
    }
}

/// Copy `source` into `sink` on a new task, then shut `sink` down.
///
/// Both endpoints are owned and dropped when the task ends, which closes the
/// child's stdin. A child that exits (or closes stdin) before consuming all
/// input is not an error.
pub(crate) fn spawn_feed<R, W>(source: R, sink: W) -> JoinHandle<io::Result<u64>>
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    tokio::spawn(feed(source, sink))
}

async fn feed<R, W>(mut source: R, mut sink: W) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let copied = match tokio::io::copy(&mut source, &mut sink).await {
        Ok(n) => n,
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            debug!("stdin closed by child before input was fully written");
            return Ok(0);
        }
        Err(e) => return Err(e),
    };

    match sink.shutdown().await {
        Err(e) if e.kind() != io::ErrorKind::BrokenPipe => return Err(e),
        _ => {}
    }

    trace!(bytes = copied, "stdin feed finished");
    Ok(copied)
}

/// Read `source` to the end on a new task.
pub(crate) fn spawn_collect<R>(mut source: R) -> JoinHandle<io::Result<Vec<u8>>>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        source.read_to_end(&mut buf).await?;
        trace!(bytes = buf.len(), "collect finished");
        Ok(buf)
    })
}

/// Copy `source` into a borrowed `sink` and flush it. The sink stays open.
///
/// If writing to the sink fails, the rest of `source` is discarded so the
/// child never blocks on a full pipe; the first error is returned.
pub(crate) async fn drain<R, W>(source: &mut R, sink: &mut W) -> io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let copied = match tokio::io::copy(source, sink).await {
        Ok(n) => n,
        Err(e) => {
            let discarded = tokio::io::copy(source, &mut tokio::io::sink()).await.unwrap_or(0);
            debug!(discarded, error = %e, "sink failed; discarding remaining output");
            return Err(e);
        }
    };
    sink.flush().await?;
    Ok(copied)
}

/// Await a pump task, turning a panic or cancellation into an I/O error.
///
/// Takes the handle by reference so a caller racing a deadline can still
/// abort the task afterwards.
pub(crate) async fn join<T>(handle: &mut JoinHandle<io::Result<T>>) -> io::Result<T> {
    handle.await.map_err(io::Error::other)?
}

/// Like [`join`], but give up after `grace`: the task is aborted and `None`
/// returned.
pub(crate) async fn join_within<T>(
    handle: &mut JoinHandle<io::Result<T>>,
    grace: Duration,
) -> Option<io::Result<T>> {
    match tokio::time::timeout(grace, join(&mut *handle)).await {
        Ok(joined) => Some(joined),
        Err(_) => {
            handle.abort();
            None
        }
    }
}
