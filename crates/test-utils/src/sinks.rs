//! Writers that misbehave on purpose.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::AsyncWrite;

/// A sink whose every write fails, as a full disk would.
///
/// Flush and shutdown succeed, so only the copy itself reports the error.
#[derive(Debug, Default)]
pub struct FailingSink {
    message: Option<&'static str>,
}

impl FailingSink {
    pub fn new(message: &'static str) -> Self {
        Self {
            message: Some(message),
        }
    }

    /// The default failure, `"disk full"`.
    pub fn disk_full() -> Self {
        Self::new("disk full")
    }
}

impl AsyncWrite for FailingSink {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, _buf: &[u8]) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::other(self.message.unwrap_or("disk full"))))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
