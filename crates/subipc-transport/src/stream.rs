use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::error::Result;

/// A connected duplex IPC stream, readable and writable through tokio's
/// `AsyncRead` and `AsyncWrite`.
///
/// This is the raw handle the message channel is layered over.
/// On Unix, this wraps one end of a Unix domain socket pair.
pub struct IpcStream {
    inner: IpcStreamInner,
}

enum IpcStreamInner {
    Unix(tokio::net::UnixStream),
}

impl IpcStream {
    /// Adopt a connected blocking socket. Must be called inside a tokio runtime.
    pub fn from_std(stream: std::os::unix::net::UnixStream) -> Result<Self> {
        stream.set_nonblocking(true)?;
        let stream = tokio::net::UnixStream::from_std(stream)?;
        Ok(Self {
            inner: IpcStreamInner::Unix(stream),
        })
    }

    /// Create a connected pair of streams inside the current process.
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = tokio::net::UnixStream::pair()?;
        Ok((
            Self {
                inner: IpcStreamInner::Unix(left),
            },
            Self {
                inner: IpcStreamInner::Unix(right),
            },
        ))
    }

    /// Get the credentials of the connected peer (Linux only).
    ///
    /// Returns the peer process id, if the platform reports one.
    pub fn peer_pid(&self) -> Option<u32> {
        match &self.inner {
            IpcStreamInner::Unix(stream) => stream
                .peer_cred()
                .ok()
                .and_then(|cred| cred.pid())
                .and_then(|pid| u32::try_from(pid).ok()),
        }
    }
}

impl AsyncRead for IpcStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut self.get_mut().inner {
            IpcStreamInner::Unix(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for IpcStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut self.get_mut().inner {
            IpcStreamInner::Unix(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.get_mut().inner {
            IpcStreamInner::Unix(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.get_mut().inner {
            IpcStreamInner::Unix(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

impl std::fmt::Debug for IpcStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            IpcStreamInner::Unix(_) => f.debug_struct("IpcStream").field("type", &"unix").finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[tokio::test]
    async fn pair_is_duplex() {
        let (mut left, mut right) = IpcStream::pair().unwrap();

        left.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        right.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        right.write_all(b"pong").await.unwrap();
        left.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");
    }

    #[tokio::test]
    async fn shutdown_is_seen_as_eof() {
        let (mut left, mut right) = IpcStream::pair().unwrap();
        left.shutdown().await.unwrap();

        let mut buf = Vec::new();
        let read = right.read_to_end(&mut buf).await.unwrap();
        assert_eq!(read, 0);
    }

    #[tokio::test]
    async fn from_std_adopts_blocking_socket() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut left = IpcStream::from_std(left).unwrap();
        let mut right = IpcStream::from_std(right).unwrap();

        left.write_all(b"x").await.unwrap();
        let mut buf = [0u8; 1];
        right.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"x");
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn peer_pid_reports_own_process() {
        let (left, _right) = IpcStream::pair().unwrap();
        assert_eq!(left.peer_pid(), Some(std::process::id()));
    }
}
