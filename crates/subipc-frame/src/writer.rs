use std::io::ErrorKind;

use bytes::BytesMut;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::codec::{encode_frame, Frame, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete frames to any `AsyncWrite` stream.
///
/// A frame is either written whole or the call fails; there is no
/// partial-frame state visible to the caller.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: AsyncWrite + Unpin> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Write a complete frame.
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.send(frame.encoding, frame.payload.as_ref()).await
    }

    /// Encode and send a payload with the given encoding tag.
    pub async fn send(&mut self, encoding: u16, payload: &[u8]) -> Result<()> {
        if payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }

        self.buf.clear();
        encode_frame(encoding, payload, &mut self.buf)?;

        self.inner.write_all(&self.buf).await.map_err(map_io)?;
        self.inner.flush().await.map_err(map_io)
    }

    /// Shut down the write half so the peer observes end-of-stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await.map_err(map_io)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

fn map_io(err: std::io::Error) -> FrameError {
    match err.kind() {
        ErrorKind::WriteZero => FrameError::ConnectionClosed,
        _ => FrameError::Io(err),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BytesMut;

    use super::*;
    use crate::codec::{decode_frame, DEFAULT_MAX_PAYLOAD};
    use crate::encoding::{ENCODING_ADVANCED, ENCODING_JSON};

    #[tokio::test]
    async fn write_single_frame() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        writer.send(ENCODING_JSON, b"hello").await.unwrap();

        let inner = writer.into_inner();
        let mut wire = BytesMut::from(inner.into_inner().as_slice());
        let frame = decode_frame(&mut wire, usize::MAX).unwrap().unwrap();
        assert_eq!(frame.encoding, ENCODING_JSON);
        assert_eq!(frame.payload.as_ref(), b"hello");
    }

    #[tokio::test]
    async fn frames_keep_issue_order() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        writer.send(ENCODING_JSON, b"one").await.unwrap();
        writer
            .write_frame(&Frame::new(ENCODING_ADVANCED, b"two".to_vec()))
            .await
            .unwrap();

        let mut wire = BytesMut::from(writer.into_inner().into_inner().as_slice());
        let first = decode_frame(&mut wire, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        let second = decode_frame(&mut wire, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(
            (first.encoding, first.payload.as_ref()),
            (ENCODING_JSON, b"one".as_ref())
        );
        assert_eq!(
            (second.encoding, second.payload.as_ref()),
            (ENCODING_ADVANCED, b"two".as_ref())
        );
        assert!(wire.is_empty());
    }

    #[tokio::test]
    async fn oversized_payload_writes_nothing() {
        let mut writer = FrameWriter::with_config(
            Cursor::new(Vec::<u8>::new()),
            FrameConfig {
                max_payload_size: 2,
            },
        );

        let err = writer.send(ENCODING_JSON, b"abc").await.unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 3, max: 2 }));
        assert!(writer.get_ref().get_ref().is_empty());
    }

    #[tokio::test]
    async fn write_to_closed_peer_fails() {
        let (tx, rx) = tokio::io::duplex(16);
        drop(rx);

        let mut writer = FrameWriter::new(tx);
        let err = writer.send(ENCODING_JSON, b"lost").await.unwrap_err();
        assert!(matches!(
            err,
            FrameError::Io(_) | FrameError::ConnectionClosed
        ));
    }
}
