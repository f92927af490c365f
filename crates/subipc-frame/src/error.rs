use std::io::ErrorKind;

/// Failures while moving frames over a channel stream.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Bytes on the stream do not start with the `SI` marker.
    #[error("invalid frame magic (expected 0x5349 \"SI\")")]
    InvalidMagic,

    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended in the middle of a frame, or a write made no progress.
    #[error("connection closed mid-frame")]
    ConnectionClosed,
}

impl FrameError {
    /// Whether the failure means the other end went away, as opposed to the
    /// stream carrying bytes that are not frames.
    pub fn is_peer_gone(&self) -> bool {
        match self {
            FrameError::Io(io) => matches!(
                io.kind(),
                ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
            ),
            FrameError::ConnectionClosed => true,
            FrameError::InvalidMagic | FrameError::PayloadTooLarge { .. } => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
