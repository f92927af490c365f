//! Length-prefixed message framing for subprocess channels.
//!
//! Every message is framed with:
//! - A 2-byte magic number ("SI") for stream synchronization
//! - A 4-byte little-endian payload length
//! - A 2-byte little-endian encoding tag naming the payload serialization
//!
//! No partial reads, no buffer management in user code.

pub mod codec;
pub mod encoding;
pub mod error;
pub mod writer;

pub use codec::{
    decode_frame, encode_frame, Frame, FrameConfig, IpcCodec, DEFAULT_MAX_PAYLOAD, HEADER_SIZE,
};
pub use encoding::{encoding_name, ENCODING_ADVANCED, ENCODING_JSON};
pub use error::{FrameError, Result};
pub use writer::FrameWriter;
