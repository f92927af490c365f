//! Bridges a duplex byte stream and the channel: frames out, values in.

use std::sync::{Arc, Weak};

use futures_util::StreamExt;
use subipc_frame::{encoding_name, Frame, FrameConfig, FrameError, FrameWriter, IpcCodec};
use subipc_serial::{Profile, SerialError, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Notify;
use tokio_util::codec::FramedRead;
use tracing::{debug, trace, warn};

use crate::channel::Shared;
use crate::state::DisconnectReason;

pub(crate) type BoxedRead = Box<dyn AsyncRead + Send + Unpin>;
pub(crate) type BoxedWrite = Box<dyn AsyncWrite + Send + Unpin>;

pub(crate) type FrameReader = FramedRead<BoxedRead, IpcCodec>;

/// Split a duplex stream into a frame reader and a frame writer.
pub(crate) fn split<S>(stream: S, max_payload_size: usize) -> (FrameReader, FrameWriter<BoxedWrite>)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read, write) = tokio::io::split(stream);
    let config = FrameConfig { max_payload_size };
    let reader = FramedRead::new(
        Box::new(read) as BoxedRead,
        IpcCodec::with_config(config.clone()),
    );
    let writer = FrameWriter::with_config(Box::new(write) as BoxedWrite, config);
    (reader, writer)
}

/// Validate and serialize an outbound message.
///
/// Nothing reaches the transport unless this succeeds.
pub(crate) fn encode(profile: Profile, value: &Value, max: usize) -> Result<Vec<u8>, SerialError> {
    let payload = profile.encode(value)?;
    if payload.len() > max {
        return Err(SerialError::TooLarge {
            size: payload.len(),
            max,
        });
    }
    Ok(payload)
}

/// Turn an inbound frame into a value of the channel's profile.
pub(crate) fn decode(profile: Profile, frame: &Frame) -> Result<Value, String> {
    if frame.encoding != profile.encoding_tag() {
        return Err(format!(
            "peer sent a {} payload (tag {}) on a {profile} channel",
            encoding_name(frame.encoding),
            frame.encoding
        ));
    }
    profile
        .decode(&frame.payload)
        .map_err(|err| format!("undecodable {profile} payload: {err}"))
}

/// Read frames until the transport ends, delivering values to the queue.
///
/// Holds only a weak handle between frames so dropping the last channel
/// handle tears the task down.
pub(crate) async fn read_loop(
    mut reader: FrameReader,
    shared: Weak<Shared>,
    space: Arc<Notify>,
    profile: Profile,
    max_buffered: usize,
) {
    loop {
        loop {
            let pause = match shared.upgrade() {
                Some(shared) => shared.should_pause(max_buffered),
                None => return,
            };
            if !pause {
                break;
            }
            trace!(max_buffered, "inbound queue full, pausing reads");
            space.notified().await;
        }

        let reason = match reader.next().await {
            Some(Ok(frame)) => match decode(profile, &frame) {
                Ok(value) => {
                    let Some(shared) = shared.upgrade() else {
                        return;
                    };
                    trace!(bytes = frame.payload.len(), "message delivered");
                    shared.deliver(value);
                    continue;
                }
                Err(text) => {
                    warn!(error = %text, "dropping channel after bad inbound frame");
                    DisconnectReason::Failed(text)
                }
            },
            Some(Err(err @ FrameError::Io(_))) if err.is_peer_gone() => {
                debug!(error = %err, "peer reset the channel");
                DisconnectReason::Closed
            }
            Some(Err(err)) => {
                warn!(error = %err, "channel read failed");
                DisconnectReason::Failed(err.to_string())
            }
            None => {
                debug!("peer closed the channel");
                DisconnectReason::Closed
            }
        };

        if let Some(shared) = shared.upgrade() {
            shared.transition(reason);
        }
        return;
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use subipc_frame::{decode_frame, ENCODING_ADVANCED, ENCODING_JSON};
    use tokio::io::AsyncReadExt;

    use super::*;

    #[test]
    fn encode_rejects_before_size_check() {
        let err = encode(Profile::Json, &Value::Undefined, 0).unwrap_err();
        assert!(matches!(err, SerialError::Unsupported { kind: "undefined", .. }));
    }

    #[test]
    fn encode_caps_payload_size() {
        let err = encode(Profile::Json, &Value::from("a long enough string"), 8).unwrap_err();
        assert!(matches!(err, SerialError::TooLarge { max: 8, .. }));
    }

    #[test]
    fn decode_rejects_foreign_encoding() {
        let frame = Frame::new(ENCODING_ADVANCED, b"{}".to_vec());
        let err = decode(Profile::Json, &frame).unwrap_err();
        assert!(err.contains("advanced"));

        let frame = Frame::new(ENCODING_JSON, b"[1,2]".to_vec());
        assert_eq!(
            decode(Profile::Json, &frame).unwrap(),
            Value::array([Value::from(1), Value::from(2)])
        );
    }

    #[tokio::test]
    async fn split_writer_emits_frames() {
        let (near, mut far) = tokio::io::duplex(256);
        let (_reader, mut writer) = split(near, 1024);

        let payload = encode(Profile::Json, &Value::from(true), 1024).unwrap();
        writer.send(Profile::Json.encoding_tag(), &payload).await.unwrap();

        let mut buf = [0u8; 64];
        let n = far.read(&mut buf).await.unwrap();
        let mut wire = BytesMut::from(&buf[..n]);
        let frame = decode_frame(&mut wire, 1024).unwrap().unwrap();
        assert_eq!(frame.encoding, ENCODING_JSON);
        assert_eq!(frame.payload.as_ref(), b"true");
    }
}
