use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use futures_core::Stream;
use subipc_serial::Value;

use crate::channel::{Channel, Pending, Take};
use crate::error::{Operation, Result};
use crate::queue::Wake;

/// Lazy, forward-only iteration over inbound messages.
///
/// Each step yields the oldest queued message or waits for the next one.
/// Once the channel disconnects, messages delivered before the disconnect
/// are still yielded; the stream then ends. It ends cleanly after an
/// explicit disconnect or peer close, and yields one lifecycle error first
/// when the transport failed.
///
/// Several streams (or `get_one_message` callers) on the same channel
/// compete for messages; each message goes to exactly one of them.
pub struct MessageStream {
    channel: Channel,
    pending: Option<Pending>,
    done: bool,
}

impl MessageStream {
    pub(crate) fn new(channel: Channel) -> Self {
        Self {
            channel,
            pending: None,
            done: false,
        }
    }

    /// Next message, or `None` once the stream has ended.
    pub async fn next_message(&mut self) -> Option<Result<Value>> {
        std::future::poll_fn(|cx| Pin::new(&mut *self).poll_next(cx)).await
    }

    /// The channel this stream reads from.
    pub fn channel(&self) -> &Channel {
        &self.channel
    }
}

impl Stream for MessageStream {
    type Item = Result<Value>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if this.done {
            return Poll::Ready(None);
        }

        loop {
            if let Some(pending) = this.pending.as_mut() {
                let wake = ready!(Pin::new(pending).poll(cx));
                this.pending = None;
                if let Wake::Message(_, value) = wake {
                    return Poll::Ready(Some(Ok(value)));
                }
            }

            let shared = &this.channel.shared;
            match shared.take_or_wait(Operation::GetEachMessage, None) {
                Ok(Take::Ready(value)) => return Poll::Ready(Some(Ok(value))),
                Ok(Take::Wait(rx)) => this.pending = Some(Pending::new(rx, shared)),
                Err(err) => {
                    if let Some(value) = shared.take_buffered() {
                        return Poll::Ready(Some(Ok(value)));
                    }
                    this.done = true;
                    let orderly = shared.reason().is_some_and(|reason| reason.is_orderly());
                    return if err.is_lifecycle() && orderly {
                        Poll::Ready(None)
                    } else {
                        Poll::Ready(Some(Err(err)))
                    };
                }
            }
        }
    }
}

impl std::fmt::Debug for MessageStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageStream")
            .field("channel", &self.channel)
            .field("waiting", &self.pending.is_some())
            .field("done", &self.done)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use futures_util::StreamExt;
    use subipc_frame::{encode_frame, ENCODING_JSON};
    use subipc_serial::Profile;
    use tokio::io::AsyncWriteExt;

    use super::*;
    use crate::config::{ChannelConfig, Side};

    fn json_pair() -> (Channel, Channel) {
        let (near, far) = tokio::io::duplex(64 * 1024);
        let config = ChannelConfig::enabled().with_serialization(Profile::Json);
        (
            Channel::open(near, config.clone()),
            Channel::open(far, config.with_side(Side::Subprocess)),
        )
    }

    #[tokio::test]
    async fn drains_then_ends_cleanly_when_peer_disconnects() {
        let (parent, child) = json_pair();
        let mut messages = parent.get_each_message().unwrap();

        for n in 0..3 {
            child.send_message(n).await.unwrap();
        }
        child.disconnect().await;
        parent.closed().await;

        let received: Vec<Value> = (&mut messages)
            .map(|item| item.unwrap())
            .collect()
            .await;
        assert_eq!(
            received,
            vec![Value::from(0), Value::from(1), Value::from(2)]
        );
        assert!(messages.next_message().await.is_none());
    }

    #[tokio::test]
    async fn ends_cleanly_on_local_disconnect() {
        let (parent, _child) = json_pair();
        let mut messages = parent.get_each_message().unwrap();

        let reader = tokio::spawn(async move { messages.next_message().await });
        tokio::task::yield_now().await;
        parent.disconnect().await;

        assert!(reader.await.unwrap().is_none());
    }

    #[tokio::test]
    async fn yields_error_after_transport_failure() {
        let (near, mut far) = tokio::io::duplex(1024);
        let parent = Channel::open(
            near,
            ChannelConfig::enabled().with_serialization(Profile::Json),
        );
        let mut messages = parent.get_each_message().unwrap();

        let mut wire = BytesMut::new();
        encode_frame(ENCODING_JSON, b"\"first\"", &mut wire).unwrap();
        wire.extend_from_slice(b"garbage!garbage!");
        far.write_all(&wire).await.unwrap();

        assert_eq!(
            messages.next_message().await.unwrap().unwrap(),
            Value::from("first")
        );
        let err = messages.next_message().await.unwrap().unwrap_err();
        assert!(err
            .to_string()
            .contains("subprocess.getEachMessage() cannot be used"));
        assert!(messages.next_message().await.is_none());
    }

    #[tokio::test]
    async fn competing_streams_receive_distinct_messages() {
        let (parent, child) = json_pair();
        let mut first = parent.get_each_message().unwrap();
        let mut second = parent.get_each_message().unwrap();

        for n in 0..4 {
            child.send_message(n).await.unwrap();
        }
        let mut seen = Vec::new();
        for _ in 0..2 {
            seen.push(first.next_message().await.unwrap().unwrap());
            seen.push(second.next_message().await.unwrap().unwrap());
        }
        assert_eq!(
            seen,
            (0..4).map(Value::from).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn refused_on_disabled_channel() {
        let channel = Channel::disabled(ChannelConfig::default().with_side(Side::Subprocess));
        let err = channel.get_each_message().unwrap_err();
        assert_eq!(
            err.to_string(),
            "getEachMessage() can only be used if the ipc option is true"
        );
    }
}
