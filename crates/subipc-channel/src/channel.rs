use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use parking_lot::Mutex;
use subipc_frame::FrameWriter;
use subipc_serial::{Profile, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{oneshot, watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::adapter::{self, BoxedWrite};
use crate::config::{ChannelConfig, Side};
use crate::error::{CallSite, ChannelError, Operation, Result};
use crate::queue::{Filter, Wake};
use crate::state::{ChannelState, DisconnectReason, Lifecycle};
use crate::stream::MessageStream;

/// One end of the message channel between a process and its subprocess.
///
/// Cloning is cheap; clones share the same connection, queue and state.
#[derive(Clone)]
pub struct Channel {
    pub(crate) shared: Arc<Shared>,
}

pub(crate) struct Shared {
    config: ChannelConfig,
    lifecycle: Mutex<Lifecycle>,
    writer: tokio::sync::Mutex<Option<FrameWriter<BoxedWrite>>>,
    space: Arc<Notify>,
    closed: watch::Sender<Option<DisconnectReason>>,
    /// Callers currently blocked in [`Channel::closed`].
    watchers: AtomicUsize,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    fn new(
        config: ChannelConfig,
        state: ChannelState,
        writer: Option<FrameWriter<BoxedWrite>>,
    ) -> Self {
        Self {
            config,
            lifecycle: Mutex::new(Lifecycle::new(state)),
            writer: tokio::sync::Mutex::new(writer),
            space: Arc::new(Notify::new()),
            closed: watch::channel(None).0,
            watchers: AtomicUsize::new(0),
            reader: Mutex::new(None),
        }
    }

    pub(crate) fn buffered_len(&self) -> usize {
        self.lifecycle.lock().queue.len()
    }

    pub(crate) fn deliver(&self, value: Value) {
        self.lifecycle.lock().queue.push(value);
    }

    /// Whether the reader should stop pulling frames for now.
    ///
    /// A full queue only pauses reading while nobody is blocked on it: a
    /// receiver whose filter rejects everything buffered, or a caller of
    /// [`Channel::closed`], needs further frames to make progress.
    pub(crate) fn should_pause(&self, max_buffered: usize) -> bool {
        let lifecycle = self.lifecycle.lock();
        lifecycle.queue.len() >= max_buffered
            && !lifecycle.queue.has_waiters()
            && self.watchers.load(Ordering::Acquire) == 0
    }

    /// Perform the single transition to `Disconnected`.
    ///
    /// Returns false when another trigger got there first.
    pub(crate) fn transition(&self, reason: DisconnectReason) -> bool {
        if !self.lifecycle.lock().disconnect(reason.clone()) {
            return false;
        }
        debug!(side = ?self.config.side, %reason, "channel disconnected");
        self.closed.send_replace(Some(reason));
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
        true
    }

    /// Take the oldest accepted message, or queue a waiter for one.
    pub(crate) fn take_or_wait(&self, op: Operation, filter: Option<Filter>) -> Result<Take> {
        let mut lifecycle = self.lifecycle.lock();
        lifecycle.guard(op, self.config.side)?;
        let popped = lifecycle.queue.pop(filter.as_ref());
        match popped {
            Some(value) => {
                drop(lifecycle);
                self.space.notify_one();
                Ok(Take::Ready(value))
            }
            None => {
                let rx = lifecycle.queue.register(filter);
                drop(lifecycle);
                // A paused reader must resume to serve the new waiter.
                self.space.notify_one();
                Ok(Take::Wait(rx))
            }
        }
    }

    /// Take the oldest message regardless of state, for draining.
    pub(crate) fn take_buffered(&self) -> Option<Value> {
        let value = self.lifecycle.lock().queue.pop(None)?;
        self.space.notify_one();
        Some(value)
    }

    pub(crate) fn lifecycle_error(&self, op: Operation) -> ChannelError {
        self.lifecycle
            .lock()
            .lifecycle_error(CallSite::new(op, self.config.side))
    }

    pub(crate) fn state(&self) -> ChannelState {
        self.lifecycle.lock().state()
    }

    pub(crate) fn reason(&self) -> Option<DisconnectReason> {
        self.lifecycle.lock().reason().cloned()
    }

    pub(crate) fn guard(&self, op: Operation) -> Result<()> {
        self.lifecycle.lock().guard(op, self.config.side)
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.get_mut().take() {
            reader.abort();
        }
    }
}

/// Registration of one [`Channel::closed`] caller, undone on drop.
struct Watching<'a> {
    shared: &'a Shared,
}

impl<'a> Watching<'a> {
    fn new(shared: &'a Shared) -> Self {
        shared.watchers.fetch_add(1, Ordering::AcqRel);
        // The peer's close sits behind unread frames; let the reader find it.
        shared.space.notify_one();
        Self { shared }
    }
}

impl Drop for Watching<'_> {
    fn drop(&mut self) {
        self.shared.watchers.fetch_sub(1, Ordering::AcqRel);
    }
}

pub(crate) enum Take {
    Ready(Value),
    Wait(oneshot::Receiver<Wake>),
}

/// A receiver suspended on the queue.
///
/// Dropping it before completion hands any message already addressed to it
/// back to the queue.
pub(crate) struct Pending {
    rx: oneshot::Receiver<Wake>,
    shared: Weak<Shared>,
}

impl Pending {
    pub(crate) fn new(rx: oneshot::Receiver<Wake>, shared: &Arc<Shared>) -> Self {
        Self {
            rx,
            shared: Arc::downgrade(shared),
        }
    }
}

impl Future for Pending {
    type Output = Wake;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Wake> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|wake| wake.unwrap_or(Wake::Closed(DisconnectReason::Closed)))
    }
}

impl Drop for Pending {
    fn drop(&mut self) {
        self.rx.close();
        if let Ok(Wake::Message(seq, value)) = self.rx.try_recv() {
            if let Some(shared) = self.shared.upgrade() {
                shared.lifecycle.lock().queue.restore(seq, value);
            }
        }
    }
}

impl Channel {
    /// Open a channel over an established duplex transport.
    ///
    /// When `config` does not enable IPC the transport is dropped and the
    /// channel stays [`ChannelState::NotRequested`]. Must be called within a
    /// Tokio runtime: the inbound side runs as a spawned task.
    pub fn open<S>(stream: S, config: ChannelConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        if !config.ipc_enabled() {
            debug!(side = ?config.side, "ipc not requested, transport dropped");
            return Self::disabled(config);
        }

        let (reader, writer) = adapter::split(stream, config.max_payload_size);
        let profile = config.serialization;
        let max_buffered = config.max_buffered_messages;
        let shared = Arc::new(Shared::new(config, ChannelState::Connected, Some(writer)));

        let task = tokio::spawn(adapter::read_loop(
            reader,
            Arc::downgrade(&shared),
            Arc::clone(&shared.space),
            profile,
            max_buffered,
        ));
        *shared.reader.lock() = Some(task);

        debug!(side = ?shared.config.side, %profile, "channel connected");
        Self { shared }
    }

    /// A channel for a subprocess started without IPC. Every operation fails
    /// with a configuration error.
    pub fn disabled(config: ChannelConfig) -> Self {
        Self {
            shared: Arc::new(Shared::new(config, ChannelState::NotRequested, None)),
        }
    }

    /// Attach to the channel inherited from the parent process.
    ///
    /// Reads the descriptor from `SUBIPC_CHANNEL_FD` and the profile from
    /// `SUBIPC_SERIALIZATION`. Without a descriptor the channel is
    /// [`ChannelState::NotRequested`].
    #[cfg(unix)]
    pub fn from_env() -> Result<Self> {
        use subipc_transport::{IpcStream, CHANNEL_FD_ENV, SERIALIZATION_ENV};

        let profile = match std::env::var(SERIALIZATION_ENV) {
            Ok(name) => name
                .parse::<Profile>()
                .map_err(|err| ChannelError::Environment {
                    var: SERIALIZATION_ENV,
                    message: err.to_string(),
                })?,
            Err(std::env::VarError::NotPresent) => Profile::default(),
            Err(err) => {
                return Err(ChannelError::Environment {
                    var: SERIALIZATION_ENV,
                    message: err.to_string(),
                })
            }
        };
        let config = ChannelConfig::default()
            .with_side(Side::Subprocess)
            .with_serialization(profile);

        match IpcStream::from_env() {
            Ok(Some(stream)) => Ok(Self::open(stream, config.with_ipc(true))),
            Ok(None) => Ok(Self::disabled(config)),
            Err(err) => Err(ChannelError::Environment {
                var: CHANNEL_FD_ENV,
                message: err.to_string(),
            }),
        }
    }

    /// Send a message without waiting for a reply.
    ///
    /// Resolves once the transport has accepted the whole frame. Invalid
    /// payloads are rejected before anything is written and leave the
    /// channel usable.
    pub async fn send_message(&self, message: impl Into<Value>) -> Result<()> {
        self.send_as(Operation::SendMessage, &message.into()).await
    }

    /// Wait for the next message.
    pub async fn get_one_message(&self) -> Result<Value> {
        self.receive(Operation::GetOneMessage, None).await
    }

    /// Wait for the oldest message accepted by `filter`.
    ///
    /// Messages the filter rejects stay queued, in order, for other
    /// receivers.
    ///
    /// The filter runs while the channel's queue is locked. It must not call
    /// back into this channel or any clone of it, or it deadlocks.
    pub async fn get_one_message_where<F>(&self, filter: F) -> Result<Value>
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.receive(Operation::GetOneMessage, Some(Arc::new(filter)))
            .await
    }

    /// Send a message, then wait for the next inbound one.
    ///
    /// There is no request/response correlation: the reply is whatever
    /// message is next in the shared queue once the send has completed.
    pub async fn exchange_message(&self, message: impl Into<Value>) -> Result<Value> {
        self.send_as(Operation::ExchangeMessage, &message.into())
            .await?;
        self.receive(Operation::ExchangeMessage, None).await
    }

    /// Iterate inbound messages until the channel disconnects.
    pub fn get_each_message(&self) -> Result<MessageStream> {
        self.shared.guard(Operation::GetEachMessage)?;
        Ok(MessageStream::new(self.clone()))
    }

    /// Close the channel. Idempotent.
    ///
    /// Pending receivers fail, in-flight sends are abandoned and the peer
    /// observes end-of-stream. After the peer already disconnected this only
    /// releases the local end.
    pub async fn disconnect(&self) {
        self.shared.transition(DisconnectReason::Explicit);
        let writer = self.shared.writer.lock().await.take();
        if let Some(mut writer) = writer {
            if let Err(err) = writer.shutdown().await {
                debug!(error = %err, "channel shutdown after disconnect failed");
            }
        }
    }

    /// Wait until the channel is disconnected and report why.
    ///
    /// Returns `None` immediately for a channel that was never connected.
    pub async fn closed(&self) -> Option<DisconnectReason> {
        if self.state() == ChannelState::NotRequested {
            return None;
        }
        let mut rx = self.shared.closed.subscribe();
        let _watching = Watching::new(&self.shared);
        let reason = match rx.wait_for(Option::is_some).await {
            Ok(reason) => (*reason).clone(),
            Err(_) => None,
        };
        reason
    }

    pub fn state(&self) -> ChannelState {
        self.shared.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ChannelState::Connected
    }

    /// Why the channel disconnected, once it has.
    pub fn disconnect_reason(&self) -> Option<DisconnectReason> {
        self.shared.reason()
    }

    pub fn profile(&self) -> Profile {
        self.shared.config.serialization
    }

    pub fn side(&self) -> Side {
        self.shared.config.side
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.shared.config
    }

    /// Messages delivered but not yet consumed.
    pub fn buffered_len(&self) -> usize {
        self.shared.buffered_len()
    }

    async fn send_as(&self, op: Operation, value: &Value) -> Result<()> {
        let site = CallSite::new(op, self.side());
        self.shared.guard(op)?;

        let config = &self.shared.config;
        let payload = adapter::encode(config.serialization, value, config.max_payload_size)
            .map_err(|source| ChannelError::Serialization { site, source })?;

        let mut writer = self.shared.writer.lock().await;
        // A disconnect may have happened while waiting for the writer.
        self.shared.guard(op)?;
        let Some(frame_writer) = writer.as_mut() else {
            return Err(self.shared.lifecycle_error(op));
        };

        let mut closed = self.shared.closed.subscribe();
        let tag = config.serialization.encoding_tag();
        let written = tokio::select! {
            written = frame_writer.send(tag, &payload) => written,
            _ = closed.wait_for(Option::is_some) => {
                return Err(self.shared.lifecycle_error(op));
            }
        };

        match written {
            Ok(()) => {
                trace!(%site, bytes = payload.len(), "message sent");
                Ok(())
            }
            Err(source) if source.is_peer_gone() => {
                *writer = None;
                self.shared.transition(DisconnectReason::Closed);
                Err(self.shared.lifecycle_error(op))
            }
            Err(source) => {
                *writer = None;
                if self
                    .shared
                    .transition(DisconnectReason::Failed(source.to_string()))
                {
                    warn!(%site, error = %source, "channel write failed");
                    Err(ChannelError::Transport { site, source })
                } else {
                    Err(self.shared.lifecycle_error(op))
                }
            }
        }
    }

    async fn receive(&self, op: Operation, filter: Option<Filter>) -> Result<Value> {
        let rx = match self.shared.take_or_wait(op, filter)? {
            Take::Ready(value) => return Ok(value),
            Take::Wait(rx) => rx,
        };
        match Pending::new(rx, &self.shared).await {
            Wake::Message(_, value) => Ok(value),
            Wake::Closed(_) => Err(self.shared.lifecycle_error(op)),
        }
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("state", &self.state())
            .field("profile", &self.profile())
            .field("side", &self.side())
            .field("buffered", &self.buffered_len())
            .finish()
    }
}
