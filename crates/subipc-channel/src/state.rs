use std::fmt;

use crate::config::Side;
use crate::error::{CallSite, ChannelError, Operation, Result};
use crate::queue::MessageQueue;

/// Connection state of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    /// IPC was not enabled.
    NotRequested,
    /// The transport is live.
    Connected,
    /// Terminal. Reached at most once.
    Disconnected,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChannelState::NotRequested => "not-requested",
            ChannelState::Connected => "connected",
            ChannelState::Disconnected => "disconnected",
        })
    }
}

/// What caused the transition to [`ChannelState::Disconnected`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// `disconnect()` was called locally.
    Explicit,
    /// The peer closed the transport.
    Closed,
    /// The transport failed while reading or writing.
    Failed(String),
}

impl DisconnectReason {
    /// Orderly disconnects end message iteration without an error.
    pub fn is_orderly(&self) -> bool {
        !matches!(self, DisconnectReason::Failed(_))
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::Explicit => f.write_str("disconnected locally"),
            DisconnectReason::Closed => f.write_str("closed by peer"),
            DisconnectReason::Failed(text) => write!(f, "transport failed: {text}"),
        }
    }
}

/// State, disconnect reason and inbound queue, always mutated together
/// under the channel lock.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    state: ChannelState,
    reason: Option<DisconnectReason>,
    pub(crate) queue: MessageQueue,
}

impl Lifecycle {
    pub(crate) fn new(state: ChannelState) -> Self {
        Self {
            state,
            reason: None,
            queue: MessageQueue::default(),
        }
    }

    pub(crate) fn state(&self) -> ChannelState {
        self.state
    }

    pub(crate) fn reason(&self) -> Option<&DisconnectReason> {
        self.reason.as_ref()
    }

    /// Fail fast unless the channel is connected.
    pub(crate) fn guard(&self, op: Operation, side: Side) -> Result<()> {
        let site = CallSite::new(op, side);
        match self.state {
            ChannelState::Connected => Ok(()),
            ChannelState::NotRequested => Err(ChannelError::Configuration { site }),
            ChannelState::Disconnected => Err(self.lifecycle_error(site)),
        }
    }

    pub(crate) fn lifecycle_error(&self, site: CallSite) -> ChannelError {
        ChannelError::Lifecycle {
            site,
            reason: self.reason.clone(),
        }
    }

    /// Move to `Disconnected` and fail every pending waiter.
    ///
    /// Returns false if the channel was not connected; only the first
    /// trigger performs the transition.
    pub(crate) fn disconnect(&mut self, reason: DisconnectReason) -> bool {
        if self.state != ChannelState::Connected {
            return false;
        }
        self.state = ChannelState::Disconnected;
        self.queue.close(&reason);
        self.reason = Some(reason);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_maps_state_to_error_kind() {
        let lifecycle = Lifecycle::new(ChannelState::NotRequested);
        let err = lifecycle
            .guard(Operation::SendMessage, Side::Parent)
            .unwrap_err();
        assert!(err.is_configuration());

        let mut lifecycle = Lifecycle::new(ChannelState::Connected);
        assert!(lifecycle.guard(Operation::SendMessage, Side::Parent).is_ok());
        assert!(lifecycle.disconnect(DisconnectReason::Closed));
        let err = lifecycle
            .guard(Operation::SendMessage, Side::Parent)
            .unwrap_err();
        assert!(err.is_lifecycle());
    }

    #[test]
    fn first_disconnect_wins() {
        let mut lifecycle = Lifecycle::new(ChannelState::Connected);
        assert!(lifecycle.disconnect(DisconnectReason::Failed("reset".into())));
        assert!(!lifecycle.disconnect(DisconnectReason::Explicit));
        assert_eq!(lifecycle.state(), ChannelState::Disconnected);
        assert_eq!(
            lifecycle.reason(),
            Some(&DisconnectReason::Failed("reset".into()))
        );
    }

    #[test]
    fn not_requested_never_disconnects() {
        let mut lifecycle = Lifecycle::new(ChannelState::NotRequested);
        assert!(!lifecycle.disconnect(DisconnectReason::Explicit));
        assert_eq!(lifecycle.state(), ChannelState::NotRequested);
    }
}
