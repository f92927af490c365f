use std::fmt;

use subipc_frame::FrameError;
use subipc_serial::SerialError;

use crate::config::Side;
use crate::state::DisconnectReason;

/// Public channel operations, as named in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    SendMessage,
    GetOneMessage,
    ExchangeMessage,
    GetEachMessage,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::SendMessage => "sendMessage",
            Operation::GetOneMessage => "getOneMessage",
            Operation::ExchangeMessage => "exchangeMessage",
            Operation::GetEachMessage => "getEachMessage",
        }
    }

    pub const ALL: [Operation; 4] = [
        Operation::SendMessage,
        Operation::GetOneMessage,
        Operation::ExchangeMessage,
        Operation::GetEachMessage,
    ];
}

/// An operation together with the side of the channel it was called on.
///
/// Renders as `subprocess.sendMessage()` on the parent side and
/// `sendMessage()` inside the subprocess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite {
    pub op: Operation,
    pub side: Side,
}

impl CallSite {
    pub fn new(op: Operation, side: Side) -> Self {
        Self { op, side }
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.side {
            Side::Parent => write!(f, "subprocess.{}()", self.op.name()),
            Side::Subprocess => write!(f, "{}()", self.op.name()),
        }
    }
}

/// Errors raised by channel operations.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// IPC was never enabled for this channel.
    #[error("{site} can only be used if the ipc option is true")]
    Configuration { site: CallSite },

    /// The channel is disconnected, or got disconnected while the call was pending.
    #[error("{site} cannot be used: {}", lifecycle_detail(.site, .reason.as_ref()))]
    Lifecycle {
        site: CallSite,
        reason: Option<DisconnectReason>,
    },

    /// The payload was rejected before anything was written.
    #[error("{site}'s argument type is invalid: the message cannot be serialized: {source}")]
    Serialization {
        site: CallSite,
        #[source]
        source: SerialError,
    },

    /// Writing to the transport failed; the channel is now disconnected.
    #[error("{site} failed: {source}")]
    Transport {
        site: CallSite,
        #[source]
        source: FrameError,
    },

    /// The inherited channel environment is unusable.
    #[error("invalid IPC environment {var}: {message}")]
    Environment { var: &'static str, message: String },
}

fn lifecycle_detail(site: &CallSite, reason: Option<&DisconnectReason>) -> String {
    let peer = match site.side {
        Side::Parent => "the subprocess",
        Side::Subprocess => "the parent process",
    };
    match reason {
        Some(DisconnectReason::Failed(text)) => {
            format!("{peer} has already exited or disconnected ({text})")
        }
        _ => format!("{peer} has already exited or disconnected"),
    }
}

impl ChannelError {
    /// Operation the error came from, if any.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            ChannelError::Configuration { site }
            | ChannelError::Lifecycle { site, .. }
            | ChannelError::Serialization { site, .. }
            | ChannelError::Transport { site, .. } => Some(site.op),
            ChannelError::Environment { .. } => None,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ChannelError::Configuration { .. } | ChannelError::Environment { .. }
        )
    }

    pub fn is_lifecycle(&self) -> bool {
        matches!(self, ChannelError::Lifecycle { .. })
    }

    pub fn is_serialization(&self) -> bool {
        matches!(self, ChannelError::Serialization { .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ChannelError::Transport { .. })
    }
}

pub type Result<T> = std::result::Result<T, ChannelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_side_prefixes_subprocess() {
        let site = CallSite::new(Operation::GetOneMessage, Side::Parent);
        let err = ChannelError::Configuration { site };
        assert_eq!(
            err.to_string(),
            "subprocess.getOneMessage() can only be used if the ipc option is true"
        );
    }

    #[test]
    fn lifecycle_message_names_peer_and_failure() {
        let err = ChannelError::Lifecycle {
            site: CallSite::new(Operation::SendMessage, Side::Subprocess),
            reason: Some(DisconnectReason::Failed("broken pipe".into())),
        };
        let text = err.to_string();
        assert!(text.starts_with("sendMessage() cannot be used"));
        assert!(text.contains("the parent process"));
        assert!(text.contains("broken pipe"));
    }

    #[test]
    fn serialization_message_contains_contract_text() {
        let err = ChannelError::Serialization {
            site: CallSite::new(Operation::ExchangeMessage, Side::Parent),
            source: SerialError::Cycle {
                path: "$.self".into(),
            },
        };
        let text = err.to_string();
        assert!(text.contains("subprocess.exchangeMessage()'s argument type is invalid"));
        assert!(text.contains("$.self"));
        assert_eq!(err.operation(), Some(Operation::ExchangeMessage));
    }
}
