//! Message channel between a process and the subprocess it spawned.
//!
//! This is the "just works" layer. Open a [`Channel`] over an established
//! duplex transport, then exchange [`Value`]s with the four access patterns:
//!
//! - [`Channel::send_message`]: fire-and-forget send
//! - [`Channel::get_one_message`]: wait for the next message
//! - [`Channel::exchange_message`]: send, then wait for the next message
//! - [`Channel::get_each_message`]: iterate messages until disconnection
//!
//! A channel is `NotRequested` when IPC was not enabled, `Connected` while
//! the transport is live, and `Disconnected` forever after the first of an
//! explicit [`Channel::disconnect`], transport EOF, or transport error.

mod adapter;
pub mod channel;
pub mod config;
pub mod error;
mod queue;
pub mod state;
pub mod stream;

pub use channel::Channel;
pub use config::{ChannelConfig, Side, StdioSlot, DEFAULT_MAX_BUFFERED_MESSAGES};
pub use error::{CallSite, ChannelError, Operation, Result};
pub use state::{ChannelState, DisconnectReason};
pub use stream::MessageStream;
pub use subipc_serial::{Profile, Value};
