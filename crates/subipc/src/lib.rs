//! Message channel between a process and the subprocess it spawned.
//!
//! subipc layers a message-oriented channel over an inherited duplex
//! socket: the parent sends and receives [`Value`]s, the subprocess does
//! the same from its side, and disconnection on either side turns into
//! precise errors for whatever is still pending.
//!
//! # Crate Structure
//!
//! - [`transport`]: socket pair creation and descriptor inheritance
//! - [`frame`]: length-prefixed frames tagged with the payload encoding
//! - [`serial`]: the value model, serialization profiles and validation
//! - [`channel`]: lifecycle, message queue and the public access API
//!
//! ```no_run
//! # async fn demo() -> subipc::channel::Result<()> {
//! use subipc::{Channel, Value};
//!
//! // Inside a subprocess started with an IPC channel.
//! let channel = Channel::from_env()?;
//! let request = channel.get_one_message().await?;
//! channel
//!     .send_message(Value::object([("echo", request)]))
//!     .await?;
//! channel.disconnect().await;
//! # Ok(())
//! # }
//! ```

/// Re-export transport types.
pub mod transport {
    pub use subipc_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use subipc_frame::*;
}

/// Re-export value model and serialization profiles.
pub mod serial {
    pub use subipc_serial::*;
}

/// Re-export channel types.
pub mod channel {
    pub use subipc_channel::*;
}

pub use subipc_channel::{
    Channel, ChannelConfig, ChannelError, ChannelState, DisconnectReason, MessageStream, Side,
};
pub use subipc_serial::{Profile, Value};
