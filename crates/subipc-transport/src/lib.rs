//! Duplex transport handle for parent/subprocess messaging.
//!
//! The channel between a process and its subprocess is one end each of a
//! Unix socket pair. The parent keeps one end as an [`IpcStream`] and hands
//! the other to the subprocess as an inheritable descriptor, announced
//! through [`CHANNEL_FD_ENV`].
//!
//! This is the lowest layer of subipc. Everything else builds on top of
//! the [`IpcStream`] type provided here.

pub mod error;

#[cfg(unix)]
pub mod inherit;
#[cfg(unix)]
pub mod stream;

pub use error::{Result, TransportError};

#[cfg(unix)]
pub use inherit::{ipc_pair, ChildEnd, CHANNEL_FD_ENV, SERIALIZATION_ENV};
#[cfg(unix)]
pub use stream::IpcStream;
