use subipc_frame::DEFAULT_MAX_PAYLOAD;
use subipc_serial::Profile;

/// Default number of delivered-but-unconsumed messages before reading pauses.
pub const DEFAULT_MAX_BUFFERED_MESSAGES: usize = 1024;

/// Which end of the channel this process holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Side {
    /// The process that spawned the subprocess.
    #[default]
    Parent,
    /// The spawned subprocess.
    Subprocess,
}

/// One entry of the subprocess stdio configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StdioSlot {
    Pipe,
    Inherit,
    Ignore,
    Ipc,
}

/// Channel configuration, fixed when the channel is created.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Whether IPC was requested. Only `Some(true)` enables the channel.
    pub ipc: Option<bool>,
    /// Serialization profile for every message in both directions.
    pub serialization: Profile,
    /// Stdio layout of the subprocess. Informational: an `Ipc` slot here
    /// does not enable the channel by itself.
    pub stdio: Vec<StdioSlot>,
    /// Selects how operations are named in errors.
    pub side: Side,
    /// Inbound queue length at which the transport stops being read.
    pub max_buffered_messages: usize,
    /// Largest encoded message accepted in either direction.
    pub max_payload_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            ipc: None,
            serialization: Profile::default(),
            stdio: Vec::new(),
            side: Side::default(),
            max_buffered_messages: DEFAULT_MAX_BUFFERED_MESSAGES,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

impl ChannelConfig {
    /// Configuration with IPC enabled and everything else defaulted.
    pub fn enabled() -> Self {
        Self::default().with_ipc(true)
    }

    pub fn with_ipc(mut self, ipc: bool) -> Self {
        self.ipc = Some(ipc);
        self
    }

    pub fn with_serialization(mut self, profile: Profile) -> Self {
        self.serialization = profile;
        self
    }

    pub fn with_stdio(mut self, stdio: impl IntoIterator<Item = StdioSlot>) -> Self {
        self.stdio = stdio.into_iter().collect();
        self
    }

    pub fn with_side(mut self, side: Side) -> Self {
        self.side = side;
        self
    }

    /// Override the inbound queue bound. Clamped to at least one message.
    pub fn with_max_buffered_messages(mut self, max: usize) -> Self {
        self.max_buffered_messages = max.max(1);
        self
    }

    pub fn with_max_payload_size(mut self, max: usize) -> Self {
        self.max_payload_size = max;
        self
    }

    /// True only when the `ipc` flag is explicitly set.
    pub fn ipc_enabled(&self) -> bool {
        self.ipc == Some(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_leave_ipc_off() {
        let config = ChannelConfig::default();
        assert!(!config.ipc_enabled());
        assert_eq!(config.serialization, Profile::Advanced);
        assert_eq!(config.side, Side::Parent);
        assert_eq!(config.max_buffered_messages, DEFAULT_MAX_BUFFERED_MESSAGES);
        assert_eq!(config.max_payload_size, DEFAULT_MAX_PAYLOAD);
    }

    #[test]
    fn ipc_stdio_slot_alone_does_not_enable() {
        let config = ChannelConfig::default().with_stdio([
            StdioSlot::Pipe,
            StdioSlot::Pipe,
            StdioSlot::Pipe,
            StdioSlot::Ipc,
        ]);
        assert!(!config.ipc_enabled());
        assert!(config.clone().with_ipc(true).ipc_enabled());
        assert!(!config.with_ipc(false).ipc_enabled());
    }

    #[test]
    fn buffer_bound_is_at_least_one() {
        assert_eq!(
            ChannelConfig::enabled()
                .with_max_buffered_messages(0)
                .max_buffered_messages,
            1
        );
    }
}
