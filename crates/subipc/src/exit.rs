use std::fmt;
use std::io;

use subipc_channel::ChannelError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound => USAGE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn channel_error(context: &str, err: ChannelError) -> CliError {
    let code = match &err {
        ChannelError::Configuration { .. } | ChannelError::Environment { .. } => USAGE,
        ChannelError::Serialization { .. } => DATA_INVALID,
        ChannelError::Lifecycle { .. } => FAILURE,
        ChannelError::Transport { .. } => TRANSPORT_ERROR,
    };
    CliError::new(code, format!("{context}: {err}"))
}

#[cfg(test)]
mod tests {
    use subipc_channel::{CallSite, Operation, Side};
    use subipc_serial::SerialError;

    use super::*;

    #[test]
    fn channel_errors_map_to_exit_codes() {
        let site = CallSite::new(Operation::SendMessage, Side::Subprocess);
        let cases = [
            (ChannelError::Configuration { site }, USAGE),
            (
                ChannelError::Lifecycle { site, reason: None },
                FAILURE,
            ),
            (
                ChannelError::Serialization {
                    site,
                    source: SerialError::Malformed("x".into()),
                },
                DATA_INVALID,
            ),
        ];
        for (err, code) in cases {
            let cli = channel_error("send failed", err);
            assert_eq!(cli.code, code);
            assert!(cli.message.starts_with("send failed: sendMessage()"));
        }
    }

    #[test]
    fn permission_denied_has_its_own_code() {
        let err = io_error("read", io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(err.code, PERMISSION_DENIED);
    }
}
