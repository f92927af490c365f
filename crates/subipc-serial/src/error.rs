/// Errors raised while validating, encoding or decoding message values.
#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    /// The value holds a kind the profile cannot carry.
    #[error("{kind} cannot be serialized (at {path})")]
    Unsupported { kind: &'static str, path: String },

    /// The value graph loops back to one of its own ancestors.
    #[error("cyclic reference cannot be serialized (at {path})")]
    Cycle { path: String },

    /// The encoded message exceeds the frame payload limit.
    #[error("encoded message too large ({size} bytes, max {max})")]
    TooLarge { size: usize, max: usize },

    /// An inbound payload is not a well-formed encoding.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// JSON text could not be produced or parsed.
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    /// The profile name is not `advanced` or `json`.
    #[error("unknown serialization profile {0:?} (expected \"advanced\" or \"json\")")]
    UnknownProfile(String),
}

pub type Result<T> = std::result::Result<T, SerialError>;
