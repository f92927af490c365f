/// Errors that can occur while creating or adopting a transport handle.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The inherited descriptor variable does not hold a descriptor number.
    #[error("invalid descriptor in {var}: {value:?}")]
    InvalidDescriptor { var: &'static str, value: String },

    /// The inherited descriptor is open but is not a socket.
    #[error("descriptor {0} is not a socket")]
    NotASocket(i32),

    /// The inherited descriptor was already taken over by this process.
    #[error("inherited channel descriptor already adopted")]
    AlreadyAdopted,
}

pub type Result<T> = std::result::Result<T, TransportError>;
