/// Errors from backend operations.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Transport, authentication or availability failure.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend rejected a name, metadata entry or size.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A stored object could not be decoded.
    #[error("corrupt object {name}: {reason}")]
    Corrupt { name: String, reason: String },

    /// I/O error from the underlying storage or the caller's reader/writer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;
