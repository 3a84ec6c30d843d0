use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid object name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

/// Result alias for type operations.
pub type TypeResult<T> = Result<T, TypeError>;
