use thiserror::Error;

/// Errors from cache slot operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Another handle holds the cache slot for this name.
    #[error("cache slot in use: {name}")]
    InUse { name: String },

    /// The manager has been shut down and no longer hands out slots.
    #[error("cache manager is shut down")]
    ShutDown,

    /// The slot was already released; its path is no longer valid.
    #[error("cache slot already released: {name}")]
    Released { name: String },

    /// Configuration could not be parsed.
    #[error("invalid cache configuration: {0}")]
    Config(String),

    /// Internal lock was poisoned by a panicking thread.
    #[error("cache state unavailable: {0}")]
    Poisoned(String),

    /// Local disk I/O failure (disk full, permissions, ...).
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
