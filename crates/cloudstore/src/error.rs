use std::io;

use cloudstore_backend::BackendError;
use cloudstore_cache::CacheError;
use cloudstore_types::TypeError;
use thiserror::Error;

/// Errors from store and object operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No remote object with this name exists.
    #[error("object not found: {name}")]
    NotFound { name: String },

    /// `new_object` was called for a name that already exists remotely.
    #[error("object already exists: {name}")]
    AlreadyExists { name: String },

    /// `open` was called on a handle that is already open.
    #[error("object already open: {name}")]
    AlreadyOpen { name: String },

    /// The operation needs an open handle.
    #[error("object not open: {name}")]
    NotOpen { name: String },

    /// The handle was opened read-only.
    #[error("object opened read-only: {name}")]
    NotWritable { name: String },

    /// Another handle holds the cache slot for this name.
    #[error("object in use by another handle: {name}")]
    InUse { name: String },

    /// Pushing to the backend failed. The remote object is unchanged and the
    /// handle stays dirty, so the sync can be retried.
    #[error("sync failed for {name}: {source}")]
    SyncFailed {
        name: String,
        #[source]
        source: BackendError,
    },

    /// Transport or authentication failure talking to the backend.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(#[source] BackendError),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("invalid object name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// The backend (or a configured limit) rejected an argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The handle was released and can no longer be opened.
    #[error("object handle released: {name}")]
    Released { name: String },

    /// `release` was called before `close`.
    #[error("object still open, close before releasing: {name}")]
    StillOpen { name: String },

    /// Local cache bookkeeping failure.
    #[error("cache error: {0}")]
    Cache(#[source] CacheError),

    /// Local cache file I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Flat classification of [`StoreError`] for callers that only care about
/// the kind of failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    AlreadyOpen,
    NotOpen,
    NotWritable,
    InUse,
    SyncFailed,
    BackendUnavailable,
    InvalidQuery,
    InvalidName,
    InvalidArgument,
    Released,
    StillOpen,
    Cache,
    Io,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::AlreadyOpen { .. } => ErrorKind::AlreadyOpen,
            Self::NotOpen { .. } => ErrorKind::NotOpen,
            Self::NotWritable { .. } => ErrorKind::NotWritable,
            Self::InUse { .. } => ErrorKind::InUse,
            Self::SyncFailed { .. } => ErrorKind::SyncFailed,
            Self::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            Self::InvalidQuery(_) => ErrorKind::InvalidQuery,
            Self::InvalidName { .. } => ErrorKind::InvalidName,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Released { .. } => ErrorKind::Released,
            Self::StillOpen { .. } => ErrorKind::StillOpen,
            Self::Cache(_) => ErrorKind::Cache,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

impl From<BackendError> for StoreError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::InvalidArgument(msg) => Self::InvalidArgument(msg),
            other => Self::BackendUnavailable(other),
        }
    }
}

impl From<CacheError> for StoreError {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::InUse { name } => Self::InUse { name },
            CacheError::Io(io) => Self::Io(io),
            other => Self::Cache(other),
        }
    }
}

impl From<TypeError> for StoreError {
    fn from(e: TypeError) -> Self {
        match e {
            TypeError::InvalidName { name, reason } => Self::InvalidName { name, reason },
            TypeError::InvalidQuery(msg) => Self::InvalidQuery(msg),
        }
    }
}

impl From<StoreError> for io::Error {
    fn from(e: StoreError) -> Self {
        let kind = match &e {
            StoreError::Io(inner) => inner.kind(),
            StoreError::NotFound { .. } => io::ErrorKind::NotFound,
            StoreError::AlreadyExists { .. } => io::ErrorKind::AlreadyExists,
            StoreError::NotWritable { .. } => io::ErrorKind::PermissionDenied,
            StoreError::InvalidName { .. }
            | StoreError::InvalidQuery(_)
            | StoreError::InvalidArgument(_) => io::ErrorKind::InvalidInput,
            _ => io::ErrorKind::Other,
        };
        match e {
            StoreError::Io(inner) => inner,
            other => io::Error::new(kind, other),
        }
    }
}
