//! Cached object storage.
//!
//! `cloudstore` gives callers file-like handles to objects held by a remote
//! [`Backend`]. Every opened handle works against an exclusive local copy
//! managed by a [`CacheManager`]; content travels to and from the backend
//! only when a handle is opened, synced, or closed.
//!
//! ```
//! use std::sync::Arc;
//!
//! use cloudstore::{CachedStore, MetaData, Store, StoreConfig};
//! use cloudstore_backend::InMemoryBackend;
//! use cloudstore_cache::CacheConfig;
//!
//! # fn main() -> Result<(), cloudstore::StoreError> {
//! let root = std::env::temp_dir().join(format!("cloudstore-doc-{}", std::process::id()));
//! let store = CachedStore::open(
//!     Arc::new(InMemoryBackend::new()),
//!     StoreConfig::new(CacheConfig::new(&root)),
//! )?;
//!
//! store.write_object("a/b.txt", &MetaData::new().with(MetaData::CONTENT_TYPE_KEY, "text/plain"), b"hello")?;
//!
//! let mut object = store.get_and_open("a/b.txt", true)?;
//! let mut body = Vec::new();
//! object.read_to_end(&mut body)?;
//! assert_eq!(body, b"hello");
//! object.close()?;
//! object.release()?;
//! # store.cache().shutdown().ok();
//! # std::fs::remove_dir_all(&root).ok();
//! # Ok(())
//! # }
//! ```
//!
//! # Lifecycle
//!
//! | State           | Local copy | Reads | Writes |
//! |-----------------|------------|-------|--------|
//! | `Unopened`      | no         | no    | no     |
//! | `OpenReadOnly`  | yes        | yes   | no     |
//! | `OpenReadWrite` | yes        | yes   | yes    |
//! | `Closed`        | yes        | no    | no     |
//! | `Released`      | no         | no    | no     |
//!
//! A handle is dirty when its local copy or metadata differ from what was
//! last pushed. `close` pushes a dirty handle; a failed push leaves the
//! handle open and dirty so it can be retried.

pub mod config;
pub mod error;
pub mod object;
pub mod objects;
pub mod store;

pub use config::StoreConfig;
pub use error::{ErrorKind, StoreError, StoreResult};
pub use object::{CacheState, CachedCopy, Object};
pub use objects::Objects;
pub use store::{CachedStore, Store};

pub use cloudstore_backend::Backend;
pub use cloudstore_cache::CacheManager;
pub use cloudstore_types::{MetaData, ObjectInfo, Query};
