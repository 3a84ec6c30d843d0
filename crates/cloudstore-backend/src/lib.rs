//! Remote backend contract for cloudstore.
//!
//! A backend is the transport half of a store: it moves whole objects
//! (bytes plus metadata) between a name-addressed remote namespace and a
//! local reader or writer. It knows nothing about caches, handles or
//! lifecycle state.
//!
//! # Storage Backends
//!
//! All backends implement the [`Backend`] trait:
//!
//! - [`InMemoryBackend`] -- `BTreeMap`-based backend for tests and embedding
//! - [`LocalFsBackend`] -- mirrors objects as files under a local directory
//!
//! # Contract
//!
//! 1. `put` is all-or-nothing: on error the previous object (or its absence)
//!    is left untouched.
//! 2. A missing object is `Ok(None)` / `Ok(false)`, never an error.
//! 3. `list` filters by prefix only; ordering and further filtering are the
//!    caller's job.
//! 4. Transport and authentication failures surface as
//!    [`BackendError::Unavailable`]; constraint violations as
//!    [`BackendError::InvalidArgument`].

pub mod error;
pub mod localfs;
pub mod memory;
pub mod traits;

pub use error::{BackendError, BackendResult};
pub use localfs::LocalFsBackend;
pub use memory::InMemoryBackend;
pub use traits::Backend;
