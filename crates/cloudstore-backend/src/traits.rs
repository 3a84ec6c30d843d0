//! The backend contract every remote store adapter implements.

use std::io::{Read, Write};

use cloudstore_types::{MetaData, ObjectInfo};

use crate::error::BackendResult;

/// Name-addressed remote object storage.
///
/// All implementations must satisfy these invariants:
/// - `put` is atomic. Readers observe either the previous object or the new
///   one, never a mix of old metadata and new bytes or a truncated body.
/// - Absence is reported as `None`/`false`, not as an error.
/// - Operations on different names are independent; concurrent calls are
///   safe (`Send + Sync`).
pub trait Backend: Send + Sync {
    /// Stable identity of this backend instance (storage class, location).
    ///
    /// Used for diagnostics and as the cache scope, so two instances
    /// pointing at different namespaces must return different ids.
    fn id(&self) -> String;

    /// Describe an object without transferring its content.
    fn head(&self, name: &str) -> BackendResult<Option<ObjectInfo>>;

    /// Stream the object's content into `sink` and return its description.
    ///
    /// Returns `Ok(None)` without touching `sink` if the object does not
    /// exist. On error `sink` may have received a prefix of the content.
    fn fetch(&self, name: &str, sink: &mut dyn Write) -> BackendResult<Option<ObjectInfo>>;

    /// Create or replace an object with the content read from `source`.
    fn put(&self, name: &str, source: &mut dyn Read, metadata: &MetaData)
        -> BackendResult<ObjectInfo>;

    /// Delete an object. Returns `true` if the object existed.
    fn delete(&self, name: &str) -> BackendResult<bool>;

    /// Describe every object whose name starts with `prefix`, in any order.
    fn list(&self, prefix: &str) -> BackendResult<Vec<ObjectInfo>>;

    /// Check whether an object exists.
    ///
    /// Default implementation calls `head()`. Backends may override with a
    /// cheaper probe.
    fn exists(&self, name: &str) -> BackendResult<bool> {
        Ok(self.head(name)?.is_some())
    }
}
