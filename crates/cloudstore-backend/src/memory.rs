//! In-memory backend for tests and ephemeral use.
//!
//! [`InMemoryBackend`] keeps every object in a `BTreeMap` behind a
//! `RwLock`. A put reads its whole source before replacing the entry, so a
//! failed upload never changes what readers see.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use cloudstore_types::{MetaData, ObjectInfo};

use crate::error::{BackendError, BackendResult};
use crate::traits::Backend;

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

struct StoredEntry {
    data: Vec<u8>,
    info: ObjectInfo,
}

/// In-memory, `BTreeMap`-based backend.
///
/// Intended for tests and embedding. Objects live behind a `RwLock`; `put`
/// buffers the whole source before swapping the entry in, which makes it
/// atomic with respect to concurrent readers.
pub struct InMemoryBackend {
    label: String,
    objects: RwLock<BTreeMap<String, StoredEntry>>,
}

impl InMemoryBackend {
    /// Create an empty backend with a process-unique label.
    pub fn new() -> Self {
        let n = NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed);
        Self::with_label(format!("instance-{n}"))
    }

    /// Create an empty backend with an explicit label.
    pub fn with_label(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.read_map().map(|m| m.len()).unwrap_or(0)
    }

    /// Returns `true` if the backend is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total content bytes across all stored objects.
    pub fn total_bytes(&self) -> u64 {
        self.read_map()
            .map(|m| m.values().map(|e| e.info.size).sum())
            .unwrap_or(0)
    }

    /// Raw content of an object, bypassing the streaming interface.
    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.read_map().ok()?.get(name).map(|e| e.data.clone())
    }

    /// Remove all objects.
    pub fn clear(&self) {
        if let Ok(mut map) = self.write_map() {
            map.clear();
        }
    }

    fn read_map(&self) -> BackendResult<RwLockReadGuard<'_, BTreeMap<String, StoredEntry>>> {
        self.objects
            .read()
            .map_err(|e| BackendError::Unavailable(format!("lock poisoned: {e}")))
    }

    fn write_map(&self) -> BackendResult<RwLockWriteGuard<'_, BTreeMap<String, StoredEntry>>> {
        self.objects
            .write()
            .map_err(|e| BackendError::Unavailable(format!("lock poisoned: {e}")))
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for InMemoryBackend {
    fn id(&self) -> String {
        format!("memory://{}", self.label)
    }

    fn head(&self, name: &str) -> BackendResult<Option<ObjectInfo>> {
        Ok(self.read_map()?.get(name).map(|e| e.info.clone()))
    }

    fn fetch(&self, name: &str, sink: &mut dyn Write) -> BackendResult<Option<ObjectInfo>> {
        // Copy out under the lock, write after releasing it.
        let (data, info) = match self.read_map()?.get(name) {
            Some(entry) => (entry.data.clone(), entry.info.clone()),
            None => return Ok(None),
        };
        sink.write_all(&data)?;
        Ok(Some(info))
    }

    fn put(
        &self,
        name: &str,
        source: &mut dyn Read,
        metadata: &MetaData,
    ) -> BackendResult<ObjectInfo> {
        if name.is_empty() {
            return Err(BackendError::InvalidArgument("object name must not be empty".into()));
        }

        let mut data = Vec::new();
        source.read_to_end(&mut data)?;

        let info = ObjectInfo::new(name, data.len() as u64, Utc::now())
            .with_etag(blake3::hash(&data).to_hex().to_string())
            .with_metadata(metadata.clone());

        self.write_map()?.insert(
            name.to_string(),
            StoredEntry {
                data,
                info: info.clone(),
            },
        );
        Ok(info)
    }

    fn delete(&self, name: &str) -> BackendResult<bool> {
        Ok(self.write_map()?.remove(name).is_some())
    }

    fn list(&self, prefix: &str) -> BackendResult<Vec<ObjectInfo>> {
        let map = self.read_map()?;
        Ok(map
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(_, e)| e.info.clone())
            .collect())
    }

    fn exists(&self, name: &str) -> BackendResult<bool> {
        Ok(self.read_map()?.contains_key(name))
    }
}

impl std::fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBackend")
            .field("label", &self.label)
            .field("object_count", &self.len())
            .finish()
    }
}
