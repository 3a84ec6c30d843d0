//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use cloudstore::{CachedStore, MetaData, ObjectInfo, StoreConfig};
use cloudstore_backend::{Backend, BackendError, BackendResult, InMemoryBackend};
use cloudstore_cache::CacheConfig;
use tempfile::TempDir;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// In-memory backend with switchable failures.
///
/// Failed fetches write half the content before erroring; failed puts
/// consume part of the source. Both exercise partial-transfer cleanup.
#[derive(Default)]
pub struct FaultyBackend {
    pub inner: InMemoryBackend,
    pub fail_fetch: AtomicBool,
    pub fail_put: AtomicBool,
    pub fetches: AtomicUsize,
    pub puts: AtomicUsize,
}

impl FaultyBackend {
    pub fn set_fail_fetch(&self, on: bool) {
        self.fail_fetch.store(on, Ordering::SeqCst);
    }

    pub fn set_fail_put(&self, on: bool) {
        self.fail_put.store(on, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.inner.contents(name)
    }
}

impl Backend for FaultyBackend {
    fn id(&self) -> String {
        format!("faulty+{}", self.inner.id())
    }

    fn head(&self, name: &str) -> BackendResult<Option<ObjectInfo>> {
        self.inner.head(name)
    }

    fn fetch(&self, name: &str, sink: &mut dyn Write) -> BackendResult<Option<ObjectInfo>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            if let Some(data) = self.inner.contents(name) {
                sink.write_all(&data[..data.len() / 2])?;
            }
            return Err(BackendError::Unavailable("injected fetch failure".into()));
        }
        self.inner.fetch(name, sink)
    }

    fn put(&self, name: &str, source: &mut dyn Read, metadata: &MetaData) -> BackendResult<ObjectInfo> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_put.load(Ordering::SeqCst) {
            let mut buf = [0u8; 2];
            let _ = source.read(&mut buf)?;
            return Err(BackendError::Unavailable("injected put failure".into()));
        }
        self.inner.put(name, source, metadata)
    }

    fn delete(&self, name: &str) -> BackendResult<bool> {
        self.inner.delete(name)
    }

    fn list(&self, prefix: &str) -> BackendResult<Vec<ObjectInfo>> {
        self.inner.list(prefix)
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub backend: Arc<FaultyBackend>,
    pub store: CachedStore,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(|c| c)
    }

    pub fn with_config(f: impl FnOnce(StoreConfig) -> StoreConfig) -> Self {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FaultyBackend::default());
        let config = f(StoreConfig::new(CacheConfig::new(dir.path().join("cache"))));
        let store = CachedStore::open(backend.clone(), config).unwrap();
        Self { dir, backend, store }
    }

    pub fn cache_root(&self) -> PathBuf {
        self.dir.path().join("cache")
    }

    /// Every file currently in the cache root, staging files included.
    pub fn cache_files(&self) -> Vec<PathBuf> {
        files_in(&self.cache_root())
    }
}

pub fn files_in(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect()
}
