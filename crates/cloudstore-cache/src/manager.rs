//! Cache slot allocation and reclamation.
//!
//! [`CacheManager`] owns a cache root and a table of live slots. Each slot
//! is one exclusive local file for one `(scope, name)` pair. Managers are
//! shared per root across the whole process, so two stores configured with
//! the same root can never hand out the same file twice.

use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, Weak};
use std::time::{Duration, Instant};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::config::{CacheConfig, ContentionPolicy};
use crate::error::{CacheError, CacheResult};

/// File name prefix for in-progress downloads.
const STAGING_PREFIX: &str = ".staging-";

/// Live managers by canonical root. One root has at most one live slot
/// table per process.
static MANAGERS: OnceLock<Mutex<HashMap<PathBuf, Weak<CacheInner>>>> = OnceLock::new();

/// Distinguishes the files of successive managers over the same root.
static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

struct LiveEntry {
    generation: u64,
    path: PathBuf,
    name: String,
}

#[derive(Default)]
struct SlotTable {
    entries: HashMap<String, LiveEntry>,
    next_generation: u64,
    shut_down: bool,
}

struct CacheInner {
    root: PathBuf,
    instance: u64,
    contention: ContentionPolicy,
    table: Mutex<SlotTable>,
    /// Signalled whenever an entry leaves the table.
    freed: Condvar,
}

impl CacheInner {
    fn lock(&self) -> CacheResult<MutexGuard<'_, SlotTable>> {
        self.table
            .lock()
            .map_err(|e| CacheError::Poisoned(format!("lock poisoned: {e}")))
    }

    fn is_live(&self, key: &str, generation: u64) -> CacheResult<bool> {
        let table = self.lock()?;
        Ok(table
            .entries
            .get(key)
            .is_some_and(|e| e.generation == generation))
    }

    /// Remove the entry for `key` if it still belongs to `generation`.
    ///
    /// The file is removed before the entry, so a failed removal leaves the
    /// slot held and the release can be retried.
    fn release_generation(&self, key: &str, generation: u64) -> CacheResult<bool> {
        let mut table = self.lock()?;
        let path = match table.entries.get(key) {
            Some(entry) if entry.generation == generation => entry.path.clone(),
            _ => return Ok(false),
        };

        remove_if_exists(&path)?;
        if let Some(entry) = table.entries.remove(key) {
            debug!(name = %entry.name, path = %entry.path.display(), "cache slot released");
        }
        drop(table);
        self.freed.notify_all();
        Ok(true)
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Hex digest identifying a `(scope, name)` pair. Flat, so nested object
/// names never create directories in the cache root.
fn slot_key(scope: &str, name: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(scope.as_bytes());
    hasher.update(&[0]);
    hasher.update(name.as_bytes());
    hex::encode(&hasher.finalize().as_bytes()[..16])
}

/// Allocates, tracks and reclaims local cache files.
///
/// Cloning is cheap and every clone shares the same slot table, so one
/// manager can be handed to any number of stores. Allocation and reclamation
/// for a name happen inside a single critical section.
#[derive(Clone)]
pub struct CacheManager {
    inner: Arc<CacheInner>,
}

impl CacheManager {
    /// Create the cache root and return the manager for it.
    ///
    /// Managers are process-wide per root: a second `init` for a root that
    /// already has a live manager returns that manager, keeping its
    /// contention policy and skipping `purge_on_init`.
    pub fn init(config: CacheConfig) -> CacheResult<Self> {
        fs::create_dir_all(&config.root)?;
        let root = fs::canonicalize(&config.root)?;

        let mut managers = MANAGERS
            .get_or_init(Default::default)
            .lock()
            .map_err(|e| CacheError::Poisoned(format!("lock poisoned: {e}")))?;
        managers.retain(|_, inner| inner.strong_count() > 0);

        if let Some(inner) = managers.get(&root).and_then(Weak::upgrade) {
            if !inner.lock()?.shut_down {
                if inner.contention != config.contention {
                    warn!(root = %root.display(), "cache already initialized with a different contention policy");
                }
                debug!(root = %root.display(), "joined live cache manager");
                return Ok(Self { inner });
            }
        }

        if config.purge_on_init {
            let mut purged = 0usize;
            for entry in fs::read_dir(&root)? {
                let entry = entry?;
                if entry.file_type()?.is_file() {
                    remove_if_exists(&entry.path())?;
                    purged += 1;
                }
            }
            debug!(purged, "purged leftover cache files");
        }

        let inner = Arc::new(CacheInner {
            root: root.clone(),
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
            contention: config.contention,
            table: Mutex::new(SlotTable::default()),
            freed: Condvar::new(),
        });
        managers.insert(root, Arc::downgrade(&inner));
        drop(managers);

        info!(root = %inner.root.display(), "cache initialized");
        Ok(Self { inner })
    }

    /// Acquire the cache slot for `name` within `scope`.
    ///
    /// `scope` identifies the backend instance, so the same name in two
    /// different stores gets two independent slots. If the slot is held,
    /// the configured [`ContentionPolicy`] decides between failing with
    /// `InUse` and waiting for it.
    pub fn acquire(&self, scope: &str, name: &str) -> CacheResult<CacheSlot> {
        let key = slot_key(scope, name);
        let deadline = match self.inner.contention {
            ContentionPolicy::Fail => None,
            ContentionPolicy::Wait { timeout_ms } => {
                Some(Instant::now() + Duration::from_millis(timeout_ms))
            }
        };

        let mut table = self.inner.lock()?;
        loop {
            if table.shut_down {
                return Err(CacheError::ShutDown);
            }
            if !table.entries.contains_key(&key) {
                break;
            }
            let in_use = || CacheError::InUse {
                name: name.to_string(),
            };
            let Some(deadline) = deadline else {
                return Err(in_use());
            };
            let now = Instant::now();
            if now >= deadline {
                return Err(in_use());
            }
            let (guard, _) = self
                .inner
                .freed
                .wait_timeout(table, deadline - now)
                .map_err(|e| CacheError::Poisoned(format!("lock poisoned: {e}")))?;
            table = guard;
        }

        table.next_generation += 1;
        let generation = table.next_generation;
        let path = self
            .inner
            .root
            .join(format!("{key}-{}-{generation}", self.inner.instance));
        table.entries.insert(
            key.clone(),
            LiveEntry {
                generation,
                path: path.clone(),
                name: name.to_string(),
            },
        );
        drop(table);

        debug!(scope, name, path = %path.display(), "cache slot acquired");
        Ok(CacheSlot {
            inner: Arc::clone(&self.inner),
            key,
            generation,
            path,
            name: name.to_string(),
            released: false,
        })
    }

    /// Release the slot whose file lives at `path`.
    ///
    /// Unknown or already-released paths are a no-op.
    pub fn release(&self, path: &Path) -> CacheResult<()> {
        let found = {
            let table = self.inner.lock()?;
            table
                .entries
                .iter()
                .find(|(_, e)| e.path == path)
                .map(|(k, e)| (k.clone(), e.generation))
        };
        if let Some((key, generation)) = found {
            self.inner.release_generation(&key, generation)?;
        }
        Ok(())
    }

    /// Reclaim every live slot and refuse further acquisitions.
    ///
    /// Returns the number of slots reclaimed. Outstanding [`CacheSlot`]s
    /// become inert: releasing them afterwards is a no-op.
    pub fn shutdown(&self) -> CacheResult<usize> {
        let mut table = self.inner.lock()?;
        table.shut_down = true;
        let entries: Vec<LiveEntry> = table.entries.drain().map(|(_, e)| e).collect();

        let mut first_err = None;
        for entry in &entries {
            if let Err(e) = remove_if_exists(&entry.path) {
                warn!(name = %entry.name, error = %e, "failed to remove cache file during shutdown");
                first_err.get_or_insert(e);
            }
        }
        drop(table);
        self.inner.freed.notify_all();

        info!(reclaimed = entries.len(), "cache shut down");
        match first_err {
            Some(e) => Err(e.into()),
            None => Ok(entries.len()),
        }
    }

    /// Number of slots currently held.
    pub fn live_entries(&self) -> usize {
        self.inner.lock().map(|t| t.entries.len()).unwrap_or(0)
    }

    /// Whether a slot for `(scope, name)` is currently held.
    pub fn is_held(&self, scope: &str, name: &str) -> bool {
        let key = slot_key(scope, name);
        self.inner
            .lock()
            .map(|t| t.entries.contains_key(&key))
            .unwrap_or(false)
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub fn contention(&self) -> &ContentionPolicy {
        &self.inner.contention
    }
}

impl fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheManager")
            .field("root", &self.inner.root)
            .field("live_entries", &self.live_entries())
            .finish()
    }
}

/// Exclusive ownership of one cache location.
///
/// The slot is released exactly once: explicitly via [`CacheSlot::release`],
/// through [`CacheManager::release`], or when dropped.
pub struct CacheSlot {
    inner: Arc<CacheInner>,
    key: String,
    generation: u64,
    path: PathBuf,
    name: String,
    released: bool,
}

impl CacheSlot {
    /// Location of the cache file. Only meaningful while the slot is live.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Object name the slot was acquired for.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Whether the cache file has been materialized.
    pub fn exists(&self) -> bool {
        !self.released && self.path.exists()
    }

    /// Create a staging file next to the slot. Dropping it without
    /// [`commit`](Self::commit) deletes it.
    pub fn stage(&self) -> CacheResult<NamedTempFile> {
        self.ensure_live()?;
        Ok(tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempfile_in(&self.inner.root)?)
    }

    /// Atomically move a fully written staging file into the slot path.
    pub fn commit(&self, staged: NamedTempFile) -> CacheResult<()> {
        self.ensure_live()?;
        staged.as_file().sync_all()?;
        staged.persist(&self.path).map_err(|e| CacheError::Io(e.error))?;
        Ok(())
    }

    /// Open the materialized cache file.
    pub fn open(&self, writable: bool) -> CacheResult<File> {
        self.ensure_live()?;
        Ok(OpenOptions::new()
            .read(true)
            .write(writable)
            .open(&self.path)?)
    }

    /// Remove the cache file and free the slot. Idempotent.
    pub fn release(&mut self) -> CacheResult<()> {
        if self.released {
            return Ok(());
        }
        self.inner.release_generation(&self.key, self.generation)?;
        self.released = true;
        Ok(())
    }

    fn ensure_live(&self) -> CacheResult<()> {
        if self.released || !self.inner.is_live(&self.key, self.generation)? {
            return Err(CacheError::Released {
                name: self.name.clone(),
            });
        }
        Ok(())
    }
}

impl Drop for CacheSlot {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(name = %self.name, error = %e, "failed to release cache slot on drop");
        }
    }
}

impl fmt::Debug for CacheSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheSlot")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("released", &self.released)
            .finish()
    }
}
