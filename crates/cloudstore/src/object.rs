//! Object handles and their cache lifecycle.
//!
//! An [`Object`] is a handle to one named remote object. Opening it pulls
//! the remote bytes into an exclusive local cache slot; reads and writes go
//! to that local copy; [`Object::sync`] and [`Object::close`] push the copy
//! back. Nothing crosses the network except inside `open`, `sync` and
//! `close`.
//!
//! ```text
//!   Unopened --open(ro)--> OpenReadOnly  --close--> Closed --release--> Released
//!   Unopened --open(rw)--> OpenReadWrite --close--> Closed --open-->    Open*
//! ```

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use cloudstore_backend::BackendError;
use cloudstore_cache::CacheSlot;
use cloudstore_types::{MetaData, ObjectInfo};
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::store::StoreShared;

/// Where an object handle is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheState {
    /// No local copy exists.
    Unopened,
    /// Local copy present; reads allowed, writes rejected.
    OpenReadOnly,
    /// Local copy present; reads and writes allowed.
    OpenReadWrite,
    /// Local copy retained and in sync with the remote; no I/O allowed
    /// until reopened.
    Closed,
    /// Local copy discarded. Terminal.
    Released,
}

impl CacheState {
    pub fn is_open(self) -> bool {
        matches!(self, Self::OpenReadOnly | Self::OpenReadWrite)
    }

    /// Whether a local cache file exists in this state.
    pub fn has_cache(self) -> bool {
        matches!(self, Self::OpenReadOnly | Self::OpenReadWrite | Self::Closed)
    }
}

impl fmt::Display for CacheState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unopened => "unopened",
            Self::OpenReadOnly => "open-ro",
            Self::OpenReadWrite => "open-rw",
            Self::Closed => "closed",
            Self::Released => "released",
        };
        f.write_str(s)
    }
}

/// How [`Object::open`] seeds the local copy.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Seed {
    /// Download the remote content.
    Remote,
    /// Start from an empty file.
    Empty,
}

/// A handle to one named object in a store.
///
/// Handles are not shared between threads; give each thread its own handle.
/// Two handles for the same name cannot be open at once within one cache.
pub struct Object {
    shared: Arc<StoreShared>,
    name: String,
    metadata: MetaData,
    /// Metadata was set locally and has not been pushed yet.
    metadata_staged: bool,
    info: Option<ObjectInfo>,
    state: CacheState,
    slot: Option<CacheSlot>,
    file: Option<File>,
    dirty: bool,
}

impl Object {
    pub(crate) fn new(shared: Arc<StoreShared>, name: String, info: Option<ObjectInfo>) -> Self {
        let metadata = info
            .as_ref()
            .map(|i| i.metadata.clone())
            .unwrap_or_default();
        Self {
            shared,
            name,
            metadata,
            metadata_staged: false,
            info,
            state: CacheState::Unopened,
            slot: None,
            file: None,
            dirty: false,
        }
    }

    // ----------------------------------------------------------------
    // Accessors
    // ----------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifier of the backend this object lives in.
    pub fn storage_source(&self) -> String {
        self.shared.backend.id()
    }

    /// The handle's current metadata. Reflects local changes made through
    /// [`set_metadata`](Self::set_metadata) before they are synced.
    pub fn metadata(&self) -> &MetaData {
        &self.metadata
    }

    pub fn state(&self) -> CacheState {
        self.state
    }

    /// Whether local changes exist that the remote has not seen.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Last known remote modification time.
    pub fn updated(&self) -> Option<DateTime<Utc>> {
        self.info.as_ref().map(|i| i.updated)
    }

    /// Last known remote size in bytes.
    pub fn size(&self) -> Option<u64> {
        self.info.as_ref().map(|i| i.size)
    }

    pub fn etag(&self) -> Option<&str> {
        self.info.as_ref().and_then(|i| i.etag.as_deref())
    }

    /// Everything last reported by the backend for this object.
    pub fn info(&self) -> Option<&ObjectInfo> {
        self.info.as_ref()
    }

    /// Local cache file location while one exists. `None` once the cache
    /// manager has reclaimed the file, even for a closed handle.
    pub fn cached_path(&self) -> Option<&Path> {
        if !self.state.has_cache() {
            return None;
        }
        self.slot
            .as_ref()
            .filter(|slot| slot.exists())
            .map(CacheSlot::path)
    }

    // ----------------------------------------------------------------
    // Metadata
    // ----------------------------------------------------------------

    /// Replace the object's metadata locally.
    ///
    /// The new metadata reaches the remote at the next sync. On a handle
    /// open read-write this marks the object dirty.
    pub fn set_metadata(&mut self, metadata: MetaData) -> StoreResult<()> {
        if self.state == CacheState::Released {
            return Err(self.released());
        }
        self.metadata = metadata;
        self.metadata_staged = true;
        if self.state == CacheState::OpenReadWrite {
            self.dirty = true;
        }
        Ok(())
    }

    // ----------------------------------------------------------------
    // Lifecycle
    // ----------------------------------------------------------------

    /// Open the object, pulling the remote content into the local cache.
    ///
    /// A closed handle reopens its retained copy without downloading again.
    /// A read-write open of a name with no remote object starts from empty
    /// content and is dirty, so closing it creates the object. On failure
    /// no cache slot is held and the state is unchanged.
    pub fn open(&mut self, readonly: bool) -> StoreResult<()> {
        match self.state {
            CacheState::Unopened => self.open_fresh(readonly, Seed::Remote),
            CacheState::Closed => self.reopen(readonly),
            CacheState::OpenReadOnly | CacheState::OpenReadWrite => Err(StoreError::AlreadyOpen {
                name: self.name.clone(),
            }),
            CacheState::Released => Err(self.released()),
        }
    }

    /// Open read-write with empty content, skipping the download.
    pub(crate) fn open_truncated(&mut self) -> StoreResult<()> {
        match self.state {
            CacheState::Unopened => self.open_fresh(false, Seed::Empty),
            CacheState::Released => Err(self.released()),
            _ => Err(StoreError::AlreadyOpen {
                name: self.name.clone(),
            }),
        }
    }

    fn open_fresh(&mut self, readonly: bool, seed: Seed) -> StoreResult<()> {
        let mut slot = self.shared.cache.acquire(&self.shared.scope, &self.name)?;
        match self.populate(&slot, readonly, seed) {
            Ok(file) => {
                self.slot = Some(slot);
                self.file = Some(file);
                self.state = if readonly {
                    CacheState::OpenReadOnly
                } else {
                    CacheState::OpenReadWrite
                };
                debug!(name = %self.name, state = %self.state, dirty = self.dirty, "object opened");
                Ok(())
            }
            Err(e) => {
                if let Err(release_err) = slot.release() {
                    warn!(name = %self.name, error = %release_err, "failed to release cache slot after open failure");
                }
                Err(e)
            }
        }
    }

    /// Fill the slot and open the cache file. Only touches `self` once
    /// nothing else can fail.
    fn populate(&mut self, slot: &CacheSlot, readonly: bool, seed: Seed) -> StoreResult<File> {
        let mut staged = slot.stage()?;
        let remote = match seed {
            Seed::Remote => self.shared.backend.fetch(&self.name, &mut staged)?,
            Seed::Empty => None,
        };

        if remote.is_none() && readonly {
            return Err(StoreError::NotFound {
                name: self.name.clone(),
            });
        }

        slot.commit(staged)?;
        let file = slot.open(!readonly)?;

        match remote {
            Some(info) => {
                debug!(name = %self.name, bytes = info.size, "pulled object into cache");
                if !self.metadata_staged {
                    self.metadata = info.metadata.clone();
                }
                self.info = Some(info);
                self.dirty = !readonly && self.metadata_staged;
            }
            None => self.dirty = true,
        }
        Ok(file)
    }

    fn reopen(&mut self, readonly: bool) -> StoreResult<()> {
        let file = match self.slot.as_ref() {
            Some(slot) => slot.open(!readonly)?,
            None => return Err(self.released()),
        };
        self.file = Some(file);
        self.dirty = !readonly && self.metadata_staged;
        self.state = if readonly {
            CacheState::OpenReadOnly
        } else {
            CacheState::OpenReadWrite
        };
        debug!(name = %self.name, state = %self.state, "object reopened from cache");
        Ok(())
    }

    /// Read from the local copy at the current position.
    pub fn read(&mut self, buf: &mut [u8]) -> StoreResult<usize> {
        let file = self.open_file()?;
        Ok(file.read(buf)?)
    }

    /// Read the rest of the local copy from the current position.
    pub fn read_to_end(&mut self, buf: &mut Vec<u8>) -> StoreResult<usize> {
        let file = self.open_file()?;
        Ok(file.read_to_end(buf)?)
    }

    /// Write to the local copy at the current position. Marks the object
    /// dirty; nothing is pushed until [`sync`](Self::sync) or
    /// [`close`](Self::close).
    pub fn write(&mut self, buf: &[u8]) -> StoreResult<usize> {
        let file = self.writable_file()?;
        let n = file.write(buf)?;
        self.dirty = true;
        Ok(n)
    }

    pub fn write_all(&mut self, buf: &[u8]) -> StoreResult<()> {
        let file = self.writable_file()?;
        file.write_all(buf)?;
        self.dirty = true;
        Ok(())
    }

    pub fn seek(&mut self, pos: SeekFrom) -> StoreResult<u64> {
        let file = self.open_file()?;
        Ok(file.seek(pos)?)
    }

    /// Truncate or extend the local copy.
    pub fn set_len(&mut self, len: u64) -> StoreResult<()> {
        let file = self.writable_file()?;
        file.set_len(len)?;
        self.dirty = true;
        Ok(())
    }

    /// Push the local copy and metadata to the remote.
    ///
    /// On success the object is clean. On failure the remote object is
    /// untouched and the handle stays open and dirty, so the sync can be
    /// retried. Transfer failures surface as `SyncFailed`; a name or size
    /// the backend refuses surfaces as `InvalidArgument`.
    pub fn sync(&mut self) -> StoreResult<()> {
        self.writable_file()?.sync_all()?;

        let source = match self.slot.as_ref() {
            Some(slot) => slot.open(false)?,
            None => return Err(self.not_open()),
        };
        let len = source.metadata()?.len();
        if let Some(max) = self.shared.config.max_object_bytes {
            if len > max {
                return Err(StoreError::InvalidArgument(format!(
                    "{} is {len} bytes, larger than the configured maximum of {max}",
                    self.name
                )));
            }
        }

        let mut reader = BufReader::new(source);
        match self
            .shared
            .backend
            .put(&self.name, &mut reader, &self.metadata)
        {
            Ok(info) => {
                info!(name = %self.name, bytes = info.size, "object synced");
                self.info = Some(info);
                self.dirty = false;
                self.metadata_staged = false;
                Ok(())
            }
            Err(BackendError::InvalidArgument(msg)) => {
                warn!(name = %self.name, reason = %msg, "backend rejected object");
                Err(StoreError::InvalidArgument(msg))
            }
            Err(source) => {
                warn!(name = %self.name, error = %source, "object sync failed");
                Err(StoreError::SyncFailed {
                    name: self.name.clone(),
                    source,
                })
            }
        }
    }

    /// Close the handle, syncing first if dirty.
    ///
    /// If the sync fails the handle stays open and dirty. A closed handle
    /// keeps its local copy until [`release`](Self::release).
    pub fn close(&mut self) -> StoreResult<()> {
        if !self.state.is_open() {
            return Err(self.not_open());
        }
        if self.dirty {
            self.sync()?;
        }
        self.file = None;
        self.state = CacheState::Closed;
        debug!(name = %self.name, "object closed");
        Ok(())
    }

    /// Discard the local copy and free the cache slot. Idempotent.
    ///
    /// Fails with `StillOpen` while the handle is open.
    pub fn release(&mut self) -> StoreResult<()> {
        match self.state {
            CacheState::OpenReadOnly | CacheState::OpenReadWrite => Err(StoreError::StillOpen {
                name: self.name.clone(),
            }),
            CacheState::Unopened | CacheState::Released => Ok(()),
            CacheState::Closed => {
                if let Some(slot) = self.slot.as_mut() {
                    slot.release()?;
                }
                self.slot = None;
                self.state = CacheState::Released;
                debug!(name = %self.name, "object released");
                Ok(())
            }
        }
    }

    /// Direct access to the local copy while the handle is open.
    ///
    /// Writes through the returned guard mark the object dirty, exactly like
    /// [`write`](Self::write). The guard borrows the handle, so the handle
    /// cannot be closed while the guard is alive.
    pub fn cached_copy(&mut self) -> StoreResult<CachedCopy<'_>> {
        if !self.state.is_open() {
            return Err(self.not_open());
        }
        let writable = self.state == CacheState::OpenReadWrite;
        match self.file.as_mut() {
            Some(file) => Ok(CachedCopy {
                file,
                dirty: &mut self.dirty,
                writable,
            }),
            None => Err(StoreError::NotOpen {
                name: self.name.clone(),
            }),
        }
    }

    // ----------------------------------------------------------------
    // Helpers
    // ----------------------------------------------------------------

    fn open_file(&mut self) -> StoreResult<&mut File> {
        if !self.state.is_open() {
            return Err(self.not_open());
        }
        match self.file.as_mut() {
            Some(file) => Ok(file),
            None => Err(StoreError::NotOpen {
                name: self.name.clone(),
            }),
        }
    }

    fn writable_file(&mut self) -> StoreResult<&mut File> {
        match self.state {
            CacheState::OpenReadWrite => self.open_file(),
            CacheState::OpenReadOnly => Err(StoreError::NotWritable {
                name: self.name.clone(),
            }),
            _ => Err(self.not_open()),
        }
    }

    fn not_open(&self) -> StoreError {
        StoreError::NotOpen {
            name: self.name.clone(),
        }
    }

    fn released(&self) -> StoreError {
        StoreError::Released {
            name: self.name.clone(),
        }
    }
}

impl Read for Object {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Object::read(self, buf).map_err(io::Error::from)
    }
}

impl Write for Object {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Object::write(self, buf).map_err(io::Error::from)
    }

    /// Flushes the local copy only. Use [`Object::sync`] to push.
    fn flush(&mut self) -> io::Result<()> {
        self.writable_file().map_err(io::Error::from)?.flush()
    }
}

impl Seek for Object {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Object::seek(self, pos).map_err(io::Error::from)
    }
}

impl Drop for Object {
    fn drop(&mut self) {
        if self.dirty {
            warn!(name = %self.name, "object dropped with unsynced changes; local changes discarded");
        }
        self.file = None;
        if let Some(mut slot) = self.slot.take() {
            if let Err(e) = slot.release() {
                warn!(name = %self.name, error = %e, "failed to release cache slot on drop");
            }
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.shared.backend.id(), self.name)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("dirty", &self.dirty)
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Borrowed read/write/seek access to an open object's local copy.
#[derive(Debug)]
pub struct CachedCopy<'a> {
    file: &'a mut File,
    dirty: &'a mut bool,
    writable: bool,
}

impl CachedCopy<'_> {
    pub fn is_writable(&self) -> bool {
        self.writable
    }
}

impl Read for CachedCopy<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for CachedCopy<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.writable {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "object opened read-only",
            ));
        }
        let n = self.file.write(buf)?;
        *self.dirty = true;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for CachedCopy<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}
