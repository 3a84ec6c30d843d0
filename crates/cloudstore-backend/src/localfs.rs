//! Local filesystem mirror backend.
//!
//! Each object is a single file under `<root>/objects/<name>`. Content and
//! metadata share one file so that replacing an object is one rename:
//!
//! ```text
//! [N bytes: content]
//! [M bytes: header (JSON: metadata, etag, updated)]
//! [4 bytes: header length M (little-endian u32)]
//! ```
//!
//! Writes go to `<root>/.tmp` first and are renamed into place once
//! complete and synced.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use cloudstore_types::{MetaData, ObjectInfo};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{BackendError, BackendResult};
use crate::traits::Backend;

/// Trailer size: 4 bytes header length.
const TRAILER_SIZE: u64 = 4;

/// Copy buffer size for streaming content.
const COPY_BUF_SIZE: usize = 64 * 1024;

#[derive(Debug, Serialize, Deserialize)]
struct FileHeader {
    metadata: MetaData,
    etag: String,
    updated: DateTime<Utc>,
}

/// Backend mirroring objects as files in a local directory.
#[derive(Debug)]
pub struct LocalFsBackend {
    root: PathBuf,
    objects_dir: PathBuf,
    tmp_dir: PathBuf,
}

impl LocalFsBackend {
    /// Open (or create) a mirror rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> BackendResult<Self> {
        let root = root.as_ref().to_path_buf();
        let objects_dir = root.join("objects");
        let tmp_dir = root.join(".tmp");
        fs::create_dir_all(&objects_dir)?;
        fs::create_dir_all(&tmp_dir)?;
        Ok(Self {
            root,
            objects_dir,
            tmp_dir,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map an object name onto a path under the objects directory.
    fn object_path(&self, name: &str) -> BackendResult<PathBuf> {
        validate_relative(name, false)?;
        Ok(self.objects_dir.join(name))
    }

    fn read_header(&self, name: &str, file: &mut File) -> BackendResult<(FileHeader, u64)> {
        let corrupt = |reason: String| BackendError::Corrupt {
            name: name.to_string(),
            reason,
        };

        let file_len = file.metadata()?.len();
        if file_len < TRAILER_SIZE {
            return Err(corrupt(format!("file too short: {file_len} bytes")));
        }

        file.seek(SeekFrom::End(-(TRAILER_SIZE as i64)))?;
        let mut len_buf = [0u8; 4];
        file.read_exact(&mut len_buf)?;
        let header_len = u64::from(u32::from_le_bytes(len_buf));

        if header_len + TRAILER_SIZE > file_len {
            return Err(corrupt(format!(
                "header length {header_len} exceeds file length {file_len}"
            )));
        }
        let content_len = file_len - TRAILER_SIZE - header_len;

        file.seek(SeekFrom::Start(content_len))?;
        let mut header_buf = vec![0u8; header_len as usize];
        file.read_exact(&mut header_buf)?;
        let header: FileHeader =
            serde_json::from_slice(&header_buf).map_err(|e| corrupt(e.to_string()))?;

        Ok((header, content_len))
    }

    /// Open the object file at `path`. Directories are prefixes of other
    /// objects, not objects, so they read as absent.
    fn open_existing(&self, path: &Path) -> BackendResult<Option<File>> {
        match File::open(path) {
            Ok(file) if file.metadata()?.is_file() => Ok(Some(file)),
            Ok(_) => Ok(None),
            Err(e) if self.names_no_object(path, &e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether `e`, raised for `path`, just means no object lives there:
    /// the path is missing, is a directory, or runs through an object file.
    fn names_no_object(&self, path: &Path, e: &io::Error) -> bool {
        e.kind() == io::ErrorKind::NotFound
            || path.is_dir()
            || path
                .ancestors()
                .skip(1)
                .take_while(|dir| *dir != self.objects_dir && dir.starts_with(&self.objects_dir))
                .any(Path::is_file)
    }

    fn info_for(&self, name: &str, file: &mut File) -> BackendResult<ObjectInfo> {
        let (header, content_len) = self.read_header(name, file)?;
        Ok(ObjectInfo::new(name, content_len, header.updated)
            .with_etag(header.etag)
            .with_metadata(header.metadata))
    }

    /// Stream `source` into a staging file, append the header, and rename
    /// the result over `path`.
    fn write_framed(
        &self,
        path: &Path,
        source: &mut dyn Read,
        metadata: &MetaData,
    ) -> BackendResult<(u64, FileHeader)> {
        let mut staged = tempfile::NamedTempFile::new_in(&self.tmp_dir)?;
        let mut hasher = blake3::Hasher::new();
        let mut size = 0u64;
        let mut buf = vec![0u8; COPY_BUF_SIZE];
        loop {
            let n = match source.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            hasher.update(&buf[..n]);
            staged.write_all(&buf[..n])?;
            size += n as u64;
        }

        let header = FileHeader {
            metadata: metadata.clone(),
            etag: hasher.finalize().to_hex().to_string(),
            updated: Utc::now(),
        };
        let header_bytes = serde_json::to_vec(&header)
            .map_err(|e| BackendError::InvalidArgument(format!("unencodable metadata: {e}")))?;
        let header_len = u32::try_from(header_bytes.len())
            .map_err(|_| BackendError::InvalidArgument("metadata too large".into()))?;

        staged.write_all(&header_bytes)?;
        staged.write_all(&header_len.to_le_bytes())?;
        staged.as_file().sync_all()?;
        staged.persist(path).map_err(|e| BackendError::Io(e.error))?;
        Ok((size, header))
    }

    /// Remove now-empty directories between `path` and the objects root.
    fn prune_empty_parents(&self, path: &Path) {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir == self.objects_dir || !dir.starts_with(&self.objects_dir) {
                break;
            }
            if fs::remove_dir(dir).is_err() {
                break;
            }
            current = dir.parent();
        }
    }

    fn name_from_path(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.objects_dir).ok()?;
        let parts: Option<Vec<&str>> = rel.components().map(|c| c.as_os_str().to_str()).collect();
        Some(parts?.join("/"))
    }
}

/// Names must be relative `/`-separated paths without `.`, `..` or empty
/// components. A listing prefix may additionally be empty or end in `/`.
fn validate_relative(name: &str, is_prefix: bool) -> BackendResult<()> {
    let invalid = |reason: &str| BackendError::InvalidArgument(format!("{name:?}: {reason}"));

    if name.is_empty() {
        return if is_prefix {
            Ok(())
        } else {
            Err(invalid("name must not be empty"))
        };
    }
    if name.starts_with('/') || name.contains('\\') {
        return Err(invalid("must be a relative '/'-separated path"));
    }

    let mut segments: Vec<&str> = name.split('/').collect();
    if is_prefix && segments.last() == Some(&"") {
        segments.pop();
    }
    for segment in segments {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(invalid("path segments must be non-empty and not '.' or '..'"));
        }
    }

    let path = Path::new(name);
    if path.components().any(|c| !matches!(c, Component::Normal(_))) {
        return Err(invalid("must not escape the store root"));
    }
    Ok(())
}

impl Backend for LocalFsBackend {
    fn id(&self) -> String {
        format!("localfs://{}", self.root.display())
    }

    fn head(&self, name: &str) -> BackendResult<Option<ObjectInfo>> {
        let path = self.object_path(name)?;
        match self.open_existing(&path)? {
            Some(mut file) => Ok(Some(self.info_for(name, &mut file)?)),
            None => Ok(None),
        }
    }

    fn fetch(&self, name: &str, sink: &mut dyn Write) -> BackendResult<Option<ObjectInfo>> {
        let path = self.object_path(name)?;
        let Some(mut file) = self.open_existing(&path)? else {
            return Ok(None);
        };

        let info = self.info_for(name, &mut file)?;
        file.seek(SeekFrom::Start(0))?;
        let copied = io::copy(&mut (&mut file).take(info.size), sink)?;
        if copied != info.size {
            return Err(BackendError::Corrupt {
                name: name.to_string(),
                reason: format!("expected {} content bytes, read {copied}", info.size),
            });
        }

        debug!(name, bytes = copied, "fetched object");
        Ok(Some(info))
    }

    fn put(
        &self,
        name: &str,
        source: &mut dyn Read,
        metadata: &MetaData,
    ) -> BackendResult<ObjectInfo> {
        let path = self.object_path(name)?;
        if path.is_dir() {
            return Err(BackendError::InvalidArgument(format!(
                "{name:?} is a prefix of existing objects"
            )));
        }

        let staged = path
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .map_err(BackendError::from)
            .and_then(|()| self.write_framed(&path, source, metadata));
        let (size, header) = match staged {
            Ok(written) => written,
            Err(e) => {
                self.prune_empty_parents(&path);
                return Err(e);
            }
        };

        debug!(name, bytes = size, "stored object");
        Ok(ObjectInfo::new(name, size, header.updated)
            .with_etag(header.etag)
            .with_metadata(header.metadata))
    }

    fn delete(&self, name: &str) -> BackendResult<bool> {
        let path = self.object_path(name)?;
        if path.is_dir() {
            return Ok(false);
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                self.prune_empty_parents(&path);
                Ok(true)
            }
            Err(e) if self.names_no_object(&path, &e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self, prefix: &str) -> BackendResult<Vec<ObjectInfo>> {
        // Walk only the deepest directory the prefix pins down.
        let dir_part = match prefix.rfind('/') {
            Some(idx) => &prefix[..=idx],
            None => "",
        };
        validate_relative(dir_part, true)?;
        let start = self.objects_dir.join(dir_part);
        if !start.is_dir() {
            return Ok(Vec::new());
        }

        let mut infos = Vec::new();
        for entry in WalkDir::new(&start).follow_links(false) {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = self.name_from_path(entry.path()) else {
                warn!(path = %entry.path().display(), "skipping non-UTF-8 object path");
                continue;
            };
            if !name.starts_with(prefix) {
                continue;
            }
            let mut file = File::open(entry.path())?;
            match self.info_for(&name, &mut file) {
                Ok(info) => infos.push(info),
                Err(e) => warn!(name = %name, error = %e, "skipping unreadable object"),
            }
        }
        Ok(infos)
    }

    fn exists(&self, name: &str) -> BackendResult<bool> {
        Ok(self.object_path(name)?.is_file())
    }
}
