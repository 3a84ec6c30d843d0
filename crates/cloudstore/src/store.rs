//! The [`Store`] trait and its cached implementation.
//!
//! [`CachedStore`] pairs any [`Backend`] with a [`CacheManager`]. Listing and
//! lookups talk to the backend directly; content goes through [`Object`]
//! handles.

use std::fmt;
use std::sync::Arc;

use cloudstore_backend::Backend;
use cloudstore_cache::CacheManager;
use cloudstore_types::{validate_object_name, MetaData, ObjectInfo, Query};
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::object::Object;
use crate::objects::Objects;

/// A namespace of named objects.
///
/// Store operations that only touch metadata (`new_object`, `get`, `list`,
/// `folders`) never download content. Content moves only when an
/// [`Object`] is opened, synced, or closed, or through `write_object`.
pub trait Store: Send + Sync + fmt::Display {
    /// A handle for a name that does not exist yet.
    ///
    /// Nothing is created remotely until the handle is opened read-write
    /// and closed (or synced).
    fn new_object(&self, name: &str) -> StoreResult<Object>;

    /// Create or replace an object in one step.
    ///
    /// Readers see either the previous content or `data`, never a mix.
    fn write_object(&self, name: &str, metadata: &MetaData, data: &[u8]) -> StoreResult<()>;

    /// An unopened handle for an existing object.
    fn get(&self, name: &str) -> StoreResult<Object>;

    /// [`get`](Store::get) followed by [`Object::open`].
    ///
    /// If the open fails no handle or cache slot is left behind.
    fn get_and_open(&self, name: &str, readonly: bool) -> StoreResult<Object> {
        let mut object = self.get(name)?;
        object.open(readonly)?;
        Ok(object)
    }

    /// Unopened handles for every object matching `query`, ascending by name.
    fn list(&self, query: &Query) -> StoreResult<Objects>;

    /// Common prefixes one level below `query.prefix`. Requires a delimiter.
    fn folders(&self, query: &Query) -> StoreResult<Vec<String>>;

    /// Remove the remote object. Open handles keep their local copy.
    fn delete(&self, name: &str) -> StoreResult<()>;
}

/// State shared between a store and every handle it created.
pub(crate) struct StoreShared {
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) cache: CacheManager,
    /// Cache scope; the backend's id.
    pub(crate) scope: String,
    pub(crate) config: StoreConfig,
}

/// A [`Store`] that stages object content in a local [`CacheManager`].
#[derive(Clone)]
pub struct CachedStore {
    shared: Arc<StoreShared>,
}

impl CachedStore {
    /// Initialize the cache described by `config` and wrap `backend`.
    pub fn open(backend: Arc<dyn Backend>, config: StoreConfig) -> StoreResult<Self> {
        let cache = CacheManager::init(config.cache.clone())?;
        Ok(Self::with_cache(backend, cache, config))
    }

    /// Wrap `backend` using an existing cache manager, which may be shared
    /// with other stores. `config.cache` is ignored.
    pub fn with_cache(backend: Arc<dyn Backend>, cache: CacheManager, config: StoreConfig) -> Self {
        let scope = backend.id();
        info!(backend = %scope, cache = %cache.root().display(), "store opened");
        Self {
            shared: Arc::new(StoreShared {
                backend,
                cache,
                scope,
                config,
            }),
        }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.shared.backend
    }

    pub fn cache(&self) -> &CacheManager {
        &self.shared.cache
    }

    pub fn config(&self) -> &StoreConfig {
        &self.shared.config
    }

    fn handle(&self, name: &str, info: Option<ObjectInfo>) -> Object {
        Object::new(Arc::clone(&self.shared), name.to_string(), info)
    }
}

impl Store for CachedStore {
    fn new_object(&self, name: &str) -> StoreResult<Object> {
        validate_object_name(name)?;
        if self.shared.backend.exists(name)? {
            return Err(StoreError::AlreadyExists {
                name: name.to_string(),
            });
        }
        Ok(self.handle(name, None))
    }

    fn write_object(&self, name: &str, metadata: &MetaData, data: &[u8]) -> StoreResult<()> {
        validate_object_name(name)?;
        let mut object = self.handle(name, None);
        object.open_truncated()?;
        object.write_all(data)?;
        object.set_metadata(metadata.clone())?;
        object.close()?;
        object.release()?;
        info!(name, bytes = data.len(), "object written");
        Ok(())
    }

    fn get(&self, name: &str) -> StoreResult<Object> {
        validate_object_name(name)?;
        match self.shared.backend.head(name)? {
            Some(info) => Ok(self.handle(name, Some(info))),
            None => Err(StoreError::NotFound {
                name: name.to_string(),
            }),
        }
    }

    fn list(&self, query: &Query) -> StoreResult<Objects> {
        query.validate()?;
        let infos = self.shared.backend.list(&query.prefix)?;
        let objects: Objects = query
            .apply(infos)
            .into_iter()
            .map(|info| Object::new(Arc::clone(&self.shared), info.name.clone(), Some(info)))
            .collect();
        debug!(prefix = %query.prefix, count = objects.len(), "listed objects");
        Ok(objects)
    }

    fn folders(&self, query: &Query) -> StoreResult<Vec<String>> {
        query.validate()?;
        if query.delimiter.is_none() {
            return Err(StoreError::InvalidQuery(
                "folder listing requires a delimiter".into(),
            ));
        }
        let infos = self.shared.backend.list(&query.prefix)?;
        let folders = query.folders(infos.iter().map(|i| i.name.as_str()));
        debug!(prefix = %query.prefix, count = folders.len(), "listed folders");
        Ok(folders)
    }

    fn delete(&self, name: &str) -> StoreResult<()> {
        validate_object_name(name)?;
        if !self.shared.backend.delete(name)? {
            return Err(StoreError::NotFound {
                name: name.to_string(),
            });
        }
        info!(name, "object deleted");
        Ok(())
    }
}

impl fmt::Display for CachedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.shared.scope)
    }
}

impl fmt::Debug for CachedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedStore")
            .field("backend", &self.shared.scope)
            .field("cache", &self.shared.cache)
            .finish()
    }
}
