//! Store configuration.

use cloudstore_cache::CacheConfig;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Configuration for a [`CachedStore`](crate::CachedStore).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Local cache settings.
    pub cache: CacheConfig,
    /// Refuse to sync objects larger than this many bytes.
    pub max_object_bytes: Option<u64>,
}

impl StoreConfig {
    pub fn new(cache: CacheConfig) -> Self {
        Self {
            cache,
            max_object_bytes: None,
        }
    }

    pub fn with_max_object_bytes(mut self, bytes: u64) -> Self {
        self.max_object_bytes = Some(bytes);
        self
    }

    /// Parse a configuration from TOML. Missing fields take defaults.
    pub fn from_toml_str(s: &str) -> StoreResult<Self> {
        toml::from_str(s).map_err(|e| StoreError::InvalidArgument(format!("invalid store configuration: {e}")))
    }
}
