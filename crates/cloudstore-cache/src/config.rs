//! Cache configuration and contention policies.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, CacheResult};

/// What to do when a cache slot is requested while another handle holds it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ContentionPolicy {
    /// Fail immediately with `InUse`.
    Fail,
    /// Block until the slot is released, failing with `InUse` after the
    /// timeout.
    Wait { timeout_ms: u64 },
}

impl ContentionPolicy {
    pub fn wait(timeout: Duration) -> Self {
        Self::Wait {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl Default for ContentionPolicy {
    fn default() -> Self {
        Self::Fail
    }
}

/// Configuration for the local object cache.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding cache and staging files. Owned by the manager.
    pub root: PathBuf,
    /// Behaviour when two handles open the same object.
    pub contention: ContentionPolicy,
    /// Remove every file left in `root` when the manager is initialized.
    pub purge_on_init: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: std::env::temp_dir().join("cloudstore-cache"),
            contention: ContentionPolicy::default(),
            purge_on_init: false,
        }
    }
}

impl CacheConfig {
    /// Configuration rooted at `root` with default policies.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    pub fn with_contention(mut self, contention: ContentionPolicy) -> Self {
        self.contention = contention;
        self
    }

    pub fn with_purge_on_init(mut self, purge: bool) -> Self {
        self.purge_on_init = purge;
        self
    }

    /// Parse a configuration from TOML. Missing fields take defaults.
    pub fn from_toml_str(s: &str) -> CacheResult<Self> {
        toml::from_str(s).map_err(|e| CacheError::Config(e.to_string()))
    }
}
