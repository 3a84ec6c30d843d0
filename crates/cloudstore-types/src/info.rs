//! Backend-reported object facts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metadata::MetaData;

/// What a backend reports about a remote object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Full object name within the store namespace.
    pub name: String,
    /// Content size in bytes.
    pub size: u64,
    /// Last time the remote object was written.
    pub updated: DateTime<Utc>,
    /// Backend-defined content tag, if the backend computes one.
    pub etag: Option<String>,
    /// Metadata stored alongside the content.
    pub metadata: MetaData,
}

impl ObjectInfo {
    pub fn new(name: impl Into<String>, size: u64, updated: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            size,
            updated,
            etag: None,
            metadata: MetaData::new(),
        }
    }

    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    pub fn with_metadata(mut self, metadata: MetaData) -> Self {
        self.metadata = metadata;
        self
    }
}
