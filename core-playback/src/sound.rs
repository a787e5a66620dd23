//! Sound descriptors supplied by the host application.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A playable sound as the app knows it.
///
/// A resolvable sound has either a `local_asset`, or a `storage_url`
/// (plus a `filename` when it should be cached).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sound {
    /// Stable identifier, unique within the app's sound set.
    pub id: String,
    pub name: String,
    /// Cache key under the sound cache directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Storage path or full URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_url: Option<String>,
    /// Opaque bundle resource reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_asset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Sound {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            filename: None,
            storage_url: None,
            local_asset: None,
            duration_seconds: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_local_asset(mut self, asset: impl Into<String>) -> Self {
        self.local_asset = Some(asset.into());
        self
    }

    pub fn with_storage_url(mut self, storage_url: impl Into<String>) -> Self {
        self.storage_url = Some(storage_url.into());
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_duration_seconds(mut self, seconds: f64) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Whether the descriptor carries anything a resolver could use.
    pub fn is_resolvable(&self) -> bool {
        self.local_asset.is_some() || self.storage_url.is_some()
    }

    /// Whether the sound can land in the file cache.
    pub fn is_cacheable(&self) -> bool {
        self.local_asset.is_none() && self.storage_url.is_some() && self.filename.is_some()
    }
}
