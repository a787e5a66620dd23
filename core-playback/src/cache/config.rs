//! Sound cache configuration

use core_runtime::config::DEFAULT_CACHE_SUBDIRECTORY;
use std::path::PathBuf;

/// Directory used when nothing else is configured.
pub const DEFAULT_CACHE_DIRECTORY: &str = DEFAULT_CACHE_SUBDIRECTORY;

/// Configuration for the on-disk sound cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Directory name under the cache root
    pub cache_directory: String,

    /// Cache root; `None` uses the file system's cache directory
    pub root: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_directory: DEFAULT_CACHE_DIRECTORY.to_string(),
            root: None,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_directory(mut self, name: impl Into<String>) -> Self {
        self.cache_directory = name.into();
        self
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_directory.trim().is_empty() {
            return Err("Cache directory cannot be empty".to_string());
        }
        if self.cache_directory.contains(['/', '\\']) {
            return Err(format!(
                "Cache directory must be a single path segment, got '{}'",
                self.cache_directory
            ));
        }
        Ok(())
    }
}

/// Reject cache keys that would escape the cache directory.
pub(crate) fn validate_filename(filename: &str) -> Result<(), String> {
    if filename.trim().is_empty() {
        return Err("cache filename cannot be empty".to_string());
    }
    if filename.contains(['/', '\\']) || filename == "." || filename == ".." {
        return Err(format!("cache filename '{filename}' is not a plain file name"));
    }
    Ok(())
}
