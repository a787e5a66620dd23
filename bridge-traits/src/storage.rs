//! Storage and File System Abstractions
//!
//! The filesystem primitive the sound cache sits on, and the host hook that
//! turns an opaque storage path into a downloadable URL.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::Result;

/// File metadata information
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub size: u64,
    pub created_at: Option<i64>,
    pub modified_at: Option<i64>,
    pub is_directory: bool,
}

/// Progress of a running transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub bytes_written: u64,
    /// `None` when the server did not announce a length.
    pub bytes_expected: Option<u64>,
}

impl TransferProgress {
    /// Completed fraction in `0.0..=1.0`, if the total is known.
    pub fn fraction(&self) -> Option<f64> {
        match self.bytes_expected {
            Some(0) | None => None,
            Some(expected) => Some((self.bytes_written as f64 / expected as f64).min(1.0)),
        }
    }
}

/// Invoked on every progress tick of a download.
pub type ProgressCallback = Arc<dyn Fn(TransferProgress) + Send + Sync>;

/// Outcome of a completed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    /// Final location of the file.
    pub path: PathBuf,
    pub bytes: u64,
    /// HTTP status of the last response, when the transport has one.
    pub status: Option<u16>,
}

/// File system access trait
///
/// Abstracts the handful of file operations the sound cache needs:
/// - Desktop: direct filesystem access plus an HTTP client
/// - iOS/Android: sandboxed cache directory and the platform download manager
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn fetch(fs: &dyn FileSystemAccess, url: &str) -> Result<()> {
///     let dir = fs.get_cache_directory().await?.join("sounds");
///     fs.create_dir_all(&dir).await?;
///     fs.download_resumable(url, &dir.join("rain.mp3"), None).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Get the application's cache directory
    ///
    /// The OS may purge it when storage is low.
    async fn get_cache_directory(&self) -> Result<PathBuf>;

    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Get metadata for a file or directory
    async fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// Create a directory and all parent directories if they don't exist
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Delete a file
    async fn delete_file(&self, path: &Path) -> Result<()>;

    /// Delete a directory and all its contents
    async fn delete_dir_all(&self, path: &Path) -> Result<()>;

    /// List all entries directly inside a directory
    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Download `url` into `destination`, resuming a previous partial
    /// transfer when the platform supports it.
    ///
    /// `on_progress` fires on every chunk. Returns `Ok(None)` when the
    /// transfer ended without producing a file (cancelled or truncated);
    /// transport failures are errors.
    async fn download_resumable(
        &self,
        url: &str,
        destination: &Path,
        on_progress: Option<ProgressCallback>,
    ) -> Result<Option<DownloadResult>>;
}

/// Resolves an opaque storage path (bucket key, `s3://` URI, ...) to a URL
/// the filesystem bridge can download. Implemented by the host per storage
/// backend; the core never talks to a backend directly.
#[async_trait]
pub trait StorageResolver: Send + Sync {
    async fn get_download_url(&self, storage_path: &str) -> Result<String>;
}
