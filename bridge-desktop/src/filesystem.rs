//! File System Access Implementation using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{DownloadResult, FileMetadata, FileSystemAccess, ProgressCallback},
};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tracing::debug;

use crate::download::HttpDownloader;

/// Directory created under the platform cache root.
pub const APP_CACHE_DIR: &str = "audio-manager";

/// Tokio-based file system implementation
///
/// Local operations go through `tokio::fs`; downloads go through
/// [`HttpDownloader`].
pub struct TokioFileSystem {
    cache_dir: PathBuf,
    downloader: HttpDownloader,
}

impl TokioFileSystem {
    /// Use `<platform cache dir>/audio-manager`, falling back to the temp dir.
    ///
    /// Fails only if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(APP_CACHE_DIR);
        Self::with_cache_directory(cache_dir)
    }

    pub fn with_cache_directory(cache_dir: PathBuf) -> Result<Self> {
        Ok(Self {
            cache_dir,
            downloader: HttpDownloader::new()?,
        })
    }

    pub fn with_downloader(mut self, downloader: HttpDownloader) -> Self {
        self.downloader = downloader;
        self
    }

    fn map_io_error(e: std::io::Error) -> BridgeError {
        BridgeError::Io(e)
    }

    fn epoch_secs(time: std::io::Result<SystemTime>) -> Option<i64> {
        time.ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
    }
}

#[async_trait]
impl FileSystemAccess for TokioFileSystem {
    async fn get_cache_directory(&self) -> Result<PathBuf> {
        if !fs::try_exists(&self.cache_dir)
            .await
            .map_err(Self::map_io_error)?
        {
            fs::create_dir_all(&self.cache_dir)
                .await
                .map_err(Self::map_io_error)?;
            debug!(path = ?self.cache_dir, "Created cache directory");
        }
        Ok(self.cache_dir.clone())
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        fs::try_exists(path).await.map_err(Self::map_io_error)
    }

    async fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        let metadata = fs::metadata(path).await.map_err(Self::map_io_error)?;

        Ok(FileMetadata {
            size: metadata.len(),
            created_at: Self::epoch_secs(metadata.created()),
            modified_at: Self::epoch_secs(metadata.modified()),
            is_directory: metadata.is_dir(),
        })
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)
            .await
            .map_err(Self::map_io_error)?;
        debug!(path = ?path, "Created directory");
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).await.map_err(Self::map_io_error)?;
        debug!(path = ?path, "Deleted file");
        Ok(())
    }

    async fn delete_dir_all(&self, path: &Path) -> Result<()> {
        fs::remove_dir_all(path)
            .await
            .map_err(Self::map_io_error)?;
        debug!(path = ?path, "Deleted directory");
        Ok(())
    }

    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(path).await.map_err(Self::map_io_error)?;

        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(Self::map_io_error)?
        {
            entries.push(entry.path());
        }

        debug!(path = ?path, count = entries.len(), "Listed directory");
        Ok(entries)
    }

    async fn download_resumable(
        &self,
        url: &str,
        destination: &Path,
        on_progress: Option<ProgressCallback>,
    ) -> Result<Option<DownloadResult>> {
        self.downloader.download(url, destination, on_progress).await
    }
}
