//! Filesystem-backed sound cache.

use crate::cache::config::{validate_filename, CacheConfig};
use crate::error::{PlaybackError, Result};
use bridge_traits::storage::{FileSystemAccess, ProgressCallback, TransferProgress};
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use core_runtime::logging::{redact_url, strip_path};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Receives download progress as a fraction in `0.0..=1.0`.
pub type DownloadProgressFn = Arc<dyn Fn(f64) + Send + Sync>;

/// Maps cache filenames to local files.
///
/// Maintenance operations ([`clear`](SoundCache::clear),
/// [`size_mb`](SoundCache::size_mb), [`delete`](SoundCache::delete)) never
/// fail: cache upkeep must not get in the way of playback, so their I/O
/// errors are logged and degrade to a no-op or zero.
///
/// Concurrent downloads of the same filename are not serialized. The
/// existence re-check at the top of [`download`](SoundCache::download)
/// short-circuits most duplicates; a genuine race leaves the last writer's
/// file in place.
pub struct SoundCache {
    fs: Arc<dyn FileSystemAccess>,
    config: CacheConfig,
    directory: OnceCell<PathBuf>,
    event_bus: Option<Arc<EventBus>>,
}

impl SoundCache {
    pub fn new(fs: Arc<dyn FileSystemAccess>, config: CacheConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| PlaybackError::CacheIo(format!("Invalid cache configuration: {e}")))?;

        Ok(Self {
            fs,
            config,
            directory: OnceCell::new(),
            event_bus: None,
        })
    }

    /// Set event bus for download and maintenance events.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The cache directory. Resolved once; not created.
    pub async fn directory(&self) -> Result<PathBuf> {
        self.directory
            .get_or_try_init(|| async {
                let root = match &self.config.root {
                    Some(root) => root.clone(),
                    None => self.fs.get_cache_directory().await?,
                };
                Ok::<_, PlaybackError>(root.join(&self.config.cache_directory))
            })
            .await
            .cloned()
    }

    async fn ensure_directory(&self) -> Result<PathBuf> {
        let dir = self.directory().await?;
        if !self.fs.exists(&dir).await? {
            self.fs.create_dir_all(&dir).await?;
            debug!(path = ?dir, "Created sound cache directory");
        }
        Ok(dir)
    }

    /// Local path of `filename` if it is cached. Creates the cache
    /// directory on first use.
    #[instrument(skip(self))]
    pub async fn get_cached(&self, filename: &str) -> Result<Option<PathBuf>> {
        validate_filename(filename).map_err(PlaybackError::InvalidSource)?;

        let path = self.ensure_directory().await?.join(filename);
        if self.fs.exists(&path).await? {
            Ok(Some(path))
        } else {
            Ok(None)
        }
    }

    /// Like [`get_cached`](SoundCache::get_cached), treating errors as "not cached".
    pub async fn is_cached(&self, filename: &str) -> bool {
        match self.get_cached(filename).await {
            Ok(found) => found.is_some(),
            Err(e) => {
                debug!(filename, error = %e, "Cache lookup failed");
                false
            }
        }
    }

    /// Download `url` into the cache as `filename` and return the local path.
    ///
    /// Returns immediately if the file is already cached. Progress is
    /// reported on every tick for which the total size is known.
    #[instrument(skip(self, url, on_progress), fields(url = %redact_url(url)))]
    pub async fn download(
        &self,
        url: &str,
        filename: &str,
        on_progress: Option<DownloadProgressFn>,
    ) -> Result<PathBuf> {
        if let Some(path) = self.get_cached(filename).await? {
            debug!("Sound already cached, skipping download");
            return Ok(path);
        }

        let destination = self.directory().await?.join(filename);
        self.emit(CacheEvent::DownloadStarted {
            filename: filename.to_string(),
        });

        let progress = self.progress_callback(filename, on_progress);
        match self
            .fs
            .download_resumable(url, &destination, Some(progress))
            .await
        {
            Ok(Some(result)) => {
                info!(
                    file = %strip_path(&result.path.to_string_lossy()),
                    bytes = result.bytes,
                    "Sound cached"
                );
                self.emit(CacheEvent::DownloadCompleted {
                    filename: filename.to_string(),
                    bytes: result.bytes,
                });
                Ok(result.path)
            }
            Ok(None) => Err(self.download_failed(filename, "transfer produced no result")),
            Err(e) => Err(self.download_failed(filename, &e.to_string())),
        }
    }

    fn download_failed(&self, filename: &str, message: &str) -> PlaybackError {
        warn!(filename, message, "Sound download failed");
        self.emit(CacheEvent::DownloadFailed {
            filename: filename.to_string(),
            message: message.to_string(),
        });
        PlaybackError::DownloadFailed {
            filename: filename.to_string(),
            message: message.to_string(),
        }
    }

    fn progress_callback(
        &self,
        filename: &str,
        on_progress: Option<DownloadProgressFn>,
    ) -> ProgressCallback {
        let event_bus = self.event_bus.clone();
        let filename = filename.to_string();
        let last_percent = AtomicU64::new(u64::MAX);

        Arc::new(move |progress: TransferProgress| {
            let Some(fraction) = progress.fraction() else {
                return;
            };
            if let Some(callback) = &on_progress {
                callback(fraction);
            }

            // One event per whole percent.
            let percent = (fraction * 100.0).floor() as u64;
            if last_percent.swap(percent, Ordering::Relaxed) == percent {
                return;
            }
            if let Some(bus) = &event_bus {
                let _ = bus.emit(CoreEvent::Cache(CacheEvent::DownloadProgress {
                    filename: filename.clone(),
                    percent: fraction * 100.0,
                }));
            }
        })
    }

    /// Remove every cached file and recreate an empty directory.
    #[instrument(skip(self))]
    pub async fn clear(&self) {
        let dir = match self.directory().await {
            Ok(dir) => dir,
            Err(e) => {
                warn!(error = %e, "Cannot locate sound cache to clear");
                return;
            }
        };

        match self.fs.exists(&dir).await {
            Ok(true) => {
                if let Err(e) = self.fs.delete_dir_all(&dir).await {
                    warn!(error = %e, "Failed to delete sound cache directory");
                }
            }
            Ok(false) => {}
            Err(e) => warn!(error = %e, "Failed to check sound cache directory"),
        }

        if let Err(e) = self.fs.create_dir_all(&dir).await {
            warn!(error = %e, "Failed to recreate sound cache directory");
        }

        info!("Sound cache cleared");
        self.emit(CacheEvent::Cleared);
    }

    /// Total size of the files directly under the cache directory, in
    /// megabytes. `0.0` if the directory cannot be read.
    pub async fn size_mb(&self) -> f64 {
        match self.total_bytes().await {
            Ok(bytes) => bytes as f64 / BYTES_PER_MB,
            Err(e) => {
                warn!(error = %e, "Failed to compute sound cache size");
                0.0
            }
        }
    }

    async fn total_bytes(&self) -> Result<u64> {
        let dir = self.directory().await?;
        if !self.fs.exists(&dir).await? {
            return Ok(0);
        }

        let mut total = 0u64;
        for entry in self.fs.list_directory(&dir).await? {
            let metadata = self.fs.metadata(&entry).await?;
            if !metadata.is_directory {
                total += metadata.size;
            }
        }
        Ok(total)
    }

    /// Remove one cached file. Missing files and I/O errors are ignored.
    #[instrument(skip(self))]
    pub async fn delete(&self, filename: &str) {
        match self.delete_inner(filename).await {
            Ok(true) => {
                debug!("Deleted cached sound");
                self.emit(CacheEvent::Deleted {
                    filename: filename.to_string(),
                });
            }
            Ok(false) => {}
            Err(e) => warn!(error = %e, "Failed to delete cached sound"),
        }
    }

    async fn delete_inner(&self, filename: &str) -> Result<bool> {
        validate_filename(filename).map_err(PlaybackError::InvalidSource)?;
        let path = self.directory().await?.join(filename);
        if !self.fs.exists(&path).await? {
            return Ok(false);
        }
        self.fs.delete_file(&path).await?;
        Ok(true)
    }

    fn emit(&self, event: CacheEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Cache(event));
        }
    }
}
