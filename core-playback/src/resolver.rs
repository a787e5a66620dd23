//! # Source Resolution
//!
//! Turns a [`Sound`] into something the platform can play, in fixed
//! precedence order:
//!
//! 1. a bundled asset, without touching the network or the cache;
//! 2. a cached copy of `filename`;
//! 3. a download URL from the [`StorageResolver`], streamed while the file
//!    downloads into the cache in the background;
//! 4. `storage_url` itself, when no resolver is configured or when it is
//!    already a full URL without a cache filename.
//!
//! Anything else is unplayable.

use crate::cache::{DownloadProgressFn, SoundCache};
use crate::error::{PlaybackError, Result};
use crate::sound::Sound;
use bridge_traits::playback::AudioSource;
use bridge_traits::storage::StorageResolver;
use core_runtime::logging::redact_url;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

/// A playable source chosen for a sound.
#[derive(Debug)]
pub struct ResolvedSource {
    pub source: AudioSource,
    /// `true` if playback reads from the network
    pub is_streaming: bool,
    /// Cache download started as a side effect of resolution
    pub background_download: Option<BackgroundDownload>,
}

impl ResolvedSource {
    fn local(source: AudioSource) -> Self {
        Self {
            source,
            is_streaming: false,
            background_download: None,
        }
    }

    fn streaming(url: String) -> Self {
        Self {
            source: AudioSource::remote(url),
            is_streaming: true,
            background_download: None,
        }
    }
}

/// A fire-and-forget cache download.
///
/// Dropping this does not cancel the download. Failures are logged inside
/// the task and never reach the caller.
pub struct BackgroundDownload {
    filename: String,
    handle: JoinHandle<Option<PathBuf>>,
}

impl BackgroundDownload {
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the download to settle. `None` if it failed.
    pub async fn finished(self) -> Option<PathBuf> {
        self.handle.await.ok().flatten()
    }
}

impl fmt::Debug for BackgroundDownload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundDownload")
            .field("filename", &self.filename)
            .field("finished", &self.handle.is_finished())
            .finish()
    }
}

/// A sound paired with the source it resolved to.
#[derive(Debug)]
pub struct SoundRequest {
    pub sound: Sound,
    pub resolved: ResolvedSource,
}

/// Chooses between bundled, cached and streamed sources.
pub struct SourceResolver {
    cache: Arc<SoundCache>,
    storage: Option<Arc<dyn StorageResolver>>,
}

impl SourceResolver {
    pub fn new(cache: Arc<SoundCache>, storage: Option<Arc<dyn StorageResolver>>) -> Self {
        Self { cache, storage }
    }

    pub fn cache(&self) -> &Arc<SoundCache> {
        &self.cache
    }

    pub fn has_storage_resolver(&self) -> bool {
        self.storage.is_some()
    }

    /// Resolve `sound` to a playable source, or `None` if it cannot be played.
    ///
    /// When the sound is streamed from a resolved download URL, a cache
    /// download is spawned on the current tokio runtime and returned in
    /// [`ResolvedSource::background_download`]. `on_progress` is forwarded
    /// to that download.
    #[instrument(skip(self, sound, on_progress), fields(sound_id = %sound.id))]
    pub async fn resolve(
        &self,
        sound: &Sound,
        on_progress: Option<DownloadProgressFn>,
    ) -> Option<ResolvedSource> {
        if let Some(asset) = &sound.local_asset {
            debug!("Using bundled asset");
            return Some(ResolvedSource::local(AudioSource::bundled(asset.clone())));
        }

        let storage_url = sound.storage_url.as_deref()?;

        if let Some(filename) = sound.filename.as_deref() {
            match self.cache.get_cached(filename).await {
                Ok(Some(path)) => {
                    debug!(filename, "Using cached file");
                    return Some(ResolvedSource::local(AudioSource::local(path)));
                }
                Ok(None) => {}
                Err(e) => debug!(filename, error = %e, "Cache lookup failed, streaming instead"),
            }
        }

        if let (Some(filename), Some(storage)) = (sound.filename.as_deref(), &self.storage) {
            let url = match storage.get_download_url(storage_url).await {
                Ok(url) => url,
                Err(e) => {
                    warn!(error = %e, "Failed to resolve storage path");
                    return None;
                }
            };
            debug!(url = %redact_url(&url), "Streaming while caching");

            let background = self.spawn_download(url.clone(), filename.to_string(), on_progress);
            let mut resolved = ResolvedSource::streaming(url);
            resolved.background_download = Some(background);
            return Some(resolved);
        }

        if self.storage.is_none() || is_direct_url(storage_url) {
            debug!(url = %redact_url(storage_url), "Streaming storage URL directly");
            return Some(ResolvedSource::streaming(storage_url.to_string()));
        }

        debug!("Sound has no playable source");
        None
    }

    /// [`resolve`](SourceResolver::resolve) into a [`SoundRequest`].
    pub async fn request(
        &self,
        sound: &Sound,
        on_progress: Option<DownloadProgressFn>,
    ) -> Option<SoundRequest> {
        let resolved = self.resolve(sound, on_progress).await?;
        Some(SoundRequest {
            sound: sound.clone(),
            resolved,
        })
    }

    /// Download `sound` into the cache and return its local path.
    ///
    /// Unlike the background download started by
    /// [`resolve`](SourceResolver::resolve), failures are returned.
    #[instrument(skip(self, sound, on_progress), fields(sound_id = %sound.id))]
    pub async fn download(
        &self,
        sound: &Sound,
        on_progress: Option<DownloadProgressFn>,
    ) -> Result<PathBuf> {
        let filename = sound.filename.as_deref().ok_or_else(|| {
            PlaybackError::InvalidSource(format!("sound '{}' has no cache filename", sound.id))
        })?;
        let storage_url = sound.storage_url.as_deref().ok_or_else(|| {
            PlaybackError::InvalidSource(format!("sound '{}' has no storage URL", sound.id))
        })?;

        let url = match &self.storage {
            Some(storage) => storage.get_download_url(storage_url).await.map_err(|e| {
                PlaybackError::StorageResolution {
                    path: storage_url.to_string(),
                    message: e.to_string(),
                }
            })?,
            None => storage_url.to_string(),
        };

        self.cache.download(&url, filename, on_progress).await
    }

    fn spawn_download(
        &self,
        url: String,
        filename: String,
        on_progress: Option<DownloadProgressFn>,
    ) -> BackgroundDownload {
        let cache = Arc::clone(&self.cache);
        let task_filename = filename.clone();
        let handle = tokio::spawn(async move {
            match cache.download(&url, &task_filename, on_progress).await {
                Ok(path) => Some(path),
                Err(e) => {
                    debug!(filename = %task_filename, error = %e, "Background download failed");
                    None
                }
            }
        });

        BackgroundDownload { filename, handle }
    }
}

fn is_direct_url(value: &str) -> bool {
    match value.split_once("://") {
        Some((scheme, rest)) => {
            !scheme.is_empty()
                && !rest.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}
