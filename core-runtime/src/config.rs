//! # Core Configuration Module
//!
//! Builder-based configuration for the audio core.
//!
//! ## Overview
//!
//! [`CoreConfig`] carries every bridge the core needs plus the tunables of the
//! sound cache and the preload cache. [`CoreConfigBuilder::build`] validates
//! eagerly so a misconfigured host fails at startup instead of at first play.
//!
//! ## Required Dependencies
//!
//! - `PlaybackAdapter` - the platform audio primitive
//! - `FileSystemAccess` - cache directory and downloads (desktop default:
//!   `bridge_desktop::TokioFileSystem` when the `desktop-shims` feature is on)
//!
//! ## Optional Dependencies
//!
//! - `StorageResolver` - turns storage paths into download URLs; without it,
//!   `storage_url` values are played as direct URLs and never cached
//! - `Clock` - defaults to [`SystemClock`]
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .playback_adapter(Arc::new(MyAdapter::new()))
//!     .storage_resolver(Arc::new(MyBucketResolver))
//!     .preload_capacity(5)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{
    AudioSessionConfig, Clock, FileSystemAccess, PlaybackAdapter, StorageResolver, SystemClock,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Subdirectory of the platform cache root that holds cached sounds.
pub const DEFAULT_CACHE_SUBDIRECTORY: &str = "sounds";

/// Maximum number of preloaded handles kept at once.
pub const DEFAULT_PRELOAD_CAPACITY: usize = 3;

/// Age after which a preloaded handle is discarded.
pub const DEFAULT_PRELOAD_TTL: Duration = Duration::from_secs(5 * 60);

/// Core configuration for the audio core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Platform audio primitive
    pub playback_adapter: Arc<dyn PlaybackAdapter>,

    /// File system access abstraction
    pub file_system: Arc<dyn FileSystemAccess>,

    /// Storage path resolver (optional)
    pub storage_resolver: Option<Arc<dyn StorageResolver>>,

    /// Time source for preload expiry
    pub clock: Arc<dyn Clock>,

    /// Cache root overriding the one reported by `file_system`
    pub cache_root: Option<PathBuf>,

    /// Directory name, under the cache root, for cached sound files
    pub cache_subdirectory: String,

    pub preload_capacity: usize,

    pub preload_ttl: Duration,

    /// Applied once at startup
    pub audio_session: AudioSessionConfig,

    /// Capacity of the broadcast channel behind the event bus
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("playback_adapter", &"PlaybackAdapter { ... }")
            .field("file_system", &"FileSystemAccess { ... }")
            .field(
                "storage_resolver",
                &self
                    .storage_resolver
                    .as_ref()
                    .map(|_| "StorageResolver { ... }"),
            )
            .field("cache_root", &self.cache_root)
            .field("cache_subdirectory", &self.cache_subdirectory)
            .field("preload_capacity", &self.preload_capacity)
            .field("preload_ttl", &self.preload_ttl)
            .field("audio_session", &self.audio_session)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - The cache subdirectory is a single, non-empty path segment
    /// - The preload cache holds at least one entry and has a non-zero TTL
    /// - The event buffer can hold at least one event
    pub fn validate(&self) -> Result<()> {
        let subdir = self.cache_subdirectory.trim();
        if subdir.is_empty() {
            return Err(Error::Config(
                "Cache subdirectory cannot be empty".to_string(),
            ));
        }
        if subdir.contains('/') || subdir.contains('\\') || subdir == "." || subdir == ".." {
            return Err(Error::Config(format!(
                "Cache subdirectory must be a single directory name, got '{}'",
                self.cache_subdirectory
            )));
        }

        if let Some(root) = &self.cache_root {
            if root.as_os_str().is_empty() {
                return Err(Error::Config("Cache root cannot be empty".to_string()));
            }
        }

        if self.preload_capacity == 0 {
            return Err(Error::Config(
                "Preload capacity must be at least 1".to_string(),
            ));
        }

        if self.preload_ttl.is_zero() {
            return Err(Error::Config(
                "Preload TTL must be greater than zero".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

fn playback_adapter_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "PlaybackAdapter".to_string(),
        message: "A PlaybackAdapter implementation is required to create audio handles. \
                 Inject the platform-native audio adapter with .playback_adapter()."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system(cache_root: Option<&PathBuf>) -> Result<Arc<dyn FileSystemAccess>> {
    use bridge_desktop::TokioFileSystem;

    let fs = match cache_root {
        Some(root) => TokioFileSystem::with_cache_directory(root.clone()),
        None => TokioFileSystem::new(),
    }
    .map_err(|e| Error::CapabilityMissing {
        capability: "FileSystemAccess".to_string(),
        message: format!("Desktop file system unavailable: {e}"),
    })?;
    let fs: Arc<dyn FileSystemAccess> = Arc::new(fs);
    Ok(fs)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system(
    _cache_root: Option<&PathBuf>,
) -> Result<Arc<dyn FileSystemAccess>> {
    Err(Error::CapabilityMissing {
        capability: "FileSystemAccess".to_string(),
        message: "FileSystemAccess implementation is required for the sound cache. \
                 Desktop: enable the 'desktop-shims' feature to use TokioFileSystem. \
                 Mobile: inject the platform filesystem/download adapter."
            .to_string(),
    })
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    playback_adapter: Option<Arc<dyn PlaybackAdapter>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    storage_resolver: Option<Arc<dyn StorageResolver>>,
    clock: Option<Arc<dyn Clock>>,
    cache_root: Option<PathBuf>,
    cache_subdirectory: Option<String>,
    preload_capacity: Option<usize>,
    preload_ttl: Option<Duration>,
    audio_session: Option<AudioSessionConfig>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the platform audio primitive. Required.
    pub fn playback_adapter(mut self, adapter: Arc<dyn PlaybackAdapter>) -> Self {
        self.playback_adapter = Some(adapter);
        self
    }

    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    /// Sets the resolver used to turn `storage_url` values into download URLs.
    pub fn storage_resolver(mut self, resolver: Arc<dyn StorageResolver>) -> Self {
        self.storage_resolver = Some(resolver);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Overrides the cache root. With `desktop-shims` and no explicit file
    /// system, the default `TokioFileSystem` is rooted here too.
    pub fn cache_root<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cache_root = Some(path.into());
        self
    }

    /// Default: `"sounds"`
    pub fn cache_subdirectory(mut self, name: impl Into<String>) -> Self {
        self.cache_subdirectory = Some(name.into());
        self
    }

    /// Default: 3
    pub fn preload_capacity(mut self, capacity: usize) -> Self {
        self.preload_capacity = Some(capacity);
        self
    }

    /// Default: 5 minutes
    pub fn preload_ttl(mut self, ttl: Duration) -> Self {
        self.preload_ttl = Some(ttl);
        self
    }

    pub fn audio_session(mut self, config: AudioSessionConfig) -> Self {
        self.audio_session = Some(config);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn build(self) -> Result<CoreConfig> {
        let playback_adapter = self
            .playback_adapter
            .ok_or_else(playback_adapter_missing_error)?;

        let file_system = match self.file_system {
            Some(fs) => fs,
            None => provide_default_file_system(self.cache_root.as_ref())?,
        };

        let config = CoreConfig {
            playback_adapter,
            file_system,
            storage_resolver: self.storage_resolver,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            cache_root: self.cache_root,
            cache_subdirectory: self
                .cache_subdirectory
                .unwrap_or_else(|| DEFAULT_CACHE_SUBDIRECTORY.to_string()),
            preload_capacity: self.preload_capacity.unwrap_or(DEFAULT_PRELOAD_CAPACITY),
            preload_ttl: self.preload_ttl.unwrap_or(DEFAULT_PRELOAD_TTL),
            audio_session: self.audio_session.unwrap_or_default(),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{
        AudioSource, DownloadResult, FileMetadata, PlaybackOptions, PlaybackSessionId,
        PlaybackStatus, ProgressCallback, StatusCallback,
    };
    use mockall::mock;
    use std::path::Path;

    mock! {
        Adapter {}

        #[async_trait]
        impl PlaybackAdapter for Adapter {
            async fn configure_session(&self, config: AudioSessionConfig) -> BridgeResult<()>;
            async fn create(
                &self,
                source: AudioSource,
                options: PlaybackOptions,
                on_status: StatusCallback,
            ) -> BridgeResult<PlaybackSessionId>;
            async fn play(&self, session: PlaybackSessionId) -> BridgeResult<()>;
            async fn pause(&self, session: PlaybackSessionId) -> BridgeResult<()>;
            async fn resume(&self, session: PlaybackSessionId) -> BridgeResult<()>;
            async fn stop(&self, session: PlaybackSessionId) -> BridgeResult<()>;
            async fn seek(&self, session: PlaybackSessionId, position_millis: u64) -> BridgeResult<()>;
            async fn set_volume(&self, session: PlaybackSessionId, volume: f32) -> BridgeResult<()>;
            async fn set_rate(&self, session: PlaybackSessionId, rate: f32) -> BridgeResult<()>;
            async fn status(&self, session: PlaybackSessionId) -> BridgeResult<PlaybackStatus>;
            async fn unload(&self, session: PlaybackSessionId) -> BridgeResult<()>;
        }
    }

    mock! {
        FileSystem {}

        #[async_trait]
        impl FileSystemAccess for FileSystem {
            async fn get_cache_directory(&self) -> BridgeResult<PathBuf>;
            async fn exists(&self, path: &Path) -> BridgeResult<bool>;
            async fn metadata(&self, path: &Path) -> BridgeResult<FileMetadata>;
            async fn create_dir_all(&self, path: &Path) -> BridgeResult<()>;
            async fn delete_file(&self, path: &Path) -> BridgeResult<()>;
            async fn delete_dir_all(&self, path: &Path) -> BridgeResult<()>;
            async fn list_directory(&self, path: &Path) -> BridgeResult<Vec<PathBuf>>;
            async fn download_resumable(
                &self,
                url: &str,
                destination: &Path,
                on_progress: Option<ProgressCallback>,
            ) -> BridgeResult<Option<DownloadResult>>;
        }
    }

    fn builder() -> CoreConfigBuilder {
        CoreConfig::builder()
            .playback_adapter(Arc::new(MockAdapter::new()))
            .file_system(Arc::new(MockFileSystem::new()))
    }

    #[test]
    fn test_builder_requires_playback_adapter() {
        let result = CoreConfig::builder()
            .file_system(Arc::new(MockFileSystem::new()))
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "PlaybackAdapter")
            }
            other => panic!("expected CapabilityMissing, got {other:?}"),
        }
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_requires_file_system_without_shims() {
        let result = CoreConfig::builder()
            .playback_adapter(Arc::new(MockAdapter::new()))
            .build();

        assert!(matches!(
            result,
            Err(Error::CapabilityMissing { ref capability, .. }) if capability == "FileSystemAccess"
        ));
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_builder_defaults_file_system_with_shims() {
        let result = CoreConfig::builder()
            .playback_adapter(Arc::new(MockAdapter::new()))
            .cache_root(std::env::temp_dir().join("audio-manager-config-test"))
            .build();

        assert!(result.is_ok());
    }

    #[test]
    fn test_builder_defaults() {
        let config = builder().build().unwrap();

        assert_eq!(config.cache_subdirectory, DEFAULT_CACHE_SUBDIRECTORY);
        assert_eq!(config.preload_capacity, 3);
        assert_eq!(config.preload_ttl, Duration::from_secs(300));
        assert_eq!(config.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
        assert!(config.audio_session.duck_others);
        assert!(config.storage_resolver.is_none());
        assert!(config.cache_root.is_none());
    }

    #[test]
    fn test_builder_overrides() {
        let config = builder()
            .cache_subdirectory("clips")
            .preload_capacity(5)
            .preload_ttl(Duration::from_secs(30))
            .event_buffer_size(8)
            .cache_root("/tmp/audio")
            .build()
            .unwrap();

        assert_eq!(config.cache_subdirectory, "clips");
        assert_eq!(config.preload_capacity, 5);
        assert_eq!(config.preload_ttl, Duration::from_secs(30));
        assert_eq!(config.event_buffer_size, 8);
        assert_eq!(config.cache_root, Some(PathBuf::from("/tmp/audio")));
    }

    #[test]
    fn test_validate_rejects_zero_preload_capacity() {
        let result = builder().preload_capacity(0).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_ttl() {
        let result = builder().preload_ttl(Duration::ZERO).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_nested_subdirectory() {
        assert!(builder().cache_subdirectory("a/b").build().is_err());
        assert!(builder().cache_subdirectory("..").build().is_err());
        assert!(builder().cache_subdirectory("  ").build().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_event_buffer() {
        let result = builder().event_buffer_size(0).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_config_debug_hides_bridges() {
        let config = builder().build().unwrap();
        let rendered = format!("{config:?}");
        assert!(rendered.contains("PlaybackAdapter { ... }"));
        assert!(rendered.contains("storage_resolver: None"));
    }

    #[test]
    fn test_config_is_cloneable() {
        let config = builder().build().unwrap();
        let cloned = config.clone();
        assert_eq!(cloned.preload_capacity, config.preload_capacity);
        assert!(Arc::ptr_eq(&cloned.playback_adapter, &config.playback_adapter));
    }
}
