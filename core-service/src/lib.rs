//! Core service façade and bootstrap helpers.
//!
//! This crate wires the host-provided bridges (audio primitive, filesystem,
//! storage resolver) into one [`AudioContext`]. Build it once at startup
//! and hand clones of its `Arc`s to the UI layer; there is no global
//! instance. Desktop apps typically enable the `desktop-shims` feature,
//! which supplies a `tokio`/`reqwest` filesystem when none is configured.

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use core_playback::{
    AudioControls, AudioManager, CacheConfig, PreloadConfig, Sound, SoundCache,
    SoundCacheControls, SoundPlayer, SourceResolver, UiStateStore,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{EventBus, EventStream};
use tracing::{info, warn};

#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
pub use bridge_desktop::{HttpDownloader, TokioFileSystem};

/// Everything a host needs to play and cache sounds.
pub struct AudioContext {
    config: CoreConfig,
    events: Arc<EventBus>,
    cache: Arc<SoundCache>,
    manager: Arc<AudioManager>,
}

impl AudioContext {
    /// Build the cache, resolver and manager from `config`.
    ///
    /// Does not touch the audio session; see [`AudioContext::bootstrap`].
    pub fn new(config: CoreConfig) -> Result<Self> {
        config.validate()?;

        let events = Arc::new(EventBus::new(config.event_buffer_size));

        let mut cache_config =
            CacheConfig::new().with_cache_directory(config.cache_subdirectory.clone());
        if let Some(root) = &config.cache_root {
            cache_config = cache_config.with_root(root.clone());
        }
        let cache = Arc::new(
            SoundCache::new(Arc::clone(&config.file_system), cache_config)?
                .with_event_bus(Arc::clone(&events)),
        );

        let resolver = Arc::new(SourceResolver::new(
            Arc::clone(&cache),
            config.storage_resolver.clone(),
        ));

        let preload = PreloadConfig::new(config.preload_capacity, config.preload_ttl);
        preload.validate().map_err(CoreError::InitializationFailed)?;

        let manager = Arc::new(
            AudioManager::new(
                Arc::clone(&config.playback_adapter),
                resolver,
                Arc::new(UiStateStore::new()),
                preload,
                Arc::clone(&config.clock),
            )
            .with_event_bus(Arc::clone(&events)),
        );

        info!(
            preload_capacity = preload.capacity,
            storage_resolver = config.storage_resolver.is_some(),
            "Audio context created"
        );

        Ok(Self {
            config,
            events,
            cache,
            manager,
        })
    }

    /// [`new`](AudioContext::new), then apply the configured audio session.
    ///
    /// A host that rejects the session configuration is logged; sounds still
    /// play with the platform defaults.
    pub async fn bootstrap(config: CoreConfig) -> Result<Self> {
        let context = Self::new(config)?;
        if let Err(e) = context
            .config
            .playback_adapter
            .configure_session(context.config.audio_session)
            .await
        {
            warn!(error = %e, "Audio session configuration rejected");
        }
        Ok(context)
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn manager(&self) -> Arc<AudioManager> {
        Arc::clone(&self.manager)
    }

    pub fn cache(&self) -> Arc<SoundCache> {
        Arc::clone(&self.cache)
    }

    pub fn state(&self) -> Arc<UiStateStore> {
        Arc::clone(self.manager.state())
    }

    pub fn events(&self) -> Arc<EventBus> {
        Arc::clone(&self.events)
    }

    pub fn subscribe_events(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    pub fn player(&self, sound: Sound) -> SoundPlayer {
        SoundPlayer::new(self.manager(), sound)
    }

    pub fn controls(&self) -> AudioControls {
        AudioControls::new(self.manager())
    }

    pub fn cache_controls(&self) -> SoundCacheControls {
        SoundCacheControls::new(self.manager())
    }

    /// Release every native handle, active and preloaded.
    pub async fn shutdown(&self) {
        self.manager.unload().await;
        self.manager.clear_cache().await;
        info!("Audio context shut down");
    }
}
