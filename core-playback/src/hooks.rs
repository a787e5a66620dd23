//! Consumer-facing adapters over [`AudioManager`] and [`SoundCache`].
//!
//! These are what UI code holds on to: thin, cheap to clone, and free of
//! any UI framework. Each wraps an `Arc` to the shared manager, so any
//! number of them can exist for the one active session.

use crate::cache::SoundCache;
use crate::error::Result;
use crate::manager::AudioManager;
use crate::sound::Sound;
use crate::state::{StateListener, Subscription, UiState};
use bridge_traits::playback::PlaybackOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

/// Per-sound controls, e.g. for one row in a sound list.
#[derive(Clone)]
pub struct SoundPlayer {
    manager: Arc<AudioManager>,
    sound: Sound,
    options: PlaybackOptions,
}

impl SoundPlayer {
    pub fn new(manager: Arc<AudioManager>, sound: Sound) -> Self {
        Self {
            manager,
            sound,
            options: PlaybackOptions::default(),
        }
    }

    /// Options used by [`play`](Self::play) and [`toggle`](Self::toggle).
    pub fn with_options(mut self, options: PlaybackOptions) -> Self {
        self.options = options;
        self
    }

    pub fn sound(&self) -> &Sound {
        &self.sound
    }

    pub async fn play(&self) -> Result<()> {
        self.manager.play_sound(&self.sound, self.options).await
    }

    /// Pause if this sound is playing, otherwise play it.
    pub async fn toggle(&self) -> Result<()> {
        if self.is_playing() {
            self.manager.pause().await
        } else {
            self.play().await
        }
    }

    /// Pause, if this sound is the current one.
    pub async fn pause(&self) -> Result<()> {
        if !self.is_current() {
            return Ok(());
        }
        self.manager.pause().await
    }

    /// Stop, if this sound is the current one.
    pub async fn stop(&self) -> Result<()> {
        if !self.is_current() {
            return Ok(());
        }
        self.manager.stop().await
    }

    pub async fn preload(&self) -> Result<()> {
        self.manager
            .preload_sound(&self.sound, self.options.with_should_play(false))
            .await
    }

    pub fn is_current(&self) -> bool {
        self.manager.current_id().as_deref() == Some(self.sound.id.as_str())
    }

    pub fn is_playing(&self) -> bool {
        self.is_current() && self.manager.state().get().is_playing
    }

    pub fn is_preloaded(&self) -> bool {
        self.manager.is_cached(&self.sound.id)
    }

    pub fn state(&self) -> UiState {
        self.manager.state().get()
    }
}

/// Transport controls for whatever is currently loaded.
#[derive(Clone)]
pub struct AudioControls {
    manager: Arc<AudioManager>,
}

impl AudioControls {
    pub fn new(manager: Arc<AudioManager>) -> Self {
        Self { manager }
    }

    pub async fn pause(&self) -> Result<()> {
        self.manager.pause().await
    }

    pub async fn resume(&self) -> Result<()> {
        self.manager.resume().await
    }

    pub async fn stop(&self) -> Result<()> {
        self.manager.stop().await
    }

    pub async fn seek(&self, position_millis: i64) -> Result<()> {
        self.manager.seek(position_millis).await
    }

    pub async fn set_volume(&self, volume: f32) -> Result<()> {
        self.manager.set_volume(volume).await
    }

    pub async fn set_rate(&self, rate: f32) {
        self.manager.set_rate(rate).await
    }

    pub async fn unload(&self) {
        self.manager.unload().await
    }

    pub fn current_id(&self) -> Option<String> {
        self.manager.current_id()
    }

    pub fn snapshot(&self) -> UiState {
        self.manager.state().get()
    }

    pub fn subscribe(&self, listener: StateListener) -> Subscription {
        self.manager.state().subscribe(listener)
    }

    pub fn watch(&self) -> watch::Receiver<UiState> {
        self.manager.state().watch()
    }
}

/// File cache controls for a set of sounds.
#[derive(Clone)]
pub struct SoundCacheControls {
    manager: Arc<AudioManager>,
}

impl SoundCacheControls {
    pub fn new(manager: Arc<AudioManager>) -> Self {
        Self { manager }
    }

    fn cache(&self) -> &Arc<SoundCache> {
        self.manager.cache()
    }

    /// `true` if `sound` has a cached file. Sounds without a filename never do.
    pub async fn is_cached(&self, sound: &Sound) -> bool {
        match &sound.filename {
            Some(filename) => self.cache().is_cached(filename).await,
            None => false,
        }
    }

    pub async fn download(&self, sound: &Sound) -> Result<PathBuf> {
        self.manager.download_sound(sound).await
    }

    pub async fn delete(&self, sound: &Sound) {
        if let Some(filename) = &sound.filename {
            self.cache().delete(filename).await;
        }
    }

    pub async fn size_mb(&self) -> f64 {
        self.cache().size_mb().await
    }

    pub async fn clear(&self) {
        self.cache().clear().await
    }

    /// `true` if `sound` has a fresh preloaded handle.
    pub fn is_preloaded(&self, sound: &Sound) -> bool {
        self.manager.is_cached(&sound.id)
    }

    /// Id and percent of the download in progress, if any.
    pub fn downloading(&self) -> Option<(String, u8)> {
        let state = self.manager.state().get();
        state
            .downloading_sound_id
            .map(|id| (id, state.download_progress))
    }
}
