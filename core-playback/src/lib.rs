//! # Playback & Caching Module
//!
//! Single-active-playback audio manager with an on-disk sound cache.
//!
//! ## Overview
//!
//! This module handles:
//! - Resolving a [`Sound`] to a bundled, cached or streamed source
//! - Downloading remote sounds into a flat file cache
//! - Keeping at most one native handle playing, plus a small preload cache
//! - Publishing playback and download state to UI subscribers
//!
//! ## Usage
//!
//! ```ignore
//! use core_playback::{AudioManager, PlaybackOptions, Sound, SoundPlayer};
//!
//! let rain = Sound::new("rain", "Rain")
//!     .with_storage_url("sounds/rain.mp3")
//!     .with_filename("rain.mp3");
//!
//! let player = SoundPlayer::new(manager.clone(), rain);
//! player.toggle().await?;
//! ```

pub mod cache;
pub mod error;
mod handle;
pub mod hooks;
pub mod manager;
pub mod preload;
pub mod resolver;
pub mod sound;
pub mod state;

#[cfg(test)]
mod test_support;

pub use bridge_traits::playback::{AudioSource, PlaybackOptions};
pub use cache::{CacheConfig, DownloadProgressFn, SoundCache};
pub use error::{PlaybackError, Result};
pub use hooks::{AudioControls, SoundCacheControls, SoundPlayer};
pub use manager::AudioManager;
pub use preload::{PreloadConfig, DEFAULT_PRELOAD_CAPACITY, DEFAULT_PRELOAD_TTL};
pub use resolver::{BackgroundDownload, ResolvedSource, SoundRequest, SourceResolver};
pub use sound::Sound;
pub use state::{StateListener, Subscription, UiState, UiStatePatch, UiStateStore};
