//! Playback bridge: the contract over the platform audio primitive.
//!
//! A host implements [`PlaybackAdapter`] on top of whatever native engine it
//! has (AVAudioPlayer, ExoPlayer, rodio, ...). The core never touches native
//! handles directly; it refers to them through [`PlaybackSessionId`] values
//! returned by [`PlaybackAdapter::create`] and releases them with
//! [`PlaybackAdapter::unload`].

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// Lowest playback rate forwarded to a host.
pub const MIN_RATE: f32 = 0.5;
/// Highest playback rate forwarded to a host.
pub const MAX_RATE: f32 = 2.0;

/// Concrete playable reference handed to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// Opaque reference to a resource bundled with the application.
    BundledAsset { asset: String },
    /// File on local storage, typically a cached download.
    LocalFile { path: PathBuf },
    /// Remote HTTP(S) URL that the host streams.
    RemoteStream {
        url: String,
        headers: HashMap<String, String>,
    },
}

impl AudioSource {
    pub fn bundled(asset: impl Into<String>) -> Self {
        AudioSource::BundledAsset {
            asset: asset.into(),
        }
    }

    pub fn local(path: impl Into<PathBuf>) -> Self {
        AudioSource::LocalFile { path: path.into() }
    }

    pub fn remote(url: impl Into<String>) -> Self {
        AudioSource::RemoteStream {
            url: url.into(),
            headers: HashMap::new(),
        }
    }

    /// Determine whether the source represents remote content.
    pub fn is_remote(&self) -> bool {
        matches!(self, AudioSource::RemoteStream { .. })
    }
}

impl fmt::Display for AudioSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioSource::BundledAsset { asset } => write!(f, "asset:{asset}"),
            AudioSource::LocalFile { path } => write!(f, "file://{}", path.display()),
            AudioSource::RemoteStream { url, .. } => f.write_str(url),
        }
    }
}

/// Options applied when a handle is created.
///
/// Out-of-range `volume` and `rate` values are clamped, never rejected; see
/// [`PlaybackOptions::normalized`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackOptions {
    pub looping: bool,
    /// `0.0` is muted, `1.0` is unity gain.
    pub volume: f32,
    /// Playback speed multiplier in `MIN_RATE..=MAX_RATE`.
    pub rate: f32,
    /// Starting offset.
    pub position_millis: u64,
    /// Start playing as soon as the handle is loaded.
    pub should_play: bool,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            looping: false,
            volume: 1.0,
            rate: 1.0,
            position_millis: 0,
            should_play: true,
        }
    }
}

impl PlaybackOptions {
    /// Defaults for a handle that is loaded but kept silent.
    pub fn preload() -> Self {
        Self {
            should_play: false,
            ..Self::default()
        }
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_position_millis(mut self, position_millis: u64) -> Self {
        self.position_millis = position_millis;
        self
    }

    pub fn with_should_play(mut self, should_play: bool) -> Self {
        self.should_play = should_play;
        self
    }

    /// Copy with `volume` and `rate` clamped into their valid ranges.
    pub fn normalized(self) -> Self {
        Self {
            volume: clamp_volume(self.volume),
            rate: clamp_rate(self.rate),
            ..self
        }
    }
}

/// Clamp a volume into `0.0..=1.0`. NaN maps to `0.0`.
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        return 0.0;
    }
    volume.clamp(0.0, 1.0)
}

/// Clamp a rate into `MIN_RATE..=MAX_RATE`. NaN maps to `1.0`.
pub fn clamp_rate(rate: f32) -> f32 {
    if rate.is_nan() {
        return 1.0;
    }
    rate.clamp(MIN_RATE, MAX_RATE)
}

/// Identifier for a native handle managed by a host adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaybackSessionId(Uuid);

impl PlaybackSessionId {
    /// Generate a new session identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Construct an identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Borrow the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PlaybackSessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlaybackSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Snapshot reported by a host through a [`StatusCallback`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackStatus {
    pub is_loaded: bool,
    pub is_playing: bool,
    pub is_buffering: bool,
    pub position_millis: u64,
    /// `None` until the host knows the duration (e.g. while streaming).
    pub duration_millis: Option<u64>,
    pub did_just_finish: bool,
    pub is_looping: bool,
    pub error: Option<String>,
}

impl PlaybackStatus {
    /// Status of a handle that is loaded and idle at the start.
    pub fn loaded() -> Self {
        Self {
            is_loaded: true,
            ..Self::default()
        }
    }

    /// Status of a handle the host failed to load or lost.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Receives status updates for one handle, for as long as it is loaded.
///
/// Hosts may invoke it from any thread, zero or more times.
pub type StatusCallback = Arc<dyn Fn(PlaybackStatus) + Send + Sync>;

/// Process-wide audio session behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSessionConfig {
    /// Lower the volume of other apps while a sound plays.
    pub duck_others: bool,
    /// Keep playing when the device ringer is silenced.
    pub play_in_silent_mode: bool,
    pub stay_active_in_background: bool,
}

impl Default for AudioSessionConfig {
    fn default() -> Self {
        Self {
            duck_others: true,
            play_in_silent_mode: true,
            stay_active_in_background: false,
        }
    }
}

/// Platform audio primitive.
///
/// Every call may suspend on I/O or hardware setup and may fail. Failures are
/// returned to the caller; it is the caller's job to decide which ones are
/// fatal. Implementations must keep invoking the [`StatusCallback`] passed to
/// [`create`](PlaybackAdapter::create) until the handle is unloaded, and must
/// stop afterwards.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::playback::{AudioSource, PlaybackAdapter, PlaybackOptions};
/// use std::sync::Arc;
///
/// async fn chime(adapter: &dyn PlaybackAdapter) -> bridge_traits::error::Result<()> {
///     let on_status = Arc::new(|status| tracing::debug!(?status, "chime status"));
///     let session = adapter
///         .create(AudioSource::bundled("chime"), PlaybackOptions::default(), on_status)
///         .await?;
///     // ... later
///     adapter.unload(session).await
/// }
/// ```
#[async_trait::async_trait]
pub trait PlaybackAdapter: Send + Sync {
    /// Apply process-wide session behaviour. Hosts without the concept keep
    /// the default no-op.
    async fn configure_session(&self, config: AudioSessionConfig) -> Result<()> {
        let _ = config;
        Ok(())
    }

    /// Load `source` into a new native handle.
    async fn create(
        &self,
        source: AudioSource,
        options: PlaybackOptions,
        on_status: StatusCallback,
    ) -> Result<PlaybackSessionId>;

    /// Start playback from the current position.
    async fn play(&self, session: PlaybackSessionId) -> Result<()>;

    /// Pause without releasing the handle.
    async fn pause(&self, session: PlaybackSessionId) -> Result<()>;

    /// Continue after [`pause`](PlaybackAdapter::pause).
    async fn resume(&self, session: PlaybackSessionId) -> Result<()>;

    /// Stop and rewind to the start.
    async fn stop(&self, session: PlaybackSessionId) -> Result<()>;

    async fn seek(&self, session: PlaybackSessionId, position_millis: u64) -> Result<()>;

    async fn set_volume(&self, session: PlaybackSessionId, volume: f32) -> Result<()>;

    /// May fail with [`BridgeError::Unsupported`](crate::BridgeError::Unsupported)
    /// when the platform cannot change speed for this source.
    async fn set_rate(&self, session: PlaybackSessionId, rate: f32) -> Result<()>;

    /// Current status of the handle.
    async fn status(&self, session: PlaybackSessionId) -> Result<PlaybackStatus>;

    /// Release the native handle.
    async fn unload(&self, session: PlaybackSessionId) -> Result<()>;
}
