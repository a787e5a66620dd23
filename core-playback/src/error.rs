//! # Playback Error Types
//!
//! Errors surfaced by the cache, the resolver and the audio manager.
//!
//! Not every variant reaches a caller: cleanup and cache-maintenance
//! failures are logged and absorbed where they happen. The classification
//! helpers below encode which ones.

use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors that can occur during playback and caching operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Source Errors
    // ========================================================================
    /// Absent or unresolvable source, or a malformed sound descriptor.
    #[error("Invalid source: {0}")]
    InvalidSource(String),

    /// The host could not turn a storage path into a download URL.
    #[error("Failed to resolve storage path '{path}': {message}")]
    StorageResolution { path: String, message: String },

    // ========================================================================
    // Handle Lifecycle Errors
    // ========================================================================
    /// The platform rejected creating or starting a native handle.
    #[error("Failed to load sound '{sound_id}': {message}")]
    CreationFailed { sound_id: String, message: String },

    /// A newer play request arrived before this one started.
    #[error("Play request for '{sound_id}' was superseded by a newer request")]
    Superseded { sound_id: String },

    #[error("Failed to unload sound: {0}")]
    UnloadFailed(String),

    #[error("Playback rate not supported: {0}")]
    RateUnsupported(String),

    // ========================================================================
    // Cache Errors
    // ========================================================================
    #[error("Download of '{filename}' failed: {message}")]
    DownloadFailed { filename: String, message: String },

    #[error("Cache I/O error: {0}")]
    CacheIo(String),

    // ========================================================================
    // Platform Errors
    // ========================================================================
    #[error("Platform error: {0}")]
    Bridge(#[from] BridgeError),
}

impl PlaybackError {
    /// Returns `true` for failures that never block further operations and
    /// are absorbed on the best-effort paths.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PlaybackError::UnloadFailed(_)
                | PlaybackError::RateUnsupported(_)
                | PlaybackError::CacheIo(_)
                | PlaybackError::Superseded { .. }
        )
    }

    /// Returns `true` if the error belongs in the UI state's `error` field.
    pub fn records_in_ui(&self) -> bool {
        matches!(
            self,
            PlaybackError::InvalidSource(_) | PlaybackError::CreationFailed { .. }
        )
    }

    /// Returns `true` if the error came out of the network or the download path.
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::DownloadFailed { .. } | PlaybackError::StorageResolution { .. }
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
