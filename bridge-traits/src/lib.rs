//! # Host Bridge Traits
//!
//! Contracts between the audio core and the host platform.
//!
//! ## Overview
//!
//! The core needs three things it cannot provide portably: a way to decode and
//! output audio, a filesystem with a download primitive, and (optionally) a
//! way to turn storage paths into URLs. Each is a trait here; hosts ship the
//! implementations.
//!
//! ## Traits
//!
//! - [`PlaybackAdapter`](playback::PlaybackAdapter) - native audio handles
//! - [`FileSystemAccess`](storage::FileSystemAccess) - cache directory, existence checks, resumable downloads
//! - [`StorageResolver`](storage::StorageResolver) - storage path to download URL
//! - [`Clock`](time::Clock) - time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Provides |
//! |----------|---------------------|----------|
//! | Desktop  | `bridge-desktop`    | `FileSystemAccess` |
//! | iOS / Android | host app       | all traits |
//!
//! ## Error Handling
//!
//! All bridge traits return [`BridgeError`](error::BridgeError). Implementations
//! should convert platform errors into it and keep file paths or URLs in the
//! message so failures are actionable.
//!
//! ## Thread Safety
//!
//! Every trait requires `Send + Sync`; the core holds implementations as
//! `Arc<dyn Trait>` and calls them from arbitrary tokio tasks.

pub mod error;
pub mod playback;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use playback::{
    AudioSessionConfig, AudioSource, PlaybackAdapter, PlaybackOptions, PlaybackSessionId,
    PlaybackStatus, StatusCallback,
};
pub use storage::{
    DownloadResult, FileMetadata, FileSystemAccess, ProgressCallback, StorageResolver,
    TransferProgress,
};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, SystemClock};
