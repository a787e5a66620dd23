//! # Sound Cache
//!
//! Durable file cache for remote sounds, keyed by filename, living in one
//! flat directory (`<cache root>/sounds/` by default). There is no index
//! file: a sound is cached exactly when its file exists.

pub mod config;
pub mod store;

pub use config::{CacheConfig, DEFAULT_CACHE_DIRECTORY};
pub use store::{DownloadProgressFn, SoundCache};
