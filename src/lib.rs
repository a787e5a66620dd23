//! Workspace placeholder crate.
//!
//! Exposes feature flags that map onto the member crates so a host
//! application can depend on `audio-manager-workspace` alone:
//!
//! - `desktop-shims` (default): the full [`core_service::AudioContext`] with
//!   the tokio/reqwest filesystem bridge wired in.
//! - `playback-only`: just `core-playback`, for hosts that inject every
//!   bridge themselves.

#[cfg(feature = "desktop-shims")]
pub use core_service;

#[cfg(feature = "playback-only")]
pub use core_playback;
