//! # Desktop Bridge Implementations
//!
//! Default [`FileSystemAccess`](bridge_traits::FileSystemAccess) for desktop
//! platforms (macOS, Windows, Linux): `tokio::fs` for local operations and
//! `reqwest` for resumable downloads.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::TokioFileSystem;
//! use std::sync::Arc;
//!
//! let fs = Arc::new(TokioFileSystem::new()?);
//! let config = CoreConfig::builder().file_system(fs) /* ... */;
//! ```

mod download;
mod filesystem;

pub use download::HttpDownloader;
pub use filesystem::{TokioFileSystem, APP_CACHE_DIR};
