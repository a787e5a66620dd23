//! Mocks shared by the unit tests in this crate.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::playback::{
    AudioSessionConfig, AudioSource, PlaybackAdapter, PlaybackOptions, PlaybackSessionId,
    PlaybackStatus, StatusCallback,
};
use bridge_traits::storage::{
    DownloadResult, FileMetadata, FileSystemAccess, ProgressCallback, StorageResolver,
};
use mockall::mock;
use std::path::{Path, PathBuf};

mock! {
    pub Adapter {}

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
    pub FileSystem {}

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

mock! {
    pub Storage {}

    #[async_trait]
    impl StorageResolver for Storage {
        async fn get_download_url(&self, storage_path: &str) -> BridgeResult<String>;
    }
}
