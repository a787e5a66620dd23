//! In-memory fakes for the host contracts.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::playback::{
    AudioSource, PlaybackAdapter, PlaybackOptions, PlaybackSessionId, PlaybackStatus,
    StatusCallback,
};
use bridge_traits::storage::{
    DownloadResult, FileMetadata, FileSystemAccess, ProgressCallback, StorageResolver,
    TransferProgress,
};
use bridge_traits::time::Clock;
use chrono::{DateTime, Utc};
use core_playback::{
    AudioManager, CacheConfig, PreloadConfig, SoundCache, SourceResolver, UiStateStore,
};
use core_runtime::events::EventBus;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Playback adapter
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create(AudioSource, PlaybackOptions),
    Play(AudioSource),
    Pause(AudioSource),
    Resume(AudioSource),
    Stop(AudioSource),
    Seek(AudioSource, u64),
    SetVolume(AudioSource, f32),
    SetRate(AudioSource, f32),
    Unload(AudioSource),
}

struct FakeHandle {
    source: AudioSource,
    playing: bool,
    looping: bool,
    position_millis: u64,
    on_status: StatusCallback,
}

impl FakeHandle {
    fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            is_loaded: true,
            is_playing: self.playing,
            position_millis: self.position_millis,
            duration_millis: Some(60_000),
            is_looping: self.looping,
            ..PlaybackStatus::default()
        }
    }
}

/// Adapter that keeps handles in memory and reports status synchronously.
#[derive(Default)]
pub struct FakeAdapter {
    handles: Mutex<HashMap<PlaybackSessionId, FakeHandle>>,
    retired: Mutex<Vec<(AudioSource, StatusCallback)>>,
    calls: Mutex<Vec<Call>>,
    creates_started: AtomicUsize,
    create_gate: tokio::sync::Mutex<()>,
    fail_create: AtomicBool,
    fail_unload: AtomicBool,
    reject_rate: AtomicBool,
}

impl FakeAdapter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_unload(&self, fail: bool) {
        self.fail_unload.store(fail, Ordering::SeqCst);
    }

    pub fn reject_rate(&self, reject: bool) {
        self.reject_rate.store(reject, Ordering::SeqCst);
    }

    /// Block every `create` until the guard is dropped.
    pub async fn hold_creates(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.create_gate.lock().await
    }

    pub fn creates_started(&self) -> usize {
        self.creates_started.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn create_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, Call::Create(..)))
            .count()
    }

    pub fn unloaded(&self) -> Vec<AudioSource> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                Call::Unload(source) => Some(source.clone()),
                _ => None,
            })
            .collect()
    }

    /// Sources with a loaded handle.
    pub fn loaded(&self) -> Vec<AudioSource> {
        self.handles
            .lock()
            .values()
            .map(|handle| handle.source.clone())
            .collect()
    }

    /// Sources with a handle that is currently playing.
    pub fn playing(&self) -> Vec<AudioSource> {
        self.handles
            .lock()
            .values()
            .filter(|handle| handle.playing)
            .map(|handle| handle.source.clone())
            .collect()
    }

    /// Report `status` from every loaded handle of `source`.
    pub fn report(&self, source: &AudioSource, status: PlaybackStatus) {
        let callbacks: Vec<StatusCallback> = self
            .handles
            .lock()
            .values()
            .filter(|handle| handle.source == *source)
            .map(|handle| Arc::clone(&handle.on_status))
            .collect();
        for callback in callbacks {
            callback(status.clone());
        }
    }

    /// Report `status` from an already unloaded handle of `source`.
    pub fn report_late(&self, source: &AudioSource, status: PlaybackStatus) {
        let callbacks: Vec<StatusCallback> = self
            .retired
            .lock()
            .iter()
            .filter(|(retired, _)| retired == source)
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in callbacks {
            callback(status.clone());
        }
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    fn source_of(&self, session: PlaybackSessionId) -> Result<AudioSource> {
        self.handles
            .lock()
            .get(&session)
            .map(|handle| handle.source.clone())
            .ok_or_else(|| BridgeError::OperationFailed(format!("unknown handle {session}")))
    }

    /// Apply `change` and report the resulting status outside the lock.
    fn transition(
        &self,
        session: PlaybackSessionId,
        change: impl FnOnce(&mut FakeHandle),
    ) -> Result<AudioSource> {
        let (source, callback, status) = {
            let mut handles = self.handles.lock();
            let handle = handles
                .get_mut(&session)
                .ok_or_else(|| BridgeError::OperationFailed(format!("unknown handle {session}")))?;
            change(handle);
            (
                handle.source.clone(),
                Arc::clone(&handle.on_status),
                handle.status(),
            )
        };
        callback(status);
        Ok(source)
    }
}

#[async_trait]
impl PlaybackAdapter for FakeAdapter {
    async fn create(
        &self,
        source: AudioSource,
        options: PlaybackOptions,
        on_status: StatusCallback,
    ) -> Result<PlaybackSessionId> {
        self.creates_started.fetch_add(1, Ordering::SeqCst);
        drop(self.create_gate.lock().await);

        self.record(Call::Create(source.clone(), options));
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("decoder unavailable".into()));
        }

        let session = PlaybackSessionId::new();
        let handle = FakeHandle {
            source,
            playing: options.should_play,
            looping: options.looping,
            position_millis: options.position_millis,
            on_status: Arc::clone(&on_status),
        };
        let status = handle.status();
        self.handles.lock().insert(session, handle);
        on_status(status);
        Ok(session)
    }

    async fn play(&self, session: PlaybackSessionId) -> Result<()> {
        let source = self.transition(session, |handle| handle.playing = true)?;
        self.record(Call::Play(source));
        Ok(())
    }

    async fn pause(&self, session: PlaybackSessionId) -> Result<()> {
        let source = self.transition(session, |handle| handle.playing = false)?;
        self.record(Call::Pause(source));
        Ok(())
    }

    async fn resume(&self, session: PlaybackSessionId) -> Result<()> {
        let source = self.transition(session, |handle| handle.playing = true)?;
        self.record(Call::Resume(source));
        Ok(())
    }

    async fn stop(&self, session: PlaybackSessionId) -> Result<()> {
        // No status report: some hosts stay silent after an explicit stop.
        let source = {
            let mut handles = self.handles.lock();
            let handle = handles
                .get_mut(&session)
                .ok_or_else(|| BridgeError::OperationFailed(format!("unknown handle {session}")))?;
            handle.playing = false;
            handle.position_millis = 0;
            handle.source.clone()
        };
        self.record(Call::Stop(source));
        Ok(())
    }

    async fn seek(&self, session: PlaybackSessionId, position_millis: u64) -> Result<()> {
        let source = self.transition(session, |handle| handle.position_millis = position_millis)?;
        self.record(Call::Seek(source, position_millis));
        Ok(())
    }

    async fn set_volume(&self, session: PlaybackSessionId, volume: f32) -> Result<()> {
        let source = self.source_of(session)?;
        self.record(Call::SetVolume(source, volume));
        Ok(())
    }

    async fn set_rate(&self, session: PlaybackSessionId, rate: f32) -> Result<()> {
        let source = self.source_of(session)?;
        if self.reject_rate.load(Ordering::SeqCst) {
            return Err(BridgeError::Unsupported(format!("rate {rate}")));
        }
        self.record(Call::SetRate(source, rate));
        Ok(())
    }

    async fn status(&self, session: PlaybackSessionId) -> Result<PlaybackStatus> {
        Ok(self
            .handles
            .lock()
            .get(&session)
            .map(FakeHandle::status)
            .unwrap_or_default())
    }

    async fn unload(&self, session: PlaybackSessionId) -> Result<()> {
        let removed = self.handles.lock().remove(&session);
        if let Some(handle) = removed {
            self.record(Call::Unload(handle.source.clone()));
            self.retired.lock().push((handle.source, handle.on_status));
        }
        if self.fail_unload.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("native release failed".into()));
        }
        Ok(())
    }
}

// ============================================================================
// File system
// ============================================================================

enum Remote {
    Body(Vec<u8>),
    Truncated,
}

/// File system kept in maps, with downloads served from registered URLs.
pub struct InMemoryFileSystem {
    root: PathBuf,
    files: Mutex<BTreeMap<PathBuf, Vec<u8>>>,
    dirs: Mutex<BTreeSet<PathBuf>>,
    remote: Mutex<HashMap<String, Remote>>,
    downloads: AtomicUsize,
    download_gate: tokio::sync::Mutex<()>,
}

impl InMemoryFileSystem {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            root: PathBuf::from("/cache"),
            files: Mutex::new(BTreeMap::new()),
            dirs: Mutex::new(BTreeSet::new()),
            remote: Mutex::new(HashMap::new()),
            downloads: AtomicUsize::new(0),
            download_gate: tokio::sync::Mutex::new(()),
        })
    }

    pub fn serve(&self, url: &str, body: &[u8]) {
        self.remote
            .lock()
            .insert(url.to_string(), Remote::Body(body.to_vec()));
    }

    /// Downloads of `url` end early and yield no result.
    pub fn serve_truncated(&self, url: &str) {
        self.remote.lock().insert(url.to_string(), Remote::Truncated);
    }

    pub fn put_file(&self, path: impl Into<PathBuf>, body: &[u8]) {
        let path = path.into();
        if let Some(parent) = path.parent() {
            self.dirs.lock().insert(parent.to_path_buf());
        }
        self.files.lock().insert(path, body.to_vec());
    }

    pub fn has_file(&self, path: impl AsRef<Path>) -> bool {
        self.files.lock().contains_key(path.as_ref())
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    /// Block every download until the guard is dropped.
    pub async fn hold_downloads(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.download_gate.lock().await
    }
}

#[async_trait]
impl FileSystemAccess for InMemoryFileSystem {
    async fn get_cache_directory(&self) -> Result<PathBuf> {
        Ok(self.root.clone())
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.files.lock().contains_key(path) || self.dirs.lock().contains(path))
    }

    async fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        if let Some(body) = self.files.lock().get(path) {
            return Ok(FileMetadata {
                size: body.len() as u64,
                created_at: None,
                modified_at: None,
                is_directory: false,
            });
        }
        if self.dirs.lock().contains(path) {
            return Ok(FileMetadata {
                size: 0,
                created_at: None,
                modified_at: None,
                is_directory: true,
            });
        }
        Err(BridgeError::OperationFailed(format!(
            "no such file: {}",
            path.display()
        )))
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut dirs = self.dirs.lock();
        for ancestor in path.ancestors() {
            dirs.insert(ancestor.to_path_buf());
        }
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        self.files.lock().remove(path);
        Ok(())
    }

    async fn delete_dir_all(&self, path: &Path) -> Result<()> {
        self.files.lock().retain(|file, _| !file.starts_with(path));
        self.dirs.lock().retain(|dir| !dir.starts_with(path));
        Ok(())
    }

    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>> {
        if !self.dirs.lock().contains(path) {
            return Err(BridgeError::OperationFailed(format!(
                "no such directory: {}",
                path.display()
            )));
        }
        let mut entries: Vec<PathBuf> = self
            .files
            .lock()
            .keys()
            .filter(|file| file.parent() == Some(path))
            .cloned()
            .collect();
        entries.extend(
            self.dirs
                .lock()
                .iter()
                .filter(|dir| dir.parent() == Some(path))
                .cloned(),
        );
        Ok(entries)
    }

    async fn download_resumable(
        &self,
        url: &str,
        destination: &Path,
        on_progress: Option<ProgressCallback>,
    ) -> Result<Option<DownloadResult>> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        drop(self.download_gate.lock().await);

        let body = match self.remote.lock().get(url) {
            Some(Remote::Body(body)) => body.clone(),
            Some(Remote::Truncated) => return Ok(None),
            None => return Err(BridgeError::OperationFailed(format!("404 for {url}"))),
        };

        let total = body.len() as u64;
        if let Some(progress) = &on_progress {
            progress(TransferProgress {
                bytes_written: total / 2,
                bytes_expected: Some(total),
            });
            progress(TransferProgress {
                bytes_written: total,
                bytes_expected: Some(total),
            });
        }

        self.put_file(destination, &body);
        Ok(Some(DownloadResult {
            path: destination.to_path_buf(),
            bytes: total,
            status: Some(200),
        }))
    }
}

// ============================================================================
// Storage resolver and clock
// ============================================================================

/// Maps storage paths to URLs; unknown paths fail.
#[derive(Default)]
pub struct FakeStorage {
    urls: Mutex<HashMap<String, String>>,
    calls: AtomicUsize,
}

impl FakeStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn map(&self, storage_path: &str, url: &str) {
        self.urls
            .lock()
            .insert(storage_path.to_string(), url.to_string());
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageResolver for FakeStorage {
    async fn get_download_url(&self, storage_path: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls
            .lock()
            .get(storage_path)
            .cloned()
            .ok_or_else(|| BridgeError::NotAvailable(format!("no object at {storage_path}")))
    }
}

pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self(Mutex::new(Utc::now())))
    }

    pub fn advance(&self, by: Duration) {
        let by = chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
        *self.0.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock()
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub adapter: Arc<FakeAdapter>,
    pub fs: Arc<InMemoryFileSystem>,
    pub storage: Arc<FakeStorage>,
    pub clock: Arc<ManualClock>,
    pub cache: Arc<SoundCache>,
    pub events: Arc<EventBus>,
    pub manager: Arc<AudioManager>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(true)
    }

    /// Harness whose resolver has no storage collaborator.
    pub fn without_storage() -> Self {
        Self::build(false)
    }

    fn build(with_storage: bool) -> Self {
        let adapter = FakeAdapter::new();
        let fs = InMemoryFileSystem::new();
        let storage = FakeStorage::new();
        let clock = ManualClock::new();
        let events = Arc::new(EventBus::new(256));

        let cache = Arc::new(
            SoundCache::new(fs.clone(), CacheConfig::default())
                .expect("valid cache config")
                .with_event_bus(Arc::clone(&events)),
        );
        let storage_resolver: Option<Arc<dyn StorageResolver>> = if with_storage {
            Some(storage.clone())
        } else {
            None
        };
        let resolver = Arc::new(SourceResolver::new(Arc::clone(&cache), storage_resolver));
        let manager = Arc::new(
            AudioManager::new(
                adapter.clone(),
                resolver,
                Arc::new(UiStateStore::new()),
                PreloadConfig::default(),
                clock.clone(),
            )
            .with_event_bus(Arc::clone(&events)),
        );

        Self {
            adapter,
            fs,
            storage,
            clock,
            cache,
            events,
            manager,
        }
    }
}

/// Poll `condition` until it holds, failing the test after two seconds.
pub async fn eventually<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within 2s"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
