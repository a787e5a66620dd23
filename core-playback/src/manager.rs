//! # Audio Manager
//!
//! Coordinates the single active playback session, the preload cache and
//! the UI state.
//!
//! ## Ownership
//!
//! At most one native handle is playing or paused at any time. It lives in
//! the session slot, guarded by an async mutex that every handle-mutating
//! operation takes for its whole duration. Preloaded handles live in the
//! [`PreloadCache`] until they are promoted into the session or released.
//!
//! ## Stale completions
//!
//! Every handle gets a token. Its status callback only writes UI state
//! while that token is the active one, and the check happens inside the
//! state store's write section, so a callback can never land after the
//! session that owned it was released. `play` also draws a request
//! generation: a request that is no longer the newest by the time it gets
//! the session returns [`PlaybackError::Superseded`] without side effects.

use crate::cache::{DownloadProgressFn, SoundCache};
use crate::error::{PlaybackError, Result};
use crate::handle::SoundHandle;
use crate::preload::{PreloadCache, PreloadConfig, PreloadEntry};
use crate::resolver::{BackgroundDownload, SoundRequest, SourceResolver};
use crate::sound::Sound;
use crate::state::{UiState, UiStatePatch, UiStateStore};
use bridge_traits::playback::{
    clamp_rate, clamp_volume, AudioSource, PlaybackAdapter, PlaybackOptions, PlaybackStatus,
    StatusCallback,
};
use bridge_traits::time::Clock;
use bridge_traits::{BridgeError, PlaybackSessionId};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use parking_lot::{Mutex, RwLock};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Token value meaning "no handle is active".
const NO_TOKEN: u64 = 0;

struct ActiveSession {
    id: String,
    handle: SoundHandle,
    source: AudioSource,
}

/// The playback coordinator.
pub struct AudioManager {
    adapter: Arc<dyn PlaybackAdapter>,
    resolver: Arc<SourceResolver>,
    state: Arc<UiStateStore>,
    session: tokio::sync::Mutex<Option<ActiveSession>>,
    current_id: RwLock<Option<String>>,
    preload: Mutex<PreloadCache>,
    active_token: Arc<AtomicU64>,
    next_token: AtomicU64,
    play_requests: AtomicU64,
    event_bus: Option<Arc<EventBus>>,
}

impl AudioManager {
    pub fn new(
        adapter: Arc<dyn PlaybackAdapter>,
        resolver: Arc<SourceResolver>,
        state: Arc<UiStateStore>,
        preload: PreloadConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            adapter,
            resolver,
            state,
            session: tokio::sync::Mutex::new(None),
            current_id: RwLock::new(None),
            preload: Mutex::new(PreloadCache::new(preload, clock)),
            active_token: Arc::new(AtomicU64::new(NO_TOKEN)),
            next_token: AtomicU64::new(NO_TOKEN + 1),
            play_requests: AtomicU64::new(0),
            event_bus: None,
        }
    }

    /// Set event bus for playback events.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn state(&self) -> &Arc<UiStateStore> {
        &self.state
    }

    pub fn resolver(&self) -> &Arc<SourceResolver> {
        &self.resolver
    }

    pub fn cache(&self) -> &Arc<SoundCache> {
        self.resolver.cache()
    }

    pub fn preload_config(&self) -> PreloadConfig {
        *self.preload.lock().config()
    }

    // ========================================================================
    // Playback
    // ========================================================================

    /// Play `source` as sound `id`.
    ///
    /// If `id` is already loaded this resumes it, or does nothing if it is
    /// playing. Otherwise the current session is released first, then the
    /// sound is promoted from the preload cache or created fresh.
    pub async fn play(&self, id: &str, source: AudioSource, options: PlaybackOptions) -> Result<()> {
        let is_streaming = source.is_remote();
        self.play_resolved(id, source, options, is_streaming).await
    }

    /// Resolve `sound` and play it.
    ///
    /// A cache download started by resolution runs in the background and is
    /// reflected in `downloading_sound_id` and `download_progress`. Its
    /// failure never fails this call.
    #[instrument(skip(self, sound, options), fields(sound_id = %sound.id))]
    pub async fn play_sound(&self, sound: &Sound, options: PlaybackOptions) -> Result<()> {
        let progress = self.download_progress_reporter(&sound.id);
        let Some(request) = self.resolver.request(sound, Some(progress)).await else {
            let err = PlaybackError::InvalidSource(format!(
                "sound '{}' has no playable source",
                sound.id
            ));
            self.record_error(Some(sound.id.as_str()), &err);
            return Err(err);
        };
        self.play_request(request, options).await
    }

    /// Play an already resolved sound.
    pub async fn play_request(&self, request: SoundRequest, options: PlaybackOptions) -> Result<()> {
        let SoundRequest { sound, resolved } = request;
        let result = self
            .play_resolved(&sound.id, resolved.source, options, resolved.is_streaming)
            .await;

        if let Some(download) = resolved.background_download {
            if result.is_ok() && !download.is_finished() {
                self.state.set(UiStatePatch {
                    downloading_sound_id: Some(Some(sound.id.clone())),
                    ..UiStatePatch::default()
                });
            }
            self.track_download(sound.id.clone(), download);
        }
        result
    }

    #[instrument(skip(self, source, options), fields(sound_id = %id))]
    async fn play_resolved(
        &self,
        id: &str,
        source: AudioSource,
        options: PlaybackOptions,
        is_streaming: bool,
    ) -> Result<()> {
        if let Err(err) = validate_request(id, &source) {
            self.record_error(Some(id), &err);
            return Err(err);
        }

        let generation = self.play_requests.fetch_add(1, Ordering::SeqCst) + 1;
        let mut session = self.session.lock().await;
        if self.play_requests.load(Ordering::SeqCst) != generation {
            debug!("Play request superseded");
            return Err(PlaybackError::Superseded {
                sound_id: id.to_string(),
            });
        }

        let options = options.normalized();

        if let Some(active) = session.as_ref().filter(|active| active.id == id) {
            if self.continue_in_place(active).await? {
                return Ok(());
            }
        }

        self.release_session(&mut session).await;

        *self.current_id.write() = Some(id.to_string());
        self.state.set(
            UiStatePatch::new()
                .current_id(Some(id.to_string()))
                .source(Some(source.clone()))
                .streaming(is_streaming)
                .volume(options.volume)
                .rate(options.rate)
                .error(None),
        );
        self.emit(PlaybackEvent::Loading {
            sound_id: id.to_string(),
        });

        let (handle, from_preload) = match self.promote_preloaded(id, &source, &options).await {
            Some(handle) => (handle, true),
            None => match self.create_active(id, &source, &options).await {
                Ok(handle) => (handle, false),
                Err(e) => return Err(self.fail_play(id, e)),
            },
        };

        *session = Some(ActiveSession {
            id: id.to_string(),
            handle,
            source,
        });

        info!(streaming = is_streaming, from_preload, "Playback started");
        self.emit(PlaybackEvent::Started {
            sound_id: id.to_string(),
            streaming: is_streaming,
            from_preload,
        });
        Ok(())
    }

    /// Handle a play request for the sound that is already loaded. Returns
    /// `false` if the handle has to be replaced.
    async fn continue_in_place(&self, active: &ActiveSession) -> Result<bool> {
        let handle = active.handle.session();
        let status = match self.adapter.status(handle).await {
            Ok(status) if status.is_loaded => status,
            Ok(_) => return Ok(false),
            Err(e) => {
                debug!(error = %e, "Status query failed, reloading");
                return Ok(false);
            }
        };

        if status.is_playing {
            debug!("Already playing");
            return Ok(true);
        }

        let at_end = status
            .duration_millis
            .is_some_and(|duration| duration > 0 && status.position_millis >= duration);
        if at_end {
            self.adapter.seek(handle, 0).await?;
            self.adapter.play(handle).await?;
        } else {
            self.adapter.resume(handle).await?;
        }

        debug!("Resumed in place");
        self.emit(PlaybackEvent::Resumed {
            sound_id: active.id.clone(),
        });
        Ok(true)
    }

    /// Move a fresh preloaded handle for `id` into play. A stale or failing
    /// entry is released and `None` returned so the caller creates anew.
    async fn promote_preloaded(
        &self,
        id: &str,
        source: &AudioSource,
        options: &PlaybackOptions,
    ) -> Option<SoundHandle> {
        let (entry, usable) = {
            let mut preload = self.preload.lock();
            let entry = preload.take(id)?;
            let usable = !preload.is_expired(&entry) && entry.source == *source;
            (entry, usable)
        };

        if !usable {
            self.release_preloaded(entry).await;
            return None;
        }

        let handle = entry.handle.session();
        self.active_token.store(entry.handle.token(), Ordering::SeqCst);

        match self.start_preloaded(handle, options).await {
            Ok(()) => {
                debug!("Promoted preloaded handle");
                Some(entry.handle)
            }
            Err(e) => {
                warn!(error = %e, "Failed to start preloaded handle, creating a new one");
                self.active_token.store(NO_TOKEN, Ordering::SeqCst);
                self.unload_quietly(&entry.id, entry.handle).await;
                None
            }
        }
    }

    async fn start_preloaded(
        &self,
        handle: PlaybackSessionId,
        options: &PlaybackOptions,
    ) -> std::result::Result<(), BridgeError> {
        self.adapter.set_volume(handle, options.volume).await?;
        if let Err(e) = self.adapter.set_rate(handle, options.rate).await {
            warn!(rate = options.rate, error = %e, "Playback rate not applied");
        }
        if options.position_millis > 0 {
            self.adapter.seek(handle, options.position_millis).await?;
        }
        self.adapter.play(handle).await
    }

    async fn create_active(
        &self,
        id: &str,
        source: &AudioSource,
        options: &PlaybackOptions,
    ) -> std::result::Result<SoundHandle, BridgeError> {
        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
        // Active before create so the first status updates land.
        self.active_token.store(token, Ordering::SeqCst);

        let on_status = self.status_callback(id, token);
        match self
            .adapter
            .create(source.clone(), options.with_should_play(true), on_status)
            .await
        {
            Ok(session) => Ok(SoundHandle::new(session, token)),
            Err(e) => {
                let _ = self.active_token.compare_exchange(
                    token,
                    NO_TOKEN,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                );
                Err(e)
            }
        }
    }

    /// Roll back the optimistic session state after a failed play.
    fn fail_play(&self, id: &str, cause: BridgeError) -> PlaybackError {
        {
            let mut current = self.current_id.write();
            if current.as_deref() == Some(id) {
                *current = None;
            }
        }

        let err = PlaybackError::CreationFailed {
            sound_id: id.to_string(),
            message: cause.to_string(),
        };
        error!(error = %err, "Failed to start playback");

        self.state.set(
            UiStatePatch::new()
                .current_id(None)
                .source(None)
                .playing(false)
                .buffering(false)
                .streaming(false)
                .error(Some(err.to_string())),
        );
        self.emit(PlaybackEvent::Error {
            sound_id: Some(id.to_string()),
            message: err.to_string(),
        });
        err
    }

    fn status_callback(&self, id: &str, token: u64) -> StatusCallback {
        let state = Arc::clone(&self.state);
        let active_token = Arc::clone(&self.active_token);
        let event_bus = self.event_bus.clone();
        let sound_id = id.to_string();

        Arc::new(move |status: PlaybackStatus| {
            let mut relevant = false;
            state.update(|ui| {
                if active_token.load(Ordering::SeqCst) != token {
                    return false;
                }
                relevant = true;
                apply_status(ui, &status)
            });

            if !relevant {
                return;
            }
            let Some(bus) = &event_bus else {
                return;
            };
            if status.did_just_finish && !status.is_looping {
                let _ = bus.emit(CoreEvent::Playback(PlaybackEvent::Finished {
                    sound_id: sound_id.clone(),
                }));
            }
            if let Some(message) = &status.error {
                let _ = bus.emit(CoreEvent::Playback(PlaybackEvent::Error {
                    sound_id: Some(sound_id.clone()),
                    message: message.clone(),
                }));
            }
        })
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Pause the active sound. No-op if nothing is loaded.
    #[instrument(skip(self))]
    pub async fn pause(&self) -> Result<()> {
        let session = self.session.lock().await;
        let Some(active) = session.as_ref() else {
            return Ok(());
        };
        self.adapter.pause(active.handle.session()).await?;
        self.emit(PlaybackEvent::Paused {
            sound_id: active.id.clone(),
        });
        Ok(())
    }

    /// Resume the active sound. No-op if nothing is loaded.
    #[instrument(skip(self))]
    pub async fn resume(&self) -> Result<()> {
        let session = self.session.lock().await;
        let Some(active) = session.as_ref() else {
            return Ok(());
        };
        self.adapter.resume(active.handle.session()).await?;
        self.emit(PlaybackEvent::Resumed {
            sound_id: active.id.clone(),
        });
        Ok(())
    }

    /// Stop the active sound and rewind. The handle stays loaded.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<()> {
        let session = self.session.lock().await;
        let Some(active) = session.as_ref() else {
            return Ok(());
        };
        self.adapter.stop(active.handle.session()).await?;

        // Some hosts never report a final status after an explicit stop.
        self.state.set(
            UiStatePatch::new()
                .playing(false)
                .buffering(false)
                .position(0)
                .duration(0),
        );
        self.emit(PlaybackEvent::Stopped {
            sound_id: active.id.clone(),
        });
        Ok(())
    }

    /// Seek the active sound. Negative positions seek to the start; no-op if
    /// nothing is loaded.
    #[instrument(skip(self))]
    pub async fn seek(&self, position_millis: i64) -> Result<()> {
        let session = self.session.lock().await;
        let Some(active) = session.as_ref() else {
            return Ok(());
        };
        let handle = active.handle.session();
        if !self.adapter.status(handle).await?.is_loaded {
            debug!("Seek ignored, handle not loaded");
            return Ok(());
        }

        let position = u64::try_from(position_millis.max(0)).unwrap_or_default();
        self.adapter.seek(handle, position).await?;
        Ok(())
    }

    /// Set the volume, clamped to `0.0..=1.0`. The UI state is updated even
    /// when nothing is loaded.
    #[instrument(skip(self))]
    pub async fn set_volume(&self, volume: f32) -> Result<()> {
        let volume = clamp_volume(volume);
        let session = self.session.lock().await;
        self.state.set(UiStatePatch::new().volume(volume));

        if let Some(active) = session.as_ref() {
            self.adapter
                .set_volume(active.handle.session(), volume)
                .await?;
        }
        Ok(())
    }

    /// Set the rate, clamped to `0.5..=2.0`. A host that rejects the rate is
    /// logged and otherwise ignored.
    #[instrument(skip(self))]
    pub async fn set_rate(&self, rate: f32) {
        let rate = clamp_rate(rate);
        let session = self.session.lock().await;

        if let Some(active) = session.as_ref() {
            if let Err(e) = self.adapter.set_rate(active.handle.session(), rate).await {
                let err = PlaybackError::RateUnsupported(e.to_string());
                warn!(rate, error = %err, "Playback rate not applied");
                return;
            }
        }
        self.state.set(UiStatePatch::new().rate(rate));
    }

    /// Release the active sound and reset the UI state. Safe to call when
    /// nothing is loaded.
    #[instrument(skip(self))]
    pub async fn unload(&self) {
        let mut session = self.session.lock().await;
        self.release_session(&mut session).await;
    }

    async fn release_session(&self, session: &mut Option<ActiveSession>) {
        self.active_token.store(NO_TOKEN, Ordering::SeqCst);

        if let Some(active) = session.take() {
            debug!(sound_id = %active.id, streaming = active.source.is_remote(), "Releasing session");
            self.unload_quietly(&active.id, active.handle).await;
            self.emit(PlaybackEvent::Unloaded {
                sound_id: active.id,
            });
        }

        *self.current_id.write() = None;
        self.state.reset();
    }

    async fn unload_quietly(&self, id: &str, handle: SoundHandle) {
        if let Err(e) = self.adapter.unload(handle.session()).await {
            let err = PlaybackError::UnloadFailed(e.to_string());
            warn!(sound_id = %id, error = %err, "Ignoring unload failure");
        }
    }

    // ========================================================================
    // Preloading
    // ========================================================================

    /// Create a silent handle for `id` so a later [`play`](Self::play)
    /// starts without loading. No-op if `id` is already preloaded.
    #[instrument(skip(self, source, options), fields(sound_id = %id))]
    pub async fn preload(&self, id: &str, source: AudioSource, options: PlaybackOptions) -> Result<()> {
        validate_request(id, &source)?;

        let released = {
            let mut preload = self.preload.lock();
            if preload.is_fresh(id) {
                debug!("Already preloaded");
                return Ok(());
            }
            let mut released = preload.sweep_expired();
            released.extend(preload.evict_for_insert());
            released
        };
        for entry in released {
            self.release_preloaded(entry).await;
        }

        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
        let on_status = self.status_callback(id, token);
        let options = options.normalized().with_should_play(false);
        let session = self
            .adapter
            .create(source.clone(), options, on_status)
            .await
            .map_err(|e| PlaybackError::CreationFailed {
                sound_id: id.to_string(),
                message: e.to_string(),
            })?;

        let (displaced, cached) = {
            let mut preload = self.preload.lock();
            let entry = PreloadEntry {
                id: id.to_string(),
                handle: SoundHandle::new(session, token),
                source,
                loaded_at: preload.now(),
            };
            let displaced = preload.insert(entry);
            (displaced, preload.len())
        };
        for entry in displaced {
            self.release_preloaded(entry).await;
        }

        debug!(cached, "Preloaded");
        self.emit(PlaybackEvent::Preloaded {
            sound_id: id.to_string(),
        });
        Ok(())
    }

    /// Resolve `sound` and preload it.
    pub async fn preload_sound(&self, sound: &Sound, options: PlaybackOptions) -> Result<()> {
        let resolved = self.resolver.resolve(sound, None).await.ok_or_else(|| {
            PlaybackError::InvalidSource(format!("sound '{}' has no playable source", sound.id))
        })?;
        self.preload(&sound.id, resolved.source, options).await
    }

    async fn release_preloaded(&self, entry: PreloadEntry) {
        debug!(sound_id = %entry.id, "Releasing preloaded handle");
        self.unload_quietly(&entry.id, entry.handle).await;
        self.emit(PlaybackEvent::PreloadEvicted { sound_id: entry.id });
    }

    /// Release every preloaded handle.
    #[instrument(skip(self))]
    pub async fn clear_cache(&self) {
        let drained = self.preload.lock().drain();
        for entry in drained {
            self.release_preloaded(entry).await;
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Id of the loaded sound, or of the sound being loaded.
    pub fn current_id(&self) -> Option<String> {
        self.current_id.read().clone()
    }

    /// `true` if `id` has a fresh preloaded handle.
    pub fn is_cached(&self, id: &str) -> bool {
        self.preload.lock().is_fresh(id)
    }

    /// Preloaded ids, oldest first. Includes expired entries not yet swept.
    pub fn preloaded_ids(&self) -> Vec<String> {
        self.preload.lock().ids()
    }

    pub fn ui_state(&self) -> UiState {
        self.state.get()
    }

    // ========================================================================
    // Downloads
    // ========================================================================

    /// Download `sound` into the file cache, tracking progress in the UI
    /// state. Failures are returned.
    #[instrument(skip(self, sound), fields(sound_id = %sound.id))]
    pub async fn download_sound(&self, sound: &Sound) -> Result<PathBuf> {
        self.state
            .set(UiStatePatch::new().downloading(Some(sound.id.clone()), 0));
        let progress = self.download_progress_reporter(&sound.id);
        let result = self.resolver.download(sound, Some(progress)).await;
        clear_download(&self.state, &sound.id);
        result
    }

    fn download_progress_reporter(&self, sound_id: &str) -> DownloadProgressFn {
        let state = Arc::clone(&self.state);
        let sound_id = sound_id.to_string();
        Arc::new(move |fraction: f64| {
            let percent = (fraction * 100.0).round().clamp(0.0, 100.0) as u8;
            state.set(UiStatePatch::new().downloading(Some(sound_id.clone()), percent));
        })
    }

    fn track_download(&self, sound_id: String, download: BackgroundDownload) {
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let cached = download.finished().await;
            debug!(sound_id = %sound_id, cached = cached.is_some(), "Background download settled");
            clear_download(&state, &sound_id);
        });
    }

    fn record_error(&self, id: Option<&str>, err: &PlaybackError) {
        warn!(sound_id = ?id, error = %err, "Playback request rejected");
        if err.records_in_ui() {
            self.state.set(UiStatePatch::new().error(Some(err.to_string())));
        }
        self.emit(PlaybackEvent::Error {
            sound_id: id.map(str::to_string),
            message: err.to_string(),
        });
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Playback(event));
        }
    }
}

fn validate_request(id: &str, source: &AudioSource) -> Result<()> {
    if id.trim().is_empty() {
        return Err(PlaybackError::InvalidSource("sound id cannot be empty".to_string()));
    }
    let empty = match source {
        AudioSource::BundledAsset { asset } => asset.trim().is_empty(),
        AudioSource::LocalFile { path } => path.as_os_str().is_empty(),
        AudioSource::RemoteStream { url, .. } => url.trim().is_empty(),
    };
    if empty {
        return Err(PlaybackError::InvalidSource(format!(
            "sound '{id}' has an empty source"
        )));
    }
    Ok(())
}

/// Merge a host status into the UI state.
fn apply_status(ui: &mut UiState, status: &PlaybackStatus) -> bool {
    let finished = status.did_just_finish && !status.is_looping;
    let mut patch = UiStatePatch::new()
        .playing(status.is_loaded && status.is_playing && !finished)
        .buffering(status.is_buffering)
        .position(status.position_millis);
    if let Some(duration) = status.duration_millis {
        patch = patch.duration(duration);
    }
    if let Some(message) = &status.error {
        patch = patch.error(Some(message.clone()));
    }
    ui.apply(&patch)
}

fn clear_download(state: &UiStateStore, sound_id: &str) {
    state.update(|ui| {
        if ui.downloading_sound_id.as_deref() != Some(sound_id) {
            return false;
        }
        ui.downloading_sound_id = None;
        ui.download_progress = 0;
        true
    });
}
