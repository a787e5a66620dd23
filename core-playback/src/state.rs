//! # UI State
//!
//! [`UiStateStore`] is the single observable record of what the audio
//! manager is doing. Only the manager writes to it; UI layers read it
//! through [`UiStateStore::get`], callback subscriptions, or a
//! [`tokio::sync::watch`] receiver.
//!
//! Writes merge individual fields. Listeners are only called when a write
//! actually changes something, and always outside the store's locks, so a
//! listener may read the store again.

use bridge_traits::playback::AudioSource;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::watch;

/// Snapshot of playback and cache state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UiState {
    pub is_playing: bool,
    pub is_buffering: bool,
    pub position_millis: u64,
    pub duration_millis: u64,
    pub volume: f32,
    pub rate: f32,
    /// Last error worth showing to the user
    pub error: Option<String>,
    #[serde(serialize_with = "serialize_source")]
    pub current_source: Option<AudioSource>,
    pub current_id: Option<String>,
    pub downloading_sound_id: Option<String>,
    /// Download progress in percent, `0..=100`
    pub download_progress: u8,
    pub is_streaming: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            is_playing: false,
            is_buffering: false,
            position_millis: 0,
            duration_millis: 0,
            volume: 1.0,
            rate: 1.0,
            error: None,
            current_source: None,
            current_id: None,
            downloading_sound_id: None,
            download_progress: 0,
            is_streaming: false,
        }
    }
}

fn serialize_source<S>(source: &Option<AudioSource>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match source {
        Some(source) => serializer.serialize_some(&source.to_string()),
        None => serializer.serialize_none(),
    }
}

impl UiState {
    /// Merge `patch`, returning `true` if any field changed.
    pub fn apply(&mut self, patch: &UiStatePatch) -> bool {
        let mut changed = false;
        changed |= merge(&mut self.is_playing, &patch.is_playing);
        changed |= merge(&mut self.is_buffering, &patch.is_buffering);
        changed |= merge(&mut self.position_millis, &patch.position_millis);
        changed |= merge(&mut self.duration_millis, &patch.duration_millis);
        changed |= merge(&mut self.volume, &patch.volume);
        changed |= merge(&mut self.rate, &patch.rate);
        changed |= merge(&mut self.error, &patch.error);
        changed |= merge(&mut self.current_source, &patch.current_source);
        changed |= merge(&mut self.current_id, &patch.current_id);
        changed |= merge(&mut self.downloading_sound_id, &patch.downloading_sound_id);
        changed |= merge(&mut self.download_progress, &patch.download_progress);
        changed |= merge(&mut self.is_streaming, &patch.is_streaming);
        changed
    }
}

fn merge<T: PartialEq + Clone>(field: &mut T, value: &Option<T>) -> bool {
    match value {
        Some(value) if *field != *value => {
            *field = value.clone();
            true
        }
        _ => false,
    }
}

/// A partial update. `None` leaves a field untouched; `Some(None)` clears an
/// optional field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UiStatePatch {
    pub is_playing: Option<bool>,
    pub is_buffering: Option<bool>,
    pub position_millis: Option<u64>,
    pub duration_millis: Option<u64>,
    pub volume: Option<f32>,
    pub rate: Option<f32>,
    pub error: Option<Option<String>>,
    pub current_source: Option<Option<AudioSource>>,
    pub current_id: Option<Option<String>>,
    pub downloading_sound_id: Option<Option<String>>,
    pub download_progress: Option<u8>,
    pub is_streaming: Option<bool>,
}

impl UiStatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn playing(mut self, is_playing: bool) -> Self {
        self.is_playing = Some(is_playing);
        self
    }

    pub fn buffering(mut self, is_buffering: bool) -> Self {
        self.is_buffering = Some(is_buffering);
        self
    }

    pub fn position(mut self, millis: u64) -> Self {
        self.position_millis = Some(millis);
        self
    }

    pub fn duration(mut self, millis: u64) -> Self {
        self.duration_millis = Some(millis);
        self
    }

    pub fn volume(mut self, volume: f32) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn rate(mut self, rate: f32) -> Self {
        self.rate = Some(rate);
        self
    }

    pub fn error(mut self, error: Option<String>) -> Self {
        self.error = Some(error);
        self
    }

    pub fn source(mut self, source: Option<AudioSource>) -> Self {
        self.current_source = Some(source);
        self
    }

    pub fn current_id(mut self, id: Option<String>) -> Self {
        self.current_id = Some(id);
        self
    }

    pub fn downloading(mut self, sound_id: Option<String>, progress: u8) -> Self {
        self.downloading_sound_id = Some(sound_id);
        self.download_progress = Some(progress.min(100));
        self
    }

    pub fn streaming(mut self, is_streaming: bool) -> Self {
        self.is_streaming = Some(is_streaming);
        self
    }
}

/// Callback invoked with the new state after every effective write.
pub type StateListener = Arc<dyn Fn(&UiState) + Send + Sync>;

/// Observable holder of [`UiState`].
pub struct UiStateStore {
    sender: watch::Sender<UiState>,
    listeners: Mutex<BTreeMap<u64, StateListener>>,
    next_listener: AtomicU64,
}

impl UiStateStore {
    pub fn new() -> Self {
        Self::with_state(UiState::default())
    }

    pub fn with_state(state: UiState) -> Self {
        let (sender, _) = watch::channel(state);
        Self {
            sender,
            listeners: Mutex::new(BTreeMap::new()),
            next_listener: AtomicU64::new(0),
        }
    }

    /// Current snapshot.
    pub fn get(&self) -> UiState {
        self.sender.borrow().clone()
    }

    /// Call `listener` after every change until the returned
    /// [`Subscription`] is dropped.
    pub fn subscribe(self: &Arc<Self>, listener: StateListener) -> Subscription {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().insert(id, listener);
        Subscription {
            store: Arc::downgrade(self),
            id,
        }
    }

    /// Receiver that observes every change.
    pub fn watch(&self) -> watch::Receiver<UiState> {
        self.sender.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub(crate) fn set(&self, patch: UiStatePatch) -> bool {
        self.update(|state| state.apply(&patch))
    }

    /// Mutate in place. `mutate` runs inside the store's critical section and
    /// returns whether it changed anything.
    pub(crate) fn update<F>(&self, mutate: F) -> bool
    where
        F: FnOnce(&mut UiState) -> bool,
    {
        let changed = self.sender.send_if_modified(mutate);
        if changed {
            self.notify();
        }
        changed
    }

    pub(crate) fn reset(&self) {
        self.update(|state| {
            let initial = UiState::default();
            if *state == initial {
                return false;
            }
            *state = initial;
            true
        });
    }

    fn notify(&self) {
        let snapshot = self.get();
        let listeners: Vec<StateListener> = self.listeners.lock().values().cloned().collect();
        for listener in listeners {
            listener(&snapshot);
        }
    }

    fn unsubscribe(&self, id: u64) {
        self.listeners.lock().remove(&id);
    }
}

impl Default for UiStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UiStateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiStateStore")
            .field("state", &*self.sender.borrow())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Keeps a listener registered. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    store: Weak<UiStateStore>,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store.unsubscribe(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
