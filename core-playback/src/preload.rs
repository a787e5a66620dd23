//! In-memory cache of created-but-not-playing handles.
//!
//! Entries are kept in insertion order and are never reordered by lookups,
//! so the least-recently-used end of the [`LruCache`] is always the oldest
//! insert. Expiry and size eviction only happen when the manager asks for
//! them at the start of a preload; there is no background timer.

use crate::handle::SoundHandle;
use bridge_traits::playback::AudioSource;
use bridge_traits::time::Clock;
use chrono::{DateTime, Utc};
use lru::LruCache;
use std::sync::Arc;
use std::time::Duration;

pub use core_runtime::config::{DEFAULT_PRELOAD_CAPACITY, DEFAULT_PRELOAD_TTL};

/// Bounds of the preload cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreloadConfig {
    pub capacity: usize,
    pub ttl: Duration,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_PRELOAD_CAPACITY,
            ttl: DEFAULT_PRELOAD_TTL,
        }
    }
}

impl PreloadConfig {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self { capacity, ttl }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.capacity == 0 {
            return Err("Preload capacity must be at least 1".to_string());
        }
        if self.ttl.is_zero() {
            return Err("Preload TTL must be greater than zero".to_string());
        }
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct PreloadEntry {
    pub(crate) id: String,
    pub(crate) handle: SoundHandle,
    pub(crate) source: AudioSource,
    pub(crate) loaded_at: DateTime<Utc>,
}

pub(crate) struct PreloadCache {
    entries: LruCache<String, PreloadEntry>,
    config: PreloadConfig,
    clock: Arc<dyn Clock>,
}

impl PreloadCache {
    pub(crate) fn new(config: PreloadConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: LruCache::unbounded(),
            config,
            clock,
        }
    }

    pub(crate) fn config(&self) -> &PreloadConfig {
        &self.config
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn is_expired(&self, entry: &PreloadEntry) -> bool {
        let age = (self.clock.now() - entry.loaded_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        age > self.config.ttl
    }

    /// `true` if `id` is cached and not expired.
    pub(crate) fn is_fresh(&self, id: &str) -> bool {
        self.entries
            .peek(id)
            .is_some_and(|entry| !self.is_expired(entry))
    }

    /// Remove and return the entry for `id`, expired or not.
    pub(crate) fn take(&mut self, id: &str) -> Option<PreloadEntry> {
        self.entries.pop(id)
    }

    /// Remove every expired entry.
    pub(crate) fn sweep_expired(&mut self) -> Vec<PreloadEntry> {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| self.is_expired(entry))
            .map(|(id, _)| id.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|id| self.entries.pop(&id))
            .collect()
    }

    /// Remove oldest entries until one more fits.
    pub(crate) fn evict_for_insert(&mut self) -> Vec<PreloadEntry> {
        let mut evicted = Vec::new();
        while self.entries.len() >= self.config.capacity {
            match self.entries.pop_lru() {
                Some((_, entry)) => evicted.push(entry),
                None => break,
            }
        }
        evicted
    }

    /// Insert `entry`, returning an entry it replaced or pushed out.
    ///
    /// Callers run [`evict_for_insert`](PreloadCache::evict_for_insert)
    /// first; a displaced entry only appears when another preload raced in
    /// between.
    pub(crate) fn insert(&mut self, entry: PreloadEntry) -> Vec<PreloadEntry> {
        let mut displaced = Vec::new();
        if let Some((_, previous)) = self.entries.push(entry.id.clone(), entry) {
            displaced.push(previous);
        }
        while self.entries.len() > self.config.capacity {
            match self.entries.pop_lru() {
                Some((_, entry)) => displaced.push(entry),
                None => break,
            }
        }
        displaced
    }

    pub(crate) fn drain(&mut self) -> Vec<PreloadEntry> {
        let mut drained = Vec::with_capacity(self.entries.len());
        while let Some((_, entry)) = self.entries.pop_lru() {
            drained.push(entry);
        }
        drained
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Cached ids, oldest first.
    pub(crate) fn ids(&self) -> Vec<String> {
        self.entries.iter().rev().map(|(id, _)| id.clone()).collect()
    }
}
