//! # Event Bus System
//!
//! Broadcasts what the audio core is doing (sounds loading, starting,
//! finishing, downloads progressing) over `tokio::sync::broadcast`.
//!
//! The UI state container is the source of truth for the current playback
//! state; the bus is for side channels such as analytics, logging or a
//! download toast that want a history of transitions rather than a snapshot.
//!
//! ```text
//! ┌──────────────┐  emit   ┌───────────┐  subscribe  ┌────────────┐
//! │ AudioManager ├────────>│           ├────────────>│ Subscriber │
//! └──────────────┘         │ EventBus  │             └────────────┘
//! ┌──────────────┐  emit   │           │  subscribe  ┌────────────┐
//! │  SoundCache  ├────────>│           ├────────────>│ Subscriber │
//! └──────────────┘         └───────────┘             └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
//!
//! let bus = EventBus::new(16);
//! let mut rx = bus.subscribe();
//! bus.emit(CoreEvent::Playback(PlaybackEvent::Stopped {
//!     sound_id: "rain".to_string(),
//! }))
//! .ok();
//! assert!(rx.try_recv().is_ok());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, SendError};

pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that fall further behind receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Playback(PlaybackEvent),
    Cache(CacheEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Cache(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Cache(CacheEvent::DownloadFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::Started { .. }) => EventSeverity::Info,
            CoreEvent::Cache(CacheEvent::DownloadCompleted { .. }) => EventSeverity::Info,
            CoreEvent::Cache(CacheEvent::Cleared) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A handle is being created for the sound.
    Loading { sound_id: String },
    /// The sound is playing.
    Started {
        sound_id: String,
        /// Whether the source is a remote stream.
        streaming: bool,
        /// Whether the handle came out of the preload cache.
        from_preload: bool,
    },
    Paused { sound_id: String },
    Resumed { sound_id: String },
    Stopped { sound_id: String },
    /// The sound reached its end naturally.
    Finished { sound_id: String },
    /// The handle was released.
    Unloaded { sound_id: String },
    /// A handle was created ahead of time.
    Preloaded { sound_id: String },
    /// A preloaded handle was released without being played.
    PreloadEvicted { sound_id: String },
    Error {
        sound_id: Option<String>,
        message: String,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::Loading { .. } => "Sound loading",
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Resumed { .. } => "Playback resumed",
            PlaybackEvent::Stopped { .. } => "Playback stopped",
            PlaybackEvent::Finished { .. } => "Sound finished",
            PlaybackEvent::Unloaded { .. } => "Sound unloaded",
            PlaybackEvent::Preloaded { .. } => "Sound preloaded",
            PlaybackEvent::PreloadEvicted { .. } => "Preloaded sound evicted",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Cache Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum CacheEvent {
    DownloadStarted { filename: String },
    DownloadProgress {
        filename: String,
        /// Percentage in `0.0..=100.0`.
        percent: f64,
    },
    DownloadCompleted { filename: String, bytes: u64 },
    DownloadFailed { filename: String, message: String },
    /// A single cached file was removed.
    Deleted { filename: String },
    /// The whole cache directory was wiped.
    Cleared,
}

impl CacheEvent {
    fn description(&self) -> &str {
        match self {
            CacheEvent::DownloadStarted { .. } => "Download started",
            CacheEvent::DownloadProgress { .. } => "Download progress",
            CacheEvent::DownloadCompleted { .. } => "Download completed",
            CacheEvent::DownloadFailed { .. } => "Download failed",
            CacheEvent::Deleted { .. } => "Cached sound deleted",
            CacheEvent::Cleared => "Sound cache cleared",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning is cheap; every clone publishes into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if nobody is listening. Producers usually ignore that error.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a receiver for all future events. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::default();
/// let downloads = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Cache(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned from `recv`/`try_recv`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next matching event.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the subscriber fell behind by `n` events,
    /// `RecvError::Closed` once every sender is gone.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking variant of [`recv`](EventStream::recv); `None` when
    /// nothing matching is queued.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(Ok(event)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn started(id: &str) -> CoreEvent {
        CoreEvent::Playback(PlaybackEvent::Started {
            sound_id: id.to_string(),
            streaming: false,
            from_preload: false,
        })
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.emit(started("rain")).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        assert_eq!(bus.emit(started("rain")).unwrap(), 2);

        assert_eq!(a.recv().await.unwrap(), started("rain"));
        assert_eq!(b.recv().await.unwrap(), started("rain"));
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream =
            EventStream::new(bus.subscribe()).filter(|e| matches!(e, CoreEvent::Cache(_)));

        bus.emit(started("rain")).unwrap();
        bus.emit(CoreEvent::Cache(CacheEvent::Cleared)).unwrap();

        assert_eq!(
            stream.recv().await.unwrap(),
            CoreEvent::Cache(CacheEvent::Cleared)
        );
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut stream = EventStream::new(bus.subscribe());

        for id in ["a", "b", "c", "d"] {
            bus.emit(started(id)).unwrap();
        }

        match stream.recv().await {
            Err(RecvError::Lagged(n)) => assert_eq!(n, 2),
            other => panic!("expected lag, got {other:?}"),
        }
    }

    #[test]
    fn test_event_severity() {
        assert_eq!(
            CoreEvent::Playback(PlaybackEvent::Error {
                sound_id: None,
                message: "boom".into()
            })
            .severity(),
            EventSeverity::Error
        );
        assert_eq!(
            CoreEvent::Cache(CacheEvent::DownloadFailed {
                filename: "a.mp3".into(),
                message: "404".into()
            })
            .severity(),
            EventSeverity::Warning
        );
        assert_eq!(started("a").severity(), EventSeverity::Info);
        assert_eq!(
            CoreEvent::Playback(PlaybackEvent::Paused {
                sound_id: "a".into()
            })
            .severity(),
            EventSeverity::Debug
        );
    }

    #[test]
    fn test_event_description() {
        assert_eq!(started("a").description(), "Playback started");
        assert_eq!(
            CoreEvent::Cache(CacheEvent::Cleared).description(),
            "Sound cache cleared"
        );
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Cache(CacheEvent::DownloadCompleted {
            filename: "a.mp3".into(),
            bytes: 42,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Cache");
        assert_eq!(json["payload"]["event"], "DownloadCompleted");
        assert_eq!(json["payload"]["filename"], "a.mp3");

        let back: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[tokio::test]
    async fn test_try_recv_with_event() {
        let bus = EventBus::default();
        let mut stream = EventStream::new(bus.subscribe());
        assert!(stream.try_recv().is_none());

        bus.emit(started("wind")).unwrap();
        assert_eq!(stream.try_recv().unwrap().unwrap(), started("wind"));
    }
}
