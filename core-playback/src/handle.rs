//! Exclusive ownership of native handles.

use bridge_traits::PlaybackSessionId;

/// A native handle owned by the audio manager.
///
/// Not `Clone`: a handle lives either in the active session or in the
/// preload cache. `token` identifies the handle's status stream; callbacks
/// compare it against the active token before touching shared state.
#[derive(Debug)]
pub(crate) struct SoundHandle {
    session: PlaybackSessionId,
    token: u64,
}

impl SoundHandle {
    pub(crate) fn new(session: PlaybackSessionId, token: u64) -> Self {
        Self { session, token }
    }

    pub(crate) fn session(&self) -> PlaybackSessionId {
        self.session
    }

    pub(crate) fn token(&self) -> u64 {
        self.token
    }
}
