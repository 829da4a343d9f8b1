//! Observable playback state and per-attempt bookkeeping.

use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// What the player is doing, as seen by the UI.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "request_id", rename_all = "snake_case")]
pub enum PlaybackState {
    #[default]
    Idle,
    /// Resolving a source for this request id.
    Loading(String),
    /// Transport confirmed audio for this request id.
    Playing(String),
}

impl PlaybackState {
    pub fn is_playing(&self, request_id: &str) -> bool {
        matches!(self, PlaybackState::Playing(id) if id == request_id)
    }

    pub fn is_loading(&self, request_id: &str) -> bool {
        matches!(self, PlaybackState::Loading(id) if id == request_id)
    }

    pub fn request_id(&self) -> Option<&str> {
        match self {
            PlaybackState::Idle => None,
            PlaybackState::Loading(id) | PlaybackState::Playing(id) => Some(id),
        }
    }
}

/// One run of the resolution procedure for a request id.
///
/// The token is cancelled as soon as another toggle, `stop()` or `dispose()`
/// takes over the session.
#[derive(Debug, Clone)]
pub(crate) struct Attempt {
    pub request_id: String,
    pub seq: u64,
    pub token: CancellationToken,
}

#[derive(Debug, Default)]
struct Session {
    state: PlaybackState,
    // Source URL the element was playing when `state` became Playing.
    playing_src: Option<String>,
    seq: u64,
    token: Option<CancellationToken>,
}

pub(crate) struct SessionCell {
    session: Mutex<Session>,
    tx: watch::Sender<PlaybackState>,
}

impl SessionCell {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(PlaybackState::Idle);
        Self {
            session: Mutex::new(Session::default()),
            tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Publishing under the session lock keeps notifications in transition order.
    fn set_state(&self, session: &mut Session, state: PlaybackState) {
        session.state = state.clone();
        self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    pub fn snapshot(&self) -> PlaybackState {
        self.lock().state.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.tx.subscribe()
    }

    /// Supersede whatever is in flight and mark `request_id` as loading.
    pub fn begin(&self, request_id: &str, parent: &CancellationToken) -> Attempt {
        let mut session = self.lock();
        if let Some(previous) = session.token.take() {
            previous.cancel();
        }
        session.seq += 1;
        let token = parent.child_token();
        session.token = Some(token.clone());
        session.playing_src = None;
        self.set_state(&mut session, PlaybackState::Loading(request_id.to_string()));
        Attempt {
            request_id: request_id.to_string(),
            seq: session.seq,
            token,
        }
    }

    pub fn is_current(&self, attempt: &Attempt) -> bool {
        self.lock().seq == attempt.seq && !attempt.token.is_cancelled()
    }

    /// Run `f` while holding the session, only if `attempt` still owns it.
    ///
    /// Element mutations go through here so a superseded attempt can never
    /// repoint the element after its successor has taken over.
    pub fn run_if_current(&self, attempt: &Attempt, f: impl FnOnce()) -> bool {
        let session = self.lock();
        if session.seq != attempt.seq || attempt.token.is_cancelled() {
            return false;
        }
        f();
        true
    }

    /// Move a still-current attempt from Loading to Playing.
    pub fn mark_playing(&self, attempt: &Attempt, src: &str) -> bool {
        let mut session = self.lock();
        if session.seq != attempt.seq || attempt.token.is_cancelled() {
            return false;
        }
        session.playing_src = Some(src.to_string());
        self.set_state(&mut session, PlaybackState::Playing(attempt.request_id.clone()));
        true
    }

    /// Reset to Idle if `attempt` still owns the session.
    pub fn finish(&self, attempt: &Attempt) -> bool {
        let mut session = self.lock();
        if session.seq != attempt.seq {
            return false;
        }
        session.token = None;
        if matches!(session.state, PlaybackState::Loading(_)) {
            session.playing_src = None;
            self.set_state(&mut session, PlaybackState::Idle);
        }
        true
    }

    /// Supersede any attempt and go Idle.
    pub fn stop(&self) {
        let mut session = self.lock();
        if let Some(token) = session.token.take() {
            token.cancel();
        }
        session.seq += 1;
        session.playing_src = None;
        self.set_state(&mut session, PlaybackState::Idle);
    }

    /// Clear Playing when the element paused or ended the source it was playing.
    pub fn clear_if_playing(&self, src: &str) -> bool {
        let mut session = self.lock();
        let is_current_src = session.playing_src.as_deref() == Some(src);
        if !matches!(session.state, PlaybackState::Playing(_)) || !is_current_src {
            return false;
        }
        session.playing_src = None;
        self.set_state(&mut session, PlaybackState::Idle);
        true
    }
}

/// Clears Loading for its attempt on every exit path, including unwinding
/// and the owning future being dropped.
pub(crate) struct LoadingGuard<'a> {
    cell: &'a SessionCell,
    attempt: Attempt,
}

impl<'a> LoadingGuard<'a> {
    pub fn new(cell: &'a SessionCell, attempt: Attempt) -> Self {
        Self { cell, attempt }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.cell.finish(&self.attempt);
    }
}
