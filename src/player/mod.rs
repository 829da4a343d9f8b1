//! Recording playback controller.
//!
//! Plays back a stored dictation recording inside the webview, given only its
//! request id. Direct asset streaming is attempted first; hosts that hang or
//! fail on it fall back to an in-memory blob source, and the player remembers
//! that for the rest of its lifetime.
//!
//! ## Guarantees
//! - At most one request id is loading and at most one is playing
//! - Every `toggle` settles, with at most one error notification
//! - Resolved sources are cached per request id
//! - Every blob URL minted is revoked by `dispose()` at the latest

mod backend;
mod blobs;
mod cache;
mod controller;
mod element;
mod host;
mod probe;
mod session;
mod watchdog;

pub use backend::{BackendError, RecordingBackend};
pub use cache::{CachedSource, SourceKind};
pub use controller::{ErrorHandler, RecordingPlayer};
pub use host::{AudioTransport, MediaError, MediaHost, TransportEvent};
pub use probe::PlayabilityFlag;
pub use session::PlaybackState;

use serde::Serialize;
use std::time::Duration;

/// Errors that can occur while resolving or starting playback
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("No recording found for this request")]
    AbsentRecording,

    #[error("Playback did not start within {0:?}")]
    PlaybackStartTimeout(Duration),

    #[error("Playback error: {0}")]
    Transport(String),

    #[error("Audio format not supported: {0}")]
    UnsupportedFormat(String),

    #[error("Audio load was aborted")]
    AbortedLoad,

    #[error("Network failure while loading audio: {0}")]
    NetworkFailure(String),

    #[error("Playback failed: {0}")]
    OtherPlaybackFailure(String),

    #[error("Recording backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Invalid audio payload: {0}")]
    InvalidAudio(String),

    #[error("Media host error: {0}")]
    Host(String),

    #[error("Playback request superseded")]
    Superseded,

    #[error("Player has been disposed")]
    Disposed,
}

impl PlaybackError {
    /// Whether a failure of a direct asset source should fall back to a blob source.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PlaybackError::PlaybackStartTimeout(_)
                | PlaybackError::Transport(_)
                | PlaybackError::UnsupportedFormat(_)
                | PlaybackError::AbortedLoad
                | PlaybackError::NetworkFailure(_)
        )
    }

    /// Short category tag for the UI.
    pub fn error_type(&self) -> &'static str {
        match self {
            PlaybackError::AbsentRecording => "not_found",
            PlaybackError::PlaybackStartTimeout(_) => "timeout",
            PlaybackError::Transport(_)
            | PlaybackError::UnsupportedFormat(_)
            | PlaybackError::AbortedLoad
            | PlaybackError::NetworkFailure(_)
            | PlaybackError::OtherPlaybackFailure(_) => "playback",
            PlaybackError::Backend(_) => "backend",
            PlaybackError::InvalidAudio(_) => "audio",
            PlaybackError::Host(_) => "host",
            PlaybackError::Superseded => "cancelled",
            PlaybackError::Disposed => "state",
        }
    }
}

impl From<MediaError> for PlaybackError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Aborted => PlaybackError::AbortedLoad,
            MediaError::Network(msg) => PlaybackError::NetworkFailure(msg),
            MediaError::SrcNotSupported(msg) => PlaybackError::UnsupportedFormat(msg),
            MediaError::Other(msg) => PlaybackError::Transport(msg),
            MediaError::Decode(msg) => PlaybackError::OtherPlaybackFailure(format!("decode error: {}", msg)),
            MediaError::NotAllowed(msg) => PlaybackError::OtherPlaybackFailure(format!("not allowed: {}", msg)),
        }
    }
}

/// Payload delivered to the error handler when a `toggle` fails.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PlaybackErrorNotice {
    pub request_id: String,
    pub message: String,
    pub error_type: String,
}

impl PlaybackErrorNotice {
    pub fn new(request_id: &str, err: &PlaybackError) -> Self {
        let message = match err {
            PlaybackError::AbsentRecording => err.to_string(),
            other => format!("Failed to play recording: {}", other),
        };
        Self {
            request_id: request_id.to_string(),
            message,
            error_type: err.error_type().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(PlaybackError::PlaybackStartTimeout(Duration::from_millis(700)).is_recoverable());
        assert!(PlaybackError::from(MediaError::Other("error event".into())).is_recoverable());
        assert!(PlaybackError::from(MediaError::SrcNotSupported("wav".into())).is_recoverable());
        assert!(PlaybackError::from(MediaError::Aborted).is_recoverable());
        assert!(PlaybackError::from(MediaError::Network("refused".into())).is_recoverable());

        assert!(!PlaybackError::from(MediaError::Decode("bad frame".into())).is_recoverable());
        assert!(!PlaybackError::from(MediaError::NotAllowed("autoplay".into())).is_recoverable());
        assert!(!PlaybackError::AbsentRecording.is_recoverable());
        assert!(!PlaybackError::Superseded.is_recoverable());
        assert!(!PlaybackError::InvalidAudio("empty".into()).is_recoverable());
    }

    #[test]
    fn test_notice_messages() {
        let notice = PlaybackErrorNotice::new("req-1", &PlaybackError::AbsentRecording);
        assert_eq!(notice.message, "No recording found for this request");
        assert_eq!(notice.error_type, "not_found");

        let notice = PlaybackErrorNotice::new("req-1", &PlaybackError::Transport("boom".into()));
        assert_eq!(notice.message, "Failed to play recording: Playback error: boom");
        assert_eq!(notice.error_type, "playback");
        assert_eq!(notice.request_id, "req-1");
    }

    #[test]
    fn test_notice_serializes_for_ui() {
        let notice = PlaybackErrorNotice::new("req-1", &PlaybackError::AbortedLoad);
        let json = serde_json::to_value(&notice).unwrap();
        assert_eq!(json["error_type"], "playback");
        assert_eq!(json["request_id"], "req-1");
    }
}
