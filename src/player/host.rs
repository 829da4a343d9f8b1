//! Seams to the embedding webview.
//!
//! The player never talks to a media element or the blob URL registry directly.
//! The host application implements [`MediaHost`] on top of its webview bridge
//! (e.g. `new Audio()` / `URL.createObjectURL`) and hands it to the player.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Error reported by the host media element.
///
/// Mirrors the `MediaError` codes of the HTML media element plus the
/// `DOMException` names a rejected `play()` can carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// `MEDIA_ERR_ABORTED` / `AbortError`
    Aborted,
    /// `MEDIA_ERR_NETWORK`
    Network(String),
    /// `MEDIA_ERR_DECODE`
    Decode(String),
    /// `MEDIA_ERR_SRC_NOT_SUPPORTED` / `NotSupportedError`
    SrcNotSupported(String),
    /// `NotAllowedError` (autoplay policy and similar)
    NotAllowed(String),
    /// Generic `error` event without a usable code
    Other(String),
}

impl std::fmt::Display for MediaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaError::Aborted => write!(f, "media load aborted"),
            MediaError::Network(msg) => write!(f, "network error: {}", msg),
            MediaError::Decode(msg) => write!(f, "decode error: {}", msg),
            MediaError::SrcNotSupported(msg) => write!(f, "source not supported: {}", msg),
            MediaError::NotAllowed(msg) => write!(f, "playback not allowed: {}", msg),
            MediaError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for MediaError {}

/// Events published by an audio element.
///
/// Every event names the source it refers to, so listeners can ignore
/// events emitted for a source that has since been replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Audio is actually being rendered (`playing`).
    Playing { src: String },
    /// Playback paused, either by `pause()` or by an external control surface.
    Paused { src: String },
    /// Playback reached the end of the source.
    Ended { src: String },
    /// The element failed to load or render the source.
    Error { src: String, error: MediaError },
}

impl TransportEvent {
    pub fn src(&self) -> &str {
        match self {
            TransportEvent::Playing { src }
            | TransportEvent::Paused { src }
            | TransportEvent::Ended { src }
            | TransportEvent::Error { src, .. } => src,
        }
    }
}

/// A single audio playback element owned by the host.
///
/// Implementations must not emit `Paused` when `pause()` is called on an
/// element that is already paused.
#[async_trait]
pub trait AudioTransport: Send + Sync {
    /// Point the element at a new source. Does not start playback.
    fn set_source(&self, url: &str);

    /// Drop the current source and abort any pending load.
    fn clear_source(&self);

    /// Issue the play command.
    ///
    /// Resolution only means the command was accepted; `TransportEvent::Playing`
    /// is the signal that audio is actually being produced. Some hosts never
    /// resolve this for sources they cannot stream.
    async fn play(&self) -> Result<(), MediaError>;

    fn pause(&self);

    fn is_paused(&self) -> bool;

    /// Subscribe to element events emitted after this call.
    fn subscribe(&self) -> broadcast::Receiver<TransportEvent>;
}

/// Capabilities the webview provides to the player.
pub trait MediaHost: Send + Sync {
    /// Create a fresh audio element with `preload="none"`.
    fn create_audio_element(&self) -> Arc<dyn AudioTransport>;

    /// Wrap bytes as a typed in-memory object and mint a URL for it.
    fn create_object_url(&self, bytes: Vec<u8>, mime: &str) -> Result<String, String>;

    /// Revoke a URL minted by `create_object_url`.
    fn revoke_object_url(&self, url: &str);
}
