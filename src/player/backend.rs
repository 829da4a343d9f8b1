//! Backend operations the player consumes to locate a recording.

use async_trait::async_trait;

/// Errors raised by a recording backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Invalid request id: {0}")]
    InvalidRequestId(String),

    #[error("Recording storage error: {0}")]
    Io(String),
}

/// Source of stored recordings, keyed by request id.
///
/// Both operations must be idempotent; the player's cache is what bounds how
/// often they are called. `Ok(None)` means no recording is stored for the id.
#[async_trait]
pub trait RecordingBackend: Send + Sync {
    /// A locally addressable reference the media element can stream directly.
    async fn resolve_asset_reference(&self, request_id: &str) -> Result<Option<String>, BackendError>;

    /// The recording's audio container, base64 encoded.
    async fn resolve_audio_bytes_base64(&self, request_id: &str) -> Result<Option<String>, BackendError>;
}
