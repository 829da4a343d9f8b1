//! Playback of stored dictation recordings inside the tambourine webview.
//!
//! [`player::RecordingPlayer`] resolves a request id to a playable source via a
//! [`player::RecordingBackend`] (normally [`recordings::RecordingStore`]) and
//! drives the host's audio element through a [`player::MediaHost`].

pub mod player;
pub mod recordings;
pub mod settings;

#[cfg(test)]
mod tests;

pub use player::{PlaybackError, PlaybackErrorNotice, PlaybackState, RecordingPlayer};
pub use recordings::RecordingStore;
pub use settings::PlayerSettings;

/// Install the `env_logger` backend for the `log` facade.
///
/// Honors `RUST_LOG`, defaulting to `info`. Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init();
}
