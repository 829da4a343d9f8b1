//! Playback start watchdog.
//!
//! Some webviews never settle `play()` for a direct asset source they cannot
//! stream. The watchdog races the first `Playing` event for the source against
//! an error and a short timer; whichever comes first decides the outcome. The
//! event subscription and timer live inside the future, so they are dropped on
//! every outcome.

use super::host::{AudioTransport, MediaError, TransportEvent};
use super::PlaybackError;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

/// Start `src` on the transport and wait until audio is confirmed.
pub(crate) async fn await_playback_start(
    transport: &dyn AudioTransport,
    src: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<(), PlaybackError> {
    let mut events = transport.subscribe();
    let play = transport.play();
    tokio::pin!(play);
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);
    let mut play_settled = false;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                return Err(PlaybackError::Superseded);
            }

            event = events.recv() => match event {
                Ok(TransportEvent::Playing { src: s }) if s == src => return Ok(()),
                Ok(TransportEvent::Error { src: s, error }) if s == src => {
                    return Err(failure(error, cancel));
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Player: Watchdog missed {} transport event(s)", skipped);
                }
                Err(RecvError::Closed) => {
                    return Err(PlaybackError::OtherPlaybackFailure(
                        "audio element went away".to_string(),
                    ));
                }
            },

            result = &mut play, if !play_settled => {
                play_settled = true;
                if let Err(e) = result {
                    return Err(failure(e, cancel));
                }
            }

            _ = &mut deadline => {
                log::warn!("Player: Playback of {} did not start within {:?}", src, timeout);
                return Err(PlaybackError::PlaybackStartTimeout(timeout));
            }
        }
    }
}

/// A pause issued by a successor rejects `play()` with an abort. Once the
/// attempt is cancelled that says nothing about the source.
fn failure(error: MediaError, cancel: &CancellationToken) -> PlaybackError {
    if cancel.is_cancelled() {
        PlaybackError::Superseded
    } else {
        PlaybackError::from(error)
    }
}

/// Start a locally backed source. No timer: blob sources fail fast.
pub(crate) async fn play_directly(
    transport: &dyn AudioTransport,
    cancel: &CancellationToken,
) -> Result<(), PlaybackError> {
    tokio::select! {
        biased;

        _ = cancel.cancelled() => Err(PlaybackError::Superseded),

        result = transport.play() => result.map_err(PlaybackError::from),
    }
}
