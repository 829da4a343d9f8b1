//! Blob URL lifecycle.
//!
//! Every object URL minted for decoded audio is tracked here until it is
//! released; `release_all()` is the teardown sweep.

use super::host::MediaHost;
use super::PlaybackError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::collections::HashSet;
use std::io::Cursor;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const MIME_WAV: &str = "audio/wav";
const MIME_OGG: &str = "audio/ogg";
const MIME_MPEG: &str = "audio/mpeg";
const MIME_FLAC: &str = "audio/flac";

/// Guess the audio container from its magic bytes.
///
/// Recordings are WAV, so anything unrecognised is labelled as WAV too.
pub(crate) fn sniff_audio_mime(bytes: &[u8]) -> &'static str {
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
        MIME_WAV
    } else if bytes.starts_with(b"OggS") {
        MIME_OGG
    } else if bytes.starts_with(b"fLaC") {
        MIME_FLAC
    } else if bytes.starts_with(b"ID3") || (bytes.len() >= 2 && bytes[0] == 0xFF && (bytes[1] & 0xE0) == 0xE0) {
        MIME_MPEG
    } else {
        MIME_WAV
    }
}

/// Strip an optional `data:<mime>;base64,` prefix.
fn strip_data_url_prefix(payload: &str) -> &str {
    let trimmed = payload.trim();
    if trimmed.starts_with("data:") {
        if let Some((_, data)) = trimmed.split_once(";base64,") {
            return data;
        }
    }
    trimmed
}

fn wav_duration_secs(bytes: &[u8]) -> Option<f32> {
    let reader = hound::WavReader::new(Cursor::new(bytes)).ok()?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return None;
    }
    Some(reader.duration() as f32 / spec.sample_rate as f32)
}

pub(crate) struct BlobStore {
    host: Arc<dyn MediaHost>,
    live: Mutex<HashSet<String>>,
}

impl BlobStore {
    pub fn new(host: Arc<dyn MediaHost>) -> Self {
        Self {
            host,
            live: Mutex::new(HashSet::new()),
        }
    }

    fn live(&self) -> MutexGuard<'_, HashSet<String>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decode a base64 audio payload and mint an object URL for it.
    pub fn materialize(&self, payload_base64: &str) -> Result<String, PlaybackError> {
        let data = strip_data_url_prefix(payload_base64);
        if data.is_empty() {
            return Err(PlaybackError::InvalidAudio("empty audio payload".to_string()));
        }

        let bytes = STANDARD
            .decode(data)
            .map_err(|e| PlaybackError::InvalidAudio(format!("base64 decode failed: {}", e)))?;
        if bytes.is_empty() {
            return Err(PlaybackError::InvalidAudio("empty audio payload".to_string()));
        }

        let mime = sniff_audio_mime(&bytes);
        if mime == MIME_WAV {
            match wav_duration_secs(&bytes) {
                Some(secs) => log::debug!("Player: Materializing {:.2}s WAV ({} bytes)", secs, bytes.len()),
                None => log::debug!("Player: Materializing unparsed audio as WAV ({} bytes)", bytes.len()),
            }
        }

        let url = self.host.create_object_url(bytes, mime).map_err(PlaybackError::Host)?;
        self.live().insert(url.clone());
        Ok(url)
    }

    /// Revoke one URL. Unknown URLs are ignored.
    pub fn release(&self, url: &str) {
        let removed = self.live().remove(url);
        if removed {
            self.host.revoke_object_url(url);
        }
    }

    /// Revoke every live URL. Returns how many were released.
    pub fn release_all(&self) -> usize {
        let urls: Vec<String> = self.live().drain().collect();
        for url in &urls {
            self.host.revoke_object_url(url);
        }
        if !urls.is_empty() {
            log::debug!("Player: Released {} blob URL(s)", urls.len());
        }
        urls.len()
    }

    pub fn live_count(&self) -> usize {
        self.live().len()
    }

    #[cfg(test)]
    pub fn is_live(&self, url: &str) -> bool {
        self.live().contains(url)
    }
}
