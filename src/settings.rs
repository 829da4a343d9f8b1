use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fs;
use std::path::Path;
use std::time::Duration;

// ============================================================================
// DEFAULT PLAYBACK SETTINGS - Single source of truth for player defaults
// ============================================================================

/// Default time to wait for a direct asset source to start before falling back.
///
/// Short enough that the fallback is not perceived as a delay.
pub const DEFAULT_PLAYBACK_START_TIMEOUT_MS: u64 = 700;

/// Bounds applied to a user-provided start timeout.
pub const MIN_PLAYBACK_START_TIMEOUT_MS: u64 = 100;
pub const MAX_PLAYBACK_START_TIMEOUT_MS: u64 = 5_000;

/// Default number of resolved sources kept per player (0 = unbounded).
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 200;

// ============================================================================

/// Recording playback settings.
///
/// Stored alongside the rest of the app settings in the flat `settings.json`
/// key space, hence the prefixed field names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlayerSettings {
    /// Milliseconds to wait for a direct asset source to report `playing`.
    #[serde(rename = "recording_playback_start_timeout_ms")]
    pub start_timeout_ms: u64,
    /// Maximum cached sources before least recently used ones are evicted.
    #[serde(rename = "recording_playback_cache_max_entries")]
    pub cache_max_entries: usize,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            start_timeout_ms: DEFAULT_PLAYBACK_START_TIMEOUT_MS,
            cache_max_entries: DEFAULT_CACHE_MAX_ENTRIES,
        }
    }
}

impl PlayerSettings {
    /// Read the player keys out of a full settings document.
    ///
    /// Missing or mistyped keys fall back to their defaults individually.
    pub fn from_settings_json(value: &JsonValue) -> Self {
        let defaults = Self::default();
        let start_timeout_ms = value
            .get("recording_playback_start_timeout_ms")
            .and_then(JsonValue::as_u64)
            .unwrap_or(defaults.start_timeout_ms);
        let cache_max_entries = value
            .get("recording_playback_cache_max_entries")
            .and_then(JsonValue::as_u64)
            .map(|n| n as usize)
            .unwrap_or(defaults.cache_max_entries);
        Self {
            start_timeout_ms,
            cache_max_entries,
        }
    }

    /// Load from a `settings.json` file, using defaults if it cannot be read.
    pub fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                log::debug!("Settings: {} not readable ({}), using defaults", path.display(), e);
                return Self::default();
            }
        };
        match serde_json::from_str::<JsonValue>(&content) {
            Ok(value) => Self::from_settings_json(&value),
            Err(e) => {
                log::warn!("Settings: Failed to parse {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Effective watchdog timeout.
    pub fn playback_start_timeout(&self) -> Duration {
        if self.start_timeout_ms == 0 {
            return Duration::from_millis(DEFAULT_PLAYBACK_START_TIMEOUT_MS);
        }
        Duration::from_millis(
            self.start_timeout_ms
                .clamp(MIN_PLAYBACK_START_TIMEOUT_MS, MAX_PLAYBACK_START_TIMEOUT_MS),
        )
    }

    /// Effective cache bound; `None` means unbounded.
    pub fn cache_max_entries(&self) -> Option<usize> {
        match self.cache_max_entries {
            0 => None,
            n => Some(n),
        }
    }
}
