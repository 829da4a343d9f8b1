use std::sync::atomic::{AtomicU8, Ordering};

/// Whether the host can start playback from a direct asset reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayabilityFlag {
    Unknown,
    PlayableAsDirectAsset,
    NotPlayableAsDirectAsset,
}

impl PlayabilityFlag {
    fn to_raw(self) -> u8 {
        match self {
            PlayabilityFlag::Unknown => 0,
            PlayabilityFlag::PlayableAsDirectAsset => 1,
            PlayabilityFlag::NotPlayableAsDirectAsset => 2,
        }
    }

    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => PlayabilityFlag::PlayableAsDirectAsset,
            2 => PlayabilityFlag::NotPlayableAsDirectAsset,
            _ => PlayabilityFlag::Unknown,
        }
    }
}

/// Learned direct-asset capability, scoped to one player instance.
///
/// `NotPlayableAsDirectAsset` is sticky: once observed it holds until the
/// player is dropped.
#[derive(Debug)]
pub(crate) struct PlayabilityProbe {
    flag: AtomicU8,
}

impl Default for PlayabilityProbe {
    fn default() -> Self {
        Self {
            flag: AtomicU8::new(PlayabilityFlag::Unknown.to_raw()),
        }
    }
}

impl PlayabilityProbe {
    pub fn get(&self) -> PlayabilityFlag {
        PlayabilityFlag::from_raw(self.flag.load(Ordering::SeqCst))
    }

    /// True unless direct asset playback is already known to fail.
    pub fn should_try_asset(&self) -> bool {
        self.get() != PlayabilityFlag::NotPlayableAsDirectAsset
    }

    /// Record a confirmed direct-asset start. Only promotes from `Unknown`.
    pub fn mark_playable(&self) {
        let _ = self.flag.compare_exchange(
            PlayabilityFlag::Unknown.to_raw(),
            PlayabilityFlag::PlayableAsDirectAsset.to_raw(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// Record a recoverable direct-asset failure. Returns true on the first transition.
    pub fn mark_not_playable(&self) -> bool {
        let previous = self
            .flag
            .swap(PlayabilityFlag::NotPlayableAsDirectAsset.to_raw(), Ordering::SeqCst);
        previous != PlayabilityFlag::NotPlayableAsDirectAsset.to_raw()
    }
}
