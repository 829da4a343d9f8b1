//! Request id -> resolved playable source.

use std::collections::{HashMap, VecDeque};

/// How a cached source is backed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Direct asset reference streamed by the media element.
    Asset,
    /// In-memory object URL minted by the blob store.
    Blob,
}

/// A previously resolved playable source for one request id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedSource {
    pub request_id: String,
    pub url: String,
    pub kind: SourceKind,
}

impl CachedSource {
    pub fn asset(request_id: &str, url: String) -> Self {
        Self {
            request_id: request_id.to_string(),
            url,
            kind: SourceKind::Asset,
        }
    }

    pub fn blob(request_id: &str, url: String) -> Self {
        Self {
            request_id: request_id.to_string(),
            url,
            kind: SourceKind::Blob,
        }
    }
}

/// LRU cache of resolved sources.
///
/// Entries pushed out (evicted or overwritten with a different URL) are handed
/// back to the caller so blob-backed ones can be revoked.
#[derive(Debug, Default)]
pub(crate) struct SourceCache {
    entries: HashMap<String, CachedSource>,
    // Least recently used at the front.
    recency: VecDeque<String>,
    // None = unbounded
    max_entries: Option<usize>,
}

impl SourceCache {
    pub fn new(max_entries: Option<usize>) -> Self {
        Self {
            entries: HashMap::new(),
            recency: VecDeque::new(),
            max_entries: max_entries.filter(|n| *n > 0),
        }
    }

    pub fn get(&mut self, request_id: &str) -> Option<CachedSource> {
        let source = self.entries.get(request_id).cloned()?;
        self.touch(request_id);
        Some(source)
    }

    /// Insert or overwrite the entry for `source.request_id`.
    pub fn insert(&mut self, source: CachedSource) -> Vec<CachedSource> {
        let mut displaced = Vec::new();
        let id = source.request_id.clone();

        if let Some(previous) = self.entries.insert(id.clone(), source) {
            if self.entries.get(&id).map(|s| &s.url) != Some(&previous.url) {
                displaced.push(previous);
            }
        }
        self.touch(&id);

        if let Some(max) = self.max_entries {
            while self.entries.len() > max {
                let Some(oldest) = self.recency.pop_front() else {
                    break;
                };
                if let Some(evicted) = self.entries.remove(&oldest) {
                    log::debug!("Player: Evicted cached source for {}", evicted.request_id);
                    displaced.push(evicted);
                }
            }
        }

        displaced
    }

    /// Remove every entry, returning them.
    pub fn drain(&mut self) -> Vec<CachedSource> {
        self.recency.clear();
        self.entries.drain().map(|(_, source)| source).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn touch(&mut self, request_id: &str) {
        if let Some(pos) = self.recency.iter().position(|id| id == request_id) {
            self.recency.remove(pos);
        }
        self.recency.push_back(request_id.to_string());
    }
}
