use crate::player::{BackendError, RecordingBackend};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::SystemTime;

/// Convert an absolute file path into a URL the webview's asset protocol serves.
///
/// Windows webviews only accept the `http://asset.localhost` form.
pub fn asset_url_for_path(path: &Path) -> String {
    let encoded = urlencoding::encode(&path.to_string_lossy()).into_owned();
    if cfg!(windows) {
        format!("http://asset.localhost/{}", encoded)
    } else {
        format!("asset://localhost/{}", encoded)
    }
}

/// Simple on-disk store for WAV recordings keyed by request id.
///
/// Files are stored under `<app_data_dir>/recordings/<id>.wav`.
#[derive(Debug)]
pub struct RecordingStore {
    dir: PathBuf,
    // Best-effort existence cache; the filesystem stays authoritative.
    known_existing: RwLock<HashSet<String>>,
}

impl RecordingStore {
    pub fn new(app_data_dir: PathBuf) -> Self {
        let dir = app_data_dir.join("recordings");
        if let Err(e) = fs::create_dir_all(&dir) {
            log::warn!("RecordingStore: Failed to create {}: {}", dir.display(), e);
        }
        Self {
            dir,
            known_existing: RwLock::new(HashSet::new()),
        }
    }

    fn is_safe_request_id(id: &str) -> bool {
        // Request ids are UUID-like; anything else could escape the directory.
        !id.trim().is_empty()
            && id
                .bytes()
                .all(|b| matches!(b, b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_'))
    }

    fn checked_id(id: &str) -> Result<&str, BackendError> {
        if Self::is_safe_request_id(id) {
            Ok(id)
        } else {
            Err(BackendError::InvalidRequestId(id.to_string()))
        }
    }

    fn path_for_id(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.wav", id))
    }

    fn forget(&self, id: &str) {
        if let Ok(mut known) = self.known_existing.write() {
            known.remove(id);
        }
    }

    /// Returns the absolute WAV path for a given request id if it exists on disk.
    pub fn wav_path_if_exists(&self, id: &str) -> Result<Option<PathBuf>, BackendError> {
        let id = Self::checked_id(id)?;
        let path = self.path_for_id(id);

        if path.exists() {
            if let Ok(mut known) = self.known_existing.write() {
                known.insert(id.to_string());
            }
            Ok(Some(path))
        } else {
            self.forget(id);
            Ok(None)
        }
    }

    pub fn has(&self, id: &str) -> bool {
        if let Ok(known) = self.known_existing.read() {
            if known.contains(id) {
                return self.path_for_id(id).exists();
            }
        }
        Self::is_safe_request_id(id) && self.path_for_id(id).exists()
    }

    pub fn save_wav(&self, id: &str, wav_bytes: &[u8]) -> Result<(), BackendError> {
        let id = Self::checked_id(id)?;
        if wav_bytes.is_empty() {
            return Err(BackendError::Io("Cannot save recording: empty audio".to_string()));
        }

        let path = self.path_for_id(id);
        fs::create_dir_all(&self.dir)
            .map_err(|e| BackendError::Io(format!("Failed to create recordings dir: {}", e)))?;
        fs::write(&path, wav_bytes)
            .map_err(|e| BackendError::Io(format!("Failed to write recording {}: {}", path.display(), e)))?;

        if let Ok(mut known) = self.known_existing.write() {
            known.insert(id.to_string());
        }
        Ok(())
    }

    /// Read the WAV bytes, or `None` if no recording is stored for the id.
    pub fn load_wav(&self, id: &str) -> Result<Option<Vec<u8>>, BackendError> {
        let id = Self::checked_id(id)?;
        let path = self.path_for_id(id);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.forget(id);
                Ok(None)
            }
            Err(e) => Err(BackendError::Io(format!(
                "Failed to read recording {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Delete the recording for an id. Returns whether a file was removed.
    pub fn delete(&self, id: &str) -> Result<bool, BackendError> {
        let id = Self::checked_id(id)?;
        let path = self.path_for_id(id);
        self.forget(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(BackendError::Io(format!(
                "Failed to delete recording {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Keep only the `max_files` most recently modified recordings.
    ///
    /// Returns the number of files deleted.
    pub fn prune_to_max_files(&self, max_files: usize) -> Result<usize, BackendError> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| BackendError::Io(format!("Failed to list recordings: {}", e)))?;

        let mut files: Vec<(PathBuf, SystemTime)> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("wav"))
            .map(|path| {
                let modified = fs::metadata(&path)
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                (path, modified)
            })
            .collect();

        if files.len() <= max_files {
            return Ok(0);
        }

        // Newest first
        files.sort_by(|a, b| b.1.cmp(&a.1));

        let mut deleted = 0;
        for (path, _) in files.into_iter().skip(max_files) {
            match fs::remove_file(&path) {
                Ok(()) => {
                    if let Some(id) = path.file_stem().and_then(|s| s.to_str()) {
                        self.forget(id);
                    }
                    deleted += 1;
                }
                Err(e) => log::warn!("RecordingStore: Failed to prune {}: {}", path.display(), e),
            }
        }

        if deleted > 0 {
            log::info!("RecordingStore: Pruned {} old recording(s)", deleted);
        }
        Ok(deleted)
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl RecordingBackend for RecordingStore {
    async fn resolve_asset_reference(&self, request_id: &str) -> Result<Option<String>, BackendError> {
        Ok(self
            .wav_path_if_exists(request_id)?
            .map(|path| asset_url_for_path(&path)))
    }

    async fn resolve_audio_bytes_base64(&self, request_id: &str) -> Result<Option<String>, BackendError> {
        Ok(self.load_wav(request_id)?.map(|bytes| STANDARD.encode(bytes)))
    }
}
