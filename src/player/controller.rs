use super::backend::RecordingBackend;
use super::blobs::BlobStore;
use super::cache::{CachedSource, SourceCache, SourceKind};
use super::element::AudioElementManager;
use super::host::{AudioTransport, MediaHost};
use super::probe::{PlayabilityFlag, PlayabilityProbe};
use super::session::{Attempt, LoadingGuard, PlaybackState, SessionCell};
use super::watchdog::{await_playback_start, play_directly};
use super::{PlaybackError, PlaybackErrorNotice};
use crate::settings::PlayerSettings;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Callback invoked once per failed `toggle`.
pub type ErrorHandler = Arc<dyn Fn(&PlaybackErrorNotice) + Send + Sync>;

struct PlayerInner {
    start_timeout: Duration,
    backend: Arc<dyn RecordingBackend>,
    session: Arc<SessionCell>,
    cache: Mutex<SourceCache>,
    blobs: BlobStore,
    probe: PlayabilityProbe,
    element: AudioElementManager,
    on_error: Mutex<Option<ErrorHandler>>,
    /// Parent of every attempt token; cancelled on dispose.
    shutdown: CancellationToken,
    disposed: AtomicBool,
}

/// Plays stored recordings by request id.
///
/// Cheap to clone; all clones drive the same element and share one cache.
/// Teardown happens on `dispose()` or when the last clone is dropped.
#[derive(Clone)]
pub struct RecordingPlayer {
    inner: Arc<PlayerInner>,
}

impl RecordingPlayer {
    pub fn new(
        settings: PlayerSettings,
        backend: Arc<dyn RecordingBackend>,
        host: Arc<dyn MediaHost>,
    ) -> Self {
        let inner = PlayerInner {
            start_timeout: settings.playback_start_timeout(),
            backend,
            session: Arc::new(SessionCell::new()),
            cache: Mutex::new(SourceCache::new(settings.cache_max_entries())),
            blobs: BlobStore::new(host.clone()),
            probe: PlayabilityProbe::default(),
            element: AudioElementManager::new(host),
            on_error: Mutex::new(None),
            shutdown: CancellationToken::new(),
            disposed: AtomicBool::new(false),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Register the handler for failed toggles, replacing any previous one.
    pub fn set_error_handler<F>(&self, handler: F)
    where
        F: Fn(&PlaybackErrorNotice) + Send + Sync + 'static,
    {
        let mut slot = self.inner.on_error.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::new(handler));
    }

    /// Play `request_id`, or stop it if it is the one currently playing.
    ///
    /// Always settles. Failures reset the session and are reported through
    /// the error handler; attempts superseded by a later `toggle`, `stop` or
    /// `dispose` settle silently.
    pub async fn toggle(&self, request_id: &str) {
        let id = request_id.trim();
        if id.is_empty() {
            return;
        }

        let inner = &self.inner;
        if inner.disposed.load(Ordering::SeqCst) {
            log::warn!("Player: Ignoring toggle for {} after dispose", id);
            return;
        }

        if inner.session.snapshot().is_playing(id) && inner.element.is_active() {
            log::info!("Player: Stopping recording {}", id);
            self.stop();
            return;
        }

        let transport = inner.element.get_or_create(&inner.session);
        // Supersede first so the previous attempt sees its cancellation before
        // the pause rejects its pending play().
        let attempt = inner.session.begin(id, &inner.shutdown);
        transport.pause();
        log::info!("Player: Loading recording {}", id);

        // Run on its own task so a panicking backend or host still settles the toggle.
        let task = tokio::spawn({
            let inner = inner.clone();
            let attempt = attempt.clone();
            async move {
                let _loading = LoadingGuard::new(&inner.session, attempt.clone());
                inner.play_request(transport.as_ref(), &attempt).await
            }
        });

        let result = match task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(PlaybackError::OtherPlaybackFailure(
                "internal error while starting playback".to_string(),
            )),
            Err(_) => Err(PlaybackError::Superseded),
        };

        match result {
            Ok(()) => log::info!("Player: Playing recording {}", id),
            Err(PlaybackError::Superseded) | Err(PlaybackError::Disposed) => {
                log::debug!("Player: Attempt for {} was superseded", id);
            }
            Err(_) if attempt.token.is_cancelled() => {
                log::debug!("Player: Dropping failure of superseded attempt for {}", id);
            }
            Err(err) => {
                log::warn!("Player: Failed to play recording {}: {}", id, err);
                inner.notify_error(id, &err);
            }
        }
    }

    /// Pause and clear playing/loading state. Safe when nothing is active.
    pub fn stop(&self) {
        self.inner.session.stop();
        self.inner.element.pause();
    }

    pub fn is_playing(&self, request_id: &str) -> bool {
        self.inner.session.snapshot().is_playing(request_id.trim())
    }

    pub fn is_loading(&self, request_id: &str) -> bool {
        self.inner.session.snapshot().is_loading(request_id.trim())
    }

    pub fn state(&self) -> PlaybackState {
        self.inner.session.snapshot()
    }

    /// Receive every state transition.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.inner.session.subscribe()
    }

    pub fn playability(&self) -> PlayabilityFlag {
        self.inner.probe.get()
    }

    /// The cached source for a request id, if it has been resolved.
    pub fn cached_source(&self, request_id: &str) -> Option<CachedSource> {
        self.inner.cache().get(request_id.trim())
    }

    pub fn cached_source_count(&self) -> usize {
        self.inner.cache().len()
    }

    /// Blob URLs currently minted and not yet revoked.
    pub fn live_blob_count(&self) -> usize {
        self.inner.blobs.live_count()
    }

    /// Tear down the element, the cache and every blob URL. Idempotent.
    pub fn dispose(&self) {
        self.inner.teardown();
    }
}

impl PlayerInner {
    fn cache(&self) -> MutexGuard<'_, SourceCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify_error(&self, request_id: &str, err: &PlaybackError) {
        let handler = self
            .on_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(handler) = handler {
            handler(&PlaybackErrorNotice::new(request_id, err));
        }
    }

    async fn play_request(&self, transport: &dyn AudioTransport, attempt: &Attempt) -> Result<(), PlaybackError> {
        let id = attempt.request_id.as_str();

        let cached = self.cache().get(id);
        let source = match cached {
            Some(source) => {
                log::debug!("Player: Cache hit for {} ({:?})", id, source.kind);
                source
            }
            None if self.probe.should_try_asset() => self.resolve_asset(attempt).await?,
            None => self.resolve_blob(attempt).await?,
        };

        match self.start(transport, attempt, &source).await {
            Err(err) if source.kind == SourceKind::Asset && err.is_recoverable() => {
                if !self.session.run_if_current(attempt, || transport.clear_source()) {
                    return Err(PlaybackError::Superseded);
                }
                if self.probe.mark_not_playable() {
                    log::warn!(
                        "Player: Direct asset playback unavailable ({}), using in-memory audio from now on",
                        err
                    );
                } else {
                    log::warn!("Player: Direct asset playback of {} failed ({}), falling back", id, err);
                }

                let fallback = self.resolve_blob(attempt).await?;
                self.start(transport, attempt, &fallback).await
            }
            other => other,
        }
    }

    async fn resolve_asset(&self, attempt: &Attempt) -> Result<CachedSource, PlaybackError> {
        let id = attempt.request_id.as_str();
        let url = self
            .backend
            .resolve_asset_reference(id)
            .await?
            .ok_or(PlaybackError::AbsentRecording)?;

        let source = CachedSource::asset(id, url);
        self.remember(attempt, source.clone())?;
        Ok(source)
    }

    async fn resolve_blob(&self, attempt: &Attempt) -> Result<CachedSource, PlaybackError> {
        let id = attempt.request_id.as_str();
        let payload = self
            .backend
            .resolve_audio_bytes_base64(id)
            .await?
            .ok_or(PlaybackError::AbsentRecording)?;

        let url = self.blobs.materialize(&payload)?;
        let source = CachedSource::blob(id, url);
        self.remember(attempt, source.clone())?;
        Ok(source)
    }

    /// Cache a resolved source, revoking any blob it pushes out.
    ///
    /// Only the current attempt writes to the cache. A superseded one could
    /// otherwise evict the source its successor is playing.
    fn remember(&self, attempt: &Attempt, source: CachedSource) -> Result<(), PlaybackError> {
        let displaced = {
            let mut cache = self.cache();
            // Checked under the cache lock: teardown drains it and a successor
            // looks its source up through it.
            let refused = if self.disposed.load(Ordering::SeqCst) {
                Some(PlaybackError::Disposed)
            } else if !self.session.is_current(attempt) {
                Some(PlaybackError::Superseded)
            } else {
                None
            };
            if let Some(err) = refused {
                drop(cache);
                if source.kind == SourceKind::Blob {
                    self.blobs.release(&source.url);
                }
                return Err(err);
            }
            cache.insert(source)
        };

        for old in displaced {
            if old.kind == SourceKind::Blob {
                self.blobs.release(&old.url);
            }
        }
        Ok(())
    }

    async fn start(
        &self,
        transport: &dyn AudioTransport,
        attempt: &Attempt,
        source: &CachedSource,
    ) -> Result<(), PlaybackError> {
        if !self.session.run_if_current(attempt, || transport.set_source(&source.url)) {
            return Err(PlaybackError::Superseded);
        }

        match source.kind {
            SourceKind::Asset => {
                await_playback_start(transport, &source.url, self.start_timeout, &attempt.token).await?;
                self.probe.mark_playable();
            }
            SourceKind::Blob => play_directly(transport, &attempt.token).await?,
        }

        if self.session.mark_playing(attempt, &source.url) {
            Ok(())
        } else {
            Err(PlaybackError::Superseded)
        }
    }

    fn teardown(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.shutdown.cancel();
        self.session.stop();
        self.element.dispose();
        let dropped = self.cache().drain().len();
        let released = self.blobs.release_all();
        log::info!(
            "Player: Disposed ({} cached source(s), {} blob URL(s) released)",
            dropped,
            released
        );
    }
}

impl Drop for PlayerInner {
    fn drop(&mut self) {
        self.teardown();
    }
}
