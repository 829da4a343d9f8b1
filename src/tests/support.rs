//! In-process stand-ins for the webview and the recording backend.

use crate::player::{AudioTransport, BackendError, MediaError, MediaHost, RecordingBackend, TransportEvent};
use crate::{PlaybackErrorNotice, PlayerSettings, RecordingPlayer};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};

/// How the fake element reacts to `play()` for one kind of source.
#[derive(Debug, Clone)]
pub enum PlayBehavior {
    /// Start and emit `playing`.
    Play,
    /// Never settle and never emit anything.
    Hang,
    /// Emit `error` for the source and reject `play()`.
    Fail(MediaError),
    /// Stay pending until `pause()`, then reject with an abort, as webviews do.
    AbortOnPause,
}

pub struct Script {
    pub asset: Mutex<PlayBehavior>,
    pub blob: Mutex<PlayBehavior>,
}

pub struct FakeTransport {
    script: Arc<Script>,
    src: Mutex<Option<String>>,
    paused: AtomicBool,
    events: broadcast::Sender<TransportEvent>,
    paused_signal: Notify,
    pub sources_set: Mutex<Vec<String>>,
    pub pause_calls: AtomicUsize,
}

impl FakeTransport {
    fn new(script: Arc<Script>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            script,
            src: Mutex::new(None),
            paused: AtomicBool::new(true),
            events,
            paused_signal: Notify::new(),
            sources_set: Mutex::new(Vec::new()),
            pause_calls: AtomicUsize::new(0),
        }
    }

    pub fn current_src(&self) -> Option<String> {
        self.src.lock().unwrap().clone()
    }

    pub fn listener_count(&self) -> usize {
        self.events.receiver_count()
    }

    pub fn is_paused_now(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn sources(&self) -> Vec<String> {
        self.sources_set.lock().unwrap().clone()
    }

    /// Simulate a pause from a media key or OS control surface.
    pub fn pause_externally(&self) {
        AudioTransport::pause(self);
    }

    /// Simulate the end of the media.
    pub fn finish(&self) {
        if let Some(src) = self.current_src() {
            self.paused.store(true, Ordering::SeqCst);
            let _ = self.events.send(TransportEvent::Ended { src });
        }
    }
}

#[async_trait]
impl AudioTransport for FakeTransport {
    fn set_source(&self, url: &str) {
        self.paused.store(true, Ordering::SeqCst);
        *self.src.lock().unwrap() = Some(url.to_string());
        self.sources_set.lock().unwrap().push(url.to_string());
    }

    fn clear_source(&self) {
        self.paused.store(true, Ordering::SeqCst);
        *self.src.lock().unwrap() = None;
    }

    async fn play(&self) -> Result<(), MediaError> {
        let Some(src) = self.current_src() else {
            return Err(MediaError::SrcNotSupported("no source".to_string()));
        };
        let behavior = if src.starts_with("blob:") {
            self.script.blob.lock().unwrap().clone()
        } else {
            self.script.asset.lock().unwrap().clone()
        };

        match behavior {
            PlayBehavior::Play => {
                self.paused.store(false, Ordering::SeqCst);
                let _ = self.events.send(TransportEvent::Playing { src });
                Ok(())
            }
            PlayBehavior::Hang => std::future::pending().await,
            PlayBehavior::AbortOnPause => {
                let paused = self.paused_signal.notified();
                self.paused.store(false, Ordering::SeqCst);
                paused.await;
                Err(MediaError::Aborted)
            }
            PlayBehavior::Fail(error) => {
                let _ = self.events.send(TransportEvent::Error {
                    src,
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    fn pause(&self) {
        self.pause_calls.fetch_add(1, Ordering::SeqCst);
        self.paused_signal.notify_waiters();
        if self.paused.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(src) = self.current_src() {
            let _ = self.events.send(TransportEvent::Paused { src });
        }
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }
}

pub struct FakeHost {
    pub script: Arc<Script>,
    pub element: Mutex<Option<Arc<FakeTransport>>>,
    created_count: AtomicUsize,
    pub minted: Mutex<Vec<(String, String)>>,
    pub revoked: Mutex<Vec<String>>,
}

impl FakeHost {
    pub fn new(asset: PlayBehavior, blob: PlayBehavior) -> Arc<Self> {
        Arc::new(Self {
            script: Arc::new(Script {
                asset: Mutex::new(asset),
                blob: Mutex::new(blob),
            }),
            element: Mutex::new(None),
            created_count: AtomicUsize::new(0),
            minted: Mutex::new(Vec::new()),
            revoked: Mutex::new(Vec::new()),
        })
    }

    pub fn set_asset_behavior(&self, behavior: PlayBehavior) {
        *self.script.asset.lock().unwrap() = behavior;
    }

    pub fn transport(&self) -> Arc<FakeTransport> {
        self.element.lock().unwrap().clone().expect("element not created yet")
    }

    pub fn elements_created(&self) -> usize {
        self.created_count.load(Ordering::SeqCst)
    }

    pub fn sources_set_count(&self) -> usize {
        self.element
            .lock()
            .unwrap()
            .as_ref()
            .map(|t| t.sources().len())
            .unwrap_or(0)
    }

    pub fn minted_urls(&self) -> Vec<String> {
        self.minted.lock().unwrap().iter().map(|(url, _)| url.clone()).collect()
    }

    pub fn revoked_urls(&self) -> Vec<String> {
        self.revoked.lock().unwrap().clone()
    }
}

impl MediaHost for FakeHost {
    fn create_audio_element(&self) -> Arc<dyn AudioTransport> {
        self.created_count.fetch_add(1, Ordering::SeqCst);
        let transport = Arc::new(FakeTransport::new(self.script.clone()));
        *self.element.lock().unwrap() = Some(transport.clone());
        transport
    }

    fn create_object_url(&self, _bytes: Vec<u8>, mime: &str) -> Result<String, String> {
        let url = format!("blob:tauri://localhost/{}", uuid::Uuid::new_v4());
        self.minted.lock().unwrap().push((url.clone(), mime.to_string()));
        Ok(url)
    }

    fn revoke_object_url(&self, url: &str) {
        self.revoked.lock().unwrap().push(url.to_string());
    }
}

#[derive(Default)]
pub struct FakeBackend {
    recordings: Mutex<HashMap<String, Vec<u8>>>,
    // Ids whose bytes disappeared after the asset reference was handed out.
    bytes_missing: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    panic_on: Mutex<Option<String>>,
    pub asset_calls: Mutex<Vec<String>>,
    pub bytes_calls: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn with_recordings(ids: &[&str]) -> Arc<Self> {
        let backend = Self::default();
        {
            let mut recordings = backend.recordings.lock().unwrap();
            for id in ids {
                recordings.insert(id.to_string(), wav_fixture());
            }
        }
        Arc::new(backend)
    }

    pub fn delay(&self, id: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(id.to_string(), delay);
    }

    pub fn drop_bytes(&self, id: &str) {
        self.bytes_missing.lock().unwrap().insert(id.to_string());
    }

    pub fn panic_on(&self, id: &str) {
        *self.panic_on.lock().unwrap() = Some(id.to_string());
    }

    pub fn asset_calls_for(&self, id: &str) -> usize {
        self.asset_calls.lock().unwrap().iter().filter(|c| *c == id).count()
    }

    pub fn bytes_calls_for(&self, id: &str) -> usize {
        self.bytes_calls.lock().unwrap().iter().filter(|c| *c == id).count()
    }

    async fn before_call(&self, id: &str) {
        if self.panic_on.lock().unwrap().as_deref() == Some(id) {
            panic!("backend exploded for {}", id);
        }
        let delay = self.delays.lock().unwrap().get(id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl RecordingBackend for FakeBackend {
    async fn resolve_asset_reference(&self, request_id: &str) -> Result<Option<String>, BackendError> {
        self.asset_calls.lock().unwrap().push(request_id.to_string());
        self.before_call(request_id).await;
        let exists = self.recordings.lock().unwrap().contains_key(request_id);
        Ok(exists.then(|| format!("asset://localhost/%2Frecordings%2F{}.wav", request_id)))
    }

    async fn resolve_audio_bytes_base64(&self, request_id: &str) -> Result<Option<String>, BackendError> {
        self.bytes_calls.lock().unwrap().push(request_id.to_string());
        self.before_call(request_id).await;
        if self.bytes_missing.lock().unwrap().contains(request_id) {
            return Ok(None);
        }
        Ok(self
            .recordings
            .lock()
            .unwrap()
            .get(request_id)
            .map(|bytes| STANDARD.encode(bytes)))
    }
}

/// 100ms of 16kHz mono silence.
pub fn wav_fixture() -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for _ in 0..1600 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

pub type Notices = Arc<Mutex<Vec<PlaybackErrorNotice>>>;

pub fn player_with(
    settings: PlayerSettings,
    backend: Arc<FakeBackend>,
    host: Arc<FakeHost>,
) -> (RecordingPlayer, Notices) {
    let _ = env_logger::builder().is_test(true).try_init();

    let player = RecordingPlayer::new(settings, backend, host);
    let notices: Notices = Arc::new(Mutex::new(Vec::new()));
    let sink = notices.clone();
    player.set_error_handler(move |notice| sink.lock().unwrap().push(notice.clone()));
    (player, notices)
}

/// Let spawned tasks (the element listener) catch up.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
