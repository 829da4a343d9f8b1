//! Owner of the single shared audio element.

use super::host::{AudioTransport, MediaHost, TransportEvent};
use super::session::SessionCell;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

struct ElementSlot {
    transport: Arc<dyn AudioTransport>,
    listener: JoinHandle<()>,
}

pub(crate) struct AudioElementManager {
    host: Arc<dyn MediaHost>,
    slot: Mutex<Option<ElementSlot>>,
}

impl AudioElementManager {
    pub fn new(host: Arc<dyn MediaHost>) -> Self {
        Self {
            host,
            slot: Mutex::new(None),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<ElementSlot>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the element, creating it and its listener on first use.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn get_or_create(&self, session: &Arc<SessionCell>) -> Arc<dyn AudioTransport> {
        let mut slot = self.slot();
        if let Some(existing) = slot.as_ref() {
            return existing.transport.clone();
        }

        let transport = self.host.create_audio_element();
        let listener = tokio::spawn(listen(transport.subscribe(), Arc::downgrade(session)));
        log::debug!("Player: Created audio element");
        *slot = Some(ElementSlot {
            transport: transport.clone(),
            listener,
        });
        transport
    }

    /// The element, if it has been created.
    pub fn current(&self) -> Option<Arc<dyn AudioTransport>> {
        self.slot().as_ref().map(|s| s.transport.clone())
    }

    /// Pause the element if it exists.
    pub fn pause(&self) {
        if let Some(transport) = self.current() {
            transport.pause();
        }
    }

    /// Whether the element exists and is producing audio.
    pub fn is_active(&self) -> bool {
        self.current().map(|t| !t.is_paused()).unwrap_or(false)
    }

    /// Stop the listener and detach the element.
    pub fn dispose(&self) {
        let Some(slot) = self.slot().take() else {
            return;
        };
        slot.listener.abort();
        slot.transport.pause();
        slot.transport.clear_source();
        log::debug!("Player: Audio element detached");
    }
}

/// `ended` and `pause` both mean the session is no longer playing. External
/// pauses (media keys, OS controls) are indistinguishable from ours.
async fn listen(mut events: broadcast::Receiver<TransportEvent>, session: Weak<SessionCell>) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                log::warn!("Player: Element listener missed {} event(s)", skipped);
                continue;
            }
            Err(RecvError::Closed) => return,
        };

        let Some(session) = session.upgrade() else {
            return;
        };

        match &event {
            TransportEvent::Ended { src } | TransportEvent::Paused { src } => {
                if session.clear_if_playing(src) {
                    log::debug!("Player: Playback ended ({:?})", event);
                }
            }
            TransportEvent::Playing { .. } | TransportEvent::Error { .. } => {}
        }
    }
}
