//! Mirror mode: broadcasting a live study session to a second screen.
//!
//! The host pushes full snapshots whenever the visible card state changes and
//! a single `CLOSE` when the session ends. The viewer replaces its state with
//! each snapshot and falls back to waiting on `CLOSE`.

use crate::config::TransportKind;
use crate::models::Flashcard;
use crate::queue::ReviewQueue;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tui_mirror::{Bus, SocketChannel, Subscription, Transport};

/// Channel both host and viewer join.
pub const MIRROR_CHANNEL_NAME: &str = "kaizen8_mirror_channel";

/// A mirror participant shared between the app and its host or viewer.
pub type SharedTransport = Arc<dyn Transport<MirrorPayload> + Send + Sync>;

/// Join the mirror channel over the configured medium.
///
/// `bus` carries local participants; it is ignored for sockets.
pub fn open_transport(kind: TransportKind, bus: &Bus<MirrorPayload>) -> SharedTransport {
    match kind {
        TransportKind::Local => Arc::new(bus.open(MIRROR_CHANNEL_NAME)),
        TransportKind::Socket => Arc::new(SocketChannel::open(MIRROR_CHANNEL_NAME)),
    }
}

/// Everything a viewer needs to draw the host's card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorSnapshot {
    pub deck_title: String,
    pub current_card: Flashcard,
    pub is_flipped: bool,
    /// Percent mastered, 0-100.
    pub progress: u8,
    pub total_cards: usize,
}

impl MirrorSnapshot {
    /// Cards mastered, recovered from the progress percentage.
    pub fn position(&self) -> usize {
        (self.progress as usize * self.total_cards + 50) / 100
    }
}

/// Wire message on the mirror channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MirrorPayload {
    #[serde(rename = "SYNC")]
    Sync(MirrorSnapshot),
    #[serde(rename = "CLOSE")]
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SyncKey {
    card_id: String,
    flipped: bool,
    progress: u8,
}

/// Producer side of mirror mode.
pub struct MirrorHost<T> {
    transport: T,
    last_sent: Option<SyncKey>,
    closed: bool,
}

impl<T: Transport<MirrorPayload>> MirrorHost<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            last_sent: None,
            closed: false,
        }
    }

    /// Broadcast a snapshot if the visible state changed since the last one.
    ///
    /// Nothing is sent when there is no current card or after [`Self::close`].
    pub fn observe(&mut self, deck_title: &str, queue: &ReviewQueue) -> bool {
        if self.closed {
            return false;
        }
        let Some(card) = queue.current_card() else {
            return false;
        };

        let key = SyncKey {
            card_id: card.id.clone(),
            flipped: queue.is_flipped(),
            progress: queue.progress(),
        };
        if self.last_sent.as_ref() == Some(&key) {
            return false;
        }

        let payload = MirrorPayload::Sync(MirrorSnapshot {
            deck_title: deck_title.to_string(),
            current_card: card.clone(),
            is_flipped: key.flipped,
            progress: key.progress,
            total_cards: queue.total(),
        });
        self.transport.broadcast(&payload);
        tracing::debug!(card = %key.card_id, flipped = key.flipped, progress = key.progress, "mirror sync");
        self.last_sent = Some(key);
        true
    }

    /// Tell viewers the session is over. Sent at most once.
    pub fn close(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;
        self.transport.broadcast(&MirrorPayload::Close);
        tracing::debug!("mirror close");
        true
    }

    /// Re-arm for a new session.
    pub fn reset(&mut self) {
        self.closed = false;
        self.last_sent = None;
    }
}

/// What the viewer is showing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ViewerState {
    /// No host session; show the waiting screen.
    #[default]
    Waiting,
    /// Showing the host's latest snapshot.
    Live(MirrorSnapshot),
}

impl ViewerState {
    /// Replace state with what `payload` says.
    pub fn apply(&mut self, payload: &MirrorPayload) {
        *self = match payload {
            MirrorPayload::Sync(snapshot) => Self::Live(snapshot.clone()),
            MirrorPayload::Close => Self::Waiting,
        };
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live(_))
    }
}

/// Consumer side of mirror mode.
///
/// Payloads arrive when the transport is pumped. Dropping the viewer
/// unsubscribes it.
pub struct MirrorViewer {
    state: Arc<Mutex<ViewerState>>,
    subscription: Subscription,
}

impl MirrorViewer {
    pub fn attach<T: Transport<MirrorPayload> + ?Sized>(transport: &T) -> Self {
        let state = Arc::new(Mutex::new(ViewerState::Waiting));
        let sink = Arc::clone(&state);
        let subscription = transport.subscribe(Box::new(move |payload: &MirrorPayload| {
            sink.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .apply(payload);
        }));
        Self { state, subscription }
    }

    pub fn state(&self) -> ViewerState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_live(&self) -> bool {
        self.state().is_live()
    }

    /// Stop receiving payloads. Safe to call repeatedly.
    pub fn detach(&self) {
        self.subscription.unsubscribe();
    }
}
