//! A study session: the review queue plus optional mirroring.

use crate::mirror::{MirrorHost, MirrorPayload};
use crate::models::{Deck, SessionStats};
use crate::queue::{ReviewQueue, SessionState};
use std::time::{Duration, Instant};
use tui_mirror::Transport;

/// How a session is started.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// Delay between answering and the card leaving the queue.
    pub settle_delay: Duration,
    /// Shuffle the deck; otherwise authoring order.
    pub shuffle: bool,
    /// Mirror to viewers from the start.
    pub broadcasting: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(200),
            shuffle: true,
            broadcasting: false,
        }
    }
}

/// Owns the review queue for one deck and keeps viewers in step with it.
pub struct StudySession<T: Transport<MirrorPayload>> {
    deck: Deck,
    queue: ReviewQueue,
    host: Option<MirrorHost<T>>,
    broadcasting: bool,
}

impl<T: Transport<MirrorPayload>> StudySession<T> {
    /// Start studying `deck`. The deck itself is never reordered.
    pub fn start(deck: Deck, options: SessionOptions, host: Option<MirrorHost<T>>) -> Self {
        let mut queue = ReviewQueue::new(options.settle_delay);
        if options.shuffle {
            queue.start(&deck);
        } else {
            queue.start_ordered(&deck);
        }
        tracing::info!(deck = %deck.title, cards = deck.cards.len(), "study session started");

        let mut session = Self {
            deck,
            queue,
            host,
            broadcasting: options.broadcasting,
        };
        if let Some(host) = session.host.as_mut() {
            host.reset();
        }
        session.sync();
        session
    }

    /// Push the current state to viewers, closing them out once complete.
    fn sync(&mut self) {
        if !self.broadcasting {
            return;
        }
        let Some(host) = self.host.as_mut() else {
            return;
        };
        match self.queue.state() {
            SessionState::Active => {
                host.observe(&self.deck.title, &self.queue);
            }
            SessionState::Complete => {
                if host.close() {
                    tracing::info!(deck = %self.deck.title, "session complete, mirror closed");
                }
            }
        }
    }

    pub fn flip(&mut self) -> bool {
        let changed = self.queue.flip();
        self.sync();
        changed
    }

    pub fn mark_known(&mut self) -> bool {
        let accepted = self.queue.mark_known();
        self.sync();
        accepted
    }

    pub fn mark_unknown(&mut self) -> bool {
        let accepted = self.queue.mark_unknown();
        self.sync();
        accepted
    }

    /// Drive the settle timer.
    pub fn tick(&mut self, now: Instant) -> bool {
        let applied = self.queue.tick(now);
        if applied {
            self.sync();
        }
        applied
    }

    /// Turn mirroring on or off mid-session. Turning it off closes viewers.
    pub fn set_broadcasting(&mut self, on: bool) {
        if on == self.broadcasting {
            return;
        }
        if on {
            if let Some(host) = self.host.as_mut() {
                host.reset();
            }
            self.broadcasting = true;
            self.sync();
        } else {
            if let Some(host) = self.host.as_mut() {
                host.close();
            }
            self.broadcasting = false;
        }
    }

    /// End the session, closing viewers first when mirroring.
    pub fn exit(&mut self) -> SessionStats {
        if self.broadcasting {
            if let Some(host) = self.host.as_mut() {
                host.close();
            }
        }
        tracing::info!(
            deck = %self.deck.title,
            correct = self.queue.stats().correct,
            incorrect = self.queue.stats().incorrect,
            "study session ended"
        );
        self.queue.stats()
    }

    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    pub fn queue(&self) -> &ReviewQueue {
        &self.queue
    }

    pub fn stats(&self) -> SessionStats {
        self.queue.stats()
    }

    pub fn is_complete(&self) -> bool {
        self.queue.is_complete()
    }

    pub fn is_broadcasting(&self) -> bool {
        self.broadcasting && self.host.is_some()
    }
}

impl<T: Transport<MirrorPayload>> Drop for StudySession<T> {
    fn drop(&mut self) {
        if self.broadcasting {
            if let Some(host) = self.host.as_mut() {
                host.close();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::{MirrorViewer, ViewerState, MIRROR_CHANNEL_NAME};
    use crate::models::{Difficulty, Flashcard};
    use std::sync::{Arc, Mutex};
    use tui_mirror::{Bus, MirrorChannel, Subscription};

    type Channel = MirrorChannel<MirrorPayload>;

    fn deck(ids: &[&str]) -> Deck {
        Deck::new("Capitals").with_cards(
            ids.iter()
                .map(|id| Flashcard::new(*id, "Q", "A", "Geo", Difficulty::Easy))
                .collect(),
        )
    }

    fn options(broadcasting: bool) -> SessionOptions {
        SessionOptions {
            settle_delay: Duration::ZERO,
            shuffle: false,
            broadcasting,
        }
    }

    fn mirrored(ids: &[&str], broadcasting: bool) -> (StudySession<Channel>, Channel) {
        let bus = Bus::new();
        let host = MirrorHost::new(bus.open(MIRROR_CHANNEL_NAME));
        let viewer_end = bus.open(MIRROR_CHANNEL_NAME);
        let session = StudySession::start(deck(ids), options(broadcasting), Some(host));
        (session, viewer_end)
    }

    fn tap(channel: &Channel) -> (Arc<Mutex<Vec<MirrorPayload>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = channel.subscribe(Box::new(move |p: &MirrorPayload| sink.lock().unwrap().push(p.clone())));
        (seen, sub)
    }

    #[test]
    fn test_viewer_follows_session_to_completion() {
        let bus = Bus::new();
        let viewer_end: Channel = bus.open(MIRROR_CHANNEL_NAME);
        let viewer = MirrorViewer::attach(&viewer_end);
        let host = MirrorHost::new(bus.open(MIRROR_CHANNEL_NAME));

        let mut session = StudySession::start(deck(&["a", "b"]), options(true), Some(host));
        viewer_end.pump();
        match viewer.state() {
            ViewerState::Live(s) => {
                assert_eq!(s.current_card.id, "a");
                assert_eq!(s.deck_title, "Capitals");
                assert_eq!(s.total_cards, 2);
            }
            ViewerState::Waiting => panic!("viewer should be live"),
        }

        session.flip();
        viewer_end.pump();
        assert!(matches!(viewer.state(), ViewerState::Live(s) if s.is_flipped));

        session.mark_known();
        session.mark_known();
        assert!(session.is_complete());
        viewer_end.pump();
        assert_eq!(viewer.state(), ViewerState::Waiting);
    }

    #[test]
    fn test_not_broadcasting_sends_nothing() {
        let (mut session, viewer_end) = mirrored(&["a"], false);
        let (seen, _sub) = tap(&viewer_end);
        session.flip();
        session.mark_known();
        session.exit();
        viewer_end.pump();
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_exit_sends_single_close() {
        let (mut session, viewer_end) = mirrored(&["a", "b"], true);
        let (seen, _sub) = tap(&viewer_end);
        session.exit();
        drop(session);
        viewer_end.pump();

        let seen = seen.lock().unwrap();
        let closes = seen.iter().filter(|p| **p == MirrorPayload::Close).count();
        assert_eq!(closes, 1);
        assert_eq!(seen.last(), Some(&MirrorPayload::Close));
    }

    #[test]
    fn test_drop_closes_viewers() {
        let (session, viewer_end) = mirrored(&["a"], true);
        let viewer = MirrorViewer::attach(&viewer_end);
        drop(session);
        viewer_end.pump();
        assert_eq!(viewer.state(), ViewerState::Waiting);
    }

    #[test]
    fn test_toggle_broadcasting() {
        let (mut session, viewer_end) = mirrored(&["a", "b"], false);
        let viewer = MirrorViewer::attach(&viewer_end);

        session.set_broadcasting(true);
        viewer_end.pump();
        assert!(viewer.is_live());

        session.set_broadcasting(false);
        viewer_end.pump();
        assert!(!viewer.is_live());

        session.mark_known();
        viewer_end.pump();
        assert!(!viewer.is_live());
    }

    #[test]
    fn test_empty_deck_closes_immediately() {
        let bus = Bus::new();
        let viewer_end: Channel = bus.open(MIRROR_CHANNEL_NAME);
        let (seen, _sub) = tap(&viewer_end);
        let host = MirrorHost::new(bus.open(MIRROR_CHANNEL_NAME));

        let session = StudySession::start(deck(&[]), options(true), Some(host));
        assert!(session.is_complete());
        assert_eq!(session.queue().progress(), 100);
        viewer_end.pump();
        assert_eq!(*seen.lock().unwrap(), vec![MirrorPayload::Close]);
    }

    #[test]
    fn test_settle_delay_syncs_on_tick() {
        let bus = Bus::new();
        let viewer_end: Channel = bus.open(MIRROR_CHANNEL_NAME);
        let viewer = MirrorViewer::attach(&viewer_end);
        let host = MirrorHost::new(bus.open(MIRROR_CHANNEL_NAME));
        let opts = SessionOptions {
            settle_delay: Duration::from_millis(200),
            shuffle: false,
            broadcasting: true,
        };

        let mut session = StudySession::start(deck(&["a", "b"]), opts, Some(host));
        let pending_since = Instant::now();
        assert!(session.mark_known());
        assert!(!session.mark_known());

        viewer_end.pump();
        assert!(matches!(viewer.state(), ViewerState::Live(s) if s.current_card.id == "a"));

        assert!(session.tick(pending_since + Duration::from_secs(1)));
        viewer_end.pump();
        assert!(matches!(viewer.state(), ViewerState::Live(s) if s.current_card.id == "b" && s.progress == 50));
    }

    #[test]
    fn test_session_without_host() {
        let mut session: StudySession<Channel> = StudySession::start(deck(&["a"]), options(true), None);
        assert!(!session.is_broadcasting());
        session.mark_known();
        assert_eq!(session.exit().correct, 1);
    }
}
