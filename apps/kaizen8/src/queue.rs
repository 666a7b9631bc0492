//! Review queue engine.
//!
//! Cards the learner has not yet mastered stay in `queue`; a miss sends the
//! card to the back, a hit retires it to `completed`. The session is complete
//! once the queue is empty.

use crate::models::{Deck, Flashcard, SessionStats};
use crate::shuffle::shuffle;
use std::time::{Duration, Instant};

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Cards remain to review.
    Active,
    /// Every card has been mastered. Terminal until the next start.
    Complete,
}

/// Learner's answer for the current card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Known,
    Unknown,
}

/// An answer waiting for the flip-back animation to finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTransition {
    pub outcome: Outcome,
    pub due: Instant,
}

/// Ordered pending cards, mastered cards, and the display state of the
/// card being shown.
#[derive(Debug, Clone)]
pub struct ReviewQueue {
    total: usize,
    queue: Vec<Flashcard>,
    completed: Vec<Flashcard>,
    current_index: usize,
    flipped: bool,
    stats: SessionStats,
    settle_delay: Duration,
    pending: Option<PendingTransition>,
}

impl ReviewQueue {
    /// Create an idle queue. It reports `Complete` until started.
    pub fn new(settle_delay: Duration) -> Self {
        Self {
            total: 0,
            queue: Vec::new(),
            completed: Vec::new(),
            current_index: 0,
            flipped: false,
            stats: SessionStats::default(),
            settle_delay,
            pending: None,
        }
    }

    /// Start a session over a shuffled copy of the deck's cards.
    pub fn start(&mut self, deck: &Deck) {
        self.reset(shuffle(&deck.cards));
    }

    /// Start in authoring order.
    pub fn start_ordered(&mut self, deck: &Deck) {
        self.reset(deck.cards.clone());
    }

    fn reset(&mut self, cards: Vec<Flashcard>) {
        self.total = cards.len();
        self.queue = cards;
        self.completed.clear();
        self.current_index = 0;
        self.flipped = false;
        self.stats = SessionStats::default();
        self.pending = None;
        tracing::debug!(total = self.total, "review queue started");
    }

    /// The card to show, or `None` once the session is complete.
    pub fn current_card(&self) -> Option<&Flashcard> {
        self.queue.get(self.current_index)
    }

    pub fn state(&self) -> SessionState {
        if self.queue.is_empty() {
            SessionState::Complete
        } else {
            SessionState::Active
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state() == SessionState::Complete
    }

    /// Turn the current card over. Ignored while an answer is settling or
    /// when there is no card.
    pub fn flip(&mut self) -> bool {
        if self.pending.is_some() || self.current_card().is_none() {
            return false;
        }
        self.flipped = !self.flipped;
        true
    }

    pub fn mark_known(&mut self) -> bool {
        self.answer(Outcome::Known, Instant::now())
    }

    pub fn mark_unknown(&mut self) -> bool {
        self.answer(Outcome::Unknown, Instant::now())
    }

    /// Record an answer for the current card.
    ///
    /// The card is unflipped at once; the queue change is applied after the
    /// settle delay. Returns `false` when the answer was ignored because
    /// another one is still settling or the session is complete.
    pub fn answer(&mut self, outcome: Outcome, now: Instant) -> bool {
        if self.pending.is_some() || self.current_card().is_none() {
            return false;
        }
        self.flipped = false;

        if self.settle_delay.is_zero() {
            self.apply(outcome);
        } else {
            self.pending = Some(PendingTransition {
                outcome,
                due: now + self.settle_delay,
            });
        }
        true
    }

    /// Apply a settling answer whose delay has elapsed.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.pending {
            Some(pending) if now >= pending.due => self.settle(),
            _ => false,
        }
    }

    /// Apply a settling answer immediately.
    pub fn settle(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => {
                self.apply(pending.outcome);
                true
            }
            None => false,
        }
    }

    fn apply(&mut self, outcome: Outcome) {
        if self.current_index >= self.queue.len() {
            return;
        }
        let card = self.queue.remove(self.current_index);

        match outcome {
            Outcome::Known => {
                tracing::debug!(card = %card.id, "card mastered");
                self.completed.push(card);
                self.stats.correct += 1;
            }
            Outcome::Unknown => {
                tracing::debug!(card = %card.id, "card requeued");
                self.queue.push(card);
                self.stats.incorrect += 1;
            }
        }

        // The next card slides into the current slot; wrap if we removed the tail.
        if self.current_index >= self.queue.len() {
            self.current_index = 0;
        }
    }

    /// Percentage of the deck mastered, rounded half up. An empty deck is
    /// vacuously complete and reports 100.
    pub fn progress(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        let completed = self.completed.len();
        ((200 * completed + self.total) / (2 * self.total)) as u8
    }

    pub fn is_flipped(&self) -> bool {
        self.flipped
    }

    /// An answer is settling; input is ignored until it applies.
    pub fn is_transitioning(&self) -> bool {
        self.pending.is_some()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Cards in the session.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn queue(&self) -> &[Flashcard] {
        &self.queue
    }

    pub fn completed(&self) -> &[Flashcard] {
        &self.completed
    }
}
