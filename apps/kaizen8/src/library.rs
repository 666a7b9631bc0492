//! In-memory deck library. Decks live for the lifetime of the process.

use crate::models::{Deck, Difficulty, Flashcard};

#[derive(Debug, Clone, Default)]
pub struct Library {
    decks: Vec<Deck>,
}

impl Library {
    /// A library holding the bundled starter decks.
    pub fn with_samples() -> Self {
        Self {
            decks: sample_decks(),
        }
    }

    /// Add a deck in front of the others.
    pub fn add(&mut self, deck: Deck) {
        tracing::info!(deck = %deck.title, cards = deck.cards.len(), "deck added");
        self.decks.insert(0, deck);
    }

    pub fn get(&self, id: &str) -> Option<&Deck> {
        self.decks.iter().find(|d| d.id == id)
    }

    pub fn remove(&mut self, id: &str) -> Option<Deck> {
        let idx = self.decks.iter().position(|d| d.id == id)?;
        Some(self.decks.remove(idx))
    }

    /// Decks matching `query`, newest first.
    pub fn search(&self, query: &str) -> Vec<&Deck> {
        self.decks.iter().filter(|d| d.matches(query)).collect()
    }

    pub fn len(&self) -> usize {
        self.decks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decks.is_empty()
    }
}

fn sample_decks() -> Vec<Deck> {
    vec![
        Deck::new("Intro to React")
            .with_id("1")
            .with_description("Core concepts of React.js including Hooks and Components.")
            .with_tag("Coding")
            .with_tag("Engineering")
            .with_card(Flashcard::new(
                "c1",
                "What is a Hook?",
                "A function that lets you \"hook into\" React state and lifecycle features from function components.",
                "Basics",
                Difficulty::Medium,
            ))
            .with_card(Flashcard::new(
                "c2",
                "What is JSX?",
                "A syntax extension to JavaScript that looks like HTML.",
                "Syntax",
                Difficulty::Easy,
            ))
            .with_card(Flashcard::new(
                "c3",
                "UseEffect Dependency Array",
                "Controls when the effect runs. Empty [] runs once on mount.",
                "Hooks",
                Difficulty::Hard,
            )),
        Deck::new("Japanese Phrases")
            .with_id("2")
            .with_description("Essential phrases for travel.")
            .with_tag("Language")
            .with_tag("Culture")
            .with_card(Flashcard::new(
                "j1",
                "Hello",
                "Konnichiwa (こんにちは)",
                "Greetings",
                Difficulty::Easy,
            ))
            .with_card(Flashcard::new(
                "j2",
                "Thank you",
                "Arigatou (ありがとう)",
                "Politeness",
                Difficulty::Easy,
            )),
    ]
}
