//! Data models for decks and flashcards.

use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifiers.
pub type DeckId = String;
pub type CardId = String;

/// Card difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    /// Get display name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Easy => "Easy",
            Self::Medium => "Medium",
            Self::Hard => "Hard",
        }
    }

    /// Parse loosely, falling back to medium.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "easy" => Self::Easy,
            "hard" => Self::Hard,
            _ => Self::Medium,
        }
    }
}

/// A flashcard. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flashcard {
    /// Unique identifier.
    pub id: CardId,
    /// Prompt text.
    pub front: String,
    /// Answer text.
    pub back: String,
    /// Free-text label.
    pub category: String,
    pub difficulty: Difficulty,
    /// Supplementary reference link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deep_dive_url: Option<String>,
}

impl Flashcard {
    /// Create a new card.
    pub fn new(
        id: impl Into<CardId>,
        front: impl Into<String>,
        back: impl Into<String>,
        category: impl Into<String>,
        difficulty: Difficulty,
    ) -> Self {
        Self {
            id: id.into(),
            front: front.into(),
            back: back.into(),
            category: category.into(),
            difficulty,
            deep_dive_url: None,
        }
    }

    /// Set the deep dive link.
    pub fn with_deep_dive(mut self, url: impl Into<String>) -> Self {
        self.deep_dive_url = Some(url.into());
        self
    }
}

/// A flashcard deck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deck {
    /// Unique identifier.
    pub id: DeckId,
    /// Deck title.
    pub title: String,
    pub description: String,
    /// Cards in authoring order.
    pub cards: Vec<Flashcard>,
    /// Tags, matched case-insensitively.
    pub tags: Vec<String>,
    /// When the deck was created.
    pub created_at: DateTime<Utc>,
    /// Summary produced alongside imported decks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infographic: Option<InfographicData>,
}

impl Deck {
    /// Create a new empty deck.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            description: String::new(),
            cards: Vec::new(),
            tags: Vec::new(),
            created_at: Utc::now(),
            infographic: None,
        }
    }

    /// Set id.
    pub fn with_id(mut self, id: impl Into<DeckId>) -> Self {
        self.id = id.into();
        self
    }

    /// Set description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Add a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Add a card.
    pub fn with_card(mut self, card: Flashcard) -> Self {
        self.cards.push(card);
        self
    }

    /// Set cards.
    pub fn with_cards(mut self, cards: Vec<Flashcard>) -> Self {
        self.cards = cards;
        self
    }

    /// Case-insensitive match against title, description, or any tag.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&query)
            || self.description.to_lowercase().contains(&query)
            || self.tags.iter().any(|t| t.to_lowercase().contains(&query))
    }
}

/// Per-session outcome counters. Only ever incremented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub correct: usize,
    pub incorrect: usize,
}

impl SessionStats {
    /// Total answers given.
    pub fn answered(&self) -> usize {
        self.correct + self.incorrect
    }
}

/// Summary generated for imported documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfographicData {
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub sections: Vec<InfographicSection>,
}

/// One section of an infographic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfographicSection {
    pub title: String,
    pub content: String,
    /// Accent color name (blue, green, purple, orange, red).
    #[serde(default)]
    pub color: String,
}

/// Web search link used as a card's deep dive.
pub fn deep_dive_url(query: &str) -> String {
    format!(
        "https://www.google.com/search?q={}",
        utf8_percent_encode(query, NON_ALPHANUMERIC)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_deck() -> Deck {
        Deck::new("Japanese Phrases")
            .with_description("Essential phrases for travel.")
            .with_tag("Language")
            .with_tag("Culture")
            .with_card(Flashcard::new("j1", "Hello", "Konnichiwa", "Greetings", Difficulty::Easy))
    }

    #[test]
    fn test_deck_creation() {
        let deck = sample_deck();
        assert_eq!(deck.title, "Japanese Phrases");
        assert_eq!(deck.cards.len(), 1);
        assert!(!deck.id.is_empty());
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let deck = sample_deck();
        assert!(deck.matches("japanese"));
        assert!(deck.matches("TRAVEL"));
        assert!(deck.matches("cult"));
        assert!(deck.matches("  "));
        assert!(!deck.matches("react"));
    }

    #[test]
    fn test_flashcard_wire_shape() {
        let card = Flashcard::new("c1", "Q", "A", "Basics", Difficulty::Hard)
            .with_deep_dive("https://example.com");
        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["difficulty"], "hard");
        assert_eq!(json["deepDiveUrl"], "https://example.com");

        let plain = Flashcard::new("c2", "Q", "A", "Basics", Difficulty::Easy);
        let json = serde_json::to_value(&plain).unwrap();
        assert!(json.get("deepDiveUrl").is_none());
    }

    #[test]
    fn test_difficulty_parse_lenient() {
        assert_eq!(Difficulty::parse_lenient("Easy"), Difficulty::Easy);
        assert_eq!(Difficulty::parse_lenient(" hard "), Difficulty::Hard);
        assert_eq!(Difficulty::parse_lenient("brutal"), Difficulty::Medium);
    }

    #[test]
    fn test_deep_dive_url_is_encoded() {
        assert_eq!(
            deep_dive_url("What is JSX?"),
            "https://www.google.com/search?q=What%20is%20JSX%3F"
        );
    }

    #[test]
    fn test_session_stats() {
        let stats = SessionStats { correct: 2, incorrect: 3 };
        assert_eq!(stats.answered(), 5);
    }
}
