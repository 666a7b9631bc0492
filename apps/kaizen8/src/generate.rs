//! Deck generation from images, audio, or documents.
//!
//! A [`CardGenerator`] turns source files into flashcards. Generation either
//! yields a whole deck or an error; a failed request never leaves a partial
//! deck behind.

use crate::config::GenerationConfig;
use crate::models::{deep_dive_url, Deck, Difficulty, Flashcard, InfographicData};
use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("No source files given")]
    NoSources,

    #[error("API key not set (expected in ${0})")]
    MissingApiKey(String),

    #[error("Generation request failed: {0}")]
    Transport(String),

    #[error("Malformed generation response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for GenerationError {
    fn from(e: serde_json::Error) -> Self {
        Self::MalformedResponse(e.to_string())
    }
}

pub type GenerationResult<T> = Result<T, GenerationError>;

/// What the sources are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Images,
    Audio,
    Documents,
}

impl SourceKind {
    /// Guess from a MIME type.
    pub fn from_mime(mime: &str) -> Self {
        if mime.starts_with("image/") {
            Self::Images
        } else if mime.starts_with("audio/") {
            Self::Audio
        } else {
            Self::Documents
        }
    }

    fn id_prefix(&self) -> &'static str {
        match self {
            Self::Images => "gen",
            Self::Audio => "audio-gen",
            Self::Documents => "doc-gen",
        }
    }
}

/// One uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Load a file, inferring its MIME type from the extension.
    pub fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, mime_for_path(path), bytes))
    }

    /// File name without its extension.
    pub fn stem(&self) -> &str {
        self.name.split('.').next().unwrap_or("")
    }
}

fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        "ogg" => "audio/ogg",
        "pdf" => "application/pdf",
        "txt" | "md" => "text/plain",
        _ => "application/octet-stream",
    }
}

/// A generation job.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub kind: SourceKind,
    pub sources: Vec<SourceFile>,
    /// Topic focus, used for image decks.
    pub topic: Option<String>,
}

impl GenerationRequest {
    /// Build a request, inferring the kind from the first file.
    pub fn from_sources(sources: Vec<SourceFile>, topic: Option<String>) -> Self {
        let kind = sources
            .first()
            .map(|s| SourceKind::from_mime(&s.mime_type))
            .unwrap_or(SourceKind::Documents);
        Self {
            kind,
            sources,
            topic: topic.filter(|t| !t.trim().is_empty()),
        }
    }
}

/// What a generator hands back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Generated {
    pub flashcards: Vec<Flashcard>,
    pub transcript: Option<String>,
    pub infographic: Option<InfographicData>,
}

#[async_trait]
pub trait CardGenerator: Send + Sync {
    fn name(&self) -> &str;
    async fn generate(&self, request: &GenerationRequest) -> GenerationResult<Generated>;
}

/// Run `generator` and assemble a deck from its output.
pub async fn generate_deck(
    generator: &dyn CardGenerator,
    request: &GenerationRequest,
) -> GenerationResult<Deck> {
    if request.sources.is_empty() {
        return Err(GenerationError::NoSources);
    }
    tracing::info!(generator = generator.name(), kind = ?request.kind, files = request.sources.len(), "generating deck");

    match generator.generate(request).await {
        Ok(generated) => {
            let deck = build_deck(request, generated);
            tracing::info!(deck = %deck.title, cards = deck.cards.len(), "deck generated");
            Ok(deck)
        }
        Err(e) => {
            tracing::error!(error = %e, "deck generation failed");
            Err(e)
        }
    }
}

/// Turn generator output into a deck.
pub fn build_deck(request: &GenerationRequest, generated: Generated) -> Deck {
    let deck = match request.kind {
        SourceKind::Images => {
            let title = request
                .topic
                .clone()
                .unwrap_or_else(|| "Generated Deck".to_string());
            Deck::new(title)
                .with_description(format!("Generated from {} images", request.sources.len()))
                .with_tag("Generated")
        }
        SourceKind::Audio => {
            let title = request
                .sources
                .first()
                .map(|s| s.stem())
                .filter(|s| !s.is_empty())
                .unwrap_or("Audio Notes")
                .to_string();
            let transcript = generated.transcript.as_deref().unwrap_or_default();
            let excerpt: String = transcript.chars().take(50).collect();
            Deck::new(title)
                .with_description(format!("Generated from Audio: {}...", excerpt))
                .with_tag("Audio")
                .with_tag("Transcription")
        }
        SourceKind::Documents => {
            let (title, summary) = match &generated.infographic {
                Some(info) => (info.title.clone(), info.summary.clone()),
                None => ("Imported Deck".to_string(), String::new()),
            };
            let mut deck = Deck::new(title)
                .with_description(summary)
                .with_tag("Imported")
                .with_tag("Infographic");
            deck.infographic = generated.infographic.clone();
            deck
        }
    };
    deck.with_cards(generated.flashcards)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCard {
    front: Option<String>,
    back: Option<String>,
    category: Option<String>,
    difficulty: Option<String>,
    deep_dive_query: Option<String>,
}

/// Map raw model cards to flashcards.
pub fn parse_cards(raw: &Value, kind: SourceKind) -> GenerationResult<Vec<Flashcard>> {
    let raw_cards: Vec<RawCard> = serde_json::from_value(raw.clone())?;
    let stamp = Utc::now().timestamp_millis();
    let default_category = match kind {
        SourceKind::Audio => "Audio Note",
        _ => "General",
    };

    raw_cards
        .into_iter()
        .enumerate()
        .map(|(index, card)| -> GenerationResult<Flashcard> {
            let front = card
                .front
                .filter(|f| !f.trim().is_empty())
                .ok_or_else(|| GenerationError::MalformedResponse(format!("card {} has no front", index)))?;
            let back = card
                .back
                .ok_or_else(|| GenerationError::MalformedResponse(format!("card {} has no back", index)))?;
            let query = card.deep_dive_query.unwrap_or_else(|| front.clone());
            let difficulty = card
                .difficulty
                .as_deref()
                .map(Difficulty::parse_lenient)
                .unwrap_or_default();

            Ok(Flashcard::new(
                format!("{}-{}-{}", kind.id_prefix(), stamp, index),
                front,
                back,
                card.category.unwrap_or_else(|| default_category.to_string()),
                difficulty,
            )
            .with_deep_dive(deep_dive_url(&query)))
        })
        .collect()
}

/// Parse the JSON text a model produced for `kind`.
pub fn parse_generated(kind: SourceKind, text: &str) -> GenerationResult<Generated> {
    let value: Value = serde_json::from_str(text.trim())?;

    match kind {
        SourceKind::Images => Ok(Generated {
            flashcards: parse_cards(&value, kind)?,
            ..Generated::default()
        }),
        SourceKind::Audio => {
            let transcript = value
                .get("transcript")
                .and_then(Value::as_str)
                .unwrap_or("No transcription available.")
                .to_string();
            let cards = value.get("flashcards").cloned().unwrap_or_else(|| json!([]));
            Ok(Generated {
                flashcards: parse_cards(&cards, kind)?,
                transcript: Some(transcript),
                infographic: None,
            })
        }
        SourceKind::Documents => {
            let infographic: InfographicData = value
                .get("infographic")
                .cloned()
                .ok_or_else(|| GenerationError::MalformedResponse("missing infographic".to_string()))
                .and_then(|v| serde_json::from_value(v).map_err(GenerationError::from))?;
            let cards = value.get("flashcards").cloned().unwrap_or_else(|| json!([]));
            Ok(Generated {
                flashcards: parse_cards(&cards, kind)?,
                transcript: None,
                infographic: Some(infographic),
            })
        }
    }
}

/// Generator backed by the Gemini REST API.
pub struct GeminiGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiGenerator {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, timeout: Duration) -> GenerationResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    /// Build from config, reading the key from the configured variable.
    pub fn from_config(config: &GenerationConfig) -> GenerationResult<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| GenerationError::MissingApiKey(config.api_key_env.clone()))?;
        Self::new(api_key, &config.model, Duration::from_secs(config.timeout_secs))
    }

    fn prompt(request: &GenerationRequest) -> String {
        match request.kind {
            SourceKind::Images => format!(
                "Create a comprehensive set of flashcards based on these images. \
                 Topic focus: {}. \
                 Each card should have a clear question (front) and a concise answer (back). \
                 Assign a category and an estimated difficulty (easy, medium, hard). \
                 Also provide a short 'deep dive' search query related to the concept. \
                 Return JSON only.",
                request.topic.as_deref().unwrap_or("general")
            ),
            SourceKind::Audio => "Transcribe this audio recording and then generate 5 key flashcards \
                 to help study the content. Return a JSON object with a 'transcript' string \
                 and a 'flashcards' array."
                .to_string(),
            SourceKind::Documents => "Read these documents and produce an infographic summary \
                 (title, summary, and sections with title, content and a color from blue, green, \
                 purple, orange, red) plus a set of study flashcards. Return a JSON object with \
                 an 'infographic' object and a 'flashcards' array."
                .to_string(),
        }
    }

    fn response_schema(kind: SourceKind) -> Value {
        let card = json!({
            "type": "OBJECT",
            "properties": {
                "front": { "type": "STRING" },
                "back": { "type": "STRING" },
                "category": { "type": "STRING" },
                "difficulty": { "type": "STRING", "enum": ["easy", "medium", "hard"] },
                "deepDiveQuery": { "type": "STRING" }
            },
            "required": ["front", "back", "category", "difficulty"]
        });
        let cards = json!({ "type": "ARRAY", "items": card });

        match kind {
            SourceKind::Images => cards,
            SourceKind::Audio => json!({
                "type": "OBJECT",
                "properties": {
                    "transcript": { "type": "STRING" },
                    "flashcards": cards
                }
            }),
            SourceKind::Documents => json!({
                "type": "OBJECT",
                "properties": {
                    "infographic": {
                        "type": "OBJECT",
                        "properties": {
                            "title": { "type": "STRING" },
                            "summary": { "type": "STRING" },
                            "sections": {
                                "type": "ARRAY",
                                "items": {
                                    "type": "OBJECT",
                                    "properties": {
                                        "title": { "type": "STRING" },
                                        "content": { "type": "STRING" },
                                        "color": { "type": "STRING" }
                                    }
                                }
                            }
                        }
                    },
                    "flashcards": cards
                }
            }),
        }
    }

    fn request_body(request: &GenerationRequest) -> Value {
        let engine = base64::engine::general_purpose::STANDARD;
        let mut parts: Vec<Value> = request
            .sources
            .iter()
            .map(|s| {
                json!({
                    "inlineData": {
                        "mimeType": s.mime_type,
                        "data": engine.encode(&s.bytes)
                    }
                })
            })
            .collect();
        parts.push(json!({ "text": Self::prompt(request) }));

        json!({
            "contents": [{ "parts": parts }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": Self::response_schema(request.kind)
            }
        })
    }
}

/// Concatenated text of the first candidate.
fn response_text(body: &Value) -> GenerationResult<String> {
    let parts = body
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| GenerationError::MalformedResponse("no candidates".to_string()))?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    if text.trim().is_empty() {
        return Err(GenerationError::MalformedResponse("empty response".to_string()));
    }
    Ok(text)
}

#[async_trait]
impl CardGenerator for GeminiGenerator {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerationRequest) -> GenerationResult<Generated> {
        let url = format!("{}/models/{}:generateContent", GEMINI_ENDPOINT, self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::request_body(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(GenerationError::Transport(format!("HTTP {}: {}", status, detail)));
        }

        let body: Value = response.json().await?;
        parse_generated(request.kind, &response_text(&body)?)
    }
}
