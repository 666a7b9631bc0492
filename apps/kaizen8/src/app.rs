//! Application state and logic.

use crate::config::{Config, TransportKind};
use crate::generate::{generate_deck, CardGenerator, GenerationRequest, GenerationResult, SourceFile, SourceKind};
use crate::library::Library;
use crate::mirror::{open_transport, MirrorHost, MirrorPayload, MirrorViewer, SharedTransport, ViewerState};
use crate::models::{Deck, DeckId, SessionStats};
use crate::session::StudySession;
use crossterm::event::{KeyCode, KeyEvent};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tui_mirror::{Bus, Transport};

/// Shown when an image upload has no topic to focus on.
const MISSING_TOPIC: &str = "Please add at least one image and a topic.";

/// How long a dropped viewer waits before rejoining the channel.
const VIEWER_RETRY: Duration = Duration::from_secs(1);

/// Which side of mirror mode this process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Viewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    DeckList,
    Study,
    Complete,
    Mirror,
    /// Summary of a deck generated from documents.
    Infographic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputField {
    None,
    Search,
    SourcePaths,
    Topic,
}

/// Result of the last finished session, shown on the complete screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedSession {
    pub deck_title: String,
    pub stats: SessionStats,
}

struct PendingGeneration {
    kind: SourceKind,
    receiver: oneshot::Receiver<GenerationResult<Deck>>,
}

struct ViewerLink {
    viewer: MirrorViewer,
    transport: SharedTransport,
    joined_at: Instant,
}

pub struct App {
    pub config: Config,
    pub role: Role,
    pub view: View,
    pub library: Library,
    pub selected_deck: usize,
    pub search: String,
    pub session: Option<StudySession<SharedTransport>>,
    pub finished: Option<FinishedSession>,
    pub detail_deck: Option<DeckId>,
    pub broadcasting: bool,
    pub editing: bool,
    pub input_buffer: String,
    pub input_field: InputField,
    pub message: Option<String>,
    pub show_help: bool,
    pub should_quit: bool,
    bus: Bus<MirrorPayload>,
    host_transport: Option<SharedTransport>,
    viewer: Option<ViewerLink>,
    generator: Option<Arc<dyn CardGenerator>>,
    generation: Option<PendingGeneration>,
    staged_sources: Vec<SourceFile>,
}

impl App {
    pub fn new(config: Config, role: Role) -> Self {
        let broadcasting = config.mirror.broadcast_on_start;
        let mut app = Self {
            config,
            role,
            view: View::DeckList,
            library: Library::with_samples(),
            selected_deck: 0,
            search: String::new(),
            session: None,
            finished: None,
            detail_deck: None,
            broadcasting,
            editing: false,
            input_buffer: String::new(),
            input_field: InputField::None,
            message: None,
            show_help: false,
            should_quit: false,
            bus: Bus::new(),
            host_transport: None,
            viewer: None,
            generator: None,
            generation: None,
            staged_sources: Vec::new(),
        };
        if role == Role::Viewer {
            app.join_mirror();
        }
        app
    }

    /// Attach the collaborator used for deck generation.
    pub fn with_generator(mut self, generator: Arc<dyn CardGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// The in-process medium local participants share.
    #[cfg(test)]
    pub fn mirror_bus(&self) -> &Bus<MirrorPayload> {
        &self.bus
    }

    /// Decks matching the current search, newest first.
    pub fn visible_decks(&self) -> Vec<&Deck> {
        self.library.search(&self.search)
    }

    pub fn selected_deck(&self) -> Option<&Deck> {
        self.visible_decks().get(self.selected_deck).copied()
    }

    /// The deck whose infographic is open.
    pub fn detail_deck(&self) -> Option<&Deck> {
        self.detail_deck.as_deref().and_then(|id| self.library.get(id))
    }

    pub fn viewer_state(&self) -> ViewerState {
        self.viewer
            .as_ref()
            .map(|link| link.viewer.state())
            .unwrap_or_default()
    }

    pub fn is_generating(&self) -> bool {
        self.generation.is_some()
    }

    pub fn staged_sources(&self) -> &[SourceFile] {
        &self.staged_sources
    }

    /// Drive timers, transports and background work. Never blocks.
    pub fn tick(&mut self, now: Instant) {
        if let Some(session) = self.session.as_mut() {
            session.tick(now);
        }
        self.check_complete();

        if let Some(transport) = &self.host_transport {
            transport.pump();
        }
        self.pump_viewer(now);
        self.poll_generation();
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        self.message = None;

        if self.show_help {
            self.show_help = false;
            return;
        }

        if self.editing {
            self.handle_edit_key(key);
            return;
        }

        match self.view {
            View::DeckList => self.handle_deck_list_key(key),
            View::Study => self.handle_study_key(key),
            View::Complete => self.handle_complete_key(key),
            View::Mirror => self.handle_mirror_key(key),
            View::Infographic => self.handle_infographic_key(key),
        }
    }

    fn handle_edit_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                if self.input_field == InputField::Search {
                    self.search.clear();
                    self.selected_deck = 0;
                }
                self.staged_sources.clear();
                self.stop_editing();
            }
            KeyCode::Enter => self.finish_editing(),
            KeyCode::Backspace => {
                self.input_buffer.pop();
                self.sync_search();
            }
            KeyCode::Char(c) => {
                self.input_buffer.push(c);
                self.sync_search();
            }
            _ => {}
        }
    }

    fn handle_deck_list_key(&mut self, key: KeyEvent) {
        let count = self.visible_decks().len();
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                if count > 0 {
                    self.selected_deck = (self.selected_deck + 1).min(count - 1);
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.selected_deck = self.selected_deck.saturating_sub(1);
            }
            KeyCode::Enter | KeyCode::Char(' ') => self.start_study(),
            KeyCode::Char('/') => self.begin_editing(InputField::Search, self.search.clone()),
            KeyCode::Char('g') => {
                if self.is_generating() {
                    self.message = Some("A deck is already being generated".to_string());
                } else {
                    self.begin_editing(InputField::SourcePaths, String::new());
                }
            }
            KeyCode::Char('i') => self.open_infographic(),
            KeyCode::Char('d') => self.delete_selected(),
            KeyCode::Char('b') => self.toggle_broadcasting(),
            KeyCode::Char('v') => self.join_mirror(),
            KeyCode::Char('?') => self.show_help = true,
            KeyCode::Char('q') => self.should_quit = true,
            _ => {}
        }
    }

    fn handle_study_key(&mut self, key: KeyEvent) {
        let Some(session) = self.session.as_mut() else {
            self.view = View::DeckList;
            return;
        };

        match key.code {
            KeyCode::Char(' ') | KeyCode::Enter => {
                session.flip();
            }
            KeyCode::Char('1') | KeyCode::Char('r') | KeyCode::Left => {
                session.mark_unknown();
            }
            KeyCode::Char('2') | KeyCode::Char('m') | KeyCode::Right => {
                session.mark_known();
            }
            KeyCode::Char('b') => self.toggle_broadcasting(),
            KeyCode::Char('?') => self.show_help = true,
            KeyCode::Char('q') | KeyCode::Esc => self.end_session(),
            _ => {}
        }
        self.check_complete();
    }

    fn handle_complete_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter | KeyCode::Esc | KeyCode::Char('q') => {
                self.finished = None;
                self.view = View::DeckList;
            }
            _ => {}
        }
    }

    fn handle_infographic_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter | KeyCode::Char(' ') => {
                if let Some(deck) = self.detail_deck().cloned() {
                    self.detail_deck = None;
                    self.study(deck);
                }
            }
            KeyCode::Char('q') | KeyCode::Esc => {
                self.detail_deck = None;
                self.view = View::DeckList;
            }
            KeyCode::Char('?') => self.show_help = true,
            _ => {}
        }
    }

    fn handle_mirror_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.leave_mirror(),
            KeyCode::Char('?') => self.show_help = true,
            _ => {}
        }
    }

    fn begin_editing(&mut self, field: InputField, initial: String) {
        self.editing = true;
        self.input_field = field;
        self.input_buffer = initial;
    }

    fn stop_editing(&mut self) {
        self.editing = false;
        self.input_buffer.clear();
        self.input_field = InputField::None;
    }

    fn sync_search(&mut self) {
        if self.input_field == InputField::Search {
            self.search = self.input_buffer.clone();
            self.selected_deck = 0;
        }
    }

    fn finish_editing(&mut self) {
        match self.input_field {
            InputField::Search => {}
            InputField::SourcePaths => {
                let input = std::mem::take(&mut self.input_buffer);
                match read_sources(&input) {
                    Ok(sources) if sources.is_empty() => {
                        self.message = Some("No files given".to_string());
                    }
                    Ok(sources) => {
                        let kind = SourceKind::from_mime(&sources[0].mime_type);
                        self.staged_sources = sources;
                        if kind == SourceKind::Images {
                            // Images need a topic before generating.
                            self.begin_editing(InputField::Topic, String::new());
                            return;
                        }
                        self.start_generation(None);
                    }
                    Err(e) => self.message = Some(e),
                }
            }
            InputField::Topic => {
                let topic = std::mem::take(&mut self.input_buffer);
                if topic.trim().is_empty() || self.staged_sources.is_empty() {
                    // Keep the staged images so the user can try again.
                    self.message = Some(MISSING_TOPIC.to_string());
                    self.begin_editing(InputField::Topic, String::new());
                    return;
                }
                self.start_generation(Some(topic));
            }
            InputField::None => {}
        }
        self.stop_editing();
    }

    fn start_study(&mut self) {
        if let Some(deck) = self.selected_deck().cloned() {
            self.study(deck);
        }
    }

    fn study(&mut self, deck: Deck) {
        let transport = self.host_transport();
        let mut options = self.config.to_session_options();
        options.broadcasting = self.broadcasting;

        let session = StudySession::start(deck, options, Some(MirrorHost::new(transport)));
        self.session = Some(session);
        self.finished = None;
        self.view = View::Study;
        self.check_complete();
    }

    /// Leave the session early.
    fn end_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.exit();
        }
        self.view = View::DeckList;
    }

    fn check_complete(&mut self) {
        let complete = self.session.as_ref().is_some_and(|s| s.is_complete());
        if !complete {
            return;
        }
        if let Some(mut session) = self.session.take() {
            let stats = session.exit();
            self.finished = Some(FinishedSession {
                deck_title: session.deck().title.clone(),
                stats,
            });
        }
        self.view = View::Complete;
    }

    fn host_transport(&mut self) -> SharedTransport {
        let kind = self.config.mirror.transport;
        let bus = &self.bus;
        Arc::clone(
            self.host_transport
                .get_or_insert_with(|| open_transport(kind, bus)),
        )
    }

    fn toggle_broadcasting(&mut self) {
        self.broadcasting = !self.broadcasting;
        if let Some(session) = self.session.as_mut() {
            session.set_broadcasting(self.broadcasting);
        }
        self.message = Some(if self.broadcasting {
            "Broadcasting: viewers can join with kaizen8 --mirror".to_string()
        } else {
            "Broadcasting stopped".to_string()
        });
        tracing::info!(broadcasting = self.broadcasting, "mirror broadcasting toggled");
    }

    fn open_infographic(&mut self) {
        let Some(deck) = self.selected_deck() else {
            return;
        };
        if deck.infographic.is_some() {
            self.detail_deck = Some(deck.id.clone());
            self.view = View::Infographic;
        } else {
            self.message = Some("This deck has no infographic".to_string());
        }
    }

    fn delete_selected(&mut self) {
        let Some(id) = self.selected_deck().map(|d| d.id.clone()) else {
            return;
        };
        if let Some(deck) = self.library.remove(&id) {
            self.message = Some(format!("Deleted {}", deck.title));
        }
        let count = self.visible_decks().len();
        if self.selected_deck >= count {
            self.selected_deck = count.saturating_sub(1);
        }
    }

    fn join_mirror(&mut self) {
        let transport = open_transport(self.config.mirror.transport, &self.bus);
        if !transport.is_available() {
            tracing::warn!("mirror channel unavailable, will retry");
        }
        let viewer = MirrorViewer::attach(&transport);
        self.viewer = Some(ViewerLink {
            viewer,
            transport,
            joined_at: Instant::now(),
        });
        self.view = View::Mirror;
    }

    fn leave_mirror(&mut self) {
        if let Some(link) = self.viewer.take() {
            link.viewer.detach();
            link.transport.close();
        }
        match self.role {
            Role::Viewer => self.should_quit = true,
            Role::Host => self.view = View::DeckList,
        }
    }

    fn pump_viewer(&mut self, now: Instant) {
        let Some(link) = &self.viewer else {
            return;
        };
        link.transport.pump();

        let stale = !link.transport.is_available()
            && self.config.mirror.transport == TransportKind::Socket
            && now.saturating_duration_since(link.joined_at) >= VIEWER_RETRY;
        if stale {
            tracing::debug!("rejoining mirror channel");
            self.join_mirror();
        }
    }

    fn start_generation(&mut self, topic: Option<String>) {
        let sources = std::mem::take(&mut self.staged_sources);
        let request = GenerationRequest::from_sources(sources, topic);
        let kind = request.kind;

        let Some(generator) = self.generator.clone() else {
            self.message = Some(failure_message(kind).to_string());
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::error!("no async runtime for generation");
            self.message = Some(failure_message(kind).to_string());
            return;
        };

        let (tx, rx) = oneshot::channel();
        runtime.spawn(async move {
            let result = generate_deck(generator.as_ref(), &request).await;
            let _ = tx.send(result);
        });
        self.generation = Some(PendingGeneration { kind, receiver: rx });
    }

    fn poll_generation(&mut self) {
        let Some(pending) = self.generation.as_mut() else {
            return;
        };
        let outcome = match pending.receiver.try_recv() {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(oneshot::error::TryRecvError::Empty) => return,
            Err(oneshot::error::TryRecvError::Closed) => Err("generation task ended".to_string()),
        };
        let kind = pending.kind;
        self.generation = None;

        match outcome {
            Ok(deck) => {
                self.message = Some(format!("Created {} ({} cards)", deck.title, deck.cards.len()));
                let summary = deck.infographic.is_some().then(|| deck.id.clone());
                self.library.add(deck);
                self.search.clear();
                self.selected_deck = 0;
                // Document imports open on their summary.
                if summary.is_some() && self.view == View::DeckList {
                    self.detail_deck = summary;
                    self.view = View::Infographic;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "generation failed");
                self.message = Some(failure_message(kind).to_string());
            }
        }
    }
}

/// What the user sees when generating from `kind` fails.
fn failure_message(kind: SourceKind) -> &'static str {
    match kind {
        SourceKind::Images => "Failed to generate cards. Please check your API key and try again.",
        SourceKind::Audio => "Error processing audio. Ensure API Key is set.",
        SourceKind::Documents => "Failed to process files. Please try again.",
    }
}

fn read_sources(input: &str) -> Result<Vec<SourceFile>, String> {
    input
        .split_whitespace()
        .map(|p| SourceFile::read(Path::new(p)).map_err(|e| format!("Cannot read {}: {}", p, e)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::{GenerationError, Generated};
    use crate::models::{Difficulty, Flashcard, InfographicData, InfographicSection};
    use async_trait::async_trait;
    use crossterm::event::KeyModifiers;
    use std::sync::Mutex;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
    }

    fn local_config() -> Config {
        let mut config = Config::default();
        config.study.settle_delay_ms = 0;
        config.study.shuffle = false;
        config.mirror.transport = TransportKind::Local;
        config
    }

    fn host() -> App {
        App::new(local_config(), Role::Host)
    }

    struct FixedGenerator(Mutex<Option<GenerationResult<Generated>>>);

    #[async_trait]
    impl CardGenerator for FixedGenerator {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn generate(&self, _request: &GenerationRequest) -> GenerationResult<Generated> {
            self.0
                .lock()
                .unwrap()
                .take()
                .unwrap_or(Err(GenerationError::Transport("used twice".to_string())))
        }
    }

    #[test]
    fn test_starts_on_deck_list() {
        let app = host();
        assert_eq!(app.view, View::DeckList);
        assert_eq!(app.visible_decks().len(), 2);
        assert!(!app.broadcasting);
    }

    #[test]
    fn test_navigation_clamps() {
        let mut app = host();
        app.handle_key(key(KeyCode::Up));
        assert_eq!(app.selected_deck, 0);
        app.handle_key(key(KeyCode::Down));
        app.handle_key(key(KeyCode::Down));
        assert_eq!(app.selected_deck, 1);
    }

    #[test]
    fn test_search_filters_live() {
        let mut app = host();
        app.handle_key(key(KeyCode::Char('/')));
        type_text(&mut app, "travel");
        assert_eq!(app.visible_decks().len(), 1);
        app.handle_key(key(KeyCode::Enter));
        assert!(!app.editing);
        assert_eq!(app.search, "travel");
        assert_eq!(app.selected_deck().map(|d| d.title.as_str()), Some("Japanese Phrases"));

        app.handle_key(key(KeyCode::Char('/')));
        app.handle_key(key(KeyCode::Esc));
        assert!(app.search.is_empty());
        assert_eq!(app.visible_decks().len(), 2);
    }

    #[test]
    fn test_study_to_completion() {
        let mut app = host();
        app.handle_key(key(KeyCode::Down));
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.view, View::Study);

        app.handle_key(key(KeyCode::Char(' ')));
        assert!(app.session.as_ref().unwrap().queue().is_flipped());

        app.handle_key(key(KeyCode::Left));
        app.handle_key(key(KeyCode::Right));
        app.handle_key(key(KeyCode::Right));
        assert_eq!(app.view, View::Complete);
        assert!(app.session.is_none());
        let finished = app.finished.clone().unwrap();
        assert_eq!(finished.deck_title, "Japanese Phrases");
        assert_eq!(finished.stats, SessionStats { correct: 2, incorrect: 1 });

        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.view, View::DeckList);
    }

    #[test]
    fn test_settle_delay_runs_on_tick() {
        let mut config = local_config();
        config.study.settle_delay_ms = 200;
        let mut app = App::new(config, Role::Host);
        app.handle_key(key(KeyCode::Down));
        app.handle_key(key(KeyCode::Enter));

        app.handle_key(key(KeyCode::Right));
        assert_eq!(app.session.as_ref().unwrap().stats().correct, 0);
        app.tick(Instant::now() + Duration::from_secs(1));
        assert_eq!(app.session.as_ref().unwrap().stats().correct, 1);
    }

    #[test]
    fn test_quit_session_early() {
        let mut app = host();
        app.handle_key(key(KeyCode::Enter));
        app.handle_key(key(KeyCode::Esc));
        assert_eq!(app.view, View::DeckList);
        assert!(app.session.is_none());
        assert!(app.finished.is_none());
    }

    #[test]
    fn test_broadcast_reaches_local_viewer() {
        let mut app = host();
        let viewer_end = app.mirror_bus().open(crate::mirror::MIRROR_CHANNEL_NAME);
        let viewer = MirrorViewer::attach(&viewer_end);

        app.handle_key(key(KeyCode::Char('b')));
        assert!(app.broadcasting);
        app.handle_key(key(KeyCode::Down));
        app.handle_key(key(KeyCode::Enter));
        viewer_end.pump();
        match viewer.state() {
            ViewerState::Live(s) => assert_eq!(s.deck_title, "Japanese Phrases"),
            ViewerState::Waiting => panic!("viewer should be live"),
        }

        app.handle_key(key(KeyCode::Char('b')));
        viewer_end.pump();
        assert!(!viewer.is_live());
    }

    #[test]
    fn test_host_viewer_in_one_process() {
        let mut app = host();
        app.broadcasting = true;
        app.handle_key(key(KeyCode::Char('v')));
        assert_eq!(app.view, View::Mirror);
        assert_eq!(app.viewer_state(), ViewerState::Waiting);

        app.handle_key(key(KeyCode::Esc));
        assert_eq!(app.view, View::DeckList);
        assert!(!app.should_quit);
    }

    #[test]
    fn test_viewer_role_quits_from_mirror() {
        let mut app = App::new(local_config(), Role::Viewer);
        assert_eq!(app.view, View::Mirror);
        app.handle_key(key(KeyCode::Char('q')));
        assert!(app.should_quit);
    }

    #[test]
    fn test_delete_deck() {
        let mut app = host();
        app.handle_key(key(KeyCode::Char('d')));
        assert_eq!(app.library.len(), 1);
        assert!(app.message.as_deref().unwrap().contains("Intro to React"));
    }

    #[test]
    fn test_empty_deck_completes_immediately() {
        let mut app = host();
        app.library.add(Deck::new("Empty"));
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.view, View::Complete);
        assert_eq!(app.finished.as_ref().map(|f| f.stats.answered()), Some(0));
    }

    #[test]
    fn test_generation_without_generator_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("talk.mp3");
        std::fs::write(&path, b"ID3").unwrap();

        let mut app = host();
        app.handle_key(key(KeyCode::Char('g')));
        type_text(&mut app, path.to_str().unwrap());
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(
            app.message.as_deref(),
            Some("Error processing audio. Ensure API Key is set.")
        );
        assert_eq!(app.library.len(), 2);
    }

    #[test]
    fn test_unreadable_source_is_reported() {
        let mut app = host();
        app.handle_key(key(KeyCode::Char('g')));
        type_text(&mut app, "/definitely/not/here.png");
        app.handle_key(key(KeyCode::Enter));
        assert!(app.message.as_deref().unwrap().starts_with("Cannot read"));
        assert!(!app.is_generating());
    }

    #[tokio::test]
    async fn test_generated_deck_lands_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leaf.png");
        std::fs::write(&path, [0u8; 4]).unwrap();

        let generated = Generated {
            flashcards: vec![Flashcard::new("g1", "Stomata?", "Leaf pores", "Bio", Difficulty::Easy)],
            ..Generated::default()
        };
        let generator = Arc::new(FixedGenerator(Mutex::new(Some(Ok(generated)))));
        let mut app = host().with_generator(generator);

        app.handle_key(key(KeyCode::Char('g')));
        type_text(&mut app, path.to_str().unwrap());
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.input_field, InputField::Topic);
        assert_eq!(app.staged_sources().len(), 1);
        type_text(&mut app, "Plants");
        app.handle_key(key(KeyCode::Enter));
        assert!(app.is_generating());

        for _ in 0..100 {
            app.tick(Instant::now());
            if !app.is_generating() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!app.is_generating());
        assert_eq!(app.visible_decks()[0].title, "Plants");
        assert_eq!(app.library.len(), 3);
    }

    #[tokio::test]
    async fn test_failed_generation_adds_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.pdf");
        std::fs::write(&path, b"%PDF").unwrap();

        let failure = Err(GenerationError::MalformedResponse("truncated".to_string()));
        let generator = Arc::new(FixedGenerator(Mutex::new(Some(failure))));
        let mut app = host().with_generator(generator);

        app.handle_key(key(KeyCode::Char('g')));
        type_text(&mut app, path.to_str().unwrap());
        app.handle_key(key(KeyCode::Enter));

        for _ in 0..100 {
            app.tick(Instant::now());
            if !app.is_generating() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(app.message.as_deref(), Some("Failed to process files. Please try again."));
        assert_eq!(app.library.len(), 2);
    }

    fn summary_deck() -> Deck {
        let mut deck = Deck::new("Cell Biology")
            .with_id("doc")
            .with_card(Flashcard::new("d1", "Organelle for energy?", "Mitochondria", "Cells", Difficulty::Medium));
        deck.infographic = Some(InfographicData {
            title: "Cell Biology".to_string(),
            summary: "How cells work.".to_string(),
            sections: vec![InfographicSection {
                title: "Energy".to_string(),
                content: "Mitochondria make ATP.".to_string(),
                color: "green".to_string(),
            }],
        });
        deck
    }

    #[test]
    fn test_blank_topic_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leaf.png");
        std::fs::write(&path, [0u8; 4]).unwrap();

        let generator = Arc::new(FixedGenerator(Mutex::new(None)));
        let mut app = host().with_generator(generator);
        app.handle_key(key(KeyCode::Char('g')));
        type_text(&mut app, path.to_str().unwrap());
        app.handle_key(key(KeyCode::Enter));
        type_text(&mut app, "   ");
        app.handle_key(key(KeyCode::Enter));

        assert_eq!(app.message.as_deref(), Some(MISSING_TOPIC));
        assert!(!app.is_generating());
        assert!(app.editing);
        assert_eq!(app.input_field, InputField::Topic);
        assert_eq!(app.staged_sources().len(), 1);
        assert_eq!(app.library.len(), 2);
    }

    #[test]
    fn test_infographic_view_opens_and_studies() {
        let mut app = host();
        app.handle_key(key(KeyCode::Char('i')));
        assert_eq!(app.view, View::DeckList);
        assert_eq!(app.message.as_deref(), Some("This deck has no infographic"));

        app.library.add(summary_deck());
        app.handle_key(key(KeyCode::Char('i')));
        assert_eq!(app.view, View::Infographic);
        assert_eq!(app.detail_deck().map(|d| d.title.as_str()), Some("Cell Biology"));

        app.handle_key(key(KeyCode::Esc));
        assert_eq!(app.view, View::DeckList);
        assert!(app.detail_deck().is_none());

        app.handle_key(key(KeyCode::Char('i')));
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.view, View::Study);
        assert_eq!(app.session.as_ref().map(|s| s.deck().title.as_str()), Some("Cell Biology"));
    }

    #[tokio::test]
    async fn test_document_import_opens_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cells.pdf");
        std::fs::write(&path, b"%PDF").unwrap();

        let source = summary_deck();
        let generated = Generated {
            flashcards: source.cards.clone(),
            infographic: source.infographic.clone(),
            ..Generated::default()
        };
        let generator = Arc::new(FixedGenerator(Mutex::new(Some(Ok(generated)))));
        let mut app = host().with_generator(generator);

        app.handle_key(key(KeyCode::Char('g')));
        type_text(&mut app, path.to_str().unwrap());
        app.handle_key(key(KeyCode::Enter));

        for _ in 0..100 {
            app.tick(Instant::now());
            if !app.is_generating() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(app.view, View::Infographic);
        let deck = app.detail_deck().unwrap();
        assert_eq!(deck.title, "Cell Biology");
        assert_eq!(deck.infographic.as_ref().map(|i| i.sections.len()), Some(1));
    }

    #[test]
    fn test_help_swallows_next_key() {
        let mut app = host();
        app.handle_key(key(KeyCode::Char('?')));
        assert!(app.show_help);
        app.handle_key(key(KeyCode::Char('q')));
        assert!(!app.show_help);
        assert!(!app.should_quit);
    }
}
