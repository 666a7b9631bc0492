mod app;
mod config;
mod generate;
mod library;
mod mirror;
mod models;
mod queue;
mod session;
mod shuffle;
mod ui;

use anyhow::{bail, Context, Result};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use app::{App, Role};
use config::Config;
use generate::GeminiGenerator;

const USAGE: &str = "usage: kaizen8 [--mirror] [--config <path>]";

#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    mirror: bool,
    config: Option<PathBuf>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--mirror" => parsed.mirror = true,
            "--config" => {
                let path = args.next().context("--config needs a path")?;
                parsed.config = Some(PathBuf::from(path));
            }
            other => bail!("unexpected argument '{}'\n{}", other, USAGE),
        }
    }
    Ok(parsed)
}

fn setup_logging(log_path: Option<&Path>) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // The terminal belongs to the UI, so prefer a file.
    let file = log_path.and_then(|path| {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok()?;
        }
        std::fs::OpenOptions::new().create(true).append(true).open(path).ok()
    });

    if let Some(file) = file {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(file)
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;

    let config = match &args.config {
        Some(path) => Config::load_from(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::load(),
    };
    setup_logging(Config::log_path().as_deref());

    if args.config.is_none() && Config::config_path().is_some_and(|p| !p.exists()) {
        // First run: leave an editable copy of the defaults.
        match config.save() {
            Ok(()) => tracing::info!("wrote default config"),
            Err(e) => tracing::warn!(error = %e, "could not write default config"),
        }
    }

    let role = if args.mirror { Role::Viewer } else { Role::Host };
    tracing::info!(?role, transport = ?config.mirror.transport, "starting kaizen8");

    let mut app = App::new(config, role);
    if role == Role::Host {
        match GeminiGenerator::from_config(&app.config.generation) {
            Ok(generator) => app = app.with_generator(Arc::new(generator)),
            Err(e) => tracing::warn!(error = %e, "deck generation disabled"),
        }
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    // Dropping the app closes any live session, which tells viewers.
    drop(app);
    tracing::info!("kaizen8 exited");
    result
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    let tick_rate = Duration::from_millis(50);

    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(tick_rate)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key);
                }
            }
        }

        app.tick(Instant::now());

        if app.should_quit {
            return Ok(());
        }
    }
}
