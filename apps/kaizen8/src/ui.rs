//! UI rendering for kaizen8.

use crate::app::{App, InputField, View};
use crate::mirror::{MirrorSnapshot, ViewerState};
use crate::models::{Deck, Difficulty, Flashcard, InfographicData};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, Paragraph, Wrap},
    Frame,
};

pub fn draw(f: &mut Frame, app: &App) {
    match app.view {
        View::DeckList => draw_deck_list(f, app),
        View::Study => draw_study(f, app),
        View::Complete => draw_complete(f, app),
        View::Mirror => draw_mirror(f, app),
        View::Infographic => draw_infographic(f, app),
    }

    if app.show_help {
        draw_help(f);
    }

    if app.editing {
        draw_input(f, app);
    }

    if let Some(msg) = &app.message {
        draw_message(f, msg);
    }
}

fn difficulty_color(difficulty: Difficulty) -> Color {
    match difficulty {
        Difficulty::Easy => Color::Green,
        Difficulty::Medium => Color::Yellow,
        Difficulty::Hard => Color::Red,
    }
}

fn draw_deck_list(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(3)])
        .split(f.area());

    let mut title = vec![Span::styled("Kaizen8", Style::default().add_modifier(Modifier::BOLD))];
    if app.broadcasting {
        title.push(Span::styled("  [LIVE]", Style::default().fg(Color::Green)));
    }
    if app.is_generating() {
        title.push(Span::styled("  Generating deck...", Style::default().fg(Color::Cyan)));
    }
    let header = Paragraph::new(Line::from(title))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(header, chunks[0]);

    let decks = app.visible_decks();
    let list_title = if app.search.is_empty() {
        format!(" Decks ({}) ", app.library.len())
    } else {
        format!(" Decks matching \"{}\" ", app.search)
    };

    if decks.is_empty() {
        let text = if app.library.is_empty() {
            "No decks yet. Press 'g' to generate one."
        } else {
            "No decks match your search."
        };
        let msg = Paragraph::new(text)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title(list_title));
        f.render_widget(msg, chunks[1]);
    } else {
        let items: Vec<ListItem> = decks
            .iter()
            .enumerate()
            .map(|(i, deck)| deck_item(deck, i == app.selected_deck))
            .collect();

        let list = List::new(items).block(Block::default().borders(Borders::ALL).title(list_title));
        f.render_widget(list, chunks[1]);
    }

    let footer = Paragraph::new("j/k:Move  Enter:Study  /:Search  g:Generate  i:Info  d:Delete  b:Broadcast  v:Mirror  ?:Help  q:Quit")
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, chunks[2]);
}

fn deck_item(deck: &Deck, selected: bool) -> ListItem<'_> {
    let style = if selected {
        Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };

    let mut spans = vec![
        Span::styled(deck.title.as_str(), style),
        Span::raw(format!(" ({} cards)", deck.cards.len())),
    ];
    for tag in &deck.tags {
        spans.push(Span::styled(format!(" #{}", tag), Style::default().fg(Color::Blue)));
    }

    let mut lines = vec![Line::from(spans)];
    if !deck.description.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("  {}", deck.description),
            Style::default().fg(Color::DarkGray),
        )));
    }

    ListItem::new(lines).style(if selected {
        Style::default().bg(Color::DarkGray)
    } else {
        Style::default()
    })
}

fn draw_study(f: &mut Frame, app: &App) {
    let Some(session) = &app.session else {
        return;
    };
    let queue = session.queue();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Progress
            Constraint::Min(0),    // Card
            Constraint::Length(3), // Controls
        ])
        .split(f.area());

    let mut title = format!(
        " {} | {} left, {} mastered ",
        session.deck().title,
        queue.queue().len(),
        queue.completed().len()
    );
    if session.is_broadcasting() {
        title.push_str("[LIVE] ");
    }
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .gauge_style(Style::default().fg(Color::Green))
        .percent(queue.progress() as u16);
    f.render_widget(gauge, chunks[0]);

    if let Some(card) = queue.current_card() {
        draw_card(f, chunks[1], card, queue.is_flipped(), true);
    }

    let controls = if queue.is_transitioning() {
        Line::from(Span::styled("Reviewing…", Style::default().fg(Color::DarkGray)))
    } else {
        answer_controls()
    };
    let controls = Paragraph::new(controls)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(controls, chunks[2]);
}

fn answer_controls() -> Line<'static> {
    Line::from(vec![
        Span::styled("[Space]", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" Flip   "),
        Span::styled("[1/←]", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
        Span::raw(" Review   "),
        Span::styled("[2/→]", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
        Span::raw(" Mastered   "),
        Span::styled("[b]", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" Broadcast   "),
        Span::styled("[q]", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" Exit"),
    ])
}

/// One face of a card. The back carries the deep dive link when asked.
fn draw_card(f: &mut Frame, area: Rect, card: &Flashcard, flipped: bool, show_link: bool) {
    let badge = Line::from(vec![
        Span::styled(
            format!(" {} ", card.category.to_uppercase()),
            Style::default().fg(Color::Black).bg(difficulty_color(card.difficulty)),
        ),
        Span::styled(
            format!(" {}", card.difficulty.name()),
            Style::default().fg(difficulty_color(card.difficulty)),
        ),
    ]);

    let (face, text, border) = if flipped {
        (" Answer ", card.back.as_str(), Color::Magenta)
    } else {
        (" Question ", card.front.as_str(), Color::White)
    };

    let mut lines = vec![badge, Line::default()];
    lines.push(Line::from(Span::styled(text, Style::default().add_modifier(Modifier::BOLD))));
    if flipped && show_link {
        if let Some(url) = &card.deep_dive_url {
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(
                format!("Deep Dive: {}", url),
                Style::default().fg(Color::Cyan),
            )));
        }
    } else if !flipped {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled("Space to flip", Style::default().fg(Color::DarkGray))));
    }

    let paragraph = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border))
                .title(face),
        );
    f.render_widget(paragraph, area);
}

fn draw_complete(f: &mut Frame, app: &App) {
    let area = centered_rect(60, 50, f.area());
    let Some(finished) = &app.finished else {
        return;
    };

    let text = vec![
        Line::from(Span::styled(
            "Session Complete!",
            Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
        )),
        Line::from(finished.deck_title.as_str()),
        Line::default(),
        Line::from(vec![
            Span::styled(format!("{}", finished.stats.correct), Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
            Span::raw(" Mastered    "),
            Span::styled(format!("{}", finished.stats.incorrect), Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
            Span::raw(" Reviewing"),
        ]),
        Line::from(Span::styled(
            format!("{} answers", finished.stats.answered()),
            Style::default().fg(Color::DarkGray),
        )),
        Line::default(),
        Line::from(Span::styled("Enter: Back to Decks", Style::default().fg(Color::DarkGray))),
    ];

    let popup = Paragraph::new(text)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(popup, area);
}

fn draw_mirror(f: &mut Frame, app: &App) {
    match app.viewer_state() {
        ViewerState::Waiting => draw_waiting(f),
        ViewerState::Live(snapshot) => draw_live(f, &snapshot),
    }
}

fn draw_waiting(f: &mut Frame) {
    let area = centered_rect(60, 40, f.area());
    let text = vec![
        Line::from(Span::styled("Waiting for Host...", Style::default().add_modifier(Modifier::BOLD))),
        Line::default(),
        Line::from("Start a study session on the host to see it appear here."),
        Line::default(),
        Line::from(Span::styled("q: Exit Mirror Mode", Style::default().fg(Color::DarkGray))),
    ];
    let popup = Paragraph::new(text)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title(" Mirror "));
    f.render_widget(popup, area);
}

fn draw_live(f: &mut Frame, snapshot: &MirrorSnapshot) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(1)])
        .split(f.area());

    let header = Line::from(vec![
        Span::styled(snapshot.deck_title.as_str(), Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(format!("   Card {} / {}   ", snapshot.position(), snapshot.total_cards)),
        Span::styled("LIVE", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
    ]);
    let header = Paragraph::new(header)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(header, chunks[0]);

    draw_card(f, chunks[1], &snapshot.current_card, snapshot.is_flipped, false);

    let footer = Paragraph::new("Mirrored Session • Kaizen8")
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    f.render_widget(footer, chunks[2]);
}

/// Accent colour for an infographic section.
fn section_color(name: &str) -> Color {
    match name.trim().to_lowercase().as_str() {
        "blue" => Color::Blue,
        "green" => Color::Green,
        "purple" => Color::Magenta,
        "orange" => Color::Rgb(255, 165, 0),
        "red" => Color::Red,
        _ => Color::Gray,
    }
}

fn draw_infographic(f: &mut Frame, app: &App) {
    let Some(deck) = app.detail_deck() else {
        return;
    };
    let Some(info) = &deck.infographic else {
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(0), Constraint::Length(3)])
        .split(f.area());

    let header = Paragraph::new(vec![
        Line::from(Span::styled(info.title.as_str(), Style::default().add_modifier(Modifier::BOLD))),
        Line::from(Span::styled(info.summary.as_str(), Style::default().fg(Color::DarkGray))),
    ])
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .block(Block::default().borders(Borders::ALL).title(" Infographic "));
    f.render_widget(header, chunks[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(chunks[1]);

    let sections = Paragraph::new(section_lines(info))
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(" Key Points "));
    f.render_widget(sections, body[0]);

    let cards: Vec<ListItem> = deck
        .cards
        .iter()
        .map(|card| ListItem::new(format!("• {}", card.front)))
        .collect();
    let preview = List::new(cards).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" Generated Flashcards ({}) ", deck.cards.len())),
    );
    f.render_widget(preview, body[1]);

    let footer = Paragraph::new("Enter:Study this deck  q/Esc:Back to Decks")
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, chunks[2]);
}

fn section_lines(info: &InfographicData) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    for (i, section) in info.sections.iter().enumerate() {
        let color = section_color(&section.color);
        lines.push(Line::from(vec![
            Span::styled("▌ ", Style::default().fg(color)),
            Span::styled(
                format!("{}. {}", i + 1, section.title),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ),
        ]));
        lines.push(Line::from(vec![
            Span::styled("▌ ", Style::default().fg(color)),
            Span::raw(section.content.as_str()),
        ]));
        lines.push(Line::default());
    }
    lines
}

fn draw_help(f: &mut Frame) {
    let area = centered_rect(60, 80, f.area());
    f.render_widget(Clear, area);

    let help = r#"
Kaizen8 Keybindings

Deck List:
  j/k, Up/Down    Navigate decks
  Enter, Space    Start study session
  /               Search decks
  g               Generate deck from files
  i               Show deck infographic
  d               Delete deck
  b               Toggle broadcasting
  v               Open mirror viewer
  q               Quit

Study Session:
  Space, Enter    Flip card
  1, r, Left      Review again
  2, m, Right     Mastered
  b               Toggle broadcasting
  q, Esc          End session

General:
  ?               Show this help

Press any key to close
"#;

    let popup = Paragraph::new(help)
        .block(Block::default().borders(Borders::ALL).title(" Help "))
        .wrap(Wrap { trim: false });
    f.render_widget(popup, area);
}

fn draw_input(f: &mut Frame, app: &App) {
    let area = centered_rect(60, 15, f.area());
    f.render_widget(Clear, area);

    let title = match app.input_field {
        InputField::Search => "Search decks".to_string(),
        InputField::SourcePaths => "Files to generate from (space separated)".to_string(),
        InputField::Topic => format!("Topic for {} image(s)", app.staged_sources().len()),
        InputField::None => String::new(),
    };

    let input = Paragraph::new(app.input_buffer.as_str())
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL).title(format!(" {} ", title)));
    f.render_widget(input, area);

    f.set_cursor_position((cursor_x(area, &app.input_buffer), area.y + 1));
}

/// Column just past the typed text, kept inside the box borders.
fn cursor_x(area: Rect, text: &str) -> u16 {
    let typed = u16::try_from(Span::raw(text).width()).unwrap_or(u16::MAX);
    let last = area.width.saturating_sub(3);
    area.x + 1 + typed.min(last)
}

fn draw_message(f: &mut Frame, msg: &str) {
    let area = Rect::new(
        f.area().x + 2,
        f.area().height.saturating_sub(5),
        f.area().width.saturating_sub(4),
        3,
    );
    f.render_widget(Clear, area);

    let message = Paragraph::new(msg)
        .style(Style::default().fg(Color::Cyan))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(message, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
