use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};
use tiggy_core::render::thread_meta;
use tiggy_core::{render_messages, NoticeKind, Origin};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::app::{App, LoginView, Screen};

pub fn draw(f: &mut Frame, app: &App) {
    match &app.screen {
        Screen::Login(view) => draw_login(f, app, view),
        Screen::Chat => draw_chat(f, app),
    }
}

fn draw_chat(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(10),   // Sidebar + messages
            Constraint::Length(5), // Input
            Constraint::Length(1), // Status bar
        ])
        .split(f.size());

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(32), Constraint::Min(20)])
        .split(chunks[1]);

    draw_header(f, app, chunks[0]);
    draw_sidebar(f, app, body[0]);
    draw_messages(f, app, body[1]);
    draw_input(f, app, chunks[2]);
    draw_status_bar(f, app, chunks[3]);
}

fn draw_header(f: &mut Frame, app: &App, area: Rect) {
    let who = app
        .controller
        .identity()
        .map(|i| i.to_string())
        .unwrap_or_default();

    let mut spans = vec![
        Span::styled(
            format!(" {} ", app.assistant_name),
            Style::default()
                .add_modifier(Modifier::BOLD)
                .fg(Color::LightYellow),
        ),
        Span::styled("  |  ", Style::default().fg(Color::Gray)),
        Span::styled(who, Style::default().fg(Color::Cyan)),
    ];

    if let Some(notice) = app.controller.state().notice() {
        let color = match notice.kind {
            NoticeKind::Info => Color::Green,
            NoticeKind::Error => Color::Red,
        };
        spans.push(Span::styled("  |  ", Style::default().fg(Color::Gray)));
        spans.push(Span::styled(notice.text.clone(), Style::default().fg(color)));
        if notice.retryable {
            spans.push(Span::styled(
                "  (press Enter to retry)",
                Style::default().fg(Color::Gray),
            ));
        }
    }

    let header = Paragraph::new(Line::from(spans))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow)),
        )
        .alignment(Alignment::Left);

    f.render_widget(header, area);
}

/// Cut `text` to `width` terminal columns, marking the cut with `…`
fn truncate_to_width(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    let mut used = 0;
    let mut out = String::new();
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > width.saturating_sub(1) {
            out.push('…');
            return out;
        }
        used += w;
        out.push(c);
    }
    out
}

fn draw_sidebar(f: &mut Frame, app: &App, area: Rect) {
    let state = app.controller.state();
    let width = area.width.saturating_sub(4) as usize;

    let items: Vec<ListItem> = state
        .threads()
        .iter()
        .map(|thread| {
            ListItem::new(vec![
                Line::from(Span::styled(
                    truncate_to_width(&thread.title, width),
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(Span::styled(
                    thread_meta(thread),
                    Style::default().fg(Color::DarkGray),
                )),
            ])
        })
        .collect();

    let selected = state
        .active_id()
        .and_then(|id| state.threads().iter().position(|t| &t.id == id));
    let mut list_state = ListState::default().with_selected(selected);

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Chats")
                .border_style(Style::default().fg(Color::Yellow)),
        )
        .highlight_style(Style::default().fg(Color::Black).bg(Color::LightYellow))
        .highlight_symbol("> ");

    f.render_stateful_widget(list, area, &mut list_state);
}

fn draw_messages(f: &mut Frame, app: &App, area: Rect) {
    let state = app.controller.state();
    let Some(thread) = state.active_thread() else {
        f.render_widget(
            Block::default().borders(Borders::ALL).title("Messages"),
            area,
        );
        return;
    };

    let mut lines: Vec<Line> = Vec::new();

    if thread.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("Hi! I'm {}. Ask me anything about campus life.", app.assistant_name),
            Style::default().add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(""));
        for (idx, question) in app.suggestions.iter().take(4).enumerate() {
            lines.push(Line::from(vec![
                Span::styled(format!("  [{}] ", idx + 1), Style::default().fg(Color::Yellow)),
                Span::raw(question.clone()),
            ]));
        }
    }

    for message in render_messages(thread.messages()) {
        let style = match message.origin {
            Origin::User => Style::default().fg(Color::Cyan),
            Origin::Assistant => Style::default().fg(Color::Green),
        };
        lines.push(Line::from(vec![
            Span::styled(
                format!("[{}] ", message.time_label),
                Style::default().fg(Color::DarkGray),
            ),
            Span::styled(
                format!("{}:", message.sender),
                style.add_modifier(Modifier::BOLD),
            ),
        ]));
        for text_line in message.text.lines() {
            lines.push(Line::from(Span::styled(format!("  {}", text_line), style)));
        }
        lines.push(Line::from(""));
    }

    let thinking = state
        .composer()
        .pending()
        .map_or(false, |p| p.thread_id == thread.id);
    if thinking {
        lines.push(Line::from(Span::styled(
            format!("{} is thinking...", app.assistant_name),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::ITALIC),
        )));
    }

    // Keep the newest lines in view; scroll_offset counts lines up from the bottom
    let visible = area.height.saturating_sub(2) as usize;
    let bottom = lines.len().saturating_sub(app.scroll_offset);
    let top = bottom.saturating_sub(visible);
    let shown: Vec<Line> = lines.into_iter().skip(top).take(bottom - top).collect();

    let messages = Paragraph::new(shown)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(thread.title.clone())
                .border_style(Style::default().fg(Color::Yellow)),
        )
        .wrap(Wrap { trim: false });

    f.render_widget(messages, area);
}

fn draw_input(f: &mut Frame, app: &App, area: Rect) {
    let composer = app.controller.state().composer();

    let lines: Vec<Line> = if composer.input().is_empty() {
        vec![Line::from(vec![
            Span::styled("> ", Style::default().fg(Color::Green)),
            Span::styled(
                "Ask Tiggy anything... (Enter to send, Shift+Enter for a new line)",
                Style::default()
                    .fg(Color::Gray)
                    .add_modifier(Modifier::ITALIC),
            ),
        ])]
    } else {
        let mut lines: Vec<Line> = composer
            .input()
            .split('\n')
            .map(|l| Line::from(vec![Span::raw("  "), Span::raw(l.to_string())]))
            .collect();
        if let Some(last) = lines.last_mut() {
            last.spans.push(Span::styled("▌", Style::default().fg(Color::Green)));
        }
        lines
    };

    let input = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Message")
                .border_style(Style::default().fg(Color::Yellow)),
        )
        .wrap(Wrap { trim: false });

    f.render_widget(input, area);
}

fn draw_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let state = app.controller.state();
    let mut help = String::from("[Enter] Send  [Ctrl+N] New  [Tab] Next chat");
    if state.can_delete() {
        help.push_str("  [Ctrl+X] Delete");
    }
    help.push_str("  [Ctrl+D] Export  [Ctrl+O] Log out  [Ctrl+C] Quit");

    let status = format!(" Chats: {} | {}", state.threads().len(), help);
    let status_bar = Paragraph::new(status)
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Gray).add_modifier(Modifier::REVERSED));

    f.render_widget(status_bar, area);
}

fn draw_login(f: &mut Frame, app: &App, view: &LoginView) {
    let mut lines = vec![
        Line::from(Span::styled(
            format!("Welcome to {}", app.assistant_name),
            Style::default()
                .add_modifier(Modifier::BOLD)
                .fg(Color::LightYellow),
        )),
        Line::from(""),
    ];

    match &view.prompt {
        Some(prompt) => {
            for line in prompt.instructions() {
                lines.push(Line::from(line));
            }
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                "Waiting for authorization...",
                Style::default().fg(Color::Yellow),
            )));
        }
        None if app.is_logging_in() => {
            lines.push(Line::from("Signing in..."));
        }
        None => {
            lines.push(Line::from("Press Enter to sign in, Esc to quit."));
        }
    }

    if let Some(error) = &view.error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("Sign-in failed: {}", error),
            Style::default().fg(Color::Red),
        )));
        lines.push(Line::from("Press Enter to try again."));
    }

    let login = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Sign in")
                .border_style(Style::default().fg(Color::Yellow)),
        )
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });

    f.render_widget(login, f.size());
}
