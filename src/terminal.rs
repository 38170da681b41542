//! Terminal front end — ratatui drawing and crossterm key input.
//!
//! DESIGN
//! ======
//! [`TerminalRenderer`] keeps a [`ChatView`] and redraws it on `present`.
//! It is generic over the ratatui backend so drawing can be exercised with
//! `TestBackend`.
//!
//! Screen layout:
//! - chat log (titled with the room) beside the roster panel
//! - one line for the typing indicator
//! - the input box, titled "disconnected" once the connection is gone
//! - a centered notice when the connection closes
//!
//! Keys are read on a blocking thread, translated to [`InputEvent`]s, and
//! forwarded to the event loop over a channel.

#[cfg(test)]
#[path = "terminal_test.rs"]
mod tests;

use std::thread::JoinHandle;
use std::time::Duration;

use ratatui::Frame;
use ratatui::Terminal;
use ratatui::backend::Backend;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::layout::{Constraint, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Clear, List, Paragraph, Wrap};
use tokio::sync::mpsc;
use tracing::debug;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::protocol::Message;
use crate::render::{ChatView, LogEntry, Renderer};
use crate::session::InputEvent;

const ROSTER_WIDTH: u16 = 22;
const NOTICE_WIDTH: u16 = 60;
const KEY_POLL_INTERVAL: Duration = Duration::from_millis(100);

// =============================================================================
// RENDERER
// =============================================================================

pub struct TerminalRenderer<B: Backend> {
    terminal: Terminal<B>,
    view: ChatView,
}

impl<B: Backend> TerminalRenderer<B> {
    pub fn new(terminal: Terminal<B>, view: ChatView) -> Self {
        Self { terminal, view }
    }

    #[must_use]
    pub fn view(&self) -> &ChatView {
        &self.view
    }

    #[must_use]
    pub fn terminal(&self) -> &Terminal<B> {
        &self.terminal
    }
}

impl<B: Backend> Renderer for TerminalRenderer<B> {
    fn render_message(&mut self, message: &Message) {
        self.view.render_message(message);
    }

    fn render_roster(&mut self, users: &[String]) {
        self.view.render_roster(users);
    }

    fn render_typing_indicator(&mut self, user: Option<&str>) {
        self.view.render_typing_indicator(user);
    }

    fn render_input(&mut self, text: &str) {
        self.view.render_input(text);
    }

    fn render_closed(&mut self, notice: &str) {
        self.view.render_closed(notice);
    }

    fn dismiss_notice(&mut self) {
        self.view.dismiss_notice();
    }

    fn scroll(&mut self, lines: isize) {
        self.view.scroll(lines);
    }

    fn present(&mut self) -> std::io::Result<()> {
        let view = &mut self.view;
        self.terminal.draw(|frame| draw(frame, view))?;
        Ok(())
    }
}

// =============================================================================
// DRAWING
// =============================================================================

/// Draw the whole chat screen.
///
/// Laying out the log fixes how far it can scroll back, so the view's
/// scroll limit is updated as a side effect.
pub fn draw(frame: &mut Frame, view: &mut ChatView) {
    let [main_area, typing_area, input_area] =
        Layout::vertical([Constraint::Min(3), Constraint::Length(1), Constraint::Length(3)]).areas(frame.area());
    let [log_area, roster_area] =
        Layout::horizontal([Constraint::Min(10), Constraint::Length(ROSTER_WIDTH)]).areas(main_area);

    draw_log(frame, view, log_area);
    draw_roster(frame, view, roster_area);

    let typing = Paragraph::new(view.typing().unwrap_or_default())
        .style(Style::new().fg(Color::DarkGray).add_modifier(Modifier::ITALIC));
    frame.render_widget(typing, typing_area);

    draw_input(frame, view, input_area);

    if let Some(notice) = view.notice() {
        draw_notice(frame, notice);
    }
}

fn draw_log(frame: &mut Frame, view: &mut ChatView, area: Rect) {
    let block = Block::bordered().title(format!(" #{} ", view.room()));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let width = usize::from(inner.width);
    let height = usize::from(inner.height);
    let lines: Vec<Line<'static>> = view
        .log()
        .iter()
        .flat_map(|entry| wrap_spans(entry_spans(entry), width))
        .collect();

    view.set_scroll_limit(lines.len().saturating_sub(height));
    let end = lines.len() - view.scroll_back();
    let start = end.saturating_sub(height);
    let visible = lines[start..end].to_vec();

    frame.render_widget(Paragraph::new(visible), inner);
}

fn draw_roster(frame: &mut Frame, view: &ChatView, area: Rect) {
    let title = format!(" Online ({}) ", view.roster().len());
    let items = view.roster().iter().map(|user| {
        if user == view.username() {
            Line::from(Span::styled(user.clone(), Style::new().add_modifier(Modifier::BOLD)))
        } else {
            Line::from(user.clone())
        }
    });
    frame.render_widget(List::new(items).block(Block::bordered().title(title)), area);
}

fn draw_input(frame: &mut Frame, view: &ChatView, area: Rect) {
    if !view.input_enabled() {
        let block = Block::bordered().title(" disconnected ").style(Style::new().fg(Color::DarkGray));
        frame.render_widget(Paragraph::new(view.input()).block(block), area);
        return;
    }

    let block = Block::bordered().title(format!(" {} ", view.username()));
    let inner = block.inner(area);
    // Keep the caret visible by showing the tail of long input.
    let shown = tail_fitting(view.input(), usize::from(inner.width.saturating_sub(1)));
    let caret = u16::try_from(shown.width()).unwrap_or(inner.width);

    frame.render_widget(Paragraph::new(shown).block(block), area);
    frame.set_cursor_position(Position::new(inner.x + caret, inner.y));
}

fn draw_notice(frame: &mut Frame, notice: &str) {
    let area = frame.area();
    let width = NOTICE_WIDTH.min(area.width);
    let height = 5.min(area.height);
    let popup = Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    };
    let text = vec![
        Line::from(notice.to_owned()),
        Line::from(Span::styled(
            "Press any key to dismiss, Esc to quit.",
            Style::new().fg(Color::DarkGray),
        )),
    ];
    let block = Block::bordered().title(" Notice ").style(Style::new().fg(Color::Yellow));
    frame.render_widget(Clear, popup);
    frame.render_widget(Paragraph::new(text).block(block).wrap(Wrap { trim: true }), popup);
}

/// Longest suffix of `text` that fits in `width` columns.
fn tail_fitting(text: &str, width: usize) -> &str {
    let mut used = 0;
    let mut start = text.len();
    for (i, ch) in text.char_indices().rev() {
        let w = ch.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        start = i;
    }
    &text[start..]
}

/// Server text with control characters (newlines, tabs) flattened to spaces.
fn printable(text: &str) -> String {
    text.chars().map(|c| if c.is_control() { ' ' } else { c }).collect()
}

/// Styled pieces of one log entry.
fn entry_spans(entry: &LogEntry) -> Vec<Span<'static>> {
    let timestamp = Span::styled(format!("[{}] ", printable(entry.timestamp())), Style::new().fg(Color::DarkGray));
    match entry {
        LogEntry::System { content, .. } => vec![
            timestamp,
            Span::styled(printable(content), Style::new().fg(Color::Cyan).add_modifier(Modifier::ITALIC)),
        ],
        LogEntry::User { username, content, .. } => vec![
            timestamp,
            Span::styled(format!("{}: ", printable(username)), Style::new().add_modifier(Modifier::BOLD)),
            Span::raw(printable(content)),
        ],
    }
}

/// Break styled spans into lines at most `width` columns wide.
fn wrap_spans(spans: Vec<Span<'static>>, width: usize) -> Vec<Line<'static>> {
    if width == 0 {
        return Vec::new();
    }

    let mut lines = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    let mut used = 0;
    for span in spans {
        let style = span.style;
        let mut chunk = String::new();
        for ch in span.content.chars() {
            let w = ch.width().unwrap_or(0);
            if used > 0 && used + w > width {
                if !chunk.is_empty() {
                    current.push(Span::styled(std::mem::take(&mut chunk), style));
                }
                lines.push(Line::from(std::mem::take(&mut current)));
                used = 0;
            }
            chunk.push(ch);
            used += w;
        }
        if !chunk.is_empty() {
            current.push(Span::styled(chunk, style));
        }
    }
    lines.push(Line::from(current));
    lines
}

// =============================================================================
// INPUT
// =============================================================================

/// Translate a key press into a session input event.
#[must_use]
pub fn input_event(key: KeyEvent) -> Option<InputEvent> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    // AltGr arrives as Ctrl+Alt on some platforms and composes a printable character.
    let chord = key.modifiers.contains(KeyModifiers::CONTROL) && !key.modifiers.contains(KeyModifiers::ALT);
    match key.code {
        KeyCode::Esc => Some(InputEvent::Quit),
        KeyCode::Char('c' | 'd') if chord => Some(InputEvent::Quit),
        KeyCode::Char(_) if chord => None,
        KeyCode::Char(c) => Some(InputEvent::Char(c)),
        KeyCode::Backspace => Some(InputEvent::Backspace),
        KeyCode::Enter => Some(InputEvent::Enter),
        KeyCode::PageUp => Some(InputEvent::ScrollUp),
        KeyCode::PageDown => Some(InputEvent::ScrollDown),
        _ => None,
    }
}

/// Read terminal events on a blocking thread until the receiver goes away.
pub fn spawn_key_reader(tx: mpsc::UnboundedSender<InputEvent>) -> JoinHandle<std::io::Result<()>> {
    std::thread::spawn(move || {
        while !tx.is_closed() {
            if !event::poll(KEY_POLL_INTERVAL)? {
                continue;
            }
            let input = match event::read()? {
                Event::Key(key) => input_event(key),
                Event::Resize(..) => Some(InputEvent::Resize),
                _ => None,
            };
            if let Some(input) = input {
                if tx.send(input).is_err() {
                    break;
                }
            }
        }
        debug!("terminal: key reader stopped");
        Ok(())
    })
}
