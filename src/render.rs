//! Rendering seam and the in-memory chat view.
//!
//! DESIGN
//! ======
//! The session never touches the terminal directly. It drives a [`Renderer`],
//! whose capability set mirrors what the chat page needs: append a message,
//! replace the roster, show or clear the typing indicator, mirror the input
//! line, and announce a closed connection.
//!
//! [`ChatView`] is the plain-data implementation. It is what the terminal
//! draws, and what tests assert against.

#[cfg(test)]
#[path = "render_test.rs"]
mod tests;

use crate::protocol::Message;

/// Output surface driven by the session.
pub trait Renderer {
    /// Append one message to the log and scroll to it.
    fn render_message(&mut self, message: &Message);

    /// Replace the roster wholesale.
    fn render_roster(&mut self, users: &[String]);

    /// Show `"<user> is typing..."`, or clear the indicator on `None`.
    fn render_typing_indicator(&mut self, user: Option<&str>);

    /// Mirror the current contents of the input line.
    fn render_input(&mut self, text: &str);

    /// Show a blocking notice and disable input for good.
    fn render_closed(&mut self, notice: &str);

    fn dismiss_notice(&mut self) {}

    /// Scroll the log; positive values move back into history.
    fn scroll(&mut self, _lines: isize) {}

    /// Repaint after a batch of updates.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the output surface fails.
    fn present(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

// =============================================================================
// LOG ENTRY
// =============================================================================

/// One rendered line of the chat log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogEntry {
    System { timestamp: String, content: String },
    User { timestamp: String, username: String, content: String },
}

impl LogEntry {
    #[must_use]
    pub fn timestamp(&self) -> &str {
        match self {
            Self::System { timestamp, .. } | Self::User { timestamp, .. } => timestamp,
        }
    }

    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Self::System { content, .. } | Self::User { content, .. } => content,
        }
    }
}

impl From<&Message> for LogEntry {
    fn from(message: &Message) -> Self {
        if message.is_system {
            return Self::System { timestamp: message.timestamp.clone(), content: message.content.clone() };
        }
        Self::User {
            timestamp: message.timestamp.clone(),
            username: message.username.clone().unwrap_or_default(),
            content: message.content.clone(),
        }
    }
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System { timestamp, content } => write!(f, "[{timestamp}] {content}"),
            Self::User { timestamp, username, content } => write!(f, "[{timestamp}] {username}: {content}"),
        }
    }
}

/// Text shown while `user` is typing.
#[must_use]
pub fn typing_label(user: &str) -> String {
    format!("{user} is typing...")
}

// =============================================================================
// CHAT VIEW
// =============================================================================

/// Everything visible on the chat screen.
#[derive(Clone, Debug)]
pub struct ChatView {
    room: String,
    username: String,
    log: Vec<LogEntry>,
    roster: Vec<String>,
    typing: Option<String>,
    input: String,
    input_enabled: bool,
    notice: Option<String>,
    /// Display lines scrolled back from the newest entry; zero means pinned to the bottom.
    scroll_back: usize,
    /// Furthest `scroll_back` allowed by the last layout, once one has happened.
    scroll_limit: Option<usize>,
}

impl ChatView {
    #[must_use]
    pub fn new(room: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            room: room.into(),
            username: username.into(),
            log: Vec::new(),
            roster: Vec::new(),
            typing: None,
            input: String::new(),
            input_enabled: true,
            notice: None,
            scroll_back: 0,
            scroll_limit: None,
        }
    }

    #[must_use]
    pub fn room(&self) -> &str {
        &self.room
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    #[must_use]
    pub fn roster(&self) -> &[String] {
        &self.roster
    }

    /// Indicator text, if a peer is typing.
    #[must_use]
    pub fn typing(&self) -> Option<&str> {
        self.typing.as_deref()
    }

    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    #[must_use]
    pub fn input_enabled(&self) -> bool {
        self.input_enabled
    }

    #[must_use]
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    #[must_use]
    pub fn scroll_back(&self) -> usize {
        self.scroll_back
    }

    /// Record how far the laid-out log can scroll back and clamp to it.
    ///
    /// Scrolling is measured in display lines, which only the drawing code
    /// knows, so it reports the limit after each layout.
    pub fn set_scroll_limit(&mut self, limit: usize) {
        self.scroll_limit = Some(limit);
        self.scroll_back = self.scroll_back.min(limit);
    }
}

impl Renderer for ChatView {
    fn render_message(&mut self, message: &Message) {
        self.log.push(LogEntry::from(message));
        self.scroll_back = 0;
    }

    fn render_roster(&mut self, users: &[String]) {
        self.roster.clear();
        self.roster.extend(users.iter().cloned());
    }

    fn render_typing_indicator(&mut self, user: Option<&str>) {
        self.typing = user.map(typing_label);
    }

    fn render_input(&mut self, text: &str) {
        text.clone_into(&mut self.input);
    }

    fn render_closed(&mut self, notice: &str) {
        self.input_enabled = false;
        self.typing = None;
        self.notice = Some(notice.to_owned());
    }

    fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    fn scroll(&mut self, lines: isize) {
        let back = self.scroll_back.saturating_add_signed(lines);
        self.scroll_back = self.scroll_limit.map_or(back, |limit| back.min(limit));
    }
}
