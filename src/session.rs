//! Chat session — the single controller for one room connection.
//!
//! DESIGN
//! ======
//! All mutable client state lives here: the input line, the typing notifier,
//! whether the connection is still open, and the renderer. The connection
//! loop owns the session and calls into it one event at a time, so nothing
//! is shared and nothing is locked.
//!
//! Outbound frames are queued on an unbounded channel; the connection loop
//! drains it into the socket in order.
//!
//! LIFECYCLE
//! =========
//! 1. Open: inbound frames render, keystrokes edit and notify, Enter sends.
//! 2. Closed (terminal): notice shown, input disabled, typing timer dropped.
//!    Sends are no-ops from here on.

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::protocol::{self, Inbound, Outbound};
use crate::render::Renderer;
use crate::typing::TypingNotifier;

/// Notice shown when the server goes away.
pub const CLOSED_NOTICE: &str = "Connection to the server was lost.";

/// A local input event, already decoded from the keyboard.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputEvent {
    Char(char),
    Backspace,
    Enter,
    ScrollUp,
    ScrollDown,
    /// Terminal resized; repaint only.
    Resize,
    Quit,
}

/// Whether the event loop should keep going after an input event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ConnectionState {
    Open,
    Closed,
}

/// Lines moved per PageUp/PageDown.
const SCROLL_STEP: isize = 5;

pub struct ChatSession<R> {
    username: String,
    renderer: R,
    input: String,
    typing: TypingNotifier,
    state: ConnectionState,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl<R: Renderer> ChatSession<R> {
    pub fn new(
        username: impl Into<String>,
        renderer: R,
        outbound: mpsc::UnboundedSender<Outbound>,
        typing_idle: Duration,
    ) -> Self {
        Self {
            username: username.into(),
            renderer,
            input: String::new(),
            typing: TypingNotifier::new(typing_idle),
            state: ConnectionState::Open,
            outbound,
        }
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// When the pending `typing: false` is due, if any.
    #[must_use]
    pub fn typing_deadline(&self) -> Option<Instant> {
        self.typing.deadline()
    }

    // =========================================================================
    // INBOUND
    // =========================================================================

    /// Decode and dispatch one text frame. Malformed frames are logged and dropped.
    pub fn handle_frame(&mut self, text: &str) {
        match protocol::decode_frame(text) {
            Ok(frame) => self.dispatch(frame),
            Err(e) => warn!(error = %e, len = text.len(), "chat: dropping malformed frame"),
        }
    }

    pub fn dispatch(&mut self, frame: Inbound) {
        match frame {
            Inbound::Message { message } => self.renderer.render_message(&message),
            Inbound::UserList { users } => {
                debug!(count = users.len(), "chat: roster update");
                self.renderer.render_roster(&users);
            }
            Inbound::Typing { username, typing } => {
                let shown = (typing && username != self.username).then_some(username.as_str());
                self.renderer.render_typing_indicator(shown);
            }
            Inbound::History { messages } => {
                debug!(count = messages.len(), "chat: history replay");
                for message in &messages {
                    self.renderer.render_message(message);
                }
            }
            Inbound::Unknown { name } => debug!(event = %name, "chat: ignoring unknown event"),
        }
    }

    /// The connection is gone. Terminal: input stays disabled for the rest of the session.
    pub fn on_close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        info!(username = %self.username, "chat: connection closed");
        self.state = ConnectionState::Closed;
        self.typing.reset();
        self.renderer.render_closed(CLOSED_NOTICE);
    }

    // =========================================================================
    // LOCAL INPUT
    // =========================================================================

    pub fn handle_input(&mut self, event: InputEvent) -> Flow {
        match event {
            InputEvent::Quit => return Flow::Quit,
            InputEvent::Resize => {}
            InputEvent::ScrollUp => self.renderer.scroll(SCROLL_STEP),
            InputEvent::ScrollDown => self.renderer.scroll(-SCROLL_STEP),
            InputEvent::Char(_) | InputEvent::Backspace | InputEvent::Enter if !self.is_open() => {
                self.renderer.dismiss_notice();
            }
            InputEvent::Enter => {
                self.send_message();
            }
            InputEvent::Char(c) => {
                self.input.push(c);
                self.renderer.render_input(&self.input);
                self.keystroke();
            }
            InputEvent::Backspace => {
                self.input.pop();
                self.renderer.render_input(&self.input);
                self.keystroke();
            }
        }
        Flow::Continue
    }

    /// Send the trimmed input line, if any, and clear it.
    ///
    /// Returns whether a frame was queued. Empty input and a closed
    /// connection are both silent no-ops.
    pub fn send_message(&mut self) -> bool {
        if !self.is_open() {
            debug!("chat: send ignored, connection closed");
            return false;
        }
        let message = self.input.trim();
        if message.is_empty() {
            return false;
        }
        let frame = Outbound::Message { message: message.to_owned() };
        self.input.clear();
        self.renderer.render_input(&self.input);
        self.queue(frame);
        true
    }

    /// The typing deadline may have passed; emit `typing: false` if so.
    pub fn on_typing_timer(&mut self) {
        if let Some(typing) = self.typing.expire(Instant::now()) {
            self.queue(Outbound::Typing { typing });
        }
    }

    /// Repaint the output surface.
    ///
    /// # Errors
    ///
    /// Returns the renderer's I/O error.
    pub fn present(&mut self) -> std::io::Result<()> {
        self.renderer.present()
    }

    fn keystroke(&mut self) {
        if let Some(typing) = self.typing.keystroke(Instant::now()) {
            self.queue(Outbound::Typing { typing });
        }
    }

    fn queue(&mut self, frame: Outbound) {
        if !self.is_open() {
            return;
        }
        if self.outbound.send(frame).is_err() {
            warn!("chat: outbound queue closed");
            self.on_close();
        }
    }
}
