//! Wire protocol — JSON frames exchanged with the room server.
//!
//! DESIGN
//! ======
//! Every frame is a JSON object carrying an `event` discriminator. Inbound
//! frames decode into [`Inbound`]; outbound frames serialize from
//! [`Outbound`]. Known events are decoded strictly (missing fields are an
//! error), unknown events decode to [`Inbound::Unknown`] so the caller can
//! decide what to do with them.
//!
//! The endpoint path embeds the room and username, each percent-encoded with
//! the same reserved set a browser's `encodeURIComponent` uses.

#[cfg(test)]
#[path = "protocol_test.rs"]
mod tests;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ChatError;

/// Characters left unescaped in path segments: `A-Z a-z 0-9 - _ . ! ~ * ' ( )`.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Error returned by [`decode_frame`] and [`encode_frame`].
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The text was not valid JSON, or a known event had the wrong shape.
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),
    /// The JSON object carried no string `event` field.
    #[error("frame has no event discriminator")]
    MissingEvent,
}

// =============================================================================
// MESSAGE
// =============================================================================

/// One chat line as delivered by the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Server-formatted wall clock time, e.g. `"14:03:59"`.
    pub timestamp: String,
    /// Author, or `None` for system notices.
    #[serde(default)]
    pub username: Option<String>,
    /// Message body.
    pub content: String,
    /// System notices (joins, parts) render without an author prefix.
    #[serde(default)]
    pub is_system: bool,
}

// =============================================================================
// FRAMES
// =============================================================================

/// A frame received from the server.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Inbound {
    /// A single new message.
    Message { message: Message },
    /// The full roster of the room, in server order.
    UserList { users: Vec<String> },
    /// A peer started or stopped typing.
    Typing { username: String, typing: bool },
    /// Backlog sent once after connecting, oldest first.
    History { messages: Vec<Message> },
    /// Any event name this client does not understand.
    #[serde(skip)]
    Unknown { name: String },
}

/// A frame sent to the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Outbound {
    Message { message: String },
    Typing { typing: bool },
}

const KNOWN_EVENTS: [&str; 4] = ["message", "user_list", "typing", "history"];

/// Decode one text frame.
///
/// # Errors
///
/// Returns [`FrameError::Json`] for invalid JSON or a known event with a bad
/// payload, and [`FrameError::MissingEvent`] when there is no discriminator.
pub fn decode_frame(text: &str) -> Result<Inbound, FrameError> {
    let value: Value = serde_json::from_str(text)?;
    let Some(event) = value.get("event").and_then(Value::as_str) else {
        return Err(FrameError::MissingEvent);
    };
    if !KNOWN_EVENTS.contains(&event) {
        return Ok(Inbound::Unknown { name: event.to_owned() });
    }
    Ok(serde_json::from_value(value)?)
}

/// Encode one outbound frame as JSON text.
///
/// # Errors
///
/// Returns [`FrameError::Json`] if serialization fails.
pub fn encode_frame(frame: &Outbound) -> Result<String, FrameError> {
    Ok(serde_json::to_string(frame)?)
}

// =============================================================================
// ENDPOINT
// =============================================================================

/// Build the websocket URL for `room` as `username`.
///
/// `server` may be a bare `host:port` or carry a `ws`, `wss`, `http` or
/// `https` scheme; HTTP schemes map onto their websocket counterparts.
///
/// # Errors
///
/// Returns [`ChatError::InvalidServer`] for any other scheme or an empty host.
pub fn endpoint_url(server: &str, room: &str, username: &str) -> Result<String, ChatError> {
    let server = server.trim();
    let (scheme, host) = match server.split_once("://") {
        None => ("ws", server),
        Some(("ws" | "http", rest)) => ("ws", rest),
        Some(("wss" | "https", rest)) => ("wss", rest),
        Some(_) => return Err(ChatError::InvalidServer(server.to_owned())),
    };
    let host = host.trim_end_matches('/');
    if host.is_empty() {
        return Err(ChatError::InvalidServer(server.to_owned()));
    }

    let room = utf8_percent_encode(room, PATH_SEGMENT);
    let username = utf8_percent_encode(username, PATH_SEGMENT);
    Ok(format!("{scheme}://{host}/ws/{room}/{username}"))
}
