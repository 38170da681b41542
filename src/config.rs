//! Client configuration from command-line flags and environment variables.
//!
//! Every flag has a `ROOMCHAT_*` environment fallback. Room and username are
//! trimmed on parse and must be non-empty.

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::error::ChatError;
use crate::protocol;

pub const DEFAULT_SERVER: &str = "127.0.0.1:8000";
pub const DEFAULT_TYPING_IDLE_MS: u64 = 3000;

#[derive(Parser, Debug, Clone)]
#[command(name = "roomchat", about = "Terminal client for websocket chat rooms")]
pub struct ChatConfig {
    /// Server address: `host:port`, or a ws/wss/http/https URL.
    #[arg(long, env = "ROOMCHAT_SERVER", default_value = DEFAULT_SERVER)]
    pub server: String,

    /// Room to join.
    #[arg(short, long, env = "ROOMCHAT_ROOM", value_parser = trimmed)]
    pub room: String,

    /// Name shown to other participants.
    #[arg(short, long, env = "ROOMCHAT_USERNAME", value_parser = trimmed)]
    pub username: String,

    /// Idle time after the last keystroke before "stopped typing" is sent.
    #[arg(long, env = "ROOMCHAT_TYPING_IDLE_MS", default_value_t = DEFAULT_TYPING_IDLE_MS)]
    pub typing_idle_ms: u64,

    /// Append logs to this file. Nothing is logged when unset.
    #[arg(long, env = "ROOMCHAT_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

impl ChatConfig {
    /// Reject blank identity fields.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::EmptyField`] naming the first blank field.
    pub fn validate(&self) -> Result<(), ChatError> {
        if self.room.is_empty() {
            return Err(ChatError::EmptyField("room"));
        }
        if self.username.is_empty() {
            return Err(ChatError::EmptyField("username"));
        }
        Ok(())
    }

    /// Websocket URL for the configured room and user.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::InvalidServer`] for an unusable server address.
    pub fn endpoint(&self) -> Result<String, ChatError> {
        protocol::endpoint_url(&self.server, &self.room, &self.username)
    }

    #[must_use]
    pub fn typing_idle(&self) -> Duration {
        Duration::from_millis(self.typing_idle_ms)
    }
}

#[allow(clippy::unnecessary_wraps)]
fn trimmed(raw: &str) -> Result<String, String> {
    Ok(raw.trim().to_owned())
}
