//! Crate-level error type.
//!
//! Only startup and terminal failures surface as errors. Problems with
//! individual frames are logged and dropped by the session instead.

use crate::protocol::FrameError;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("invalid server address: {0}")]
    InvalidServer(String),
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
    #[error("websocket connect failed: {0}")]
    WsConnect(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("terminal i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame encoding failed: {0}")]
    Frame(#[from] FrameError),
}

impl From<tokio_tungstenite::tungstenite::Error> for ChatError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WsConnect(Box::new(error))
    }
}
