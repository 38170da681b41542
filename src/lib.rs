//! roomchat — terminal client for websocket chat rooms.
//!
//! The pieces, bottom-up:
//! - [`protocol`]: wire frames and the room endpoint URL
//! - [`typing`]: keystroke debounce for typing notifications
//! - [`render`]: the renderer seam and the in-memory chat view
//! - [`session`]: per-connection state and event handling
//! - [`connection`]: the websocket relay loop
//! - [`terminal`]: ratatui drawing and key input
//! - [`config`]: flags and environment

pub mod config;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod render;
pub mod session;
pub mod terminal;
pub mod typing;
