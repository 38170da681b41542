use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use roomchat::config::ChatConfig;
use roomchat::connection;
use roomchat::error::ChatError;
use roomchat::render::ChatView;
use roomchat::session::ChatSession;
use roomchat::terminal::{self, TerminalRenderer};

#[tokio::main]
async fn main() -> Result<(), ChatError> {
    let config = ChatConfig::parse();
    if let Some(path) = &config.log_file {
        init_logging(path)?;
    }
    config.validate()?;

    let url = config.endpoint()?;
    let stream = connection::connect(&url).await?;

    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (in_tx, in_rx) = mpsc::unbounded_channel();

    let tui = ratatui::try_init()?;
    let renderer = TerminalRenderer::new(tui, ChatView::new(&config.room, &config.username));
    let mut session = ChatSession::new(&config.username, renderer, out_tx, config.typing_idle());
    let reader = terminal::spawn_key_reader(in_tx);

    let result = connection::run_session(stream, &mut session, out_rx, in_rx).await;
    ratatui::restore();

    match reader.join() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "terminal: key reader failed"),
        Err(_) => warn!("terminal: key reader panicked"),
    }
    info!(room = %config.room, "roomchat exiting");
    result
}

/// Logs go to a file so they never draw over the terminal UI.
fn init_logging(path: &Path) -> Result<(), ChatError> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}
