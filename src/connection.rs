//! Connection manager — websocket relay between the server and the session.
//!
//! DESIGN
//! ======
//! After connecting, a single `select!` loop multiplexes four sources:
//! - Outbound frames queued by the session → socket
//! - Inbound socket messages → session dispatch
//! - The typing debounce deadline → session timer callback
//! - Local input events → session input handling
//!
//! The session is only ever touched from this loop, one event at a time.
//! After each event the renderer is asked to repaint.
//!
//! LIFECYCLE
//! =========
//! 1. `connect` opens the socket for the room endpoint.
//! 2. `run_session` relays until the user quits.
//! 3. Close frame, end of stream, or a transport error closes the session
//!    for good; the loop keeps serving local input (scrolling, quit).
//! 4. Quitting while still open sends a close frame first.

#[cfg(test)]
#[path = "connection_test.rs"]
mod tests;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::error::ChatError;
use crate::protocol::{self, Outbound};
use crate::render::Renderer;
use crate::session::{ChatSession, Flow, InputEvent};
use crate::typing;

pub type ChatStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Open the websocket for a room endpoint built by [`protocol::endpoint_url`].
///
/// # Errors
///
/// Returns [`ChatError::WsConnect`] if the handshake fails.
pub async fn connect(url: &str) -> Result<ChatStream, ChatError> {
    let (stream, response) = connect_async(url).await?;
    info!(%url, status = %response.status(), "ws: connected");
    Ok(stream)
}

/// Relay frames and input until the user quits or the input source ends.
///
/// # Errors
///
/// Returns [`ChatError::Io`] if the renderer fails to repaint.
pub async fn run_session<S, R>(
    mut stream: WebSocketStream<S>,
    session: &mut ChatSession<R>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    mut input: mpsc::UnboundedReceiver<InputEvent>,
) -> Result<(), ChatError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    R: Renderer,
{
    session.present()?;

    loop {
        let open = session.is_open();
        let typing_deadline = session.typing_deadline();

        tokio::select! {
            biased;

            Some(frame) = outbound.recv(), if open => {
                if let Err(e) = send_frame(&mut stream, &frame).await {
                    warn!(error = %e, "ws: send failed");
                    session.on_close();
                }
            }
            msg = stream.next(), if open => match msg {
                Some(Ok(WsMessage::Text(text))) => {
                    debug!(len = text.len(), "ws: recv frame");
                    session.handle_frame(text.as_str());
                }
                Some(Ok(WsMessage::Close(close))) => {
                    info!(?close, "ws: server closed connection");
                    session.on_close();
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "ws: receive failed");
                    session.on_close();
                }
                None => session.on_close(),
            },
            () = typing::sleep_until(typing_deadline), if open => {
                session.on_typing_timer();
            }
            event = input.recv() => {
                let flow = event.map_or(Flow::Quit, |event| session.handle_input(event));
                if flow == Flow::Quit {
                    break;
                }
            }
        }

        session.present()?;
    }

    if session.is_open() {
        if let Err(e) = stream.close(None).await {
            debug!(error = %e, "ws: close handshake failed");
        }
    }
    info!("ws: session ended");
    Ok(())
}

async fn send_frame<S>(stream: &mut WebSocketStream<S>, frame: &Outbound) -> Result<(), ChatError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let json = protocol::encode_frame(frame)?;
    stream.send(WsMessage::Text(json.into())).await?;
    Ok(())
}
