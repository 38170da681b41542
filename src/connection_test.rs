use super::*;
use crate::protocol::endpoint_url;
use crate::render::{ChatView, LogEntry};
use serde_json::{Value, json};
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::timeout;

type ServerStream = WebSocketStream<TcpStream>;

const WAIT: Duration = Duration::from_secs(5);

/// `ChatView` that reports when the connection-closed notice is rendered.
struct ProbeRenderer {
    view: ChatView,
    closed: Option<oneshot::Sender<()>>,
}

impl Renderer for ProbeRenderer {
    fn render_message(&mut self, message: &crate::protocol::Message) {
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
        if let Some(tx) = self.closed.take() {
            tx.send(()).expect("test should be waiting for close");
        }
    }
}

struct Client {
    input: mpsc::UnboundedSender<InputEvent>,
    closed: oneshot::Receiver<()>,
    task: tokio::task::JoinHandle<(Result<(), ChatError>, ChatSession<ProbeRenderer>)>,
}

async fn spawn_server<F, Fut>(handler: F) -> (String, tokio::task::JoinHandle<()>)
where
    F: FnOnce(ServerStream) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind should succeed");
    let addr = listener.local_addr().expect("local addr").to_string();
    let handle = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.expect("accept should succeed");
        let ws = tokio_tungstenite::accept_async(tcp).await.expect("server handshake");
        handler(ws).await;
    });
    (addr, handle)
}

async fn spawn_client(addr: &str, typing_idle: Duration) -> Client {
    let url = endpoint_url(addr, "general", "ann").expect("endpoint url");
    let stream = timeout(WAIT, connect(&url)).await.expect("connect timed out").expect("connect should succeed");

    let (closed_tx, closed_rx) = oneshot::channel();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let renderer = ProbeRenderer { view: ChatView::new("general", "ann"), closed: Some(closed_tx) };
    let mut session = ChatSession::new("ann", renderer, out_tx, typing_idle);

    let task = tokio::spawn(async move {
        let result = run_session(stream, &mut session, out_rx, in_rx).await;
        (result, session)
    });
    Client { input: in_tx, closed: closed_rx, task }
}

async fn send_json(ws: &mut ServerStream, value: Value) {
    ws.send(WsMessage::Text(value.to_string().into())).await.expect("server send");
}

async fn recv_json(ws: &mut ServerStream) -> Value {
    loop {
        let msg = timeout(WAIT, ws.next())
            .await
            .expect("server receive timed out")
            .expect("client hung up")
            .expect("server receive failed");
        if let WsMessage::Text(text) = msg {
            return serde_json::from_str(text.as_str()).expect("client sent valid json");
        }
    }
}

fn wire_message(timestamp: &str, username: Option<&str>, content: &str) -> Value {
    json!({
        "timestamp": timestamp,
        "username": username,
        "content": content,
        "is_system": username.is_none(),
    })
}

async fn finish(client: Client) -> ChatSession<ProbeRenderer> {
    client.input.send(InputEvent::Quit).expect("client loop alive");
    let (result, session) = timeout(WAIT, client.task).await.expect("client exit timed out").expect("client task");
    result.expect("session should end cleanly");
    session
}

#[tokio::test]
async fn history_then_send_then_server_close() {
    let (received_tx, received_rx) = oneshot::channel::<Vec<Value>>();
    let (addr, server) = spawn_server(|mut ws| async move {
        send_json(
            &mut ws,
            json!({"event": "history", "messages": [
                wire_message("09:00:00", Some("bob"), "earlier"),
                wire_message("09:00:01", None, "bob joined the chat"),
            ]}),
        )
        .await;
        send_json(&mut ws, json!({"event": "user_list", "users": ["bob", "ann"]})).await;

        let mut received = Vec::new();
        loop {
            let frame = recv_json(&mut ws).await;
            let is_message = frame["event"] == "message";
            received.push(frame);
            if is_message {
                break;
            }
        }
        let content = received.last().map(|f| f["message"].clone()).unwrap_or_default();
        send_json(
            &mut ws,
            json!({"event": "message", "message": {
                "timestamp": "09:00:02", "username": "ann", "content": content, "is_system": false
            }}),
        )
        .await;
        received_tx.send(received).expect("test waiting");
        ws.close(None).await.expect("server close");
    })
    .await;

    let mut client = spawn_client(&addr, Duration::from_secs(60)).await;
    for event in [InputEvent::Char('h'), InputEvent::Char('i'), InputEvent::Enter] {
        client.input.send(event).expect("client loop alive");
    }

    let received = timeout(WAIT, received_rx).await.expect("server timed out").expect("server result");
    assert_eq!(
        received,
        [json!({"event": "typing", "typing": true}), json!({"event": "message", "message": "hi"})]
    );

    timeout(WAIT, &mut client.closed).await.expect("close timed out").expect("close signal");
    let session = finish(client).await;
    server.await.expect("server task");

    let view = &session.renderer().view;
    let lines: Vec<String> = view.log().iter().map(ToString::to_string).collect();
    assert_eq!(lines, ["[09:00:00] bob: earlier", "[09:00:01] bob joined the chat", "[09:00:02] ann: hi"]);
    assert!(matches!(view.log()[1], LogEntry::System { .. }));
    assert_eq!(view.roster(), ["bob", "ann"]);
    assert!(!view.input_enabled());
    assert!(!session.is_open());
}

#[tokio::test]
async fn quit_sends_close_frame() {
    let (close_tx, close_rx) = oneshot::channel::<bool>();
    let (addr, server) = spawn_server(|mut ws| async move {
        let got_close = loop {
            match timeout(WAIT, ws.next()).await.expect("server receive timed out") {
                Some(Ok(WsMessage::Close(_))) | None => break true,
                Some(Ok(_)) => {}
                Some(Err(_)) => break false,
            }
        };
        close_tx.send(got_close).expect("test waiting");
    })
    .await;

    let client = spawn_client(&addr, Duration::from_secs(60)).await;
    let session = finish(client).await;
    assert!(session.is_open());

    let got_close = timeout(WAIT, close_rx).await.expect("server timed out").expect("server result");
    assert!(got_close);
    server.await.expect("server task");
}

#[tokio::test]
async fn abrupt_disconnect_closes_session() {
    let (addr, server) = spawn_server(|ws| async move {
        drop(ws);
    })
    .await;

    let mut client = spawn_client(&addr, Duration::from_secs(60)).await;
    timeout(WAIT, &mut client.closed).await.expect("close timed out").expect("close signal");

    client.input.send(InputEvent::Char('x')).expect("client loop alive");
    client.input.send(InputEvent::Enter).expect("client loop alive");
    let session = finish(client).await;
    server.await.expect("server task");

    assert!(!session.is_open());
    assert_eq!(session.input(), "");
    assert!(!session.renderer().view.input_enabled());
}

#[tokio::test]
async fn typing_start_and_stop_reach_server() {
    let (frames_tx, frames_rx) = oneshot::channel::<Vec<Value>>();
    let (addr, server) = spawn_server(|mut ws| async move {
        let first = recv_json(&mut ws).await;
        let second = recv_json(&mut ws).await;
        frames_tx.send(vec![first, second]).expect("test waiting");
    })
    .await;

    let client = spawn_client(&addr, Duration::from_millis(50)).await;
    for c in "abc".chars() {
        client.input.send(InputEvent::Char(c)).expect("client loop alive");
    }

    let frames = timeout(WAIT, frames_rx).await.expect("server timed out").expect("server result");
    assert_eq!(frames, [json!({"event": "typing", "typing": true}), json!({"event": "typing", "typing": false})]);

    server.await.expect("server task");
    drop(finish(client).await);
}

#[tokio::test]
async fn malformed_frames_do_not_stop_the_loop() {
    let (addr, server) = spawn_server(|mut ws| async move {
        ws.send(WsMessage::Text("not json".to_owned().into())).await.expect("server send");
        ws.send(WsMessage::Binary(vec![1, 2, 3].into())).await.expect("server send");
        send_json(&mut ws, json!({"event": "unknown_kind"})).await;
        send_json(&mut ws, json!({"event": "message", "message": wire_message("1", Some("bob"), "ok")})).await;
        ws.close(None).await.expect("server close");
    })
    .await;

    let mut client = spawn_client(&addr, Duration::from_secs(60)).await;
    timeout(WAIT, &mut client.closed).await.expect("close timed out").expect("close signal");
    let session = finish(client).await;
    server.await.expect("server task");

    let lines: Vec<String> = session.renderer().view.log().iter().map(ToString::to_string).collect();
    assert_eq!(lines, ["[1] bob: ok"]);
}
