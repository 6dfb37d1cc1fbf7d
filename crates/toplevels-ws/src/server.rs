/*!
WebSocket server.

One route, `/ws`. Every connection subscribes to the registry's event stream
on its own, is sent a `sync:init` snapshot, and then receives events and
replies to its requests on the same socket. A client that falls behind the
event buffer is resynchronised with a fresh `sync:init` instead of being left
with gaps.
*/

use async_broadcast::{Receiver, RecvError, TryRecvError};
use axum::{
  extract::{
    ws::{Message, WebSocket, WebSocketUpgrade},
    State,
  },
  response::Response,
  routing::get,
  Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use toplevels::{Event, Toplevels};
use tower_http::cors::{Any, CorsLayer};

/// Default WebSocket server port.
pub const DEFAULT_WS_PORT: u16 = 3030;

/// Shared by every connection.
#[derive(Clone)]
pub struct WebSocketState {
  toplevels: Toplevels,
  port: u16,
}

impl std::fmt::Debug for WebSocketState {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("WebSocketState")
      .field("port", &self.port)
      .finish_non_exhaustive()
  }
}

impl WebSocketState {
  /// Serve `toplevels` on [`DEFAULT_WS_PORT`].
  pub fn new(toplevels: Toplevels) -> Self {
    Self::with_port(toplevels, DEFAULT_WS_PORT)
  }

  /// Serve `toplevels` on `port`.
  pub const fn with_port(toplevels: Toplevels, port: u16) -> Self {
    Self { toplevels, port }
  }
}

/// Bind `127.0.0.1:<port>` and serve until the listener fails.
pub async fn start_server(ws_state: WebSocketState) -> std::io::Result<()> {
  let addr = format!("127.0.0.1:{}", ws_state.port);

  let cors = CorsLayer::new()
    .allow_origin(Any)
    .allow_methods(Any)
    .allow_headers(Any);
  let app = Router::new()
    .route("/ws", get(websocket_handler))
    .layer(cors)
    .with_state(ws_state);

  let listener = tokio::net::TcpListener::bind(&addr).await?;
  log::info!("WebSocket server: ws://{addr}/ws");
  axum::serve(listener, app).await
}

async fn websocket_handler(
  ws: WebSocketUpgrade,
  State(ws_state): State<WebSocketState>,
) -> Response {
  ws.on_upgrade(|socket| serve_client(socket, ws_state.toplevels))
}

/// What to do with one item from a client's event stream.
#[derive(Debug, PartialEq)]
enum Outbound {
  Frame(String),
  /// Events were dropped. The client needs a full snapshot.
  Resync(u64),
  Stop,
}

impl Outbound {
  fn from_recv(received: Result<Event, RecvError>) -> Self {
    match received {
      Ok(event) => event_frame(&event).map_or(Self::Stop, Self::Frame),
      Err(RecvError::Overflowed(missed)) => Self::Resync(missed),
      Err(RecvError::Closed) => Self::Stop,
    }
  }
}

async fn serve_client(mut socket: WebSocket, toplevels: Toplevels) {
  // Subscribed before the snapshot, so nothing falls between the two.
  let mut events = toplevels.subscribe();
  if send(&mut socket, sync_init_frame(&toplevels).await).await.is_err() {
    return;
  }

  loop {
    let outbound = tokio::select! {
      msg = socket.recv() => match msg {
        Some(Ok(Message::Text(text))) => {
          let reply = reply_frame(&text, &toplevels).await;
          // Events caused by the request go out before its reply.
          if flush_events(&mut socket, &mut events, &toplevels).await.is_err() {
            break;
          }
          Outbound::Frame(reply)
        }
        Some(Ok(Message::Close(_)) | Err(_)) | None => {
          log::debug!("[ws] client disconnected");
          break;
        }
        Some(Ok(_)) => continue,
      },
      received = events.recv() => Outbound::from_recv(received),
    };

    let sent = match outbound {
      Outbound::Frame(frame) => send(&mut socket, frame).await,
      Outbound::Resync(missed) => {
        log::warn!("[ws] client missed {missed} events, resyncing");
        send(&mut socket, sync_init_frame(&toplevels).await).await
      }
      Outbound::Stop => break,
    };
    if sent.is_err() {
      break;
    }
  }
}

async fn flush_events(
  socket: &mut WebSocket,
  events: &mut Receiver<Event>,
  toplevels: &Toplevels,
) -> Result<(), axum::Error> {
  loop {
    let received = match events.try_recv() {
      Ok(event) => Ok(event),
      Err(TryRecvError::Overflowed(missed)) => Err(RecvError::Overflowed(missed)),
      Err(TryRecvError::Empty | TryRecvError::Closed) => return Ok(()),
    };
    match Outbound::from_recv(received) {
      Outbound::Frame(frame) => send(socket, frame).await?,
      Outbound::Resync(_) => return send(socket, sync_init_frame(toplevels).await).await,
      Outbound::Stop => return Ok(()),
    }
  }
}

async fn send(socket: &mut WebSocket, frame: String) -> Result<(), axum::Error> {
  socket.send(Message::Text(frame)).await
}

fn event_frame(event: &Event) -> Option<String> {
  serde_json::to_string(event)
    .map_err(|e| log::error!("[ws] could not serialize event: {e}"))
    .ok()
}

/// A `sync:init` event, or an `{error}` frame when no snapshot is available.
async fn sync_init_frame(toplevels: &Toplevels) -> String {
  let toplevels = toplevels.clone();
  let snapshot = tokio::task::spawn_blocking(move || toplevels.snapshot()).await;
  let error = match snapshot {
    Ok(Ok(snapshot)) => match event_frame(&Event::SyncInit(snapshot)) {
      Some(frame) => return frame,
      None => "snapshot could not be serialized".to_string(),
    },
    Ok(Err(e)) => e.to_string(),
    Err(e) => format!("snapshot task failed: {e}"),
  };
  log::warn!("[ws] no sync:init for client: {error}");
  json!({ "error": format!("sync:init failed: {error}") }).to_string()
}

/// Envelope of a client request. `args` stays raw for `dispatch_json`.
#[derive(Debug, Deserialize)]
struct RequestFrame {
  #[serde(default)]
  id: Value,
  method: String,
  #[serde(default)]
  args: Value,
}

/// Run one request frame off the async runtime. The reply carries the
/// request's `id`, or `null` when the frame could not be read.
async fn reply_frame(text: &str, toplevels: &Toplevels) -> String {
  let frame = match serde_json::from_str::<RequestFrame>(text) {
    Ok(frame) => frame,
    Err(e) => return json!({ "id": null, "error": format!("Invalid request frame: {e}") }).to_string(),
  };

  let toplevels = toplevels.clone();
  let RequestFrame { id, method, args } = frame;
  let outcome =
    tokio::task::spawn_blocking(move || crate::rpc::dispatch_json(&toplevels, &method, &args)).await;

  let mut reply = outcome.unwrap_or_else(|e| json!({ "error": format!("RPC task failed: {e}") }));
  if let Value::Object(fields) = &mut reply {
    fields.insert("id".to_string(), id);
  }
  reply.to_string()
}
