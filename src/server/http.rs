//! `GET /websocket` upgrade handler.
//!
//! Each accepted connection gets its own [`crate::pty::PtyProcess`] task and
//! a [`crate::ws_task::WebSocketTask`] wrapping the upgraded socket,
//! cross-wired by a [`crate::bridge::TaskBridge`] for the life of the
//! connection.

use std::sync::Arc;

use axum::extract::ws::WebSocket;
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};

use crate::bridge::TaskBridge;
use crate::config::Config;
use crate::message::Message;
use crate::pty::{PtyProcess, PtyProcessConfig};
use crate::task::TaskManager;

/// Shared state handed to every connection handler.
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<Config>,
    pub tasks: &'static TaskManager,
}

/// Build the router: a single `GET /websocket` upgrade endpoint.
pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/websocket", get(upgrade))
        .with_state(state)
}

async fn upgrade(ws: WebSocketUpgrade, State(state): State<ServerState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: ServerState) {
    let (axum_tx, axum_rx) = socket.split();
    let ws_task = state
        .tasks
        .spawn(Arc::new(crate::ws_task::WebSocketTask::new(
            AxumWsWriter { tx: axum_tx },
            AxumWsReader { rx: axum_rx },
        )));

    let pty_task = state.tasks.spawn(Arc::new(PtyProcess::new(PtyProcessConfig {
        command: state.config.shell_command.clone(),
        ..PtyProcessConfig::default()
    })));

    let mut bridge = TaskBridge::new(Arc::clone(&ws_task), Arc::clone(&pty_task));
    bridge.wait().await;

    log::info!("session {} / {} ended", ws_task.id(), pty_task.id());
}

/// Adapts an `axum` split WebSocket sink/stream to [`crate::ws::WsWriter`]/
/// [`crate::ws::WsReader`]'s shape, so `WebSocketTask` doesn't need to know
/// whether it's driving a client (`tokio-tungstenite`) or server-side
/// (`axum`) socket.
struct AxumWsWriter {
    tx: futures_util::stream::SplitSink<WebSocket, axum::extract::ws::Message>,
}

struct AxumWsReader {
    rx: futures_util::stream::SplitStream<WebSocket>,
}

#[async_trait::async_trait]
impl crate::ws_task::WsSink for AxumWsWriter {
    async fn send_json(&mut self, msg: &Message) -> Result<(), crate::error::ShellbusError> {
        let json = serde_json::to_string(msg)
            .map_err(|e| crate::error::ShellbusError::DecodeError(e.to_string()))?;
        self.tx
            .send(axum::extract::ws::Message::Text(json))
            .await
            .map_err(|e| crate::error::ShellbusError::TransportError(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.tx.send(axum::extract::ws::Message::Close(None)).await;
    }
}

#[async_trait::async_trait]
impl crate::ws_task::WsSource for AxumWsReader {
    async fn recv_message(&mut self) -> Option<Message> {
        loop {
            match self.rx.next().await {
                Some(Ok(axum::extract::ws::Message::Text(text))) => {
                    return Some(
                        serde_json::from_str(&text)
                            .unwrap_or_else(|_| Message::data(text.to_string())),
                    );
                }
                Some(Ok(axum::extract::ws::Message::Binary(bytes))) => {
                    return Some(Message::data(bytes.to_vec()));
                }
                Some(Ok(axum::extract::ws::Message::Close(_))) | None => return None,
                Some(Ok(_)) => {}
                Some(Err(_)) => return None,
            }
        }
    }
}
