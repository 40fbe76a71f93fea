//! Frame codec adapter between a WebSocket connection and a [`Task`].
//!
//! A [`WebSocketTask`] decodes inbound frames into [`Message`]s onto its
//! output channel, and encodes whatever arrives on its input channel back
//! out as frames — the mirror of `kitsh.core.websocket.Websocket`'s
//! `_recvloop`/`_sendloop` pair.
//!
//! The actual socket is behind the [`WsSink`]/[`WsSource`] traits rather
//! than `ws.rs`'s `WsWriter`/`WsReader` directly, so the same `Runnable`
//! drives both the client side (`tokio-tungstenite`, via [`ClientSocket`])
//! and the server side (`axum`'s own websocket extractor, wrapped in
//! `server/http.rs`).

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ShellbusError;
use crate::message::Message;
use crate::task::{Runnable, Task};

/// The write half of whatever transport is carrying frames.
#[async_trait]
pub trait WsSink: Send {
    async fn send_json(&mut self, msg: &Message) -> Result<(), ShellbusError>;
    async fn close(&mut self);
}

/// The read half of whatever transport is carrying frames.
#[async_trait]
pub trait WsSource: Send {
    /// Returns `None` once the transport has nothing more to offer.
    async fn recv_message(&mut self) -> Option<Message>;
}

/// A `Runnable` that pumps frames between a split WebSocket connection and
/// a task's input/output channels.
pub struct WebSocketTask<W: WsSink, R: WsSource> {
    writer: tokio::sync::Mutex<W>,
    reader: tokio::sync::Mutex<R>,
}

impl<W: WsSink, R: WsSource> std::fmt::Debug for WebSocketTask<W, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTask").finish()
    }
}

impl<W: WsSink, R: WsSource> WebSocketTask<W, R> {
    #[must_use]
    pub fn new(writer: W, reader: R) -> Self {
        Self {
            writer: tokio::sync::Mutex::new(writer),
            reader: tokio::sync::Mutex::new(reader),
        }
    }
}

async fn sendloop<W: WsSink>(task: Arc<Task>, writer: &mut W) -> Result<(), ShellbusError> {
    let mut sub = task.input.watch();
    loop {
        match sub.recv().await {
            Some(Message::Close) | None => break,
            Some(msg) => writer.send_json(&msg).await?,
        }
    }
    writer.close().await;
    Ok(())
}

async fn recvloop<R: WsSource>(task: Arc<Task>, reader: &mut R) -> Result<(), ShellbusError> {
    loop {
        match reader.recv_message().await {
            Some(msg) => task.output.send(msg),
            None => break,
        }
    }
    Ok(())
}

#[async_trait]
impl<W: WsSink + 'static, R: WsSource + 'static> Runnable for WebSocketTask<W, R> {
    async fn run(&self, task: Arc<Task>) -> Result<(), ShellbusError> {
        let mut writer = self.writer.lock().await;
        let mut reader = self.reader.lock().await;

        let send_task = Arc::clone(&task);
        let recv_task = Arc::clone(&task);

        let result = tokio::select! {
            r = sendloop(send_task, &mut *writer) => r,
            r = recvloop(recv_task, &mut *reader) => r,
        };

        task.input.close();
        task.output.close();
        result
    }

    async fn stop(&self, task: &Task) {
        task.input.close();
    }
}

/// [`WsSink`]/[`WsSource`] over `ws.rs`'s client-side `tokio-tungstenite`
/// wrapper — used by `client.rs` and anything else connecting out as a
/// WebSocket client.
pub struct ClientWriter(pub crate::ws::WsWriter);

#[async_trait]
impl WsSink for ClientWriter {
    async fn send_json(&mut self, msg: &Message) -> Result<(), ShellbusError> {
        let json =
            serde_json::to_string(msg).map_err(|e| ShellbusError::DecodeError(e.to_string()))?;
        self.0
            .send_text(&json)
            .await
            .map_err(|e| ShellbusError::TransportError(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.0.send_close().await;
    }
}

pub struct ClientReader(pub crate::ws::WsReader);

#[async_trait]
impl WsSource for ClientReader {
    async fn recv_message(&mut self) -> Option<Message> {
        use crate::ws::WsMessage;
        loop {
            match self.0.recv().await {
                Some(Ok(WsMessage::Text(text))) => {
                    return Some(
                        serde_json::from_str(&text).unwrap_or_else(|_| Message::data(text)),
                    );
                }
                Some(Ok(WsMessage::Binary(bytes))) => return Some(Message::data(bytes)),
                Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => {}
                Some(Ok(WsMessage::Close { .. })) | None => return None,
                Some(Err(_)) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskManager;
    use std::sync::Mutex as StdMutex;

    struct MockSink(Arc<StdMutex<Vec<Message>>>);

    #[async_trait]
    impl WsSink for MockSink {
        async fn send_json(&mut self, msg: &Message) -> Result<(), ShellbusError> {
            self.0.lock().unwrap().push(msg.clone());
            Ok(())
        }
        async fn close(&mut self) {}
    }

    struct MockSource {
        queue: std::collections::VecDeque<Message>,
    }

    #[async_trait]
    impl WsSource for MockSource {
        async fn recv_message(&mut self) -> Option<Message> {
            self.queue.pop_front()
        }
    }

    #[tokio::test]
    async fn outbound_task_input_is_framed_onto_the_sink() {
        let manager: &'static TaskManager = Box::leak(Box::new(TaskManager::new()));
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let task = manager.spawn(Arc::new(WebSocketTask::new(
            MockSink(sent.clone()),
            MockSource {
                queue: std::collections::VecDeque::new(),
            },
        )));
        task.input.write("hi");
        task.input.close();
        task.wait().await;
        assert_eq!(sent.lock().unwrap().as_slice(), &[Message::data("hi")]);
    }

    #[tokio::test]
    async fn inbound_frames_land_on_task_output() {
        let manager: &'static TaskManager = Box::leak(Box::new(TaskManager::new()));
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(Message::data("from client"));
        let task = manager.spawn(Arc::new(WebSocketTask::new(
            MockSink(Arc::new(StdMutex::new(Vec::new()))),
            MockSource { queue },
        )));
        let mut out = task.output.watch();
        assert_eq!(out.recv().await, Some(Message::data("from client")));
    }
}
