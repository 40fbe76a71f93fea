//! Cross-wiring two tasks' input/output channels.
//!
//! A [`TaskBridge`] pipes one task's `output` into another's `input`, and
//! vice versa — the mechanism a `WebSocketTask` and a `PtyProcess` use to
//! become one interactive session: the browser's keystrokes arrive on the
//! socket task's output and need to land on the pty task's input, and the
//! shell's output needs to flow back the other way.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::message::Message;
use crate::task::Task;

async fn forward(from: Arc<Task>, to: Arc<Task>) {
    let mut sub = from.output.watch();
    loop {
        match sub.recv().await {
            Some(Message::Close) | None => break,
            Some(msg) => to.input.send(msg),
        }
    }
}

/// Bridges two tasks together for the lifetime of this value; closes both
/// ends and aborts its forwarder tasks on drop.
#[derive(Debug)]
pub struct TaskBridge {
    a: Arc<Task>,
    b: Arc<Task>,
    a_to_b: JoinHandle<()>,
    b_to_a: JoinHandle<()>,
}

impl TaskBridge {
    #[must_use]
    pub fn new(a: Arc<Task>, b: Arc<Task>) -> Self {
        let a_to_b = tokio::spawn(forward(Arc::clone(&a), Arc::clone(&b)));
        let b_to_a = tokio::spawn(forward(Arc::clone(&b), Arc::clone(&a)));
        Self {
            a,
            b,
            a_to_b,
            b_to_a,
        }
    }

    /// Wait for both sides of the bridge to stop forwarding (i.e. until
    /// both tasks have closed their output channels).
    pub async fn wait(&mut self) {
        let _ = tokio::join!(&mut self.a_to_b, &mut self.b_to_a);
    }

    /// Tear the bridge down: stop both forwarders and close both tasks'
    /// channels.
    pub fn close(&mut self) {
        self.a_to_b.abort();
        self.b_to_a.abort();
        self.a.input.close();
        self.a.output.close();
        self.b.input.close();
        self.b.output.close();
    }
}

impl Drop for TaskBridge {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShellbusError;
    use crate::task::{Runnable, TaskManager};
    use async_trait::async_trait;

    /// Echoes whatever it reads on input back out on output, one message at
    /// a time, until input closes.
    struct Echo;

    #[async_trait]
    impl Runnable for Echo {
        async fn run(&self, task: Arc<Task>) -> Result<(), ShellbusError> {
            let mut sub = task.input.watch();
            loop {
                match sub.recv().await {
                    Some(Message::Close) | None => break,
                    Some(msg) => task.output.send(msg),
                }
            }
            task.output.close();
            Ok(())
        }
    }

    #[tokio::test]
    async fn bridged_tasks_relay_a_handshake() {
        let manager: &'static TaskManager = Box::leak(Box::new(TaskManager::new()));
        let a = manager.spawn(Arc::new(Echo));
        let b = manager.spawn(Arc::new(Echo));

        let mut bridge = TaskBridge::new(Arc::clone(&a), Arc::clone(&b));

        let mut observe_b_input = b.input.watch();
        a.input.write("ping");
        assert_eq!(observe_b_input.recv().await, Some(Message::data("ping")));

        let mut observe_a_input = a.input.watch();
        b.input.write("pong");
        assert_eq!(observe_a_input.recv().await, Some(Message::data("pong")));

        a.input.close();
        b.input.close();
        bridge.wait().await;

        drop(bridge);
        a.wait().await;
        b.wait().await;
        assert_eq!(manager.count(), 0);
    }
}
