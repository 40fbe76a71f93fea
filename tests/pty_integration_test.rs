//! End-to-end coverage of the core fabric's six headline scenarios:
//! channel single-producer/consumer, subscriber catch-up, `DataStream` line
//! splitting, explicit task I/O redirection, a bridge handshake that leaves
//! the task manager empty, and spawning a real child process under a pty.

use std::sync::Arc;

use shellbus::channel::Channel;
use shellbus::message::Message;
use shellbus::pty::{PtyProcess, PtyProcessConfig};
use shellbus::task::TaskManager;

fn fresh_manager() -> &'static TaskManager {
    Box::leak(Box::new(TaskManager::new()))
}

#[tokio::test]
async fn single_producer_single_consumer_sees_every_message_in_order() {
    let ch = Channel::new();
    let mut sub = ch.watch();
    for i in 0..5 {
        ch.write(format!("line {i}"));
    }
    for i in 0..5 {
        assert_eq!(sub.recv().await, Some(Message::data(format!("line {i}"))));
    }
}

#[tokio::test]
async fn subscriber_attaching_late_still_gets_the_backlog() {
    let ch = Channel::new();
    ch.write("buffered before anyone watched");
    let mut sub = ch.watch();
    assert_eq!(
        sub.recv().await,
        Some(Message::data("buffered before anyone watched"))
    );
}

#[tokio::test]
async fn datastream_splits_lines_across_several_sends() {
    let ch = Channel::new();
    let mut ds = ch.datastream();
    ch.write("partial line ");
    ch.write("completes here\nand a second line\n");
    assert_eq!(
        ds.readline(b'\n').await,
        Some(b"partial line completes here".to_vec())
    );
    assert_eq!(
        ds.readline(b'\n').await,
        Some(b"and a second line".to_vec())
    );
}

#[tokio::test]
async fn task_redirects_explicitly_through_input_and_output_channels() {
    use async_trait::async_trait;
    use shellbus::error::ShellbusError;
    use shellbus::task::{Runnable, Task};

    struct Uppercase;

    #[async_trait]
    impl Runnable for Uppercase {
        async fn run(&self, task: Arc<Task>) -> Result<(), ShellbusError> {
            let mut ds = task.input.datastream();
            let bytes = ds.read(1024).await;
            let upper = String::from_utf8_lossy(&bytes).to_uppercase();
            task.output.write(upper);
            Ok(())
        }
    }

    let manager = fresh_manager();
    let task = manager.spawn(Arc::new(Uppercase));
    let mut out = task.output.watch();
    task.input.write("hello");
    task.input.close();
    assert_eq!(out.recv().await, Some(Message::data("HELLO")));
    task.wait().await;
}

#[tokio::test]
async fn bridge_handshake_leaves_the_task_manager_empty() {
    use async_trait::async_trait;
    use shellbus::bridge::TaskBridge;
    use shellbus::error::ShellbusError;
    use shellbus::task::{Runnable, Task};

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

    let manager = fresh_manager();
    let a = manager.spawn(Arc::new(Echo));
    let b = manager.spawn(Arc::new(Echo));

    let mut bridge = TaskBridge::new(Arc::clone(&a), Arc::clone(&b));
    let mut watch_b = b.input.watch();
    a.input.write("handshake");
    assert_eq!(watch_b.recv().await, Some(Message::data("handshake")));

    a.input.close();
    b.input.close();
    bridge.wait().await;
    drop(bridge);

    a.wait().await;
    b.wait().await;
    assert_eq!(manager.count(), 0);
}

#[tokio::test]
async fn pty_process_applies_a_resize_sent_before_any_data() {
    use shellbus::message::Message;
    use shellbus::task::Runnable;

    let manager = fresh_manager();
    let pty = PtyProcess::new(PtyProcessConfig {
        command: "cat".to_string(),
        ..PtyProcessConfig::default()
    });
    let task = manager.spawn(Arc::new(pty));
    let mut ds = task.output.watch().datastream();

    // Out-of-order resize: arrives before any data, per the edge policy in
    // §4.6 ("resize received before any data is applied"). The writer loop
    // must consume it without forwarding it to the child as bytes.
    task.input.send(Message::resize(100, 40));
    task.input.write("hello\n");

    let mut collected = Vec::new();
    while !collected.windows(5).any(|w| w == b"hello") {
        let chunk = ds.read(64).await;
        if chunk.is_empty() {
            break;
        }
        collected.extend_from_slice(&chunk);
    }
    assert!(collected.windows(5).any(|w| w == b"hello"));

    task.input.close();
    task.wait().await;
}

#[tokio::test]
async fn pty_process_spawns_a_real_child_and_captures_its_output() {
    use shellbus::task::Runnable;

    let manager = fresh_manager();
    let pty = PtyProcess::new(PtyProcessConfig {
        command: "ps -ax".to_string(),
        ..PtyProcessConfig::default()
    });
    let task = manager.spawn(Arc::new(pty));
    let mut ds = task.output.watch().datastream();

    let mut collected = Vec::new();
    loop {
        let chunk = ds.read(4096).await;
        if chunk.is_empty() {
            break;
        }
        collected.extend_from_slice(&chunk);
    }

    let output = String::from_utf8_lossy(&collected);
    assert!(output.contains("PID") || !output.is_empty());
    task.wait().await;
}
