//! A typed, closable message bus with fan-out.
//!
//! A [`Channel`] starts in buffered mode: every [`Channel::send`] is queued
//! internally until something calls [`Channel::watch`]. The first watcher
//! drains that backlog before anything else is delivered to it. Once at
//! least one watcher is attached, the channel switches to fan-out mode and
//! `send` pushes straight out to every attached [`Subscriber`] instead of
//! buffering.

pub mod publisher;

use std::collections::VecDeque;
use std::sync::Mutex;

pub use publisher::{Publisher, Subscriber};

use crate::message::{Message, Payload};

struct ChannelInner {
    backlog: VecDeque<Message>,
    closed: bool,
}

/// See the module documentation for the buffered/fan-out semantics.
pub struct Channel {
    inner: Mutex<ChannelInner>,
    publisher: Publisher,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().expect("channel lock poisoned");
        f.debug_struct("Channel")
            .field("backlog_len", &inner.backlog.len())
            .field("closed", &inner.closed)
            .field("subscribers", &self.publisher.len())
            .finish()
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self::new()
    }
}

impl Channel {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ChannelInner {
                backlog: VecDeque::new(),
                closed: false,
            }),
            publisher: Publisher::new(),
        }
    }

    /// Send a message. Buffered while unwatched; fanned out to every
    /// attached subscriber once at least one exists.
    ///
    /// A no-op once the channel is closed.
    pub fn send(&self, msg: Message) {
        let mut inner = self.inner.lock().expect("channel lock poisoned");
        if inner.closed {
            return;
        }
        if self.publisher.is_empty() {
            inner.backlog.push_back(msg);
        } else {
            drop(inner);
            self.publisher.send(msg);
        }
    }

    /// Convenience for `send(Message::data(payload))`.
    pub fn write(&self, payload: impl Into<Payload>) {
        self.send(Message::data(payload));
    }

    /// Attach a new subscriber.
    ///
    /// If this is the first subscriber and messages were buffered before
    /// any watcher existed, they are replayed to it — in order, before any
    /// new message can reach it — and the channel switches to fan-out mode
    /// for everything after.
    pub fn watch(&self) -> Subscriber {
        let mut inner = self.inner.lock().expect("channel lock poisoned");
        let backlog = std::mem::take(&mut inner.backlog);
        let was_closed = inner.closed;
        drop(inner);

        let sub = self.publisher.subscribe();
        for msg in backlog {
            self.publisher.send_to(sub.id(), msg);
        }
        if was_closed {
            self.publisher.send_to(sub.id(), Message::Close);
        }
        sub
    }

    /// Shorthand for `watch().datastream()`.
    #[must_use]
    pub fn datastream(&self) -> crate::datastream::DataStream {
        self.watch().datastream()
    }

    /// Close the channel: any attached subscribers get a final `Close`
    /// message, future `send`s are dropped, and future `watch`ers get an
    /// immediate `Close` with no further messages.
    pub fn close(&self) {
        let mut inner = self.inner.lock().expect("channel lock poisoned");
        if inner.closed {
            return;
        }
        inner.closed = true;
        inner.backlog.clear();
        drop(inner);
        self.publisher.close();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().expect("channel lock poisoned").closed
    }

    /// Number of messages currently buffered (always 0 once any subscriber
    /// has attached).
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("channel lock poisoned").backlog.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn buffers_until_first_watch_then_replays_in_order() {
        let ch = Channel::new();
        ch.write("one");
        ch.write("two");

        let mut sub = ch.watch();
        assert_eq!(sub.recv().await, Some(Message::data("one")));
        assert_eq!(sub.recv().await, Some(Message::data("two")));
    }

    #[tokio::test]
    async fn switches_to_fan_out_once_watched() {
        let ch = Channel::new();
        let mut first = ch.watch();
        ch.write("hello");
        assert_eq!(first.recv().await, Some(Message::data("hello")));

        let mut second = ch.watch();
        ch.write("world");
        assert_eq!(first.recv().await, Some(Message::data("world")));
        assert_eq!(second.recv().await, Some(Message::data("world")));
    }

    #[tokio::test]
    async fn second_watcher_does_not_see_messages_sent_before_it_attached() {
        let ch = Channel::new();
        let _first = ch.watch();
        ch.write("already fanned out");
        let mut second = ch.watch();
        ch.write("new");
        assert_eq!(second.recv().await, Some(Message::data("new")));
    }

    #[tokio::test]
    async fn close_delivers_close_to_existing_subscribers() {
        let ch = Channel::new();
        let mut sub = ch.watch();
        ch.close();
        assert_eq!(sub.recv().await, Some(Message::Close));
    }

    #[tokio::test]
    async fn watching_after_close_yields_immediate_close() {
        let ch = Channel::new();
        ch.close();
        let mut sub = ch.watch();
        assert_eq!(sub.recv().await, Some(Message::Close));
    }

    #[tokio::test]
    async fn send_after_close_is_dropped() {
        let ch = Channel::new();
        let mut sub = ch.watch();
        ch.close();
        ch.write("too late");
        assert_eq!(sub.recv().await, Some(Message::Close));
    }

    #[test]
    fn unwatched_sends_are_buffered() {
        let ch = Channel::new();
        ch.write("a");
        ch.write("b");
        assert_eq!(ch.len(), 2);
    }
}
