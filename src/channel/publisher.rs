//! Fan-out primitive underlying [`super::Channel`].
//!
//! Mirrors the `Publisher`/`Subscriber` pair from the original `kitsh`
//! `inout` module: a `Publisher` holds the strong references to every
//! attached `Subscriber`; a `Subscriber` holds only a detach handle back to
//! its publisher, breaking the reference cycle the Python original avoided
//! with weak callables (see Design Note in SPEC_FULL.md §9).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::message::Message;

static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(0);

/// Per-observer queue attached to a [`Publisher`].
///
/// Created attached; released on explicit [`Subscriber::close`], on the
/// publisher closing, or when dropped without an explicit close (the `Drop`
/// impl detaches, matching the Python `__del__`).
pub struct Subscriber {
    id: u64,
    rx: mpsc::UnboundedReceiver<Message>,
    detach: DetachHandle,
    closed: bool,
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("closed", &self.closed)
            .finish()
    }
}

/// Detach-only back-reference a `Subscriber` holds to its `Publisher`.
///
/// Keeping this separate from a strong `Arc<Publisher>` is what breaks the
/// `Publisher` <-> `Subscriber` reference cycle: the publisher owns its
/// subscribers' senders; a subscriber only needs to ask to be removed.
#[derive(Clone)]
struct DetachHandle(Arc<PublisherInner>);

impl Subscriber {
    fn new(id: u64, rx: mpsc::UnboundedReceiver<Message>, detach: DetachHandle) -> Self {
        Self {
            id,
            rx,
            detach,
            closed: false,
        }
    }

    /// This subscriber's slot in its publisher's set, used by
    /// [`super::Channel::watch`] to replay a backlog to exactly this
    /// subscriber without fanning it out to everyone else too.
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Receive the next message, or `None` once the subscriber is closed.
    pub async fn recv(&mut self) -> Option<Message> {
        if self.closed {
            return None;
        }
        match self.rx.recv().await {
            Some(msg) => Some(msg),
            None => {
                self.closed = true;
                None
            }
        }
    }

    /// Detach from the publisher and stop receiving further messages.
    ///
    /// Idempotent.
    pub fn close(&mut self) {
        if !self.closed {
            self.detach.0.detach(self.id);
            self.rx.close();
            self.closed = true;
        }
    }

    /// Whether this subscriber has been detached.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Wrap this subscriber in a [`crate::datastream::DataStream`].
    #[must_use]
    pub fn datastream(self) -> crate::datastream::DataStream {
        crate::datastream::DataStream::from_subscriber(self)
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.close();
    }
}

struct PublisherInner {
    subs: Mutex<HashMap<u64, mpsc::UnboundedSender<Message>>>,
}

impl PublisherInner {
    fn detach(&self, id: u64) {
        self.subs.lock().expect("publisher lock poisoned").remove(&id);
    }
}

/// Unordered set of subscribers; `send` fans a message out to a snapshot of
/// the attached set at send time (newly attached subscribers never see
/// in-flight sends that raced their `attach`).
pub struct Publisher {
    inner: Arc<PublisherInner>,
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("subscriber_count", &self.len())
            .finish()
    }
}

impl Default for Publisher {
    fn default() -> Self {
        Self::new()
    }
}

impl Publisher {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(PublisherInner {
                subs: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Number of currently attached subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.subs.lock().expect("publisher lock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attach a new subscriber.
    pub fn subscribe(&self) -> Subscriber {
        let id = NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .subs
            .lock()
            .expect("publisher lock poisoned")
            .insert(id, tx);
        Subscriber::new(id, rx, DetachHandle(Arc::clone(&self.inner)))
    }

    /// Send `msg` to every currently attached subscriber.
    ///
    /// Iterates a snapshot of the attached set; subscribers attached during
    /// this call do not receive it.
    pub fn send(&self, msg: Message) {
        let snapshot: Vec<mpsc::UnboundedSender<Message>> = self
            .inner
            .subs
            .lock()
            .expect("publisher lock poisoned")
            .values()
            .cloned()
            .collect();
        for tx in snapshot {
            // A send error means the subscriber side was dropped; it will
            // detach itself on drop, so this is not an error here.
            let _ = tx.send(msg.clone());
        }
    }

    /// Send `msg` to one specific subscriber, identified by [`Subscriber::id`].
    ///
    /// Used by [`super::Channel::watch`] to replay a buffered backlog to the
    /// subscriber that just attached, without it reaching anyone else.
    pub(crate) fn send_to(&self, id: u64, msg: Message) {
        if let Some(tx) = self.inner.subs.lock().expect("publisher lock poisoned").get(&id) {
            let _ = tx.send(msg);
        }
    }

    /// Send the close sentinel to every attached subscriber and clear the set.
    pub fn close(&self) {
        self.send(Message::Close);
        self.inner.subs.lock().expect("publisher lock poisoned").clear();
    }
}
