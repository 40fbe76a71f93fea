//! Byte-oriented view over a [`crate::channel::Channel`]'s `data` messages.
//!
//! Where [`crate::channel::Channel`] deals in discrete [`crate::message::Message`]
//! values, `DataStream` flattens the `data` payloads of a subscription into
//! a single byte buffer and offers `read`/`readline`-style draws across
//! message boundaries — mirroring `kitsh`'s `inout.DataStream`, which exists
//! so a `Task`'s stdin/stdout can be treated like a plain file object by
//! code that doesn't care about the message framing underneath.

use crate::channel::Subscriber;
use crate::message::Message;

/// A pull-based byte stream backed by a [`Subscriber`].
///
/// `Error` and `Resize` messages on the underlying subscription are
/// skipped; only `Data` payloads contribute bytes. A `Close` message ends
/// the stream.
#[derive(Debug)]
pub struct DataStream {
    sub: Subscriber,
    buf: Vec<u8>,
    eof: bool,
}

impl DataStream {
    #[must_use]
    pub fn from_subscriber(sub: Subscriber) -> Self {
        Self {
            sub,
            buf: Vec::new(),
            eof: false,
        }
    }

    /// Pull from the subscriber until at least one byte is buffered or the
    /// stream ends.
    async fn fill(&mut self) {
        while self.buf.is_empty() && !self.eof {
            match self.sub.recv().await {
                Some(Message::Data(payload)) => self.buf.extend_from_slice(payload.as_bytes()),
                Some(Message::Close) | None => self.eof = true,
                // Error/Resize/Other messages carry no stream bytes.
                Some(_) => {}
            }
        }
    }

    /// Read up to `maxbytes`, or fewer if the stream ends first. Returns an
    /// empty vector once the stream is exhausted.
    pub async fn read(&mut self, maxbytes: usize) -> Vec<u8> {
        if maxbytes == 0 {
            return Vec::new();
        }
        self.fill().await;
        let take = maxbytes.min(self.buf.len());
        self.buf.drain(..take).collect()
    }

    /// Read until `newline` is seen, with the newline itself stripped, or
    /// until the stream ends. Returns `None` once there is nothing left to
    /// read.
    pub async fn readline(&mut self, newline: u8) -> Option<Vec<u8>> {
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == newline) {
                let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
                line.pop();
                return Some(line);
            }
            if self.eof {
                return if self.buf.is_empty() {
                    None
                } else {
                    Some(std::mem::take(&mut self.buf))
                };
            }
            match self.sub.recv().await {
                Some(Message::Data(payload)) => self.buf.extend_from_slice(payload.as_bytes()),
                Some(Message::Close) | None => self.eof = true,
                Some(_) => {}
            }
        }
    }

    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.eof && self.buf.is_empty()
    }
}
