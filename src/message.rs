//! The tagged message record carried on every [`crate::channel::Channel`].
//!
//! Wire shapes (spec'd in SPEC_FULL.md §3/§6):
//!
//! ```text
//! {"data": "<str>"}                        payload from/to the session
//! {"error": "<str>"}                       stderr or error payload
//! {"resize": {"width": N, "height": M}}    terminal window resize
//! {"close": true}                          orderly termination request
//! ```
//!
//! Any other shape round-trips through [`Message::Other`] unchanged, so a
//! future tag a peer sends is never dropped.

use serde::{Deserialize, Serialize};

/// A `data`/`error` payload. Text is carried as a UTF-8 string (the common
/// case: shell output, JSON protocol chatter); `Bytes` is available for
/// producers that already have raw bytes (e.g. `PtyProcess`'s pty reads)
/// and don't want to pay for a lossy UTF-8 round trip before it's needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Bytes(Vec<u8>),
}

impl Payload {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(s) => s.as_bytes(),
            Self::Bytes(b) => b,
        }
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Text(s) => s.into_bytes(),
            Self::Bytes(b) => b,
        }
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

/// Terminal window dimensions carried by a `resize` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u16,
    pub height: u16,
}

/// The universal unit carried on a [`crate::channel::Channel`].
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Payload from/to the session.
    Data(Payload),
    /// Stderr or error payload.
    Error(Payload),
    /// Client-initiated terminal resize.
    Resize(Size),
    /// Orderly termination signal. Wire-level only: internally, closure is
    /// carried by the channel's own `closed` flag rather than a sentinel
    /// message flowing through `send`/`recv`.
    Close,
    /// An unrecognized but well-formed JSON object — preserved opaquely for
    /// forward compatibility.
    Other(serde_json::Value),
}

impl Message {
    #[must_use]
    pub fn data(payload: impl Into<Payload>) -> Self {
        Self::Data(payload.into())
    }

    #[must_use]
    pub fn error(payload: impl Into<Payload>) -> Self {
        Self::Error(payload.into())
    }

    #[must_use]
    pub fn resize(width: u16, height: u16) -> Self {
        Self::Resize(Size { width, height })
    }

    /// The `data` payload, if this is a `Data` message.
    #[must_use]
    pub fn as_data(&self) -> Option<&Payload> {
        match self {
            Self::Data(p) => Some(p),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_data(self) -> Option<Payload> {
        match self {
            Self::Data(p) => Some(p),
            _ => None,
        }
    }
}

/// Wire-format mirror of [`Message`], used only at the serde boundary.
///
/// `Message` itself is not `#[derive(Serialize, Deserialize)]` because its
/// `Other` variant needs untagged passthrough while the rest need the
/// specific tagged shapes above; `serde(untagged)` on a direct derive would
/// make `Resize`/`Close` ambiguous with `Other`, so the mapping is written
/// by hand instead.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum Wire {
    Data { data: String },
    Error { error: String },
    Resize { resize: Size },
    Close { close: bool },
    Other(serde_json::Value),
}

impl Serialize for Message {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Data(p) => Wire::Data {
                data: String::from_utf8_lossy(p.as_bytes()).into_owned(),
            }
            .serialize(serializer),
            Self::Error(p) => Wire::Error {
                error: String::from_utf8_lossy(p.as_bytes()).into_owned(),
            }
            .serialize(serializer),
            Self::Resize(size) => Wire::Resize { resize: *size }.serialize(serializer),
            Self::Close => Wire::Close { close: true }.serialize(serializer),
            Self::Other(v) => v.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = Wire::deserialize(deserializer)?;
        Ok(match wire {
            Wire::Data { data } => Self::Data(Payload::Text(data)),
            Wire::Error { error } => Self::Error(Payload::Text(error)),
            Wire::Resize { resize } => Self::Resize(resize),
            Wire::Close { .. } => Self::Close,
            Wire::Other(v) => Self::Other(v),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(msg: &Message) -> Message {
        let json = serde_json::to_string(msg).unwrap();
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn data_round_trips() {
        let msg = Message::data("hello");
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn error_round_trips() {
        let msg = Message::error("boom");
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn resize_round_trips() {
        let msg = Message::resize(80, 24);
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn close_round_trips() {
        let msg = Message::Close;
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn unrecognized_shape_is_preserved_opaquely() {
        let json = r#"{"ping": 42}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg, Message::Other(serde_json::json!({"ping": 42})));
        assert_eq!(serde_json::to_string(&msg).unwrap(), json);
    }

    #[test]
    fn data_wire_shape_matches_protocol() {
        let msg = Message::data("x");
        assert_eq!(serde_json::to_string(&msg).unwrap(), r#"{"data":"x"}"#);
    }

    #[test]
    fn resize_wire_shape_matches_protocol() {
        let msg = Message::resize(80, 24);
        assert_eq!(
            serde_json::to_string(&msg).unwrap(),
            r#"{"resize":{"width":80,"height":24}}"#
        );
    }
}
