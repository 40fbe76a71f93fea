//! HTTP collaborator: the `GET /websocket` WebSocket upgrade endpoint.
//!
//! This is the one piece of HTTP routing the core fabric owns — wiring an
//! upgraded socket to a fresh [`crate::pty::PtyProcess`] via a
//! [`crate::bridge::TaskBridge`]. Everything else an HTTP frontend might
//! want (page rendering, auth, static assets) is explicitly out of scope.

pub mod http;

pub use http::{router, ServerState};
