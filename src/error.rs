//! Shared error type for the core fabric (channel/task/pty/ssh/websocket).
//!
//! A hand-written enum with a manual `Display`/`Error` impl, matching the
//! style the rest of the stack uses for its own error types rather than
//! reaching for a derive macro.

/// Errors surfaced by the channel/task/pty/ssh/websocket fabric.
#[derive(Debug, Clone)]
pub enum ShellbusError {
    /// The channel or subscriber was closed.
    ChannelClosed,
    /// The underlying transport (socket, pty, ssh session) failed.
    TransportError(String),
    /// A message could not be decoded into the expected shape.
    DecodeError(String),
    /// The child process exited.
    ChildExited(i32),
    /// A `Runnable` returned an error from `run`.
    RunnableFault(String),
    /// An operation was attempted in a state that doesn't support it
    /// (e.g. `stop` on a task that never started).
    InvalidState(String),
}

impl std::fmt::Display for ShellbusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ChannelClosed => write!(f, "channel closed"),
            Self::TransportError(msg) => write!(f, "transport error: {msg}"),
            Self::DecodeError(msg) => write!(f, "decode error: {msg}"),
            Self::ChildExited(code) => write!(f, "child exited with status {code}"),
            Self::RunnableFault(msg) => write!(f, "runnable failed: {msg}"),
            Self::InvalidState(msg) => write!(f, "invalid state: {msg}"),
        }
    }
}

impl std::error::Error for ShellbusError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_expected_shapes() {
        assert_eq!(ShellbusError::ChannelClosed.to_string(), "channel closed");
        assert_eq!(
            ShellbusError::ChildExited(137).to_string(),
            "child exited with status 137"
        );
    }
}
