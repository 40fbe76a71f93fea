//! Application-wide constants.
//!
//! Centralizes the timeouts and buffer sizes that would otherwise be
//! scattered magic numbers across `pty.rs`, `ssh.rs`, `client.rs`, and
//! `main.rs`.

use std::time::Duration;

// ============================================================================
// Identity
// ============================================================================

/// User-Agent-equivalent string reported in log lines identifying this
/// binary's version.
pub fn user_agent() -> String {
    format!("shellbus/{}", env!("CARGO_PKG_VERSION"))
}

// ============================================================================
// Timeouts
// ============================================================================

/// How long the `stop` subcommand waits for a signaled server process to
/// exit before giving up and returning anyway.
pub const GRACEFUL_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// WebSocket handshake / connect timeout for the interactive client.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Buffer sizes
// ============================================================================

/// Read chunk size for `PtyProcess`'s blocking pty reader loop.
pub const PTY_READ_CHUNK: usize = 4096;

/// Default terminal dimensions for a freshly spawned `PtyProcess` or
/// `SshTask` before the first client-reported resize arrives.
pub const DEFAULT_ROWS: u16 = 24;
pub const DEFAULT_COLS: u16 = 80;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_values_are_reasonable() {
        assert!(CONNECT_TIMEOUT >= Duration::from_secs(5));
        assert!(GRACEFUL_STOP_TIMEOUT <= Duration::from_secs(30));
    }
}
