//! Command-line surface: `shellbus serve` and `shellbus connect`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "shellbus", version, about = "Interactive shell sessions over a message channel")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the server, accepting WebSocket connections and spawning a
    /// `PtyProcess` per session.
    Serve {
        /// Host to bind to.
        #[arg(long)]
        host: Option<String>,
        /// Port to bind to.
        #[arg(long)]
        port: Option<u16>,
        /// Shell command to run for each incoming session.
        #[arg(long)]
        shell: Option<String>,
        /// Path to the pidfile to hold for the life of the server.
        #[arg(long)]
        pidfile: Option<PathBuf>,
    },
    /// Connect to a running server as an interactive client.
    Connect {
        /// WebSocket URL of the server, e.g. `ws://127.0.0.1:7890/websocket`.
        url: String,
    },
    /// Stop a running server by reading its pidfile and sending SIGTERM.
    Stop {
        #[arg(long)]
        pidfile: Option<PathBuf>,
    },
}
