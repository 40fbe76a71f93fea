//! Core fabric for interactive terminal-style sessions bridged to remote
//! clients over a message channel: a typed closable bus with fan-out
//! ([`channel`]), a supervised-task lifecycle ([`task`]), cross-wiring
//! between two tasks ([`bridge`]), and the session backends that plug into
//! it — a local pty ([`pty`]), a remote SSH session ([`ssh`]), and a
//! WebSocket frame codec ([`ws_task`]).

pub mod bridge;
pub mod channel;
pub mod cli;
pub mod client;
pub mod config;
pub mod constants;
pub mod datastream;
pub mod error;
pub mod message;
pub mod pidfile;
pub mod pty;
pub mod server;
pub mod ssh;
pub mod task;
pub mod ws;
pub mod ws_task;

pub use channel::Channel;
pub use config::Config;
pub use datastream::DataStream;
pub use error::ShellbusError;
pub use message::{Message, Payload};
pub use pty::PtyProcess;
pub use ssh::SshTask;
pub use task::{Runnable, Task, TaskManager, TaskState};
