//! A remote shell session over SSH, exposed as a [`Runnable`].
//!
//! `SshTask` is the remote-session counterpart to [`crate::pty::PtyProcess`]:
//! where `PtyProcess` attaches a local child to a pty, `SshTask` opens a
//! channel on an established `russh` session, requests a pty and shell (or
//! a specific remote command), and bridges that channel's bytes onto a
//! [`Task`]'s input/output exactly the way `PtyProcess` bridges a local
//! child's. Grounded on `kitsh.cmd.ssh.SSHTask`, which does the same thing
//! over paramiko: open a channel, request a pty, start a shell, then pump
//! bytes both ways until the channel closes.

use std::sync::Arc;

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::ChannelMsg;

use crate::constants::{DEFAULT_COLS, DEFAULT_ROWS};
use crate::error::ShellbusError;
use crate::message::Message;
use crate::task::{Runnable, Task};

/// Connection parameters for an `SshTask`.
///
/// Authentication is the caller's responsibility: build the already
/// `authenticate_*`'d [`Handle`] and pass it in. Credential handling is out
/// of scope here, same as the distilled contract this is built against.
#[derive(Debug, Clone)]
pub struct SshTaskConfig {
    /// Remote command to run, or `None` to start an interactive shell.
    pub command: Option<String>,
    pub rows: u16,
    pub cols: u16,
}

impl Default for SshTaskConfig {
    fn default() -> Self {
        Self {
            command: None,
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
        }
    }
}

struct NoCheckHandler;

impl client::Handler for NoCheckHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh_keys::key::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// A remote shell or command running over an SSH channel.
pub struct SshTask {
    session: Handle<NoCheckHandler>,
    config: SshTaskConfig,
}

impl std::fmt::Debug for SshTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshTask")
            .field("command", &self.config.command)
            .finish()
    }
}

impl SshTask {
    #[must_use]
    pub fn new(session: Handle<NoCheckHandler>, config: SshTaskConfig) -> Self {
        Self { session, config }
    }
}

#[async_trait]
impl Runnable for SshTask {
    async fn run(&self, task: Arc<Task>) -> Result<(), ShellbusError> {
        let mut channel = self
            .session
            .channel_open_session()
            .await
            .map_err(|e| ShellbusError::TransportError(e.to_string()))?;

        match &self.config.command {
            Some(cmd) => {
                channel
                    .exec(true, cmd.as_str())
                    .await
                    .map_err(|e| ShellbusError::TransportError(e.to_string()))?;
            }
            None => {
                channel
                    .request_pty(
                        false,
                        "xterm-256color",
                        u32::from(self.config.cols),
                        u32::from(self.config.rows),
                        0,
                        0,
                        &[],
                    )
                    .await
                    .map_err(|e| ShellbusError::TransportError(e.to_string()))?;
                channel
                    .request_shell(true)
                    .await
                    .map_err(|e| ShellbusError::TransportError(e.to_string()))?;
            }
        }

        let mut input = task.input.watch();
        let mut exit_code: u32 = 0;

        loop {
            tokio::select! {
                inbound = input.recv() => {
                    match inbound {
                        Some(Message::Data(payload)) => {
                            if channel.data(payload.as_bytes()).await.is_err() {
                                break;
                            }
                        }
                        Some(Message::Resize(size)) => {
                            let _ = channel
                                .window_change(u32::from(size.width), u32::from(size.height), 0, 0)
                                .await;
                        }
                        Some(Message::Close) | None => {
                            let _ = channel.eof().await;
                            break;
                        }
                        Some(_) => {}
                    }
                }
                msg = channel.wait() => {
                    match msg {
                        Some(ChannelMsg::Data { data }) => {
                            task.output.send(Message::data(data.to_vec()));
                        }
                        Some(ChannelMsg::ExtendedData { data, .. }) => {
                            task.output.send(Message::error(data.to_vec()));
                        }
                        Some(ChannelMsg::ExitStatus { exit_status }) => {
                            exit_code = exit_status;
                        }
                        Some(ChannelMsg::Eof | ChannelMsg::Close) | None => break,
                        Some(_) => {}
                    }
                }
            }
        }

        task.input.close();
        task.output.close();

        if exit_code == 0 {
            Ok(())
        } else {
            Err(ShellbusError::ChildExited(exit_code as i32))
        }
    }

    async fn stop(&self, task: &Task) {
        task.input.close();
    }
}
