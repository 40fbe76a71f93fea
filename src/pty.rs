//! Child process attached to a pseudo-terminal, exposed as a [`Runnable`].
//!
//! A [`PtyProcess`] spawns a command under a `portable-pty` master/slave
//! pair and bridges its bytes onto a [`Task`]'s input/output channels.
//! `portable-pty`'s read/write handles are blocking, so the reader and
//! writer are each driven from `tokio::task::spawn_blocking` rather than
//! polled directly on the async runtime.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};

use crate::constants::{DEFAULT_COLS, DEFAULT_ROWS, PTY_READ_CHUNK};
use crate::error::ShellbusError;
use crate::message::Message;
use crate::task::{Runnable, Task};

/// What to run and where, mirroring `kitsh.core.process.Process`'s
/// constructor arguments.
#[derive(Debug, Clone)]
pub struct PtyProcessConfig {
    pub command: String,
    pub cwd: PathBuf,
    pub env: HashMap<String, String>,
    pub rows: u16,
    pub cols: u16,
}

impl Default for PtyProcessConfig {
    fn default() -> Self {
        Self {
            command: default_shell(),
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env: HashMap::new(),
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
        }
    }
}

fn default_shell() -> String {
    std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
}

fn build_command(command_str: &str, cwd: &Path, env: &HashMap<String, String>) -> CommandBuilder {
    let parts: Vec<&str> = command_str.split_whitespace().collect();
    let mut cmd = CommandBuilder::new(parts.first().copied().unwrap_or("/bin/sh"));
    for arg in &parts[1..] {
        cmd.arg(arg);
    }
    cmd.cwd(cwd);
    for (key, value) in env {
        cmd.env(key, value);
    }
    cmd
}

/// A command running under a pty, wired up as a [`Runnable`].
///
/// `run` drives both the output-reader and input-writer loops and doesn't
/// return until the child exits or the task's input channel closes.
pub struct PtyProcess {
    config: PtyProcessConfig,
    master: Arc<Mutex<Option<Box<dyn MasterPty + Send>>>>,
}

impl std::fmt::Debug for PtyProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtyProcess")
            .field("command", &self.config.command)
            .finish()
    }
}

impl PtyProcess {
    #[must_use]
    pub fn new(config: PtyProcessConfig) -> Self {
        Self {
            config,
            master: Arc::new(Mutex::new(None)),
        }
    }

    /// Resize the pty. A no-op before the process has started.
    pub fn resize(&self, rows: u16, cols: u16) -> Result<(), ShellbusError> {
        let guard = self.master.lock().expect("pty master lock poisoned");
        if let Some(master) = guard.as_ref() {
            master
                .resize(PtySize {
                    rows,
                    cols,
                    pixel_width: 0,
                    pixel_height: 0,
                })
                .map_err(|e| ShellbusError::TransportError(e.to_string()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl Runnable for PtyProcess {
    async fn run(&self, task: Arc<Task>) -> Result<(), ShellbusError> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: self.config.rows,
                cols: self.config.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| ShellbusError::TransportError(e.to_string()))?;

        let cmd = build_command(&self.config.command, &self.config.cwd, &self.config.env);
        let mut child: Box<dyn Child + Send + Sync> = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| ShellbusError::TransportError(e.to_string()))?;
        drop(pair.slave);

        *self.master.lock().expect("pty master lock poisoned") = Some(pair.master);
        let master_for_writer = {
            let guard = self.master.lock().expect("pty master lock poisoned");
            guard.as_ref().expect("just set").take_writer()
        }
        .map_err(|e| ShellbusError::TransportError(e.to_string()))?;

        let reader = {
            let guard = self.master.lock().expect("pty master lock poisoned");
            guard.as_ref().expect("just set").try_clone_reader()
        }
        .map_err(|e| ShellbusError::TransportError(e.to_string()))?;

        let reader_task = task.clone();
        let reader_handle = tokio::task::spawn_blocking(move || {
            let mut reader = reader;
            let mut buf = [0u8; PTY_READ_CHUNK];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => reader_task.output.send(Message::data(buf[..n].to_vec())),
                }
            }
        });

        let writer_task = task.clone();
        let master_for_resize = Arc::clone(&self.master);
        let writer_handle = tokio::task::spawn_blocking(move || {
            let mut writer = master_for_writer;
            let rt = tokio::runtime::Handle::current();
            let mut input = writer_task.input.watch();
            loop {
                let msg = rt.block_on(input.recv());
                match msg {
                    Some(Message::Data(payload)) => {
                        if writer.write_all(payload.as_bytes()).is_err() {
                            break;
                        }
                    }
                    Some(Message::Resize(size)) => {
                        let guard = master_for_resize.lock().expect("pty master lock poisoned");
                        if let Some(master) = guard.as_ref() {
                            let _ = master.resize(PtySize {
                                rows: size.height,
                                cols: size.width,
                                pixel_width: 0,
                                pixel_height: 0,
                            });
                        }
                    }
                    Some(Message::Close) | None => break,
                    Some(_) => {}
                }
            }
        });

        let exit_status = tokio::task::spawn_blocking(move || child.wait())
            .await
            .map_err(|e| ShellbusError::TransportError(e.to_string()))?
            .map_err(|e| ShellbusError::TransportError(e.to_string()))?;

        task.input.close();
        let _ = reader_handle.await;
        writer_handle.abort();

        task.output.close();

        if exit_status.success() {
            Ok(())
        } else {
            Err(ShellbusError::ChildExited(exit_status.exit_code() as i32))
        }
    }

    async fn stop(&self, task: &Task) {
        task.input.close();
    }
}
