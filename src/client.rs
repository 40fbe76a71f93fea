//! Reference interactive terminal client.
//!
//! Connects to a running server, puts the local terminal into raw mode,
//! and pumps stdin to the remote session while rendering whatever comes
//! back — the Rust mirror of `kitsh.client.invoke_shell`: resize on
//! connect, re-resize on `SIGWINCH`-equivalent terminal resize events,
//! stdin forwarded as `{data}` messages, inbound `{data}`/`{error}`
//! rendered to stdout/stderr.

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{Event, EventStream};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use futures_util::StreamExt;

use crate::constants::{CONNECT_TIMEOUT, DEFAULT_COLS, DEFAULT_ROWS};
use crate::message::{Message, Payload};
use crate::ws::{self, WsMessage};

/// Connect to `url` and drive an interactive session on the current
/// terminal until the connection closes or the user disconnects.
pub async fn invoke_shell(url: &str) -> Result<()> {
    let (writer, mut reader) = tokio::time::timeout(CONNECT_TIMEOUT, ws::connect(url, &[]))
        .await
        .with_context(|| format!("timed out connecting to {url}"))?
        .with_context(|| format!("failed to connect to {url}"))?;
    let mut writer = writer;

    let (cols, rows) = crossterm::terminal::size().unwrap_or((DEFAULT_COLS, DEFAULT_ROWS));
    send(&mut writer, Message::resize(cols, rows)).await?;

    enable_raw_mode().context("failed to enable terminal raw mode")?;
    let result = run_loop(&mut writer, &mut reader).await;
    let _ = disable_raw_mode();
    result
}

async fn run_loop(writer: &mut ws::WsWriter, reader: &mut ws::WsReader) -> Result<()> {
    let mut events = EventStream::new();
    let mut stdout = std::io::stdout();

    loop {
        tokio::select! {
            inbound = reader.recv() => {
                match inbound {
                    Some(Ok(WsMessage::Text(text))) => {
                        match serde_json::from_str::<Message>(&text) {
                            Ok(Message::Data(payload)) => write_payload(&mut stdout, &payload)?,
                            Ok(Message::Error(payload)) => write_payload(&mut stdout, &payload)?,
                            Ok(Message::Close) | Err(_) => {}
                            Ok(_) => {}
                        }
                    }
                    Some(Ok(WsMessage::Binary(bytes))) => {
                        stdout.write_all(&bytes)?;
                        stdout.flush()?;
                    }
                    Some(Ok(WsMessage::Close { .. })) | None => return Ok(()),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e),
                }
            }
            maybe_event = events.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) => {
                        if let Some(bytes) = encode_key(&key) {
                            send(writer, Message::data(bytes)).await?;
                        }
                    }
                    Some(Ok(Event::Resize(cols, rows))) => {
                        send(writer, Message::resize(cols, rows)).await?;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => return Ok(()),
                }
            }
            () = tokio::time::sleep(Duration::from_secs(30)) => {
                // Idle tick: nothing to do, just keeps the select loop from
                // starving if both streams go quiet for a long time.
            }
        }
    }
}

fn write_payload(stdout: &mut impl Write, payload: &Payload) -> Result<()> {
    stdout.write_all(payload.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

async fn send(writer: &mut ws::WsWriter, msg: Message) -> Result<()> {
    let json = serde_json::to_string(&msg)?;
    writer.send_text(&json).await
}

fn encode_key(key: &crossterm::event::KeyEvent) -> Option<Vec<u8>> {
    use crossterm::event::{KeyCode, KeyModifiers};
    match key.code {
        KeyCode::Char(c) if key.modifiers.contains(KeyModifiers::CONTROL) => {
            let byte = (c.to_ascii_uppercase() as u8).wrapping_sub(b'A').wrapping_add(1);
            Some(vec![byte])
        }
        KeyCode::Char(c) => Some(c.to_string().into_bytes()),
        KeyCode::Enter => Some(vec![b'\r']),
        KeyCode::Backspace => Some(vec![0x7f]),
        KeyCode::Tab => Some(vec![b'\t']),
        KeyCode::Esc => Some(vec![0x1b]),
        KeyCode::Up => Some(b"\x1b[A".to_vec()),
        KeyCode::Down => Some(b"\x1b[B".to_vec()),
        KeyCode::Right => Some(b"\x1b[C".to_vec()),
        KeyCode::Left => Some(b"\x1b[D".to_vec()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    #[test]
    fn ctrl_c_encodes_to_0x03() {
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(encode_key(&key), Some(vec![0x03]));
    }

    #[test]
    fn plain_char_encodes_to_its_utf8_bytes() {
        let key = KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE);
        assert_eq!(encode_key(&key), Some(b"a".to_vec()));
    }

    #[test]
    fn enter_encodes_to_carriage_return() {
        let key = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(encode_key(&key), Some(vec![b'\r']));
    }
}
