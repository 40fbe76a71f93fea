//! Server/client configuration loading and persistence.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|d| d.join("shellbus"))
        .context("could not determine config directory")
}

fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.json"))
}

fn default_pidfile_path() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("shellbus.pid")
}

/// Persisted and CLI-overridable configuration for the `serve`/`connect`
/// subcommands.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Config {
    /// Host the server binds to.
    pub host: String,
    /// Port the server binds to.
    pub port: u16,
    /// Shell command spawned for a fresh local session (e.g. `/bin/bash -l`).
    pub shell_command: String,
    /// Lines of scrollback a client should keep locally.
    pub scrollback: usize,
    /// Path to the pidfile written by `serve` and checked by `stop`.
    pub pidfile: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7890,
            shell_command: std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string()),
            scrollback: 10_000,
            pidfile: default_pidfile_path(),
        }
    }
}

impl Config {
    /// Load from the config file, falling back to defaults for anything
    /// absent (including when the file itself does not exist).
    pub fn load() -> Result<Self> {
        let path = config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file at {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("failed to parse config file at {}", path.display()))
    }

    /// Persist to the config file, creating its parent directory if needed.
    pub fn save(&self) -> Result<()> {
        let dir = config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
        let path = config_path()?;
        let data = serde_json::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(&path, data)
            .with_context(|| format!("failed to write config file at {}", path.display()))
    }
}
