//! Pidfile lifecycle for the `serve` subcommand.
//!
//! Writes the current process id to a file on startup and removes it when
//! the returned guard drops — via a `scopeguard::guard`, the same
//! "hold this for your lifetime, clean it up on the way out" pattern
//! [`crate::bridge::TaskBridge`] uses for its forwarder tasks.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use scopeguard::ScopeGuard;

/// Holds a pidfile for as long as it's alive; removes it on drop.
pub struct PidFile {
    guard: ScopeGuard<PathBuf, fn(PathBuf)>,
}

impl std::fmt::Debug for PidFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PidFile").field("path", &*self.guard).finish()
    }
}

fn remove_pidfile(path: PathBuf) {
    let _ = fs::remove_file(path);
}

impl PidFile {
    /// Write `std::process::id()` to `path`, refusing if a live process is
    /// already holding it.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(existing_pid) = read_pid(&path)? {
            if process_is_alive(existing_pid) {
                anyhow::bail!(
                    "another shellbus server (pid {existing_pid}) already holds {}",
                    path.display()
                );
            }
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create pidfile directory {}", parent.display()))?;
        }
        fs::write(&path, std::process::id().to_string())
            .with_context(|| format!("failed to write pidfile at {}", path.display()))?;
        Ok(Self {
            guard: scopeguard::guard(path, remove_pidfile),
        })
    }
}

fn read_pid(path: &Path) -> Result<Option<u32>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(contents.trim().parse().ok()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("failed to read pidfile at {}", path.display())),
    }
}

#[cfg(unix)]
fn process_is_alive(pid: u32) -> bool {
    // Signal 0 performs no actual signal delivery; it only validates that
    // a process with this pid exists and is signalable by us.
    unsafe { libc::kill(pid as i32, 0) == 0 }
}

#[cfg(not(unix))]
fn process_is_alive(_pid: u32) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_writes_current_pid_and_removes_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shellbus.pid");
        {
            let _guard = PidFile::create(&path).unwrap();
            let contents = fs::read_to_string(&path).unwrap();
            assert_eq!(contents.trim(), std::process::id().to_string());
        }
        assert!(!path.exists());
    }

    #[test]
    fn create_fails_when_a_live_process_holds_the_pidfile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shellbus.pid");
        fs::write(&path, std::process::id().to_string()).unwrap();
        assert!(PidFile::create(&path).is_err());
    }

    #[test]
    fn create_overwrites_a_stale_pidfile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shellbus.pid");
        // pid 999999 is not a real process in any test environment this runs in.
        fs::write(&path, "999999").unwrap();
        let guard = PidFile::create(&path);
        assert!(guard.is_ok());
    }
}
