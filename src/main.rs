//! `shellbus` binary entry point. See the `shellbus` library for the core
//! fabric (channel/task/pty/ssh/websocket).

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use shellbus::cli::{Cli, Command};
use shellbus::config::Config;
use shellbus::pidfile::PidFile;
use shellbus::server::{router, ServerState};
use shellbus::task::TaskManager;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve {
            host,
            port,
            shell,
            pidfile,
        } => serve(host, port, shell, pidfile).await,
        Command::Connect { url } => shellbus::client::invoke_shell(&url).await,
        Command::Stop { pidfile } => stop(pidfile).await,
    }
}

async fn serve(
    host: Option<String>,
    port: Option<u16>,
    shell: Option<String>,
    pidfile: Option<std::path::PathBuf>,
) -> Result<()> {
    let mut config = Config::load().unwrap_or_default();
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(shell) = shell {
        config.shell_command = shell;
    }
    if let Some(pidfile) = pidfile {
        config.pidfile = pidfile;
    }

    let _pidfile_guard = PidFile::create(&config.pidfile).context("failed to acquire pidfile")?;

    let shutdown = Arc::new(std::sync::atomic::AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            log::info!("shutdown requested");
            shutdown.store(true, std::sync::atomic::Ordering::SeqCst);
        })
        .context("failed to install Ctrl-C handler")?;
    }

    let addr = format!("{}:{}", config.host, config.port);
    log::info!("{} listening on {addr}", shellbus::constants::user_agent());

    let state = ServerState {
        config: Arc::new(config),
        tasks: TaskManager::global(),
    };
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let shutdown_signal = async move {
        while !shutdown.load(std::sync::atomic::Ordering::SeqCst) {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("server error")
}

async fn stop(pidfile: Option<std::path::PathBuf>) -> Result<()> {
    let config = Config::load().unwrap_or_default();
    let path = pidfile.unwrap_or(config.pidfile);
    let pid: i32 = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read pidfile at {}", path.display()))?
        .trim()
        .parse()
        .context("pidfile did not contain a valid pid")?;
    // SAFETY: kill(2) with a valid pid and SIGTERM performs no memory unsafety.
    let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
    if rc != 0 {
        anyhow::bail!("failed to signal pid {pid}: {}", std::io::Error::last_os_error());
    }
    log::info!("sent SIGTERM to pid {pid}, waiting for it to exit");

    let deadline = tokio::time::Instant::now() + shellbus::constants::GRACEFUL_STOP_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        // Signal 0 performs no actual signal delivery; it only validates
        // that a process with this pid still exists.
        let still_alive = unsafe { libc::kill(pid, 0) == 0 };
        if !still_alive {
            log::info!("pid {pid} exited");
            return Ok(());
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    log::warn!("pid {pid} did not exit within the graceful stop timeout");
    Ok(())
}
