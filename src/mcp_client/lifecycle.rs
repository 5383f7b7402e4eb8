//! Server process lifecycle management.
//!
//! Spawns the tool-hosting server, drains its startup banner, and shuts it
//! down. Launching goes through [`ProcessLauncher`] so the client can be
//! driven by in-memory pipes in tests.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::process::{Child, Command};

use super::errors::McpError;
use super::types::ServerConfig;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Timeout for graceful shutdown before force-killing.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest stderr line kept in a log event.
const MAX_STDERR_LINE: usize = 2000;

pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

// ─── ServerProcess ───────────────────────────────────────────────────────────

/// A running server: its pipes and, for real processes, the child handle.
pub struct ServerProcess {
    pub stdin: BoxedWriter,
    pub stdout: BufReader<BoxedReader>,
    pub stderr: Option<BoxedReader>,
    pub child: Option<Child>,
}

impl ServerProcess {
    /// Build a process from bare streams (no OS child behind them).
    pub fn from_streams(stdin: BoxedWriter, stdout: BoxedReader) -> Self {
        Self {
            stdin,
            stdout: BufReader::new(stdout),
            stderr: None,
            child: None,
        }
    }

    /// Check if the server process is still running.
    pub fn is_alive(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => true,
        }
    }

    /// Close stdin, wait for a graceful exit, force-kill on timeout.
    pub async fn shutdown(self, server_name: &str) {
        let ServerProcess {
            stdin, mut child, ..
        } = self;

        // Closing stdin is the end-of-input signal for stdio servers.
        drop(stdin);

        let Some(child) = child.as_mut() else {
            return;
        };

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(server = server_name, %status, "server process exited");
            }
            _ => {
                if let Err(e) = child.kill().await {
                    tracing::warn!(server = server_name, error = %e, "failed to kill server process");
                } else {
                    tracing::debug!(server = server_name, "server process killed");
                }
            }
        }
    }

    /// Kill immediately; used when the transport is faulted.
    pub async fn kill(self, server_name: &str) {
        if let Some(mut child) = self.child {
            if let Err(e) = child.kill().await {
                tracing::debug!(server = server_name, error = %e, "kill after fault failed");
            }
        }
    }
}

// ─── Launching ───────────────────────────────────────────────────────────────

/// Starts a fresh server process.
pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, server_name: &str, config: &ServerConfig) -> Result<ServerProcess, McpError>;
}

/// Launches the configured command as an OS child process.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandLauncher;

impl ProcessLauncher for CommandLauncher {
    fn launch(&self, server_name: &str, config: &ServerConfig) -> Result<ServerProcess, McpError> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args);

        for (key, value) in &config.env {
            cmd.env(key, value);
        }
        if let Some(dir) = config.cwd.as_deref() {
            cmd.current_dir(dir);
        }

        #[cfg(target_os = "windows")]
        {
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        cmd.stdin(std::process::Stdio::piped());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| McpError::SpawnFailed {
            name: server_name.to_string(),
            reason: format!("{e}"),
        })?;

        let stdin = child.stdin.take().ok_or(McpError::SpawnFailed {
            name: server_name.to_string(),
            reason: "failed to capture stdin".into(),
        })?;
        let stdout = child.stdout.take().ok_or(McpError::SpawnFailed {
            name: server_name.to_string(),
            reason: "failed to capture stdout".into(),
        })?;
        let stderr = child.stderr.take().map(|s| Box::new(s) as BoxedReader);

        tracing::debug!(
            server = server_name,
            command = %config.command,
            args = ?config.args,
            pid = child.id(),
            "spawned server process"
        );

        Ok(ServerProcess {
            stdin: Box::new(stdin),
            stdout: BufReader::new(Box::new(stdout) as BoxedReader),
            stderr,
            child: Some(child),
        })
    }
}

// ─── Stderr handling ─────────────────────────────────────────────────────────

/// Wait up to `grace` for one startup line on stderr, then hand the rest of
/// the stream to a background task that forwards it to the log.
///
/// Stderr is diagnostics only; nothing read here is treated as protocol data.
pub async fn drain_startup_banner(process: &mut ServerProcess, server_name: &str, grace: Duration) {
    let Some(stderr) = process.stderr.take() else {
        return;
    };
    let mut reader = BufReader::new(stderr);

    let mut banner = String::new();
    match tokio::time::timeout(grace, reader.read_line(&mut banner)).await {
        Ok(Ok(n)) if n > 0 => {
            tracing::debug!(server = server_name, banner = %clip(banner.trim()), "server startup");
        }
        Ok(_) => {}
        Err(_) => {
            tracing::debug!(server = server_name, "no startup banner within grace period");
        }
    }

    let name = server_name.to_string();
    tokio::spawn(async move {
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    tracing::debug!(server = %name, stderr = %clip(line.trim_end()), "server stderr");
                }
            }
        }
    });
}

fn clip(line: &str) -> String {
    if line.chars().count() <= MAX_STDERR_LINE {
        return line.to_string();
    }
    let mut clipped: String = line.chars().take(MAX_STDERR_LINE).collect();
    clipped.push_str("...(truncated)");
    clipped
}

// ─── Tests ───────────────────────────────────────────────────────────────────
