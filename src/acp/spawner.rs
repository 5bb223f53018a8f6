//! ACP agent process spawner.
//!
//! Launches a stdio agent with:
//! - `env_clear()` followed by the login-shell environment snapshot, then the
//!   transport's own `env` entries on top.
//! - `kill_on_drop(true)` so an abandoned agent does not outlive the host.
//! - stderr forwarded line by line to `tracing` at `DEBUG`.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::acp::AgentEvent;
use crate::models::transport::TransportConfig;
use crate::{AppError, Result};

/// A running stdio agent.
#[derive(Debug)]
pub struct AgentProcess {
    /// Child handle; dropping it kills the agent.
    pub child: Child,
    /// Agent's stdin (host → agent messages).
    pub stdin: ChildStdin,
    /// Agent's stdout (agent → host messages).
    pub stdout: ChildStdout,
}

/// Build the child environment: `base` overlaid with the transport's entries.
#[must_use]
pub fn agent_environment(
    base: &HashMap<String, String>,
    transport: &TransportConfig,
) -> HashMap<String, String> {
    let mut env = base.clone();
    if let TransportConfig::Stdio { env: extra, .. } = transport {
        for var in extra {
            env.insert(var.name.clone(), var.value.clone());
        }
    }
    env
}

/// Spawn the agent described by `transport` in `cwd`.
///
/// Must be called from within a tokio runtime.
///
/// # Errors
///
/// - [`AppError::Transport`] if `transport` is not `stdio`.
/// - [`AppError::Transport`] if the OS refuses to start the process.
pub fn spawn_agent(
    label: &str,
    transport: &TransportConfig,
    cwd: &Path,
    base_env: &HashMap<String, String>,
) -> Result<AgentProcess> {
    let TransportConfig::Stdio { command, args, .. } = transport else {
        return Err(AppError::Transport(format!(
            "agent {label}: {} transports cannot be spawned; only stdio agents are supported",
            transport.kind()
        )));
    };

    let mut cmd = Command::new(command);
    cmd.args(args)
        .env_clear()
        .envs(agent_environment(base_env, transport))
        .current_dir(cwd)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .map_err(|err| AppError::Transport(format!("failed to spawn agent {label}: {err}")))?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| AppError::Transport("failed to capture agent stdin".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::Transport("failed to capture agent stdout".into()))?;

    if let Some(stderr) = child.stderr.take() {
        let label = label.to_owned();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(agent = %label, stderr = %line, "agent stderr");
            }
        });
    }

    info!(agent = label, command = %command, pid = ?child.id(), "agent process spawned");
    Ok(AgentProcess {
        child,
        stdin,
        stdout,
    })
}

/// Await child exit and report it as [`AgentEvent::Closed`].
///
/// Cancellation kills the child (best effort) and exits without an event.
#[must_use]
pub fn monitor_exit(
    label: String,
    mut child: Child,
    event_tx: mpsc::Sender<AgentEvent>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            result = child.wait() => {
                let (exit_code, reason) = match result {
                    Ok(status) => {
                        let code = status.code();
                        let reason = code.map_or_else(
                            || "process terminated by signal".to_owned(),
                            |c| format!("process exited with code {c}"),
                        );
                        (code, reason)
                    }
                    Err(err) => {
                        warn!(agent = %label, %err, "error waiting for agent process");
                        (None, format!("wait error: {err}"))
                    }
                };
                info!(agent = %label, ?exit_code, "agent process exited");

                if event_tx.send(AgentEvent::Closed { exit_code, reason }).await.is_err() {
                    debug!(agent = %label, "event receiver dropped before exit was reported");
                }
            }
            () = cancel.cancelled() => {
                if let Err(err) = child.kill().await {
                    debug!(agent = %label, %err, "agent kill after cancellation failed");
                }
                info!(agent = %label, "exit monitor cancelled, agent stopped");
            }
        }
    })
}
