//! Spawning configured agents into sessions.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn};

use crate::acp::spawner::{self, AgentProcess};
use crate::config::GlobalConfig;
use crate::fs_delegate::FsDelegate;
use crate::session::{AgentSession, SessionEvent, SessionOptions};
use crate::shell_env::{CallerContext, ShellEnvLoader};
use crate::{AppError, Result};

/// Resolves agents from configuration and starts sessions with them.
///
/// Sessions are independent of each other; the coordinator only shares the
/// configuration and the shell environment cache between them.
#[derive(Debug, Clone)]
pub struct SessionCoordinator {
    config: Arc<GlobalConfig>,
    shell_env: ShellEnvLoader,
}

impl SessionCoordinator {
    /// Create a coordinator with a shell loader built from `config`.
    #[must_use]
    pub fn new(config: Arc<GlobalConfig>) -> Self {
        let shell_env = ShellEnvLoader::new(config.capture_settings());
        Self { config, shell_env }
    }

    /// Create a coordinator sharing an existing shell loader.
    #[must_use]
    pub fn with_shell_env(config: Arc<GlobalConfig>, shell_env: ShellEnvLoader) -> Self {
        Self { config, shell_env }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    /// Shared shell environment loader.
    #[must_use]
    pub fn shell_env(&self) -> &ShellEnvLoader {
        &self.shell_env
    }

    /// Session settings for `cwd` under the current configuration.
    #[must_use]
    pub fn session_options(&self, cwd: &Path) -> SessionOptions {
        let fs = if self.config.restrict_fs_to_workspace {
            FsDelegate::scoped(cwd)
        } else {
            FsDelegate::unrestricted()
        };
        SessionOptions {
            cwd: cwd.to_path_buf(),
            mcp_servers: self.config.mcp_servers.clone(),
            fs,
            request_timeout: self.config.request_timeout(),
        }
    }

    /// Spawn `agent` (or the default agent) in `cwd` and connect to it.
    ///
    /// The child sees the cached login-shell environment, or the process
    /// environment while the cache is still cold; spawning never waits on
    /// the shell. The session is returned uninitialized.
    ///
    /// # Errors
    ///
    /// - [`AppError::Config`] if the agent is not configured.
    /// - [`AppError::Session`] if `cwd` does not exist.
    /// - [`AppError::Transport`] if the agent cannot be spawned.
    pub fn launch(
        &self,
        agent: Option<&str>,
        cwd: &Path,
    ) -> Result<(AgentSession, mpsc::Receiver<SessionEvent>)> {
        let agent = self.config.agent(agent)?;
        let span = info_span!("launch", agent = %agent.name);
        let _guard = span.enter();

        let cwd = cwd.canonicalize().map_err(|err| {
            AppError::Session(format!("invalid working directory {}: {err}", cwd.display()))
        })?;

        let env = self.shell_env.load(CallerContext::Interactive);
        let AgentProcess {
            child,
            stdin,
            stdout,
        } = spawner::spawn_agent(&agent.name, &agent.transport, &cwd, &env)?;

        let (exit_tx, exit_rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let _monitor = spawner::monitor_exit(agent.name.clone(), child, exit_tx, cancel.clone());

        let options = self.session_options(&cwd);
        let connected =
            AgentSession::connect_with_exits(&agent.name, stdout, stdin, options, exit_rx, Some(cancel));
        info!(cwd = %cwd.display(), "agent launched");
        Ok(connected)
    }

    /// [`SessionCoordinator::launch`], then `initialize` and `session/new`.
    ///
    /// On failure the agent is stopped before the error is returned.
    ///
    /// # Errors
    ///
    /// Any error from launching, negotiating, or creating the session.
    pub async fn start_session(
        &self,
        agent: Option<&str>,
        cwd: &Path,
    ) -> Result<(AgentSession, mpsc::Receiver<SessionEvent>)> {
        let (session, events) = self.launch(agent, cwd)?;

        let setup = async {
            session.initialize().await?;
            session.new_session().await
        };
        if let Err(err) = setup.await {
            warn!(agent = session.agent(), %err, "session setup failed");
            session.close("session setup failed");
            return Err(err);
        }

        Ok((session, events))
    }
}
