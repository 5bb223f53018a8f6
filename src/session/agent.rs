//! Host side of one agent conversation.
//!
//! An [`AgentSession`] wraps an [`AcpClient`] with the session lifecycle:
//! `initialize` moves it to negotiating, `session/new` or `session/load`
//! makes it active, and closing, a lost connection, or agent exit terminate
//! it. Agent-originated traffic is handled by a dispatch task started in
//! [`AgentSession::connect`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::acp::client::AcpClient;
use crate::acp::AgentEvent;
use crate::fs_delegate::FsDelegate;
use crate::models::protocol::{
    AgentCapabilities, AuthenticateRequest, AuthenticateResponse, CancelNotification,
    ClientCapabilities, ClientInfo, ContentBlock, FileSystemCapability, InitializeRequest,
    InitializeResponse, LoadSessionRequest, LoadSessionResponse, NewSessionRequest,
    NewSessionResponse, PromptRequest, PromptResponse, SessionConfigOption, SetModeRequest,
    SetModeResponse, SetModelRequest, SetModelResponse, SetSessionConfigOptionRequest,
    SetSessionConfigOptionResponse, StopReason, PROTOCOL_VERSION,
};
use crate::models::session::{SessionId, SessionRecord, SessionState};
use crate::models::transport::McpServerConfig;
use crate::session::dispatch::{self, DispatchContext};
use crate::session::SessionEvent;
use crate::{AppError, Result};

/// Capacity of the UI event channel.
const EVENT_CAPACITY: usize = 256;

/// Per-session settings.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Working directory sent with `session/new` and `session/load`.
    pub cwd: PathBuf,
    /// Tool servers offered to the agent.
    pub mcp_servers: Vec<McpServerConfig>,
    /// Executes the agent's file requests.
    pub fs: FsDelegate,
    /// Bound on each request.
    pub request_timeout: Duration,
}

/// State shared between the session handle and its dispatch task.
#[derive(Debug, Default)]
pub(crate) struct SessionShared {
    pub(crate) record: SessionRecord,
    pub(crate) agent_capabilities: Option<AgentCapabilities>,
}

pub(crate) type SharedState = Arc<Mutex<SessionShared>>;

pub(crate) fn lock(shared: &SharedState) -> MutexGuard<'_, SessionShared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One conversation with one agent.
///
/// Dropping the handle shuts the connection down and, for spawned agents,
/// kills the process.
#[derive(Debug)]
pub struct AgentSession {
    agent: Arc<str>,
    client: AcpClient,
    cwd: PathBuf,
    mcp_servers: Vec<McpServerConfig>,
    shared: SharedState,
    process_cancel: Option<CancellationToken>,
}

impl AgentSession {
    /// Attach to an agent over a pair of byte streams.
    ///
    /// Returns the session in [`SessionState::Uninitialized`] plus the
    /// receiver for [`SessionEvent`]s. Must be called within a tokio runtime.
    pub fn connect<R, W>(
        agent: &str,
        stdout: R,
        stdin: W,
        options: SessionOptions,
    ) -> (Self, mpsc::Receiver<SessionEvent>)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (_no_exits, exits) = mpsc::channel(1);
        Self::connect_with_exits(agent, stdout, stdin, options, exits, None)
    }

    /// [`AgentSession::connect`] for a spawned process whose exit is
    /// reported on `exits`; `process_cancel` stops the process.
    pub(crate) fn connect_with_exits<R, W>(
        agent: &str,
        stdout: R,
        stdin: W,
        options: SessionOptions,
        exits: mpsc::Receiver<AgentEvent>,
        process_cancel: Option<CancellationToken>,
    ) -> (Self, mpsc::Receiver<SessionEvent>)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (client, events) = AcpClient::connect(agent, stdout, stdin, options.request_timeout);
        let shared: SharedState = Arc::new(Mutex::new(SessionShared::default()));
        let (event_tx, event_rx) = mpsc::channel(EVENT_CAPACITY);

        let ctx = DispatchContext {
            agent: Arc::from(agent),
            client: client.clone(),
            fs: options.fs,
            shared: Arc::clone(&shared),
        };
        tokio::spawn(dispatch::run(ctx, events, exits, event_tx));

        let session = Self {
            agent: Arc::from(agent),
            client,
            cwd: options.cwd,
            mcp_servers: options.mcp_servers,
            shared,
            process_cancel,
        };
        (session, event_rx)
    }

    /// Exchange capabilities.
    ///
    /// # Errors
    ///
    /// - [`AppError::Session`] unless the session is uninitialized.
    /// - Any request error from the agent connection.
    pub async fn initialize(&self) -> Result<InitializeResponse> {
        self.expect_state(SessionState::Uninitialized, "initialize")?;

        let request = InitializeRequest {
            protocol_version: PROTOCOL_VERSION,
            client_capabilities: ClientCapabilities {
                fs: FileSystemCapability {
                    read_text_file: true,
                    write_text_file: true,
                },
                terminal: false,
            },
            client_info: Some(ClientInfo::current()),
        };
        let response: InitializeResponse = self.client.request("initialize", &request).await?;

        if response.protocol_version != PROTOCOL_VERSION {
            warn!(
                agent = %self.agent,
                ours = PROTOCOL_VERSION,
                theirs = response.protocol_version,
                "agent negotiated a different protocol version"
            );
        }

        {
            let mut shared = lock(&self.shared);
            shared.agent_capabilities = Some(response.agent_capabilities);
            if !shared.record.transition(SessionState::Negotiating) {
                return Err(AppError::Session(
                    "session terminated during initialize".into(),
                ));
            }
        }

        info!(
            agent = %self.agent,
            auth_methods = response.auth_methods.len(),
            load_session = response.agent_capabilities.load_session,
            "agent initialized"
        );
        Ok(response)
    }

    /// Authenticate with one of the methods the agent advertised.
    ///
    /// # Errors
    ///
    /// - [`AppError::Session`] unless capabilities were exchanged and no
    ///   session exists yet.
    /// - Any request error from the agent connection.
    pub async fn authenticate(
        &self,
        method_id: &str,
        credentials: Option<BTreeMap<String, String>>,
    ) -> Result<()> {
        self.expect_state(SessionState::Negotiating, "authenticate")?;
        let request = AuthenticateRequest {
            method_id: method_id.to_owned(),
            credentials,
        };
        let _: AuthenticateResponse = self.client.request("authenticate", &request).await?;
        info!(agent = %self.agent, method_id, "authenticated");
        Ok(())
    }

    /// Create a new session and become active.
    ///
    /// # Errors
    ///
    /// - [`AppError::Session`] unless the session is negotiating.
    /// - [`AppError::Decode`] if the result lacks a valid `sessionId`.
    /// - Any other request error from the agent connection.
    pub async fn new_session(&self) -> Result<NewSessionResponse> {
        self.expect_state(SessionState::Negotiating, "create a session")?;
        let request = NewSessionRequest {
            cwd: self.cwd.clone(),
            mcp_servers: self.mcp_servers.clone(),
        };
        let response: NewSessionResponse = self.client.request("session/new", &request).await?;

        if let Some(modes) = &response.modes {
            if modes.current().is_none() {
                debug!(
                    agent = %self.agent,
                    current_mode_id = %modes.current_mode_id,
                    "current mode is not among the available modes"
                );
            }
        }
        if let Some(models) = &response.models {
            if models.current().is_none() {
                debug!(
                    agent = %self.agent,
                    current_model_id = %models.current_model_id,
                    "current model is not among the available models"
                );
            }
        }

        self.activate(response.session_id.clone())?;
        Ok(response)
    }

    /// Resume a previous session and become active.
    ///
    /// # Errors
    ///
    /// - [`AppError::Session`] unless the session is negotiating and the
    ///   agent advertised `loadSession`.
    /// - Any request error from the agent connection.
    pub async fn load_session(&self, session_id: SessionId) -> Result<LoadSessionResponse> {
        self.expect_state(SessionState::Negotiating, "load a session")?;
        let supported = lock(&self.shared)
            .agent_capabilities
            .is_some_and(|caps| caps.load_session);
        if !supported {
            return Err(AppError::Session(format!(
                "agent {} does not support session/load",
                self.agent
            )));
        }

        let request = LoadSessionRequest {
            session_id: session_id.clone(),
            cwd: self.cwd.clone(),
            mcp_servers: self.mcp_servers.clone(),
        };
        let response: LoadSessionResponse = self.client.request("session/load", &request).await?;
        self.activate(session_id)?;
        Ok(response)
    }

    /// Run one prompt turn to completion.
    ///
    /// Updates streamed during the turn arrive as [`SessionEvent::Update`].
    ///
    /// # Errors
    ///
    /// - [`AppError::Session`] unless the session is active.
    /// - Any request error from the agent connection.
    pub async fn prompt(&self, prompt: Vec<ContentBlock>) -> Result<StopReason> {
        let session_id = self.active_id()?;
        let request = PromptRequest {
            session_id: session_id.clone(),
            prompt,
        };
        let response: PromptResponse = self.client.request("session/prompt", &request).await?;
        info!(
            agent = %self.agent,
            %session_id,
            stop_reason = response.stop_reason.as_str(),
            "prompt turn finished"
        );
        Ok(response.stop_reason)
    }

    /// [`AgentSession::prompt`] with a single text block.
    ///
    /// # Errors
    ///
    /// See [`AgentSession::prompt`].
    pub async fn prompt_text(&self, text: &str) -> Result<StopReason> {
        self.prompt(vec![ContentBlock::text(text)]).await
    }

    /// Ask the agent to stop the running turn.
    ///
    /// # Errors
    ///
    /// - [`AppError::Session`] unless the session is active.
    /// - [`AppError::Transport`] if the connection is closed.
    pub async fn cancel(&self) -> Result<()> {
        let session_id = self.active_id()?;
        self.client
            .notify("session/cancel", &CancelNotification { session_id })
            .await
    }

    /// Switch the session mode.
    ///
    /// # Errors
    ///
    /// - [`AppError::Session`] unless the session is active.
    /// - Any request error from the agent connection.
    pub async fn set_mode(&self, mode_id: &str) -> Result<()> {
        let request = SetModeRequest {
            session_id: self.active_id()?,
            mode_id: mode_id.to_owned(),
        };
        let _: SetModeResponse = self.client.request("session/set_mode", &request).await?;
        debug!(agent = %self.agent, mode_id, "mode changed");
        Ok(())
    }

    /// Switch the session model.
    ///
    /// # Errors
    ///
    /// - [`AppError::Session`] unless the session is active.
    /// - Any request error from the agent connection.
    pub async fn set_model(&self, model_id: &str) -> Result<()> {
        let request = SetModelRequest {
            session_id: self.active_id()?,
            model_id: model_id.to_owned(),
        };
        let _: SetModelResponse = self.client.request("session/set_model", &request).await?;
        debug!(agent = %self.agent, model_id, "model changed");
        Ok(())
    }

    /// Change one session config option; returns the full updated set.
    ///
    /// # Errors
    ///
    /// - [`AppError::Session`] unless the session is active.
    /// - Any request error from the agent connection.
    pub async fn set_config_option(
        &self,
        config_id: &str,
        value: &str,
    ) -> Result<Vec<SessionConfigOption>> {
        let request = SetSessionConfigOptionRequest {
            session_id: self.active_id()?,
            config_id: config_id.to_owned(),
            value: value.to_owned(),
        };
        let response: SetSessionConfigOptionResponse = self
            .client
            .request("session/set_config_option", &request)
            .await?;
        Ok(response.config_options)
    }

    /// Terminate the session and release the connection. Idempotent.
    pub fn close(&self, reason: &str) {
        lock(&self.shared).record.terminate(reason);
        self.client.shutdown();
        if let Some(cancel) = &self.process_cancel {
            cancel.cancel();
        }
        info!(agent = %self.agent, reason, "session closed");
    }

    /// Agent name this session talks to.
    #[must_use]
    pub fn agent(&self) -> &str {
        &self.agent
    }

    /// Working directory of the session.
    #[must_use]
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        lock(&self.shared).record.state
    }

    /// Agent-allocated id, once active.
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        lock(&self.shared).record.id.clone()
    }

    /// Snapshot of the lifecycle record.
    #[must_use]
    pub fn record(&self) -> SessionRecord {
        lock(&self.shared).record.clone()
    }

    /// Capabilities from `initialize`, once negotiated.
    #[must_use]
    pub fn agent_capabilities(&self) -> Option<AgentCapabilities> {
        lock(&self.shared).agent_capabilities
    }

    fn expect_state(&self, expected: SessionState, action: &str) -> Result<()> {
        let state = lock(&self.shared).record.state;
        if state == expected {
            Ok(())
        } else {
            Err(AppError::Session(format!("cannot {action} in state {state:?}")))
        }
    }

    fn active_id(&self) -> Result<SessionId> {
        let shared = lock(&self.shared);
        match (shared.record.state, &shared.record.id) {
            (SessionState::Active, Some(id)) => Ok(id.clone()),
            (state, _) => Err(AppError::Session(format!(
                "session is not active (state: {state:?})"
            ))),
        }
    }

    fn activate(&self, session_id: SessionId) -> Result<()> {
        if lock(&self.shared).record.activate(session_id.clone()) {
            info!(agent = %self.agent, %session_id, "session active");
            Ok(())
        } else {
            Err(AppError::Session(format!(
                "session {session_id} could not be activated"
            )))
        }
    }
}

impl Drop for AgentSession {
    fn drop(&mut self) {
        self.client.shutdown();
        if let Some(cancel) = &self.process_cancel {
            cancel.cancel();
        }
    }
}
