//! Routing of agent-originated traffic for one session.
//!
//! - `fs/read_text_file` / `fs/write_text_file`: served by the
//!   [`FsDelegate`] on the blocking pool, answered with the result or a
//!   JSON-RPC error.
//! - Any other request: method not found.
//! - `session/update`: decoded and forwarded as [`SessionEvent::Update`].
//! - Connection or process end: the session is terminated and a single
//!   [`SessionEvent::Closed`] is forwarded.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::acp::client::AcpClient;
use crate::acp::rpc::RequestId;
use crate::acp::{decode, AgentEvent};
use crate::errors::{INVALID_PARAMS, METHOD_NOT_FOUND};
use crate::fs_delegate::FsDelegate;
use crate::models::protocol::{ReadTextFileRequest, SessionNotification, WriteTextFileRequest};
use crate::models::session::SessionId;
use crate::session::agent::{lock, SharedState};
use crate::session::SessionEvent;
use crate::{AppError, Result};

pub(crate) struct DispatchContext {
    pub(crate) agent: Arc<str>,
    pub(crate) client: AcpClient,
    pub(crate) fs: FsDelegate,
    pub(crate) shared: SharedState,
}

/// Consume agent events and process exits until both sources end.
pub(crate) async fn run(
    ctx: DispatchContext,
    mut events: mpsc::Receiver<AgentEvent>,
    mut exits: mpsc::Receiver<AgentEvent>,
    ui: mpsc::Sender<SessionEvent>,
) {
    let mut events_open = true;
    let mut exits_open = true;
    let mut closed = false;

    while events_open || exits_open {
        let event = tokio::select! {
            event = events.recv(), if events_open => {
                if event.is_none() {
                    events_open = false;
                }
                event
            }
            event = exits.recv(), if exits_open => {
                if event.is_none() {
                    exits_open = false;
                }
                event
            }
        };

        match event {
            Some(AgentEvent::Request { id, method, params }) => {
                spawn_request(&ctx, id, method, params);
            }
            Some(AgentEvent::Notification { method, params }) => {
                handle_notification(&ctx, &method, params, &ui).await;
            }
            Some(AgentEvent::Closed { exit_code, reason }) => {
                if closed {
                    debug!(agent = %ctx.agent, ?exit_code, %reason, "agent already closed");
                    continue;
                }
                closed = true;
                lock(&ctx.shared).record.terminate(reason.clone());
                info!(agent = %ctx.agent, ?exit_code, %reason, "session terminated");
                if ui.send(SessionEvent::Closed { exit_code, reason }).await.is_err() {
                    debug!(agent = %ctx.agent, "session event receiver dropped");
                }
            }
            None => {}
        }
    }

    debug!(agent = %ctx.agent, "dispatch loop finished");
}

/// Serve an agent request on its own task so slow file operations never
/// hold up update delivery.
fn spawn_request(ctx: &DispatchContext, id: RequestId, method: String, params: Value) {
    let client = ctx.client.clone();
    let fs = ctx.fs.clone();
    let agent = Arc::clone(&ctx.agent);
    let expected = lock(&ctx.shared).record.id.clone();

    tokio::spawn(async move {
        let outcome = match method.as_str() {
            "fs/read_text_file" => {
                serve(params, expected, |req: ReadTextFileRequest| {
                    (req.session_id.clone(), move || fs.read_text_file(&req))
                })
                .await
            }
            "fs/write_text_file" => {
                serve(params, expected, |req: WriteTextFileRequest| {
                    (req.session_id.clone(), move || fs.write_text_file(&req))
                })
                .await
            }
            other => Err(AppError::Rpc {
                code: METHOD_NOT_FOUND,
                message: format!("method not found: {other}"),
            }),
        };

        if let Err(e) = &outcome {
            warn!(agent = %agent, method = %method, %id, error = %e, "agent request failed");
        } else {
            debug!(agent = %agent, method = %method, %id, "agent request served");
        }
        if let Err(e) = client.respond(&id, outcome).await {
            debug!(agent = %agent, %id, error = %e, "could not deliver response");
        }
    });
}

/// Decode `params` strictly, check the session id, then run the operation
/// on the blocking pool.
async fn serve<Req, Resp, Op, Bind>(
    params: Value,
    expected: Option<SessionId>,
    bind: Bind,
) -> Result<Value>
where
    Req: DeserializeOwned,
    Resp: Serialize + Send + 'static,
    Op: FnOnce() -> Result<Resp> + Send + 'static,
    Bind: FnOnce(Req) -> (SessionId, Op),
{
    let request: Req = decode::strict(params)?;
    let (session_id, op) = bind(request);
    if let Some(expected) = expected {
        if session_id != expected {
            return Err(AppError::Rpc {
                code: INVALID_PARAMS,
                message: format!("unknown session: {session_id}"),
            });
        }
    }

    let response = tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| AppError::Io(format!("file task failed: {e}")))??;
    serde_json::to_value(response)
        .map_err(|e| AppError::Acp(format!("failed to encode response: {e}")))
}

async fn handle_notification(
    ctx: &DispatchContext,
    method: &str,
    params: Value,
    ui: &mpsc::Sender<SessionEvent>,
) {
    if method != "session/update" {
        debug!(agent = %ctx.agent, method, "ignoring notification");
        return;
    }

    match decode::strict::<SessionNotification>(params) {
        Ok(notification) => {
            if ui.send(SessionEvent::Update(notification)).await.is_err() {
                debug!(agent = %ctx.agent, "session event receiver dropped");
            }
        }
        Err(e) => warn!(agent = %ctx.agent, error = %e, "rejected malformed session/update"),
    }
}
