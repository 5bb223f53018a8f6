//! Request/response correlation over one agent connection.
//!
//! [`AcpClient::connect`] spawns the reader and writer tasks for a pair of
//! byte streams and hands back a cloneable client plus the receiver for
//! agent-originated [`AgentEvent`]s. The streams can be a child's stdio or,
//! in tests, an in-memory duplex pipe.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::acp::reader::{run_reader, PendingMap};
use crate::acp::rpc::{self, RequestId};
use crate::acp::writer::run_writer;
use crate::acp::{decode, AgentEvent};
use crate::{AppError, Result};

/// Capacity of the outbound and event channels.
const CHANNEL_CAPACITY: usize = 64;

/// Cloneable handle for talking to one agent.
#[derive(Debug, Clone)]
pub struct AcpClient {
    label: Arc<str>,
    outbound: mpsc::Sender<Value>,
    pending: PendingMap,
    next_id: Arc<AtomicI64>,
    request_timeout: Duration,
    cancel: CancellationToken,
}

impl AcpClient {
    /// Start reader and writer tasks over `stdout`/`stdin`.
    ///
    /// `label` tags log lines (usually the agent name). The returned
    /// receiver yields every request and notification the agent sends,
    /// followed by a final [`AgentEvent::Closed`].
    pub fn connect<R, W>(
        label: &str,
        stdout: R,
        stdin: W,
        request_timeout: Duration,
    ) -> (Self, mpsc::Receiver<AgentEvent>)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound, msg_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let cancel = CancellationToken::new();

        tokio::spawn(run_reader(
            label.to_owned(),
            stdout,
            Arc::clone(&pending),
            event_tx,
            cancel.clone(),
        ));

        let writer_label = label.to_owned();
        let writer_cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = run_writer(writer_label.clone(), stdin, msg_rx, writer_cancel).await {
                warn!(agent = %writer_label, error = %e, "acp writer stopped");
            }
        });

        let client = Self {
            label: Arc::from(label),
            outbound,
            pending,
            next_id: Arc::new(AtomicI64::new(1)),
            request_timeout,
            cancel,
        };
        (client, event_rx)
    }

    /// Send `method` and wait for its typed result.
    ///
    /// # Errors
    ///
    /// - [`AppError::Transport`] if the connection is closed or the agent
    ///   does not answer within the request timeout.
    /// - [`AppError::Rpc`] if the agent answers with an error.
    /// - [`AppError::Decode`] if the result does not match `T`.
    pub async fn request<P, T>(&self, method: &str, params: &P) -> Result<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed));
        let params = encode_params(method, params)?;
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        if self.outbound.send(rpc::request(&id, method, params)).await.is_err() {
            self.pending.lock().await.remove(&id);
            return Err(AppError::Transport(format!(
                "cannot send {method}: connection to {} is closed",
                self.label
            )));
        }
        debug!(agent = %self.label, method, %id, "acp request sent");

        let outcome = match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_closed)) => {
                return Err(AppError::Transport(format!(
                    "connection to {} closed while awaiting {method}",
                    self.label
                )))
            }
            Err(_elapsed) => {
                self.pending.lock().await.remove(&id);
                return Err(AppError::Transport(format!(
                    "{method} timed out after {:?}",
                    self.request_timeout
                )));
            }
        };

        decode::result(outcome?)
    }

    /// Send a notification; no answer is expected.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`] if the connection is closed.
    pub async fn notify<P>(&self, method: &str, params: &P) -> Result<()>
    where
        P: Serialize + ?Sized,
    {
        let params = encode_params(method, params)?;
        self.send(rpc::notification(method, params), method).await
    }

    /// Answer an agent request with a result or an error.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`] if the connection is closed.
    pub async fn respond(&self, id: &RequestId, outcome: Result<Value>) -> Result<()> {
        let msg = match outcome {
            Ok(result) => rpc::success(id, result),
            Err(e) => rpc::failure(id, e.rpc_code(), &e.rpc_message()),
        };
        self.send(msg, "response").await
    }

    /// Stop the reader and writer tasks. Pending requests fail.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Whether [`AcpClient::shutdown`] has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    async fn send(&self, msg: Value, what: &str) -> Result<()> {
        self.outbound.send(msg).await.map_err(|_| {
            AppError::Transport(format!(
                "cannot send {what}: connection to {} is closed",
                self.label
            ))
        })
    }
}

fn encode_params<P: Serialize + ?Sized>(method: &str, params: &P) -> Result<Value> {
    serde_json::to_value(params)
        .map_err(|e| AppError::Acp(format!("failed to encode {method} params: {e}")))
}
