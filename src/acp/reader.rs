//! ACP reader task.
//!
//! Drives a [`FramedRead`] over the agent's stdout. Responses are matched to
//! waiting callers through the shared [`PendingMap`]; requests and
//! notifications become [`AgentEvent`]s.
//!
//! Malformed lines, oversize lines, and responses nobody is waiting for are
//! logged and skipped. Only EOF, an I/O error, or cancellation stop the task.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::acp::codec::AcpCodec;
use crate::acp::rpc::{self, Inbound, RequestId, RpcOutcome};
use crate::acp::AgentEvent;

/// Callers awaiting a response, keyed by request id.
pub type PendingMap = Arc<Mutex<HashMap<RequestId, oneshot::Sender<RpcOutcome>>>>;

/// Read inbound messages from `stdout` until EOF or cancellation.
///
/// On EOF or a stream error every pending caller is released (their
/// receivers observe a closed channel) and [`AgentEvent::Closed`] is sent.
/// Cancellation exits quietly.
pub async fn run_reader<R>(
    label: String,
    stdout: R,
    pending: PendingMap,
    event_tx: mpsc::Sender<AgentEvent>,
    cancel: CancellationToken,
) where
    R: AsyncRead + Unpin + Send,
{
    let mut framed = FramedRead::new(stdout, AcpCodec::new());

    let reason = loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!(agent = %label, "acp reader: cancellation received, stopping");
                pending.lock().await.clear();
                return;
            }

            item = framed.next() => match item {
                None => break "stream closed".to_owned(),
                Some(Err(e)) => {
                    warn!(agent = %label, error = %e, "acp reader: io error, stopping");
                    break format!("stream error: {e}");
                }
                Some(Ok(line)) => {
                    if !dispatch_line(&label, &line, &pending, &event_tx).await {
                        debug!(agent = %label, "acp reader: event receiver dropped, stopping");
                        pending.lock().await.clear();
                        return;
                    }
                }
            }
        }
    };

    debug!(agent = %label, reason = %reason, "acp reader: stream ended");
    pending.lock().await.clear();
    let closed = AgentEvent::Closed {
        exit_code: None,
        reason,
    };
    if event_tx.send(closed).await.is_err() {
        debug!(agent = %label, "acp reader: event receiver dropped before close");
    }
}

/// Route one line. Returns `false` once the event receiver is gone.
async fn dispatch_line(
    label: &str,
    line: &str,
    pending: &PendingMap,
    event_tx: &mpsc::Sender<AgentEvent>,
) -> bool {
    let inbound = match rpc::parse_inbound(line) {
        Ok(inbound) => inbound,
        Err(e) => {
            warn!(agent = %label, error = %e, raw_line = %line, "acp reader: parse error, skipping line");
            return true;
        }
    };

    let event = match inbound {
        Inbound::Response { id, outcome } => {
            match pending.lock().await.remove(&id) {
                Some(waiter) => {
                    // The caller may have timed out and dropped its receiver.
                    let _ = waiter.send(outcome);
                }
                None => debug!(agent = %label, %id, "acp reader: response for unknown request"),
            }
            return true;
        }
        Inbound::Request { id, method, params } => AgentEvent::Request { id, method, params },
        Inbound::Notification { method, params } => AgentEvent::Notification { method, params },
    };

    event_tx.send(event).await.is_ok()
}
