//! ACP writer task.
//!
//! Receives outbound JSON values from a tokio [`mpsc`] channel and writes
//! each as one NDJSON line to the agent's stdin through [`AcpCodec`].

use futures_util::SinkExt;
use serde_json::Value;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::acp::codec::AcpCodec;
use crate::Result;

/// Write queued messages to `stdin` until cancellation or channel close.
///
/// Every message is flushed before the next one is taken so the agent sees
/// requests promptly.
///
/// # Errors
///
/// Returns the codec or I/O error that stopped the task (typically the
/// agent exited and its stdin is closed).
pub async fn run_writer<W>(
    label: String,
    stdin: W,
    mut msg_rx: mpsc::Receiver<Value>,
    cancel: CancellationToken,
) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut framed = FramedWrite::new(stdin, AcpCodec::new());

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!(agent = %label, "acp writer: cancellation received, stopping");
                break;
            }

            msg = msg_rx.recv() => {
                let Some(value) = msg else {
                    debug!(agent = %label, "acp writer: message channel closed, stopping");
                    break;
                };
                if let Err(e) = framed.send(value).await {
                    warn!(agent = %label, error = %e, "acp writer: write to stdin failed");
                    return Err(e);
                }
            }
        }
    }

    Ok(())
}
