//! Agent Client Protocol (ACP) stream handling.
//!
//! An agent speaks JSON-RPC 2.0 over newline-delimited JSON. Each connection
//! owns a reader task (inbound lines → responses or [`AgentEvent`]s) and a
//! writer task (outbound values → lines), glued together by [`client::AcpClient`].
//!
//! - `codec`: NDJSON framing with a per-line cap.
//! - `decode`: strict and lenient payload decoding.
//! - `rpc`: envelope classification and builders.
//! - `reader` / `writer`: stream tasks.
//! - `client`: request/response correlation.
//! - `spawner`: launching stdio agents.

pub mod client;
pub mod codec;
pub mod decode;
pub mod reader;
pub mod rpc;
pub mod spawner;
pub mod writer;

use serde_json::Value;

use crate::acp::rpc::RequestId;

/// Agent-originated traffic that is not a response to one of our requests.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// The agent expects an answer via [`client::AcpClient::respond`].
    Request {
        /// Correlation id.
        id: RequestId,
        /// Method name.
        method: String,
        /// Raw params.
        params: Value,
    },
    /// Fire-and-forget message.
    Notification {
        /// Method name.
        method: String,
        /// Raw params.
        params: Value,
    },
    /// The stream or the process ended. Always the last event.
    Closed {
        /// Process exit code, when known.
        exit_code: Option<i32>,
        /// Human-readable reason.
        reason: String,
    },
}
