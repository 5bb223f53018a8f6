//! JSON-RPC 2.0 envelopes carried over the ACP stream.
//!
//! Inbound lines are classified by which members are present:
//!
//! | `id` | `method` | `result`/`error` | Kind                   |
//! |------|----------|------------------|------------------------|
//! | yes  | yes      | –                | [`Inbound::Request`]   |
//! | no   | yes      | –                | [`Inbound::Notification`] |
//! | yes  | no       | yes              | [`Inbound::Response`]  |
//!
//! Anything else is rejected as malformed.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::{AppError, Result};

/// Correlation id of a request. Agents may use numbers or strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric id (what this host allocates).
    Number(i64),
    /// String id.
    Str(String),
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

/// Error member of a JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    /// Error code.
    pub code: i64,
    /// Error message.
    pub message: String,
    /// Optional structured detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl From<RpcError> for AppError {
    fn from(err: RpcError) -> Self {
        Self::Rpc {
            code: err.code,
            message: err.message,
        }
    }
}

/// Outcome delivered to the caller awaiting a response.
pub type RpcOutcome = std::result::Result<Value, RpcError>;

/// A classified inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Answer to a request this host sent.
    Response {
        /// Correlation id.
        id: RequestId,
        /// Result or error.
        outcome: RpcOutcome,
    },
    /// The agent asks the host to do something and awaits an answer.
    Request {
        /// Correlation id to answer with.
        id: RequestId,
        /// Method name.
        method: String,
        /// Method params (`null` when absent).
        params: Value,
    },
    /// Fire-and-forget message from the agent.
    Notification {
        /// Method name.
        method: String,
        /// Method params (`null` when absent).
        params: Value,
    },
}

/// Classify one NDJSON line.
///
/// # Errors
///
/// Returns [`AppError::Acp`] when the line is not a JSON object or does not
/// fit any JSON-RPC message shape.
pub fn parse_inbound(line: &str) -> Result<Inbound> {
    let mut msg: Map<String, Value> =
        serde_json::from_str(line).map_err(|e| AppError::Acp(format!("malformed json: {e}")))?;

    let id = match msg.remove("id") {
        None | Some(Value::Null) => None,
        Some(raw) => Some(
            serde_json::from_value::<RequestId>(raw)
                .map_err(|e| AppError::Acp(format!("invalid request id: {e}")))?,
        ),
    };
    let method = match msg.remove("method") {
        None => None,
        Some(Value::String(m)) => Some(m),
        Some(other) => return Err(AppError::Acp(format!("method must be a string, got {other}"))),
    };
    let params = msg.remove("params").unwrap_or(Value::Null);

    match (id, method) {
        (Some(id), Some(method)) => Ok(Inbound::Request { id, method, params }),
        (None, Some(method)) => Ok(Inbound::Notification { method, params }),
        (Some(id), None) => {
            let outcome = if let Some(err) = msg.remove("error") {
                Err(serde_json::from_value::<RpcError>(err)
                    .map_err(|e| AppError::Acp(format!("malformed error member: {e}")))?)
            } else if let Some(result) = msg.remove("result") {
                Ok(result)
            } else {
                return Err(AppError::Acp(format!(
                    "response {id} has neither result nor error"
                )));
            };
            Ok(Inbound::Response { id, outcome })
        }
        (None, None) => Err(AppError::Acp(
            "message has neither id nor method".into(),
        )),
    }
}

/// Build a request envelope.
#[must_use]
pub fn request(id: &RequestId, method: &str, params: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params })
}

/// Build a notification envelope.
#[must_use]
pub fn notification(method: &str, params: Value) -> Value {
    json!({ "jsonrpc": "2.0", "method": method, "params": params })
}

/// Build a success response envelope.
#[must_use]
pub fn success(id: &RequestId, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

/// Build an error response envelope.
#[must_use]
pub fn failure(id: &RequestId, code: i64, message: &str) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message } })
}
