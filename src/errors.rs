//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// JSON-RPC error code: the requested method is not served.
pub const METHOD_NOT_FOUND: i64 = -32_601;
/// JSON-RPC error code: the request parameters failed to decode.
pub const INVALID_PARAMS: i64 = -32_602;
/// JSON-RPC error code: internal failure while serving the request.
pub const INTERNAL_ERROR: i64 = -32_603;
/// ACP error code: the referenced resource (file) does not exist.
pub const RESOURCE_NOT_FOUND: i64 = -32_002;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// A protocol payload failed strict decoding.
    Decode {
        /// Dotted path to the offending field (`.` for the root).
        path: String,
        /// Description of the mismatch and the expected shape.
        message: String,
    },
    /// ACP stream framing or protocol failure.
    Acp(String),
    /// Agent transport could not be established or was lost.
    Transport(String),
    /// Session lifecycle violation (unknown session, bad transition).
    Session(String),
    /// The agent answered a request with a JSON-RPC error.
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Human-readable error message from the agent.
        message: String,
    },
    /// Agent-directed read of a file that does not exist.
    FileNotFound(String),
    /// Agent-directed file read failed.
    FileRead(String),
    /// Agent-directed file write failed.
    FileWrite(String),
    /// File system path failed validation against the workspace root.
    PathViolation(String),
    /// Generic I/O failure.
    Io(String),
}

impl AppError {
    /// JSON-RPC error code used when this error answers an agent request.
    #[must_use]
    pub fn rpc_code(&self) -> i64 {
        match self {
            Self::Decode { .. } | Self::PathViolation(_) => INVALID_PARAMS,
            Self::Rpc { code, .. } => *code,
            Self::FileNotFound(_) => RESOURCE_NOT_FOUND,
            _ => INTERNAL_ERROR,
        }
    }

    /// Message used when this error answers an agent request.
    #[must_use]
    pub fn rpc_message(&self) -> String {
        match self {
            Self::Rpc { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Decode { path, message } => write!(f, "decode: at `{path}`: {message}"),
            Self::Acp(msg) => write!(f, "acp: {msg}"),
            Self::Transport(msg) => write!(f, "transport: {msg}"),
            Self::Session(msg) => write!(f, "session: {msg}"),
            Self::Rpc { code, message } => write!(f, "rpc error {code}: {message}"),
            Self::FileNotFound(path) => write!(f, "file not found: {path}"),
            Self::FileRead(msg) => write!(f, "file read: {msg}"),
            Self::FileWrite(msg) => write!(f, "file write: {msg}"),
            Self::PathViolation(msg) => write!(f, "path violation: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<serde_path_to_error::Error<serde_json::Error>> for AppError {
    fn from(err: serde_path_to_error::Error<serde_json::Error>) -> Self {
        Self::Decode {
            path: err.path().to_string(),
            message: err.inner().to_string(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
