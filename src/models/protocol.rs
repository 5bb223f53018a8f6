//! ACP request, response, and notification payloads.
//!
//! All records use camelCase field names on the wire. Decoding is strict
//! by default: a missing required field or a type mismatch rejects the whole
//! payload. Two deliberate exceptions:
//!
//! - [`NewSessionResponse`] decodes `modes`, `models`, and `configOptions`
//!   independently; a malformed one is dropped and the response still
//!   succeeds as long as `sessionId` is valid.
//! - [`StopReason`] and [`SessionUpdate`] are open-world: unrecognized wire
//!   values map to an `Unknown` sentinel.
//!
//! Fields outside the modeled schema are dropped on decode. The only
//! side-channel for vendor metadata is `extraMetadata` on the file
//! read/write responses.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::acp::decode::lenient_field;
use crate::models::session::SessionId;
use crate::models::transport::McpServerConfig;

/// ACP protocol version spoken by this host.
pub const PROTOCOL_VERSION: u16 = 1;

/// Free-form vendor metadata attached to file responses.
pub type ExtraMetadata = Map<String, Value>;

// ── Negotiation ───────────────────────────────────────────────────────────────

/// Host identity sent in `initialize`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientInfo {
    /// Host name.
    pub name: String,
    /// Host version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ClientInfo {
    /// Identity of this crate.
    #[must_use]
    pub fn current() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_owned(),
            version: Some(env!("CARGO_PKG_VERSION").to_owned()),
        }
    }
}

/// Agent identity returned from `initialize`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentInfo {
    /// Agent name.
    pub name: String,
    /// Agent version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// File operations the host is willing to serve.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileSystemCapability {
    /// `fs/read_text_file` is served.
    #[serde(default)]
    pub read_text_file: bool,
    /// `fs/write_text_file` is served.
    #[serde(default)]
    pub write_text_file: bool,
}

/// Capabilities advertised by the host.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientCapabilities {
    /// Filesystem delegation support.
    #[serde(default)]
    pub fs: FileSystemCapability,
    /// Terminal delegation support.
    #[serde(default)]
    pub terminal: bool,
}

/// Content kinds the agent accepts in prompts beyond plain text.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PromptCapabilities {
    /// Image content blocks.
    #[serde(default)]
    pub image: bool,
    /// Audio content blocks.
    #[serde(default)]
    pub audio: bool,
    /// Embedded resource content blocks.
    #[serde(default)]
    pub embedded_context: bool,
}

/// MCP transports the agent can connect to.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct McpCapabilities {
    /// HTTP MCP servers.
    #[serde(default)]
    pub http: bool,
    /// SSE MCP servers.
    #[serde(default)]
    pub sse: bool,
}

/// Capabilities advertised by the agent.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AgentCapabilities {
    /// `session/load` is supported.
    #[serde(default)]
    pub load_session: bool,
    /// Accepted prompt content.
    #[serde(default)]
    pub prompt_capabilities: PromptCapabilities,
    /// Accepted MCP transports.
    #[serde(default)]
    pub mcp_capabilities: McpCapabilities,
}

/// One credential input an authentication method needs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialField {
    /// Key the value is submitted under.
    pub name: String,
    /// Human-readable label.
    pub label: String,
    /// Whether the input should be masked.
    #[serde(default)]
    pub secret: bool,
}

/// An authentication mechanism supported by the agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthMethod {
    /// Identifier passed back in `authenticate`.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Longer explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Ordered credential inputs, if the method needs any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<CredentialField>>,
}

/// `initialize` params.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequest {
    /// Protocol version the host speaks.
    pub protocol_version: u16,
    /// Host capabilities.
    pub client_capabilities: ClientCapabilities,
    /// Host identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_info: Option<ClientInfo>,
}

/// `initialize` result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResponse {
    /// Protocol version the agent chose.
    pub protocol_version: u16,
    /// Agent capabilities.
    #[serde(default)]
    pub agent_capabilities: AgentCapabilities,
    /// Authentication methods the agent offers.
    #[serde(default)]
    pub auth_methods: Vec<AuthMethod>,
    /// Agent identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_info: Option<AgentInfo>,
}

/// `authenticate` params.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticateRequest {
    /// Chosen [`AuthMethod::id`].
    pub method_id: String,
    /// Values for the method's credential fields, keyed by field name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<BTreeMap<String, String>>,
}

/// `authenticate` result.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthenticateResponse {}

// ── Modes, models, config options ─────────────────────────────────────────────

/// One selectable agent mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModeInfo {
    /// Mode identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Longer explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Available modes plus the current selection.
///
/// `current_mode_id` is not guaranteed to name an entry of
/// `available_modes`; [`ModesInfo::current`] returns `None` in that case.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModesInfo {
    /// Selected mode.
    pub current_mode_id: String,
    /// Modes the agent offers.
    pub available_modes: Vec<ModeInfo>,
}

impl ModesInfo {
    /// The selected mode, if it is among the available ones.
    #[must_use]
    pub fn current(&self) -> Option<&ModeInfo> {
        self.available_modes
            .iter()
            .find(|m| m.id == self.current_mode_id)
    }
}

/// One selectable model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    /// Model identifier.
    pub model_id: String,
    /// Display name.
    pub name: String,
    /// Longer explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Available models plus the current selection.
///
/// Same tolerance as [`ModesInfo`] for an unknown current id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModelsInfo {
    /// Selected model.
    pub current_model_id: String,
    /// Models the agent offers.
    pub available_models: Vec<ModelInfo>,
}

impl ModelsInfo {
    /// The selected model, if it is among the available ones.
    #[must_use]
    pub fn current(&self) -> Option<&ModelInfo> {
        self.available_models
            .iter()
            .find(|m| m.model_id == self.current_model_id)
    }
}

/// One allowed value of a session config option.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionConfigOptionValue {
    /// Value submitted in `session/set_config_option`.
    pub value: String,
    /// Display name.
    pub name: String,
    /// Longer explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// An agent-defined session setting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfigOption {
    /// Option identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Longer explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Currently selected value.
    pub current_value: String,
    /// Allowed values.
    #[serde(default)]
    pub options: Vec<SessionConfigOptionValue>,
}

// ── Sessions ──────────────────────────────────────────────────────────────────

/// `session/new` params.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewSessionRequest {
    /// Working directory of the session.
    pub cwd: PathBuf,
    /// Tool servers the agent should connect to.
    pub mcp_servers: Vec<McpServerConfig>,
}

/// `session/new` result, decoded leniently.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewSessionResponse {
    /// Agent-allocated session id. Required.
    pub session_id: SessionId,
    /// Mode catalog; absent if missing or malformed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modes: Option<ModesInfo>,
    /// Model catalog; absent if missing or malformed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models: Option<ModelsInfo>,
    /// Config options; absent if missing or malformed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_options: Option<Vec<SessionConfigOption>>,
}

impl<'de> Deserialize<'de> for NewSessionResponse {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut fields = Map::<String, Value>::deserialize(deserializer)?;
        let session_id = match fields.remove("sessionId") {
            Some(raw) => SessionId::deserialize(raw)
                .map_err(|e| D::Error::custom(format!("invalid `sessionId`: {e}")))?,
            None => return Err(D::Error::missing_field("sessionId")),
        };

        Ok(Self {
            session_id,
            modes: lenient_field(&mut fields, "modes"),
            models: lenient_field(&mut fields, "models"),
            config_options: lenient_field(&mut fields, "configOptions"),
        })
    }
}

/// `session/load` params.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoadSessionRequest {
    /// Session to resume.
    pub session_id: SessionId,
    /// Working directory of the session.
    pub cwd: PathBuf,
    /// Tool servers the agent should connect to.
    pub mcp_servers: Vec<McpServerConfig>,
}

/// `session/load` result.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoadSessionResponse {
    /// Mode catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modes: Option<ModesInfo>,
    /// Model catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models: Option<ModelsInfo>,
    /// Config options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_options: Option<Vec<SessionConfigOption>>,
}

// ── Prompt turns ──────────────────────────────────────────────────────────────

/// One piece of prompt or message content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text {
        /// The text.
        text: String,
    },
    /// Inline image.
    #[serde(rename_all = "camelCase")]
    Image {
        /// Base64 image data.
        data: String,
        /// MIME type of `data`.
        mime_type: String,
    },
    /// Reference to a resource the agent can fetch.
    ResourceLink {
        /// Resource URI.
        uri: String,
        /// Display name.
        name: String,
    },
}

impl ContentBlock {
    /// Build a text block.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// `session/prompt` params.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PromptRequest {
    /// Target session.
    pub session_id: SessionId,
    /// Prompt content.
    pub prompt: Vec<ContentBlock>,
}

/// Why the agent ended a prompt turn.
///
/// Unrecognized wire strings decode to [`StopReason::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// The model finished its turn.
    EndTurn,
    /// The host cancelled the turn.
    Cancelled,
    /// Token limit reached.
    MaxTokens,
    /// The model stopped to use a tool.
    ToolUse,
    /// The turn timed out.
    Timeout,
    /// The agent hit an error.
    Error,
    /// Any value this host does not know.
    Unknown,
}

impl StopReason {
    /// Wire string for this reason.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EndTurn => "end_turn",
            Self::Cancelled => "cancelled",
            Self::MaxTokens => "max_tokens",
            Self::ToolUse => "tool_use",
            Self::Timeout => "timeout",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }

    /// Map a wire string; never fails.
    #[must_use]
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "end_turn" => Self::EndTurn,
            "cancelled" => Self::Cancelled,
            "max_tokens" => Self::MaxTokens,
            "tool_use" => Self::ToolUse,
            "timeout" => Self::Timeout,
            "error" => Self::Error,
            _ => Self::Unknown,
        }
    }
}

impl Serialize for StopReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StopReason {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_wire(&raw))
    }
}

/// `session/prompt` result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PromptResponse {
    /// Why the turn ended.
    pub stop_reason: StopReason,
}

/// `session/cancel` notification params.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CancelNotification {
    /// Session whose turn should stop.
    pub session_id: SessionId,
}

/// `session/set_mode` params.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SetModeRequest {
    /// Target session.
    pub session_id: SessionId,
    /// Mode to switch to.
    pub mode_id: String,
}

/// `session/set_mode` result.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SetModeResponse {}

/// `session/set_model` params.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SetModelRequest {
    /// Target session.
    pub session_id: SessionId,
    /// Model to switch to.
    pub model_id: String,
}

/// `session/set_model` result.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SetModelResponse {}

/// `session/set_config_option` params.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SetSessionConfigOptionRequest {
    /// Target session.
    pub session_id: SessionId,
    /// [`SessionConfigOption::id`] to change.
    pub config_id: String,
    /// New value.
    pub value: String,
}

/// `session/set_config_option` result.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SetSessionConfigOptionResponse {
    /// Full option set after the change.
    #[serde(default)]
    pub config_options: Vec<SessionConfigOption>,
}

// ── Session updates ───────────────────────────────────────────────────────────

/// Streaming progress emitted by the agent during a turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "sessionUpdate", rename_all = "snake_case")]
pub enum SessionUpdate {
    /// A chunk of the agent's reply.
    AgentMessageChunk {
        /// Chunk content.
        content: ContentBlock,
    },
    /// A chunk of the agent's reasoning.
    AgentThoughtChunk {
        /// Chunk content.
        content: ContentBlock,
    },
    /// Echo of user content (replayed on `session/load`).
    UserMessageChunk {
        /// Chunk content.
        content: ContentBlock,
    },
    /// The agent started a tool call.
    #[serde(rename_all = "camelCase")]
    ToolCall {
        /// Tool call identifier.
        tool_call_id: String,
        /// Display title.
        title: String,
        /// Reported status, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<String>,
    },
    /// The agent switched modes on its own.
    #[serde(rename_all = "camelCase")]
    CurrentModeUpdate {
        /// New mode.
        current_mode_id: String,
    },
    /// Any update kind this host does not model.
    #[serde(other)]
    Unknown,
}

/// `session/update` notification params.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionNotification {
    /// Session the update belongs to.
    pub session_id: SessionId,
    /// The update.
    pub update: SessionUpdate,
}

// ── Filesystem delegation ─────────────────────────────────────────────────────

/// `fs/read_text_file` params (agent → host).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReadTextFileRequest {
    /// Requesting session.
    pub session_id: SessionId,
    /// Absolute file path.
    pub path: PathBuf,
    /// 1-based first line to return.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// Maximum number of lines to return.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

/// `fs/read_text_file` result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReadTextFileResponse {
    /// Requested window of the file.
    pub content: String,
    /// Line count of the whole file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_lines: Option<u32>,
    /// Vendor metadata side-channel.
    #[serde(default, alias = "_meta", skip_serializing_if = "Option::is_none")]
    pub extra_metadata: Option<ExtraMetadata>,
}

/// `fs/write_text_file` params (agent → host).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WriteTextFileRequest {
    /// Requesting session.
    pub session_id: SessionId,
    /// Absolute file path.
    pub path: PathBuf,
    /// Full replacement content.
    pub content: String,
}

/// `fs/write_text_file` result.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WriteTextFileResponse {
    /// Vendor metadata side-channel.
    #[serde(default, alias = "_meta", skip_serializing_if = "Option::is_none")]
    pub extra_metadata: Option<ExtraMetadata>,
}
