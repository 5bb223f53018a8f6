//! Transport descriptors for agents and MCP tool servers.
//!
//! A transport is a closed tagged union selected by the `type` field:
//!
//! | `type`  | Fields                                   |
//! |---------|------------------------------------------|
//! | `stdio` | `command`, optional `args`, `env`        |
//! | `http`  | `url`, optional `headers`                |
//! | `sse`   | `url`, optional `headers`                |
//!
//! Decoding reads the discriminator first and fails with
//! `unrecognized transport type: <value>` for anything outside the set.
//! Encoding always re-emits `type` next to the variant's own fields.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One environment variable handed to a stdio process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvVariable {
    /// Variable name.
    pub name: String,
    /// Variable value.
    pub value: String,
}

/// One HTTP header sent to an HTTP or SSE endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpHeader {
    /// Header name.
    pub name: String,
    /// Header value.
    pub value: String,
}

/// How to reach an agent or tool server.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    /// Spawn a local process and speak over its stdio.
    Stdio {
        /// Executable to launch.
        command: String,
        /// Arguments passed to the executable.
        args: Vec<String>,
        /// Extra environment variables for the process.
        env: Vec<EnvVariable>,
    },
    /// Plain HTTP endpoint.
    Http {
        /// Endpoint URL.
        url: String,
        /// Extra request headers.
        #[serde(skip_serializing_if = "Vec::is_empty")]
        headers: Vec<HttpHeader>,
    },
    /// Server-sent events endpoint.
    Sse {
        /// Endpoint URL.
        url: String,
        /// Extra request headers.
        #[serde(skip_serializing_if = "Vec::is_empty")]
        headers: Vec<HttpHeader>,
    },
}

impl TransportConfig {
    /// Wire discriminator for this variant.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Stdio { .. } => "stdio",
            Self::Http { .. } => "http",
            Self::Sse { .. } => "sse",
        }
    }
}

#[derive(Deserialize)]
struct StdioFields {
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: Vec<EnvVariable>,
}

#[derive(Deserialize)]
struct UrlFields {
    url: String,
    #[serde(default)]
    headers: Vec<HttpHeader>,
}

impl<'de> Deserialize<'de> for TransportConfig {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut fields = Map::<String, Value>::deserialize(deserializer)?;
        let kind = match fields.remove("type") {
            Some(Value::String(kind)) => kind,
            Some(other) => {
                return Err(D::Error::custom(format!(
                    "transport `type` must be a string, got {other}"
                )))
            }
            None => return Err(D::Error::missing_field("type")),
        };
        let rest = Value::Object(fields);

        match kind.as_str() {
            "stdio" => {
                let f: StdioFields = serde_json::from_value(rest).map_err(D::Error::custom)?;
                Ok(Self::Stdio {
                    command: f.command,
                    args: f.args,
                    env: f.env,
                })
            }
            "http" | "sse" => {
                let f: UrlFields = serde_json::from_value(rest).map_err(D::Error::custom)?;
                Ok(if kind == "http" {
                    Self::Http {
                        url: f.url,
                        headers: f.headers,
                    }
                } else {
                    Self::Sse {
                        url: f.url,
                        headers: f.headers,
                    }
                })
            }
            other => Err(D::Error::custom(format!(
                "unrecognized transport type: {other}"
            ))),
        }
    }
}

/// A named MCP tool server handed to the agent at session creation.
///
/// The transport fields are flattened next to `name` on the wire:
/// `{"name":"docs","type":"http","url":"…"}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct McpServerConfig {
    /// Display name of the server.
    pub name: String,
    /// How the agent reaches the server.
    #[serde(flatten)]
    pub transport: TransportConfig,
}
