//! Agent icon descriptor.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Icon shown for an agent in the host UI.
///
/// Wire form is tagged by `type`: `builtin` and `sfSymbol` carry a `name`,
/// `customImage` carries base64 image bytes in `data`. Unknown tags fail.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum AgentIconType {
    /// Icon bundled with the host, referenced by name.
    #[serde(rename = "builtin")]
    Builtin {
        /// Bundled asset name.
        name: String,
    },
    /// Platform symbol name.
    #[serde(rename = "sfSymbol")]
    SfSymbol {
        /// Symbol name.
        name: String,
    },
    /// Raw image bytes supplied by the user.
    #[serde(rename = "customImage")]
    CustomImage {
        /// Encoded image bytes (PNG, JPEG, …).
        #[serde(serialize_with = "encode_base64")]
        data: Vec<u8>,
    },
}

impl Default for AgentIconType {
    fn default() -> Self {
        Self::SfSymbol {
            name: "terminal".into(),
        }
    }
}

fn encode_base64<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(bytes))
}

impl<'de> Deserialize<'de> for AgentIconType {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let fields = Map::<String, Value>::deserialize(deserializer)?;
        let kind = fields
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| D::Error::missing_field("type"))?;

        let string_field = |key: &'static str| {
            fields
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or_else(|| D::Error::missing_field(key))
        };

        match kind {
            "builtin" => Ok(Self::Builtin {
                name: string_field("name")?,
            }),
            "sfSymbol" => Ok(Self::SfSymbol {
                name: string_field("name")?,
            }),
            "customImage" => {
                let data = STANDARD
                    .decode(string_field("data")?)
                    .map_err(|e| D::Error::custom(format!("customImage data is not base64: {e}")))?;
                Ok(Self::CustomImage { data })
            }
            other => Err(D::Error::custom(format!(
                "unrecognized icon type: {other}"
            ))),
        }
    }
}
