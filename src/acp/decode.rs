//! Decode policies for protocol payloads.
//!
//! - [`strict`]: the whole value must match `T`. Failures carry the field path
//!   (`availableModes[0].name`) and the expected shape.
//! - [`lenient_field`]: one optional field decoded on its own; a mismatch is
//!   logged and the field is treated as absent. Use only where a response
//!   must survive agents that emit non-conforming optional sub-objects.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use crate::Result;

/// Decode `value` into `T`, failing on the first schema violation.
///
/// # Errors
///
/// Returns [`AppError::Decode`](crate::AppError::Decode) with the path of the
/// offending field.
pub fn strict<T: DeserializeOwned>(value: Value) -> Result<T> {
    Ok(serde_path_to_error::deserialize(value)?)
}

/// Decode a JSON-RPC `result`, treating `null` as an empty object.
///
/// Several agents answer methods with no payload (`session/set_mode`,
/// `authenticate`) with `null` rather than `{}`.
///
/// # Errors
///
/// Same as [`strict`].
pub fn result<T: DeserializeOwned>(value: Value) -> Result<T> {
    match value {
        Value::Null => strict(Value::Object(Map::new())),
        other => strict(other),
    }
}

/// Remove `key` from `fields` and decode it, swallowing any failure.
///
/// `null` and a missing key both yield `None`.
pub(crate) fn lenient_field<T: DeserializeOwned>(
    fields: &mut Map<String, Value>,
    key: &str,
) -> Option<T> {
    match fields.remove(key)? {
        Value::Null => None,
        raw => match strict::<T>(raw) {
            Ok(v) => Some(v),
            Err(e) => {
                debug!(field = key, error = %e, "dropping malformed optional field");
                None
            }
        },
    }
}
