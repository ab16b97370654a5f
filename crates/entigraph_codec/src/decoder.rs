//! Decoding of values from exchange formats.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;

/// Decode a value from CBOR bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not well-formed CBOR or contain
/// floats or integers outside the `i64` range.
pub fn from_cbor(bytes: &[u8]) -> CodecResult<Value> {
    ciborium::de::from_reader(bytes).map_err(|e| CodecError::decoding_failed(e.to_string()))
}

/// Convert a `serde_json::Value` into a value.
///
/// Object keys come out in lexicographic order, matching [`Value::map`].
///
/// # Errors
///
/// Returns [`CodecError::FloatForbidden`] for non-integer numbers and
/// [`CodecError::IntegerOverflow`] for integers outside the `i64` range.
pub fn from_json(json: &serde_json::Value) -> CodecResult<Value> {
    Ok(match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else if n.is_u64() {
                return Err(CodecError::IntegerOverflow);
            } else {
                return Err(CodecError::FloatForbidden);
            }
        }
        serde_json::Value::String(s) => Value::Text(s.clone()),
        serde_json::Value::Array(items) => {
            Value::Array(items.iter().map(from_json).collect::<CodecResult<_>>()?)
        }
        serde_json::Value::Object(object) => Value::Map(
            object
                .iter()
                .map(|(k, v)| Ok((Value::Text(k.clone()), from_json(v)?)))
                .collect::<CodecResult<_>>()?,
        ),
    })
}

/// Decode a value from a JSON string.
///
/// # Errors
///
/// Returns an error if the text is not valid JSON, or see [`from_json`].
pub fn from_json_str(text: &str) -> CodecResult<Value> {
    let json: serde_json::Value =
        serde_json::from_str(text).map_err(|e| CodecError::decoding_failed(e.to_string()))?;
    from_json(&json)
}
