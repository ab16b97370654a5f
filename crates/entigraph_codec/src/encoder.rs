//! Encoding of values into exchange formats.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;

/// Encode a value to CBOR bytes.
///
/// # Errors
///
/// Returns an error if the underlying writer fails.
pub fn to_cbor(value: &Value) -> CodecResult<Vec<u8>> {
    let mut buffer = Vec::new();
    ciborium::ser::into_writer(value, &mut buffer)
        .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
    Ok(buffer)
}

/// Convert a value into a `serde_json::Value`.
///
/// Byte strings become arrays of numbers, so they do not survive a JSON
/// round trip as bytes.
///
/// # Errors
///
/// Returns [`CodecError::UnsupportedKey`] for maps keyed by anything other
/// than text.
pub fn to_json(value: &Value) -> CodecResult<serde_json::Value> {
    Ok(match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Integer(n) => serde_json::Value::from(*n),
        Value::Bytes(b) => serde_json::Value::Array(b.iter().map(|x| (*x).into()).collect()),
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(to_json).collect::<CodecResult<_>>()?)
        }
        Value::Map(pairs) => {
            let mut object = serde_json::Map::with_capacity(pairs.len());
            for (k, v) in pairs {
                let Some(key) = k.as_text() else {
                    return Err(CodecError::unsupported_key(k.to_string()));
                };
                object.insert(key.to_string(), to_json(v)?);
            }
            serde_json::Value::Object(object)
        }
    })
}

/// Encode a value to a JSON string.
///
/// # Errors
///
/// See [`to_json`].
pub fn to_json_string(value: &Value) -> CodecResult<String> {
    let json = to_json(value)?;
    serde_json::to_string(&json).map_err(|e| CodecError::encoding_failed(e.to_string()))
}
