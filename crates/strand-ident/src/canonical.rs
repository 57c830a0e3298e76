//! Canonical JSON encoding used as the comparison basis for identities.
//!
//! Object keys are emitted in byte order regardless of how the map backing
//! `serde_json::Value` orders them, so enabling `preserve_order` anywhere in
//! the dependency graph cannot change a token.

use serde::Serialize;
use serde_json::Value;

use crate::error::{IdentError, IdentResult};

/// Serialize `value` to canonical JSON bytes.
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> IdentResult<Vec<u8>> {
    let value = serde_json::to_value(value).map_err(|e| IdentError::Serialization(e.to_string()))?;
    let mut out = Vec::new();
    write_value(&value, &mut out)?;
    Ok(out)
}

fn write_value(value: &Value, out: &mut Vec<u8>) -> IdentResult<()> {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
            out.push(b'{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_scalar(&Value::String(key.clone()), out)?;
                out.push(b':');
                write_value(item, out)?;
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(item, out)?;
            }
            out.push(b']');
        }
        scalar => write_scalar(scalar, out)?,
    }
    Ok(())
}

fn write_scalar(value: &Value, out: &mut Vec<u8>) -> IdentResult<()> {
    serde_json::to_writer(out, value).map_err(|e| IdentError::Serialization(e.to_string()))
}
