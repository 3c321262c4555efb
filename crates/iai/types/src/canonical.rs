//! Canonical JSON encoding.
//!
//! The audit log hashes this form, so it has to be identical no matter which
//! order a map was built in: object keys are sorted recursively and the output
//! is compact (no insignificant whitespace). Floats use serde_json's
//! shortest round-trip representation and timestamps are RFC 3339 strings.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ModelResult;

/// Rebuild `value` with every object's keys in ascending order.
pub fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (key, inner) in entries {
                sorted.insert(key, canonicalize(inner));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Serialize `value` into a canonical [`Value`].
pub fn to_canonical_value<T: Serialize + ?Sized>(value: &T) -> ModelResult<Value> {
    Ok(canonicalize(serde_json::to_value(value)?))
}

/// Serialize `value` into its canonical compact string.
pub fn to_canonical_string<T: Serialize + ?Sized>(value: &T) -> ModelResult<String> {
    let canonical = to_canonical_value(value)?;
    Ok(serde_json::to_string(&canonical)?)
}
