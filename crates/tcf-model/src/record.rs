//! Loose JSON records exchanged with the structured store

use serde_json::{Map, Value};

/// A single store row or configuration bag
pub type Record = Map<String, Value>;

/// Row-level fields owned by the store rather than the configuration
pub const SYSTEM_FIELDS: &[&str] = &["id", "token_id", "created_at", "updated_at"];

/// Stamp the owning token id onto a record
#[inline]
pub fn stamp_token_id(record: &mut Record, token_id: &str) {
    record.insert("token_id".to_string(), Value::String(token_id.to_string()));
}

/// Copy of `record` without store-owned fields
#[must_use]
pub fn strip_system_fields(record: &Record) -> Record {
    record
        .iter()
        .filter(|(k, _)| !SYSTEM_FIELDS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// True when the field is absent, null, or an empty string
#[must_use]
pub fn is_blank(record: &Record, field: &str) -> bool {
    match record.get(field) {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Render a scalar value as a key component
///
/// Strings render bare, everything else as compact JSON, so `"1"` and `1`
/// stay distinct only where the store would also distinguish them.
#[must_use]
pub fn key_component(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
