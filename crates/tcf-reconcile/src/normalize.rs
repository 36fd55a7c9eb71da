//! Normalization stage
//!
//! Runs before reconciliation. Store-owned fields are dropped, required
//! fields missing from a record get their declared default, and loosely
//! typed values are coerced to the column's expected type.

use serde_json::{Number, Value};
use std::collections::{HashMap, HashSet};
use tcf_model::record::{is_blank, strip_system_fields};
use tcf_model::{CollectionSpec, FieldDefault, Record};

/// Normalize the desired records of one collection
///
/// Positional defaults start at the record's 1-based position in `records`
/// and skip values the caller already supplied for that field, so the same
/// input always yields the same placeholders and a placeholder never
/// collides with a supplied key.
#[must_use]
pub fn normalize_collection(spec: &CollectionSpec, records: &[Record]) -> Vec<Record> {
    let mut taken = supplied_positionals(spec, records);
    records
        .iter()
        .enumerate()
        .map(|(idx, record)| normalize_record(spec, idx, record, &mut taken))
        .collect()
}

/// Values already present for each positionally defaulted field
fn supplied_positionals(spec: &CollectionSpec, records: &[Record]) -> HashMap<&'static str, HashSet<String>> {
    let mut taken: HashMap<&'static str, HashSet<String>> = HashMap::new();
    for required in spec.required {
        if !matches!(required.default, FieldDefault::Positional(_)) {
            continue;
        }
        let values = taken.entry(required.field).or_default();
        for record in records.iter().filter(|r| !is_blank(r, required.field)) {
            match record.get(required.field) {
                Some(Value::String(s)) => values.insert(s.clone()),
                Some(v @ (Value::Number(_) | Value::Bool(_))) => values.insert(v.to_string()),
                _ => false,
            };
        }
    }
    taken
}

fn normalize_record(
    spec: &CollectionSpec,
    idx: usize,
    record: &Record,
    taken: &mut HashMap<&'static str, HashSet<String>>,
) -> Record {
    let mut out = strip_system_fields(record);

    for required in spec.required {
        if is_blank(&out, required.field) {
            let used = taken.entry(required.field).or_default();
            let value = default_value(required.default, idx + 1, used);
            tracing::debug!(
                collection = spec.name,
                field = required.field,
                position = idx + 1,
                %value,
                "synthesizing default"
            );
            out.insert(required.field.to_string(), value);
        } else if let Some(value) = out.get_mut(required.field) {
            coerce(required.default, value);
        }
    }

    for key in spec.natural_key {
        if let Some(value) = out.get_mut(*key) {
            key_to_string(value);
        }
    }

    out
}

/// First `{prefix}-{n}` at or after `position` not in `used`
fn free_placeholder(prefix: &str, position: usize, used: &HashSet<String>) -> String {
    let mut n = position;
    loop {
        let candidate = format!("{prefix}-{n}");
        if !used.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Normalize a property record
///
/// Only store-owned fields are touched; property records have no required
/// columns beyond `token_id`, which the reconciler stamps.
#[must_use]
pub fn normalize_properties(properties: &Record) -> Record {
    strip_system_fields(properties)
}

fn default_value(default: FieldDefault, position: usize, used: &mut HashSet<String>) -> Value {
    match default {
        FieldDefault::Positional(prefix) => {
            let placeholder = free_placeholder(prefix, position, used);
            used.insert(placeholder.clone());
            Value::String(placeholder)
        }
        FieldDefault::Text(text) => Value::String(text.to_string()),
        FieldDefault::Integer(n) => Value::Number(Number::from(n)),
        FieldDefault::Flag(b) => Value::Bool(b),
    }
}

fn coerce(default: FieldDefault, value: &mut Value) {
    let replacement = match (default, &*value) {
        (FieldDefault::Integer(_), Value::String(s)) => {
            s.trim().parse::<i64>().ok().map(|n| Value::Number(Number::from(n)))
        }
        (FieldDefault::Flag(_), Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(Value::Bool(true)),
            "false" | "no" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
        (FieldDefault::Text(_) | FieldDefault::Positional(_), v @ (Value::Number(_) | Value::Bool(_))) => {
            Some(Value::String(v.to_string()))
        }
        _ => None,
    };
    if let Some(replacement) = replacement {
        *value = replacement;
    }
}

fn key_to_string(value: &mut Value) {
    if let Value::Number(_) | Value::Bool(_) = value {
        *value = Value::String(value.to_string());
    }
}
