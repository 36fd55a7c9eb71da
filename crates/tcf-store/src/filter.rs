//! Filters and queries

use serde_json::Value;
use std::cmp::Ordering;
use tcf_model::Record;

/// Single column condition
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Column equals value
    Eq(String, Value),
    /// Column greater than or equal to value
    Gte(String, Value),
    /// Column strictly less than value
    Lt(String, Value),
    /// Column is one of the values
    In(String, Vec<Value>),
}

impl Condition {
    fn matches(&self, row: &Record) -> bool {
        match self {
            Condition::Eq(field, expected) => row.get(field) == Some(expected),
            Condition::Gte(field, bound) => row
                .get(field)
                .and_then(|v| compare_values(v, bound))
                .is_some_and(|o| o != Ordering::Less),
            Condition::Lt(field, bound) => row
                .get(field)
                .and_then(|v| compare_values(v, bound))
                .is_some_and(|o| o == Ordering::Less),
            Condition::In(field, values) => row.get(field).is_some_and(|v| values.contains(v)),
        }
    }
}

/// Conjunction of conditions (empty filter matches every row)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    /// Match-all filter
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add equality condition
    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Eq(field.into(), value.into()));
        self
    }

    /// Add lower bound (inclusive)
    #[must_use]
    pub fn gte(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Gte(field.into(), value.into()));
        self
    }

    /// Add upper bound (exclusive)
    #[must_use]
    pub fn lt(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Lt(field.into(), value.into()));
        self
    }

    /// Add membership condition
    #[must_use]
    pub fn one_of(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.conditions.push(Condition::In(field.into(), values));
        self
    }

    /// Conditions in insertion order
    #[inline]
    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Check a row against every condition
    #[must_use]
    pub fn matches(&self, row: &Record) -> bool {
        self.conditions.iter().all(|c| c.matches(row))
    }
}

/// Sort order for selects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Column
    pub field: String,
    /// Descending when true
    pub descending: bool,
}

/// Select request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Row filter
    pub filter: Filter,
    /// Optional ordering
    pub order_by: Option<OrderBy>,
    /// Optional row limit
    pub limit: Option<usize>,
}

impl Query {
    /// Query with filter and no ordering
    #[inline]
    #[must_use]
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            order_by: None,
            limit: None,
        }
    }

    /// Order ascending by column
    #[must_use]
    pub fn order_asc(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            descending: false,
        });
        self
    }

    /// Order descending by column
    #[must_use]
    pub fn order_desc(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            descending: true,
        });
        self
    }

    /// Limit row count
    #[inline]
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl From<Filter> for Query {
    fn from(filter: Filter) -> Self {
        Self::new(filter)
    }
}

/// Compare two JSON scalars of the same kind
///
/// Numbers compare numerically, strings lexicographically, booleans with
/// `false < true`. Mixed kinds are incomparable.
#[must_use]
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn empty_filter_matches_all() {
        assert!(Filter::new().matches(&row(json!({"a": 1}))));
    }

    #[test]
    fn eq_and_range_conditions() {
        let r = row(json!({"token_id": "t1", "started_at": "2025-01-01T10:00:00.000Z"}));
        let inside = Filter::new()
            .eq("token_id", "t1")
            .gte("started_at", "2025-01-01T09:00:00.000Z");
        let outside = Filter::new().gte("started_at", "2025-01-01T10:00:00.001Z");

        assert!(inside.matches(&r));
        assert!(!outside.matches(&r));
        assert!(Filter::new().lt("started_at", "2025-01-02T00:00:00.000Z").matches(&r));
    }

    #[test]
    fn missing_column_never_matches_range() {
        let r = row(json!({"other": 1}));
        assert!(!Filter::new().gte("started_at", "x").matches(&r));
    }

    #[test]
    fn one_of_condition() {
        let r = row(json!({"status": "started"}));
        let f = Filter::new().one_of("status", vec![json!("started"), json!("failed")]);
        assert!(f.matches(&r));
    }

    #[test]
    fn numbers_compare_numerically() {
        assert_eq!(compare_values(&json!(2), &json!(10)), Some(Ordering::Less));
        assert_eq!(compare_values(&json!(2.5), &json!(2)), Some(Ordering::Greater));
        assert_eq!(compare_values(&json!("2"), &json!(2)), None);
    }
}
