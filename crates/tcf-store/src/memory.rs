//! In-memory structured store
//!
//! Tables are vectors of rows behind a [`DashMap`]. Every write builds the
//! candidate table, checks declared unique indexes, and only then swaps it
//! in, so a rejected write never leaves partial state behind.

use crate::error::{StoreError, StoreResult};
use crate::filter::{compare_values, Filter, Query};
use crate::store::StructuredStore;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashSet;
use tcf_model::{profile, Record, Standard};

const ID_FIELD: &str = "id";

/// Concurrent in-process store with unique indexes
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: DashMap<String, Vec<Record>>,
    unique: DashMap<String, Vec<Vec<String>>>,
}

impl InMemoryStore {
    /// Empty store with only the implicit `id` index per table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with the unique indexes of every standard's tables
    ///
    /// Property tables are unique on `token_id`; keyed collections are
    /// unique on their conflict target.
    #[must_use]
    pub fn with_platform_schema() -> Self {
        let store = Self::new();
        for standard in Standard::ALL {
            let p = profile(standard);
            store.define_unique(p.property_table, &["token_id"]);
            for spec in p.collections {
                if let Some(key) = spec.conflict_key() {
                    store.define_unique(spec.table, &key);
                }
            }
        }
        store
    }

    /// Declare a unique index
    pub fn define_unique(&self, table: &str, columns: &[&str]) {
        let columns: Vec<String> = columns.iter().map(|c| (*c).to_owned()).collect();
        let mut entry = self.unique.entry(table.to_owned()).or_default();
        if !entry.contains(&columns) {
            entry.push(columns);
        }
    }

    /// Builder form of [`define_unique`](Self::define_unique)
    #[must_use]
    pub fn with_unique(self, table: &str, columns: &[&str]) -> Self {
        self.define_unique(table, columns);
        self
    }

    /// Snapshot of every row in a table
    #[must_use]
    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.tables.get(table).map(|t| t.clone()).unwrap_or_default()
    }

    /// Row count of a table
    #[must_use]
    pub fn table_len(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, |t| t.len())
    }

    fn constraints(&self, table: &str) -> Vec<Vec<String>> {
        let mut constraints = vec![vec![ID_FIELD.to_owned()]];
        if let Some(declared) = self.unique.get(table) {
            constraints.extend(declared.iter().cloned());
        }
        constraints
    }
}

/// Composite key, or `None` when any column is missing or null
fn key_of<S: AsRef<str>>(row: &Record, columns: &[S]) -> Option<String> {
    let mut parts = Vec::with_capacity(columns.len());
    for column in columns {
        match row.get(column.as_ref()) {
            None | Some(Value::Null) => return None,
            Some(v) => parts.push(v.to_string()),
        }
    }
    Some(parts.join("\u{1f}"))
}

fn assign_id(row: &mut Record) {
    if matches!(row.get(ID_FIELD), None | Some(Value::Null)) {
        row.insert(
            ID_FIELD.to_owned(),
            Value::String(uuid::Uuid::new_v4().to_string()),
        );
    }
}

fn check_unique(table: &str, rows: &[Record], constraints: &[Vec<String>]) -> StoreResult<()> {
    for columns in constraints {
        let mut seen = HashSet::with_capacity(rows.len());
        for row in rows {
            if let Some(key) = key_of(row, columns) {
                if !seen.insert(key.clone()) {
                    return Err(StoreError::UniqueViolation {
                        table: table.to_owned(),
                        constraint: columns.join("+"),
                        detail: key,
                    });
                }
            }
        }
    }
    Ok(())
}

#[async_trait]
impl StructuredStore for InMemoryStore {
    async fn select(&self, table: &str, query: &Query) -> StoreResult<Vec<Record>> {
        let mut rows: Vec<Record> = self
            .tables
            .get(table)
            .map(|t| {
                t.iter()
                    .filter(|r| query.filter.matches(r))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = &query.order_by {
            rows.sort_by(|a, b| {
                let ord = match (a.get(&order.field), b.get(&order.field)) {
                    (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                };
                if order.descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, rows: Vec<Record>) -> StoreResult<Vec<Record>> {
        let constraints = self.constraints(table);
        let mut inserted = rows;
        inserted.iter_mut().for_each(assign_id);

        let mut entry = self.tables.entry(table.to_owned()).or_default();
        let mut candidate = entry.clone();
        candidate.extend(inserted.iter().cloned());
        check_unique(table, &candidate, &constraints)?;
        *entry = candidate;

        tracing::trace!(table, rows = inserted.len(), "insert");
        Ok(inserted)
    }

    async fn update(&self, table: &str, patch: &Record, filter: &Filter) -> StoreResult<usize> {
        let constraints = self.constraints(table);
        let Some(mut entry) = self.tables.get_mut(table) else {
            return Ok(0);
        };
        let mut candidate = entry.clone();
        let mut updated = 0;
        for row in candidate.iter_mut().filter(|r| filter.matches(r)) {
            for (k, v) in patch {
                row.insert(k.clone(), v.clone());
            }
            updated += 1;
        }
        check_unique(table, &candidate, &constraints)?;
        *entry = candidate;

        tracing::trace!(table, updated, "update");
        Ok(updated)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> StoreResult<usize> {
        let Some(mut entry) = self.tables.get_mut(table) else {
            return Ok(0);
        };
        let before = entry.len();
        entry.retain(|r| !filter.matches(r));
        let deleted = before - entry.len();

        tracing::trace!(table, deleted, "delete");
        Ok(deleted)
    }

    async fn upsert(
        &self,
        table: &str,
        rows: Vec<Record>,
        conflict_keys: &[&str],
        ignore_duplicates: bool,
    ) -> StoreResult<Vec<Record>> {
        if conflict_keys.is_empty() {
            return Err(StoreError::invalid_request(table, "upsert without conflict target"));
        }
        let constraints = self.constraints(table);

        let mut entry = self.tables.entry(table.to_owned()).or_default();
        let mut candidate = entry.clone();
        let mut stored = Vec::with_capacity(rows.len());

        for mut row in rows {
            let key = key_of(&row, conflict_keys).ok_or_else(|| {
                StoreError::invalid_request(
                    table,
                    format!("row lacks conflict columns {}", conflict_keys.join("+")),
                )
            })?;
            let existing = candidate
                .iter()
                .position(|r| key_of(r, conflict_keys).as_deref() == Some(key.as_str()));

            match existing {
                Some(_) if ignore_duplicates => {}
                Some(idx) => {
                    let target = &mut candidate[idx];
                    for (k, v) in row {
                        if k != ID_FIELD {
                            target.insert(k, v);
                        }
                    }
                    stored.push(target.clone());
                }
                None => {
                    assign_id(&mut row);
                    candidate.push(row.clone());
                    stored.push(row);
                }
            }
        }

        check_unique(table, &candidate, &constraints)?;
        *entry = candidate;

        tracing::trace!(table, rows = stored.len(), "upsert");
        Ok(stored)
    }

    async fn count(&self, table: &str, filter: &Filter) -> StoreResult<usize> {
        Ok(self
            .tables
            .get(table)
            .map_or(0, |t| t.iter().filter(|r| filter.matches(r)).count()))
    }

    async fn replace(
        &self,
        table: &str,
        filter: &Filter,
        rows: Vec<Record>,
    ) -> StoreResult<Vec<Record>> {
        let constraints = self.constraints(table);
        let mut inserted = rows;
        inserted.iter_mut().for_each(assign_id);

        let mut entry = self.tables.entry(table.to_owned()).or_default();
        let mut candidate: Vec<Record> = entry.iter().filter(|r| !filter.matches(r)).cloned().collect();
        candidate.extend(inserted.iter().cloned());
        check_unique(table, &candidate, &constraints)?;
        *entry = candidate;

        tracing::trace!(table, rows = inserted.len(), "replace");
        Ok(inserted)
    }

    fn supports_atomic_replace(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SLOTS: &str = "token_erc3525_slots";

    fn row(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn slot(token: &str, slot_id: &str, name: &str) -> Record {
        row(json!({"token_id": token, "slot_id": slot_id, "name": name}))
    }

    fn by_token(token: &str) -> Filter {
        Filter::new().eq("token_id", token)
    }

    #[tokio::test]
    async fn insert_assigns_ids() {
        let store = InMemoryStore::new();
        let rows = store.insert("t", vec![row(json!({"a": 1}))]).await.unwrap();
        assert!(rows[0].get("id").and_then(Value::as_str).is_some());
        assert_eq!(store.table_len("t"), 1);
    }

    #[tokio::test]
    async fn unique_violation_rejects_whole_batch() {
        let store = InMemoryStore::with_platform_schema();
        store.insert(SLOTS, vec![slot("t1", "A", "a")]).await.unwrap();

        let err = store
            .insert(SLOTS, vec![slot("t1", "B", "b"), slot("t1", "A", "dup")])
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
        assert_eq!(store.table_len(SLOTS), 1);
    }

    #[tokio::test]
    async fn same_key_under_other_token_is_allowed() {
        let store = InMemoryStore::with_platform_schema();
        store.insert(SLOTS, vec![slot("t1", "A", "a")]).await.unwrap();
        store.insert(SLOTS, vec![slot("t2", "A", "a")]).await.unwrap();
        assert_eq!(store.table_len(SLOTS), 2);
    }

    #[tokio::test]
    async fn upsert_updates_in_place() {
        let store = InMemoryStore::with_platform_schema();
        let first = store.insert(SLOTS, vec![slot("t1", "A", "old")]).await.unwrap();
        let id = first[0]["id"].clone();

        store
            .upsert(SLOTS, vec![slot("t1", "A", "new"), slot("t1", "B", "b")], &["token_id", "slot_id"], false)
            .await
            .unwrap();

        let rows = store
            .select(SLOTS, &Query::new(by_token("t1")).order_asc("slot_id"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], id);
        assert_eq!(rows[0]["name"], json!("new"));
    }

    #[tokio::test]
    async fn upsert_ignore_duplicates_keeps_existing() {
        let store = InMemoryStore::with_platform_schema();
        store.insert(SLOTS, vec![slot("t1", "A", "old")]).await.unwrap();
        store
            .upsert(SLOTS, vec![slot("t1", "A", "new")], &["token_id", "slot_id"], true)
            .await
            .unwrap();
        assert_eq!(store.rows(SLOTS)[0]["name"], json!("old"));
    }

    #[tokio::test]
    async fn upsert_requires_conflict_columns() {
        let store = InMemoryStore::new();
        let err = store
            .upsert("t", vec![row(json!({"a": 1}))], &["token_id"], false)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn replace_is_atomic_on_violation() {
        let store = InMemoryStore::with_platform_schema();
        store.insert(SLOTS, vec![slot("t1", "A", "a")]).await.unwrap();

        let err = store
            .replace(SLOTS, &by_token("t1"), vec![slot("t1", "B", "b"), slot("t1", "B", "b2")])
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
        assert_eq!(store.rows(SLOTS)[0]["slot_id"], json!("A"));
    }

    #[tokio::test]
    async fn replace_swaps_matching_set_only() {
        let store = InMemoryStore::with_platform_schema();
        store
            .insert(SLOTS, vec![slot("t1", "A", "a"), slot("t2", "A", "a")])
            .await
            .unwrap();
        store.replace(SLOTS, &by_token("t1"), vec![]).await.unwrap();

        assert_eq!(store.count(SLOTS, &by_token("t1")).await.unwrap(), 0);
        assert_eq!(store.count(SLOTS, &by_token("t2")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn update_and_delete_by_filter() {
        let store = InMemoryStore::new();
        store
            .insert("t", vec![row(json!({"k": 1, "s": "x"})), row(json!({"k": 2, "s": "x"}))])
            .await
            .unwrap();

        let patch = row(json!({"s": "y"}));
        assert_eq!(store.update("t", &patch, &Filter::new().eq("k", 1)).await.unwrap(), 1);
        assert_eq!(store.count("t", &Filter::new().eq("s", "y")).await.unwrap(), 1);
        assert_eq!(store.delete("t", &Filter::new()).await.unwrap(), 2);
        assert_eq!(store.update("missing", &patch, &Filter::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn select_orders_and_limits() {
        let store = InMemoryStore::new();
        store
            .insert("t", vec![row(json!({"n": 3})), row(json!({"n": 1})), row(json!({"n": 2}))])
            .await
            .unwrap();
        let rows = store
            .select("t", &Query::new(Filter::new()).order_desc("n").limit(2))
            .await
            .unwrap();
        let ns: Vec<_> = rows.iter().map(|r| r["n"].as_i64().unwrap()).collect();
        assert_eq!(ns, vec![3, 2]);
    }

    #[test]
    fn null_columns_do_not_collide() {
        let rows = vec![row(json!({"k": null})), row(json!({"k": null}))];
        assert!(check_unique("t", &rows, &[vec!["k".to_owned()]]).is_ok());
    }
}
