//! Structured store trait

use crate::error::StoreResult;
use crate::filter::{Filter, Query};
use async_trait::async_trait;
use tcf_model::Record;

/// Relational store used for tokens, property records, collections,
/// deployment attempts, and audit events
///
/// Implementations must be safe to share behind `Arc<dyn StructuredStore>`.
#[async_trait]
pub trait StructuredStore: Send + Sync + std::fmt::Debug {
    /// Rows matching the query
    async fn select(&self, table: &str, query: &Query) -> StoreResult<Vec<Record>>;

    /// Insert rows, all or nothing; returns the stored rows with generated ids
    async fn insert(&self, table: &str, rows: Vec<Record>) -> StoreResult<Vec<Record>>;

    /// Apply `patch` to every matching row; returns the number updated
    async fn update(&self, table: &str, patch: &Record, filter: &Filter) -> StoreResult<usize>;

    /// Delete matching rows; returns the number deleted
    async fn delete(&self, table: &str, filter: &Filter) -> StoreResult<usize>;

    /// Insert or update on a conflict target
    ///
    /// Rows whose `conflict_keys` columns match an existing row update that
    /// row in place, or are skipped when `ignore_duplicates` is set.
    async fn upsert(
        &self,
        table: &str,
        rows: Vec<Record>,
        conflict_keys: &[&str],
        ignore_duplicates: bool,
    ) -> StoreResult<Vec<Record>>;

    /// Number of matching rows
    async fn count(&self, table: &str, filter: &Filter) -> StoreResult<usize> {
        Ok(self.select(table, &Query::new(filter.clone())).await?.len())
    }

    /// Replace every row matching `filter` with `rows`
    ///
    /// The default is delete followed by insert and is NOT atomic: a failed
    /// insert leaves the matching set empty. Backends that can do better
    /// override this and report [`supports_atomic_replace`](Self::supports_atomic_replace).
    async fn replace(
        &self,
        table: &str,
        filter: &Filter,
        rows: Vec<Record>,
    ) -> StoreResult<Vec<Record>> {
        self.delete(table, filter).await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        self.insert(table, rows).await
    }

    /// Whether [`replace`](Self::replace) is all or nothing
    fn supports_atomic_replace(&self) -> bool {
        false
    }
}
