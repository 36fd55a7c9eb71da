//! Record reconciler
//!
//! Synchronizes one child collection of one token between desired and stored
//! state. Two policies:
//!
//! - **Full replace**: the token's rows in the table are swapped for the
//!   desired set through [`StructuredStore::replace`].
//! - **Keyed sync** (collections with a natural key): identical rows are
//!   skipped, changed rows updated in place, new rows inserted, and rows whose
//!   key is no longer desired removed. Row ids of surviving rows are kept.
//!
//! A unique violation on either path starts the conflict ladder:
//!
//! 1. upsert on `token_id` + natural key, overwriting (skipped without a key)
//! 2. replace the token's whole set
//! 3. give up and report the attempted count with the last error

use crate::normalize::{normalize_collection, normalize_properties};
use crate::report::{CollectionResult, Resolution, SyncReport, SyncStatus, PROPERTIES};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tcf_model::record::{key_component, stamp_token_id, strip_system_fields};
use tcf_model::{profile, CollectionSpec, MappedConfig, Record, Standard};
use tcf_store::{Filter, Query, StoreError, StoreResult, StructuredStore};

/// Desired state of one collection
#[derive(Debug, Clone, PartialEq)]
pub enum Desired {
    /// Caller said nothing; stored rows stay as they are
    Omitted,
    /// Caller wants exactly these rows
    Records(Vec<Record>),
    /// Caller explicitly asked for no rows
    Wipe,
}

/// How an explicit empty list is read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyListMode {
    /// Empty list behaves like an omitted collection (create paths)
    #[default]
    Ignore,
    /// Empty list wipes the collection (update paths)
    Wipe,
}

impl Desired {
    /// Build from an optional configuration list
    #[must_use]
    pub fn from_config(records: Option<&Vec<Record>>, mode: EmptyListMode) -> Self {
        match records {
            None => Self::Omitted,
            Some(r) if r.is_empty() => match mode {
                EmptyListMode::Ignore => Self::Omitted,
                EmptyListMode::Wipe => Self::Wipe,
            },
            Some(r) => Self::Records(r.clone()),
        }
    }
}

/// Reconciler options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Use keyed sync for collections that declare a natural key
    pub keyed_sync: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self { keyed_sync: true }
    }
}

/// Reconciles property records and child collections against a store
#[derive(Debug, Clone)]
pub struct RecordReconciler {
    store: Arc<dyn StructuredStore>,
    options: ReconcileOptions,
}

impl RecordReconciler {
    /// Reconciler with default options
    #[must_use]
    pub fn new(store: Arc<dyn StructuredStore>) -> Self {
        Self::with_options(store, ReconcileOptions::default())
    }

    /// Reconciler with explicit options
    #[must_use]
    pub fn with_options(store: Arc<dyn StructuredStore>, options: ReconcileOptions) -> Self {
        Self { store, options }
    }

    /// Underlying store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<dyn StructuredStore> {
        &self.store
    }

    /// Reconcile one collection of one token
    pub async fn reconcile(
        &self,
        token_id: &str,
        spec: &CollectionSpec,
        desired: Desired,
    ) -> CollectionResult {
        let records = match desired {
            Desired::Omitted => return CollectionResult::empty(spec.name, spec.table),
            Desired::Wipe => return self.wipe(token_id, spec.name, spec.table).await,
            Desired::Records(records) if records.is_empty() => {
                return CollectionResult::empty(spec.name, spec.table)
            }
            Desired::Records(records) => records,
        };

        let mut rows = normalize_collection(spec, &records);
        for row in &mut rows {
            stamp_token_id(row, token_id);
        }

        match (self.options.keyed_sync, spec.natural_key()) {
            (true, Some(key)) => self.keyed_sync(token_id, spec, key, rows).await,
            _ => self.full_replace(token_id, spec, rows).await,
        }
    }

    /// Upsert the single property record on `token_id`
    pub async fn sync_properties(
        &self,
        token_id: &str,
        table: &str,
        properties: &Record,
    ) -> CollectionResult {
        let mut row = normalize_properties(properties);
        stamp_token_id(&mut row, token_id);

        match self.store.upsert(table, vec![row], &["token_id"], false).await {
            Ok(written) => {
                let mut result = CollectionResult::new(PROPERTIES, table, SyncStatus::Success, 1);
                result.updated = written.len();
                result.resolved(Resolution::PropertyUpsert)
            }
            Err(e) => {
                tracing::error!(token_id, table, error = %e, "property record upsert failed");
                CollectionResult::failed(PROPERTIES, table, 1, e)
            }
        }
    }

    /// Sync the property record and every declared collection of a token
    ///
    /// Collections are processed in profile order; a failed collection does
    /// not stop its siblings.
    pub async fn sync_token(
        &self,
        token_id: &str,
        mapped: &MappedConfig,
        mode: EmptyListMode,
    ) -> SyncReport {
        let properties = self
            .sync_properties(token_id, mapped.property_table, &mapped.properties)
            .await;

        let mut collections = BTreeMap::new();
        for spec in profile(mapped.standard).collections {
            let records = mapped.collection(spec.name).map(|p| &p.records);
            let result = self
                .reconcile(token_id, spec, Desired::from_config(records, mode))
                .await;
            collections.insert(spec.name.to_string(), result);
        }

        let report = SyncReport {
            token_id: token_id.to_string(),
            properties,
            collections,
        };
        if !report.is_success() {
            tracing::warn!(token_id, failures = %report.failure_summary(), "token sync incomplete");
        }
        report
    }

    /// Remove the property record and every collection row of a token
    pub async fn purge_token(&self, token_id: &str, standard: Standard) -> SyncReport {
        let profile = profile(standard);
        let properties = self.wipe(token_id, PROPERTIES, profile.property_table).await;

        let mut collections = BTreeMap::new();
        for spec in profile.collections {
            let result = self.reconcile(token_id, spec, Desired::Wipe).await;
            collections.insert(spec.name.to_string(), result);
        }

        SyncReport {
            token_id: token_id.to_string(),
            properties,
            collections,
        }
    }

    async fn wipe(&self, token_id: &str, collection: &str, table: &str) -> CollectionResult {
        match self.store.delete(table, &token_filter(token_id)).await {
            Ok(deleted) => {
                let mut result = CollectionResult::new(collection, table, SyncStatus::Success, 0);
                result.deleted = deleted;
                result.resolved(Resolution::Wiped)
            }
            Err(e) => {
                tracing::error!(token_id, table, error = %e, "wipe failed");
                CollectionResult::failed(collection, table, 0, e)
            }
        }
    }

    async fn full_replace(
        &self,
        token_id: &str,
        spec: &CollectionSpec,
        rows: Vec<Record>,
    ) -> CollectionResult {
        let count = rows.len();
        match self
            .store
            .replace(spec.table, &token_filter(token_id), rows.clone())
            .await
        {
            Ok(inserted) => {
                let mut result =
                    CollectionResult::new(spec.name, spec.table, SyncStatus::Success, count);
                result.inserted = inserted.len();
                result.resolved(Resolution::FullReplace)
            }
            Err(e) if e.is_unique_violation() => self.resolve_conflict(token_id, spec, rows, e).await,
            Err(e) => {
                tracing::error!(token_id, table = spec.table, error = %e, "replace failed");
                CollectionResult::failed(spec.name, spec.table, count, e)
            }
        }
    }

    async fn keyed_sync(
        &self,
        token_id: &str,
        spec: &CollectionSpec,
        key: &[&str],
        rows: Vec<Record>,
    ) -> CollectionResult {
        let rows = dedupe(spec, key, rows);
        let applied = self.apply_keyed(token_id, spec, key, &rows).await;
        match applied {
            Ok(result) => result,
            Err(e) if e.is_unique_violation() => self.resolve_conflict(token_id, spec, rows, e).await,
            Err(e) => {
                tracing::error!(token_id, table = spec.table, error = %e, "keyed sync failed");
                CollectionResult::failed(spec.name, spec.table, rows.len(), e)
            }
        }
    }

    async fn apply_keyed(
        &self,
        token_id: &str,
        spec: &CollectionSpec,
        key: &[&str],
        rows: &[Record],
    ) -> StoreResult<CollectionResult> {
        let existing = self
            .store
            .select(spec.table, &Query::new(token_filter(token_id)))
            .await?;
        let mut by_key: HashMap<String, Record> = existing
            .into_iter()
            .map(|r| (row_key(&r, key), r))
            .collect();

        let mut result = CollectionResult::new(spec.name, spec.table, SyncStatus::Success, rows.len())
            .resolved(Resolution::KeyedSync);
        let mut to_insert = Vec::new();

        for row in rows {
            match by_key.remove(&row_key(row, key)) {
                Some(current) if same_content(&current, row) => result.skipped += 1,
                Some(current) => {
                    let patch = content_patch(&current, row);
                    self.store
                        .update(spec.table, &patch, &row_filter(token_id, key, &current))
                        .await?;
                    result.updated += 1;
                }
                None => to_insert.push(row.clone()),
            }
        }

        for stale in by_key.values() {
            result.deleted += self
                .store
                .delete(spec.table, &row_filter(token_id, key, stale))
                .await?;
        }

        if !to_insert.is_empty() {
            result.inserted = self.store.insert(spec.table, to_insert).await?.len();
        }

        tracing::debug!(
            token_id,
            table = spec.table,
            inserted = result.inserted,
            updated = result.updated,
            deleted = result.deleted,
            skipped = result.skipped,
            "keyed sync applied"
        );
        Ok(result)
    }

    async fn resolve_conflict(
        &self,
        token_id: &str,
        spec: &CollectionSpec,
        rows: Vec<Record>,
        violation: StoreError,
    ) -> CollectionResult {
        let count = rows.len();
        tracing::warn!(token_id, table = spec.table, error = %violation, "unique violation, entering conflict ladder");

        if let Some(conflict) = spec.conflict_key() {
            match self.ladder_upsert(token_id, spec, &conflict, &rows).await {
                Ok((written, deleted)) => {
                    tracing::info!(token_id, table = spec.table, "conflict resolved by upsert");
                    let mut result =
                        CollectionResult::new(spec.name, spec.table, SyncStatus::Success, count);
                    result.updated = written;
                    result.deleted = deleted;
                    return result.resolved(Resolution::ConflictUpsert);
                }
                Err(e) => {
                    tracing::warn!(token_id, table = spec.table, error = %e, "upsert step failed");
                }
            }
        }

        match self
            .store
            .replace(spec.table, &token_filter(token_id), rows)
            .await
        {
            Ok(inserted) => {
                tracing::info!(token_id, table = spec.table, "conflict resolved by replace");
                let mut result =
                    CollectionResult::new(spec.name, spec.table, SyncStatus::Success, count);
                result.inserted = inserted.len();
                result.resolved(Resolution::ConflictReplace)
            }
            Err(e) => {
                tracing::error!(token_id, table = spec.table, error = %e, attempted = count, "conflict ladder exhausted");
                let mut result = CollectionResult::failed(spec.name, spec.table, count, e);
                result.unresolved_conflict = true;
                result
            }
        }
    }

    /// Upsert the desired rows, then drop rows whose key is no longer wanted
    async fn ladder_upsert(
        &self,
        token_id: &str,
        spec: &CollectionSpec,
        conflict: &[&str],
        rows: &[Record],
    ) -> StoreResult<(usize, usize)> {
        let written = self
            .store
            .upsert(spec.table, rows.to_vec(), conflict, false)
            .await?
            .len();

        let Some(key) = spec.natural_key() else {
            return Ok((written, 0));
        };
        let wanted: HashSet<String> = rows.iter().map(|r| row_key(r, key)).collect();
        let existing = self
            .store
            .select(spec.table, &Query::new(token_filter(token_id)))
            .await?;

        let mut deleted = 0;
        for stale in existing.iter().filter(|r| !wanted.contains(&row_key(r, key))) {
            deleted += self
                .store
                .delete(spec.table, &row_filter(token_id, key, stale))
                .await?;
        }
        Ok((written, deleted))
    }
}

fn token_filter(token_id: &str) -> Filter {
    Filter::new().eq("token_id", token_id)
}

/// Filter for one stored row: by id when present, else by natural key
fn row_filter(token_id: &str, key: &[&str], row: &Record) -> Filter {
    if let Some(id) = row.get("id").filter(|v| !v.is_null()) {
        return token_filter(token_id).eq("id", id.clone());
    }
    key.iter().fold(token_filter(token_id), |f, field| {
        f.eq(*field, row.get(*field).cloned().unwrap_or_default())
    })
}

fn row_key(row: &Record, key: &[&str]) -> String {
    key.iter()
        .map(|field| key_component(row.get(*field)))
        .collect::<Vec<_>>()
        .join("\u{1f}")
}

/// Keep the last row per key, in first-seen position
fn dedupe(spec: &CollectionSpec, key: &[&str], rows: Vec<Record>) -> Vec<Record> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(rows.len());
    let mut out: Vec<Record> = Vec::with_capacity(rows.len());
    for row in rows {
        let k = row_key(&row, key);
        if let Some(&at) = index.get(&k) {
            tracing::warn!(collection = spec.name, key = %k, "duplicate natural key in desired rows, keeping last");
            out[at] = row;
        } else {
            index.insert(k, out.len());
            out.push(row);
        }
    }
    out
}

fn same_content(stored: &Record, desired: &Record) -> bool {
    strip_system_fields(stored) == strip_system_fields(desired)
}

/// Desired row plus explicit nulls for columns the desired row dropped
fn content_patch(stored: &Record, desired: &Record) -> Record {
    let mut patch = desired.clone();
    for field in strip_system_fields(stored).keys() {
        if !patch.contains_key(field) {
            patch.insert(field.clone(), serde_json::Value::Null);
        }
    }
    patch
}
