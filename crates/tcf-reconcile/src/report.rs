//! Reconciliation results

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Collection name used for the property record in reports
pub const PROPERTIES: &str = "properties";

/// Outcome class of one collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Store now holds the desired rows
    Success,
    /// Every recovery step failed
    Failed,
    /// Nothing desired; stored rows untouched
    Empty,
}

/// How the final state was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Matching set replaced wholesale
    FullReplace,
    /// Keyed diff: skip identical, update changed, insert new, drop stale
    KeyedSync,
    /// Conflict ladder step A: upsert on the conflict key
    ConflictUpsert,
    /// Conflict ladder step B: replace the token's whole set
    ConflictReplace,
    /// Explicit wipe
    Wiped,
    /// Property record upserted on `token_id`
    PropertyUpsert,
}

/// Result for one collection (or the property record)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionResult {
    /// Collection name
    pub collection: String,
    /// Backing table
    pub table: String,
    /// Outcome class
    pub status: SyncStatus,
    /// Desired rows after deduplication (attempted count on failure)
    pub count: usize,
    /// Rows inserted
    pub inserted: usize,
    /// Rows updated in place
    pub updated: usize,
    /// Rows removed
    pub deleted: usize,
    /// Identical rows left alone
    pub skipped: usize,
    /// Path that produced the final state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    /// Last error when failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Failure is a unique violation the conflict ladder could not resolve
    #[serde(default)]
    pub unresolved_conflict: bool,
}

impl CollectionResult {
    pub(crate) fn new(collection: &str, table: &str, status: SyncStatus, count: usize) -> Self {
        Self {
            collection: collection.to_string(),
            table: table.to_string(),
            status,
            count,
            inserted: 0,
            updated: 0,
            deleted: 0,
            skipped: 0,
            resolution: None,
            error: None,
            unresolved_conflict: false,
        }
    }

    pub(crate) fn empty(collection: &str, table: &str) -> Self {
        Self::new(collection, table, SyncStatus::Empty, 0)
    }

    pub(crate) fn failed(collection: &str, table: &str, count: usize, error: impl ToString) -> Self {
        let mut result = Self::new(collection, table, SyncStatus::Failed, count);
        result.error = Some(error.to_string());
        result
    }

    #[must_use]
    pub(crate) fn resolved(mut self, resolution: Resolution) -> Self {
        self.resolution = Some(resolution);
        self
    }

    /// Check if this collection failed
    #[inline]
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status == SyncStatus::Failed
    }
}

/// Token-level aggregation of collection results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Token the rows belong to
    pub token_id: String,
    /// Property record result
    pub properties: CollectionResult,
    /// Collection results keyed by collection name
    pub collections: BTreeMap<String, CollectionResult>,
}

impl SyncReport {
    /// True when neither the property record nor any collection failed
    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.properties.is_failed() && self.collections.values().all(|r| !r.is_failed())
    }

    /// Failed results, property record first
    #[must_use]
    pub fn failures(&self) -> Vec<&CollectionResult> {
        std::iter::once(&self.properties)
            .chain(self.collections.values())
            .filter(|r| r.is_failed())
            .collect()
    }

    /// Result for one collection
    #[must_use]
    pub fn collection(&self, name: &str) -> Option<&CollectionResult> {
        if name == PROPERTIES {
            Some(&self.properties)
        } else {
            self.collections.get(name)
        }
    }

    /// First failure left by an exhausted conflict ladder
    #[must_use]
    pub fn unresolved_conflict(&self) -> Option<&CollectionResult> {
        self.failures().into_iter().find(|r| r.unresolved_conflict)
    }

    /// One line per failure, for error messages
    #[must_use]
    pub fn failure_summary(&self) -> String {
        self.failures()
            .iter()
            .map(|r| {
                format!(
                    "{}: {}",
                    r.collection,
                    r.error.as_deref().unwrap_or("unknown error")
                )
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}
