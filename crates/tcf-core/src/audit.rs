//! Deployment audit trail
//!
//! Append-only events around deployment start, success, failure, admission
//! denial, fallback, and verification. Two sinks ship: [`StoreAuditSink`]
//! writes rows to `token_deployment_events`, [`MemoryAuditLog`] keeps a
//! SHA-256 hash chain that can be verified after the fact.

use crate::error::ForgeResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tcf_model::{format_timestamp, Record, TokenId};
use tcf_store::StructuredStore;

/// Table receiving audit rows
pub const DEPLOYMENT_EVENTS_TABLE: &str = "token_deployment_events";

/// Audit event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Admission passed, strategy chosen
    DeploymentStarted,
    /// Contract deployed
    DeploymentSucceeded,
    /// Every attempted strategy failed
    DeploymentFailed,
    /// Rate limit denied the request
    AdmissionDenied,
    /// Primary strategy failed, fallback starting
    StrategyFallback,
    /// Verification checked the contract
    DeploymentVerified,
}

/// Event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Normal progress
    Info,
    /// Recovered or refused
    Warning,
    /// Failed
    Error,
}

/// One audit event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Token concerned
    pub token_id: TokenId,
    /// Event type
    pub event_type: AuditEventType,
    /// Severity
    pub severity: Severity,
    /// Human-readable summary
    pub message: String,
    /// Structured details
    pub data: Value,
    /// When it happened
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    /// Event with empty data
    pub fn new(
        token_id: TokenId,
        event_type: AuditEventType,
        severity: Severity,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            token_id,
            event_type,
            severity,
            message: message.into(),
            data: Value::Null,
            timestamp,
        }
    }

    /// Attach structured details
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}

/// Append-only audit destination
#[async_trait]
pub trait AuditSink: Send + Sync + std::fmt::Debug {
    /// Append one event
    async fn append(&self, event: AuditEvent) -> ForgeResult<()>;
}

/// Writes events as rows of [`DEPLOYMENT_EVENTS_TABLE`]
#[derive(Debug, Clone)]
pub struct StoreAuditSink {
    store: Arc<dyn StructuredStore>,
}

impl StoreAuditSink {
    /// Sink over a store
    #[must_use]
    pub fn new(store: Arc<dyn StructuredStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AuditSink for StoreAuditSink {
    async fn append(&self, event: AuditEvent) -> ForgeResult<()> {
        let mut row = Record::new();
        row.insert("token_id".into(), Value::String(event.token_id.to_string()));
        row.insert("event_type".into(), serde_json::to_value(event.event_type).map_err(tcf_model::ModelError::from)?);
        row.insert("severity".into(), serde_json::to_value(event.severity).map_err(tcf_model::ModelError::from)?);
        row.insert("message".into(), Value::String(event.message));
        row.insert("data".into(), event.data);
        row.insert("created_at".into(), Value::String(format_timestamp(event.timestamp)));
        self.store.insert(DEPLOYMENT_EVENTS_TABLE, vec![row]).await?;
        Ok(())
    }
}

/// Event with its position in the hash chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainedEvent {
    /// The event
    pub event: AuditEvent,
    /// Hash of the previous entry (zeros for the first)
    pub prev_hash: [u8; 32],
    /// Hash over this event and `prev_hash`
    pub hash: [u8; 32],
}

impl ChainedEvent {
    /// Hex form of the entry hash
    #[must_use]
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }
}

/// Integrity check failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("audit chain broken at entry {index}")]
pub struct IntegrityViolation {
    /// First entry whose links do not verify
    pub index: usize,
}

/// In-process hash-chained audit log
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    inner: Mutex<Vec<ChainedEvent>>,
}

impl MemoryAuditLog {
    /// Empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries in append order
    #[must_use]
    pub fn entries(&self) -> Vec<ChainedEvent> {
        self.inner.lock().clone()
    }

    /// Events in append order
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.inner.lock().iter().map(|e| e.event.clone()).collect()
    }

    /// Events of one type
    #[must_use]
    pub fn events_of(&self, event_type: AuditEventType) -> Vec<AuditEvent> {
        self.inner
            .lock()
            .iter()
            .filter(|e| e.event.event_type == event_type)
            .map(|e| e.event.clone())
            .collect()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Check if the log is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Recompute every link
    ///
    /// # Errors
    /// Returns the index of the first entry that does not verify.
    pub fn verify_integrity(&self) -> Result<(), IntegrityViolation> {
        let guard = self.inner.lock();
        let mut prev = [0u8; 32];
        for (index, entry) in guard.iter().enumerate() {
            if entry.prev_hash != prev || entry.hash != chain_hash(&entry.event, &prev) {
                return Err(IntegrityViolation { index });
            }
            prev = entry.hash;
        }
        Ok(())
    }

    #[cfg(test)]
    fn tamper(&self, index: usize, message: &str) {
        if let Some(entry) = self.inner.lock().get_mut(index) {
            entry.event.message = message.to_string();
        }
    }
}

#[async_trait]
impl AuditSink for MemoryAuditLog {
    async fn append(&self, event: AuditEvent) -> ForgeResult<()> {
        let mut guard = self.inner.lock();
        let prev_hash = guard.last().map_or([0u8; 32], |e| e.hash);
        let hash = chain_hash(&event, &prev_hash);
        guard.push(ChainedEvent {
            event,
            prev_hash,
            hash,
        });
        Ok(())
    }
}

fn chain_hash(event: &AuditEvent, prev_hash: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(event.token_id.to_string().as_bytes());
    hasher.update([0]);
    hasher.update(format_timestamp(event.timestamp).as_bytes());
    hasher.update([0]);
    hasher.update(format!("{:?}/{:?}", event.event_type, event.severity).as_bytes());
    hasher.update([0]);
    hasher.update(event.message.as_bytes());
    hasher.update([0]);
    hasher.update(event.data.to_string().as_bytes());
    hasher.update(prev_hash);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tcf_store::{Filter, InMemoryStore, Query};

    fn event(kind: AuditEventType, message: &str) -> AuditEvent {
        AuditEvent::new(TokenId::new(), kind, Severity::Info, message, Utc::now())
    }

    #[tokio::test]
    async fn chain_links_and_verifies() {
        let log = MemoryAuditLog::new();
        log.append(event(AuditEventType::DeploymentStarted, "start")).await.unwrap();
        log.append(event(AuditEventType::DeploymentSucceeded, "done")).await.unwrap();

        let entries = log.entries();
        assert_eq!(entries[0].prev_hash, [0u8; 32]);
        assert_eq!(entries[1].prev_hash, entries[0].hash);
        assert_eq!(entries[1].hash_hex().len(), 64);
        assert!(log.verify_integrity().is_ok());
    }

    #[tokio::test]
    async fn tampering_is_detected() {
        let log = MemoryAuditLog::new();
        for i in 0..3 {
            log.append(event(AuditEventType::DeploymentStarted, &format!("e{i}"))).await.unwrap();
        }
        log.tamper(1, "rewritten");
        assert_eq!(log.verify_integrity(), Err(IntegrityViolation { index: 1 }));
    }

    #[tokio::test]
    async fn events_filter_by_type() {
        let log = MemoryAuditLog::new();
        log.append(event(AuditEventType::DeploymentStarted, "a")).await.unwrap();
        log.append(event(AuditEventType::StrategyFallback, "b")).await.unwrap();
        assert_eq!(log.events_of(AuditEventType::StrategyFallback).len(), 1);
        assert_eq!(log.len(), 2);
    }

    #[tokio::test]
    async fn store_sink_writes_rows() {
        let store = Arc::new(InMemoryStore::new());
        let sink = StoreAuditSink::new(store.clone());
        let e = event(AuditEventType::DeploymentFailed, "gas").with_data(json!({"strategy": "chunked"}));
        let token = e.token_id;
        sink.append(e).await.unwrap();

        let rows = store
            .select(
                DEPLOYMENT_EVENTS_TABLE,
                &Query::new(Filter::new().eq("token_id", token.to_string())),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["event_type"], json!("deployment_failed"));
        assert_eq!(rows[0]["data"]["strategy"], json!("chunked"));
    }
}
