//! Child record reconciliation through the token service.
//!
//! Guarantees exercised here:
//! - Re-syncing an unchanged configuration writes nothing and keeps row ids.
//! - A unique violation climbs the conflict ladder: keyed upsert first, then
//!   a whole-set replace, then a reported failure with the attempted count.
//! - An exhausted ladder surfaces as a constraint violation, while the main
//!   token row stays in place.

use pretty_assertions::assert_eq;
use serde_json::Value;
use tcf_core::ForgeError;
use tcf_model::{Standard, TokenPatch};
use tcf_reconcile::{Resolution, SyncStatus};
use tcf_test_utils::{config_from_json, erc3525_config, Fault, Forge, Op};

const SLOTS: &str = "token_erc3525_slots";
const ALLOCATIONS: &str = "token_erc3525_allocations";

fn ids(forge: &Forge, table: &str) -> Vec<Value> {
    let mut ids: Vec<Value> = forge.store.rows(table).into_iter().map(|r| r["id"].clone()).collect();
    ids.sort_by_key(ToString::to_string);
    ids
}

/// Re-running the same configuration is a no-op for keyed collections.
#[tokio::test]
async fn unchanged_configuration_resync_is_idempotent() {
    let forge = Forge::default();
    let token_id = forge.create(erc3525_config(3)).await;
    let before = ids(&forge, SLOTS);
    assert_eq!(before.len(), 3);

    for _ in 0..2 {
        let write = forge
            .service
            .update_token(token_id, TokenPatch::new().with_standard_config(erc3525_config(3).standard))
            .await
            .unwrap();
        let slots = write.sync.as_ref().unwrap().collection("slots").unwrap().clone();
        assert_eq!(slots.status, SyncStatus::Success);
        assert_eq!(slots.resolution, Some(Resolution::KeyedSync));
        assert_eq!((slots.skipped, slots.inserted, slots.updated, slots.deleted), (3, 0, 0, 0));
    }

    assert_eq!(ids(&forge, SLOTS), before);
}

/// Changed and dropped keys are applied in place; surviving rows keep ids.
#[tokio::test]
async fn keyed_update_applies_minimal_diff() {
    let forge = Forge::default();
    let token_id = forge.create(erc3525_config(3)).await;
    let slot_one_id = forge
        .store
        .rows(SLOTS)
        .into_iter()
        .find(|r| r["slot_id"] == "1")
        .unwrap()["id"]
        .clone();

    let next = config_from_json(serde_json::json!({
        "name": "Fixture Bond",
        "symbol": "FXB",
        "standard": "ERC-3525",
        "slots": [
            {"slot_id": "1", "slot_name": "Senior", "value_units": "usd"},
            {"slot_id": "4", "slot_name": "Slot 4", "value_units": "usd"},
        ],
    }));
    let write = forge
        .service
        .update_token(token_id, TokenPatch::new().with_standard_config(next.standard))
        .await
        .unwrap();
    let slots = write.sync.unwrap().collection("slots").unwrap().clone();
    assert_eq!((slots.updated, slots.inserted, slots.deleted, slots.skipped), (1, 1, 2, 0));

    let rows = forge.store.rows(SLOTS);
    assert_eq!(rows.len(), 2);
    let senior = rows.iter().find(|r| r["slot_id"] == "1").unwrap();
    assert_eq!(senior["id"], slot_one_id);
    assert_eq!(senior["slot_name"], "Senior");
}

/// Ladder step A: a violation on insert is resolved by a keyed upsert.
#[tokio::test]
async fn unique_violation_resolved_by_upsert() {
    let forge = Forge::default();
    forge.store.fail_times(SLOTS, Op::Insert, Fault::UniqueViolation, 1);

    let write = forge.service.create_token(forge.project, erc3525_config(2)).await.unwrap();
    let slots = write.sync.as_ref().unwrap().collection("slots").unwrap();
    assert_eq!(slots.status, SyncStatus::Success);
    assert_eq!(slots.resolution, Some(Resolution::ConflictUpsert));
    assert!(write.is_complete());
    assert_eq!(forge.store.rows(SLOTS).len(), 2);
    assert_eq!(forge.store.calls(SLOTS, Op::Replace), 0);
}

/// Ladder step B: upsert fails too, so the whole set is replaced.
#[tokio::test]
async fn failed_upsert_falls_through_to_replace() {
    let forge = Forge::default();
    forge.store.fail(SLOTS, Op::Insert, Fault::UniqueViolation);
    forge.store.fail(SLOTS, Op::Upsert, Fault::Internal);

    let write = forge.service.create_token(forge.project, erc3525_config(2)).await.unwrap();
    let slots = write.sync.as_ref().unwrap().collection("slots").unwrap();
    assert_eq!(slots.status, SyncStatus::Success);
    assert_eq!(slots.resolution, Some(Resolution::ConflictReplace));
    assert_eq!(slots.inserted, 2);
    assert_eq!(forge.store.rows(SLOTS).len(), 2);
}

/// Collections without a natural key skip the upsert step.
#[tokio::test]
async fn unkeyed_collection_goes_straight_to_replace() {
    let forge = Forge::default();
    forge.store.fail_times(ALLOCATIONS, Op::Replace, Fault::UniqueViolation, 1);
    let config = config_from_json(serde_json::json!({
        "name": "Fixture Bond",
        "symbol": "FXB",
        "standard": "ERC-3525",
        "allocations": [{"slot_id": "1", "recipient": "0x4444444444444444444444444444444444444444", "value": "5"}],
    }));

    let write = forge.service.create_token(forge.project, config).await.unwrap();
    let allocations = write.sync.as_ref().unwrap().collection("allocations").unwrap();
    assert_eq!(allocations.resolution, Some(Resolution::ConflictReplace));
    assert_eq!(forge.store.calls(ALLOCATIONS, Op::Upsert), 0);
    assert_eq!(forge.store.calls(ALLOCATIONS, Op::Replace), 2);
    assert_eq!(forge.store.rows(ALLOCATIONS).len(), 1);
}

/// Ladder step C: every step fails and the attempted count is reported.
#[tokio::test]
async fn exhausted_ladder_reports_constraint_violation() {
    let forge = Forge::default();
    forge.store.fail(SLOTS, Op::Insert, Fault::UniqueViolation);
    forge.store.fail(SLOTS, Op::Upsert, Fault::UniqueViolation);
    forge.store.fail(SLOTS, Op::Replace, Fault::UniqueViolation);

    let write = forge.service.create_token(forge.project, erc3525_config(2)).await.unwrap();
    let report = write.sync.clone().unwrap();
    let slots = report.collection("slots").unwrap();
    assert_eq!(slots.status, SyncStatus::Failed);
    assert_eq!(slots.count, 2);
    assert!(slots.unresolved_conflict);
    assert!(slots.error.as_deref().unwrap().contains("duplicate key"));
    assert_eq!(report.properties.status, SyncStatus::Success);
    assert!(!write.is_complete());

    let token_id = write.token.id;
    let err = write.ensure_complete().unwrap_err();
    assert!(matches!(err, ForgeError::ConstraintViolation { ref collection, .. } if collection == "slots"));

    // main row survives the child failure
    assert_eq!(forge.service.load_token(token_id).await.unwrap().standard, Standard::Erc3525);
    assert!(forge.store.rows(SLOTS).is_empty());
}

/// Non-conflict failures do not enter the ladder.
#[tokio::test]
async fn outage_is_incomplete_sync_not_conflict() {
    let forge = Forge::default();
    forge.store.fail(SLOTS, Op::Select, Fault::Unavailable);

    let write = forge.service.create_token(forge.project, erc3525_config(1)).await.unwrap();
    assert_eq!(forge.store.calls(SLOTS, Op::Upsert), 0);
    assert!(!write.sync.as_ref().unwrap().collection("slots").unwrap().unresolved_conflict);
    let err = write.ensure_complete().unwrap_err();
    assert!(matches!(err, ForgeError::IncompleteSync { .. }));
}
