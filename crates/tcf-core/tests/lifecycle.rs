//! Token lifecycle and batch operations.
//!
//! Guarantees exercised here:
//! - A failing batch item never stops or undoes its siblings.
//! - Deleting a token clears every child table independently and always
//!   removes the main row.
//! - Templates and clones produce independent tokens with the same children.

use pretty_assertions::assert_eq;
use std::sync::Arc;
use tcf_core::{
    CloneRequest, ConfigValidator, ForgeError, ForgeSettings, ImportRequest, TokenService,
};
use tcf_model::{Standard, TemplateId, TokenConfig, TokenId, TokenStatus};
use tcf_reconcile::SyncStatus;
use tcf_test_utils::{config_for, erc1400_config, erc3525_config, feature_config, Fault, Forge, Op};

const ERC1400_TABLES: [&str; 6] = [
    "token_erc1400_partitions",
    "token_erc1400_controllers",
    "token_erc1400_documents",
    "token_erc1400_corporate_actions",
    "token_erc1400_regulatory_filings",
    "token_erc1400_partition_balances",
];

/// One unsupported standard in the middle of a create batch.
#[tokio::test]
async fn create_batch_isolates_failures() {
    let mut settings = ForgeSettings::default();
    settings.deployment.supported_standards = vec![Standard::Erc20, Standard::Erc3525];
    let forge = Forge::new(settings);

    let result = forge
        .service
        .create_tokens(
            forge.project,
            vec![feature_config(1), erc1400_config(), erc3525_config(2)],
        )
        .await;

    assert!(!result.success);
    assert_eq!((result.succeeded, result.failed), (2, 1));
    assert!(result.results[0].is_some());
    assert!(result.results[1].is_none());
    assert!(result.results[2].is_some());
    let error = result.error_at(1).unwrap();
    assert!(error.message.contains("ERC-1400"));
    assert!(!error.retryable);
    assert_eq!(forge.store.rows(tcf_model::TOKENS_TABLE).len(), 2);
}

/// An item whose children failed counts as failed; its main row remains.
#[tokio::test]
async fn incomplete_sync_fails_the_item() {
    let forge = Forge::default();
    forge
        .store
        .fail("token_erc3525_slots", Op::Select, Fault::Unavailable);

    let result = forge
        .service
        .create_tokens(forge.project, vec![feature_config(0), erc3525_config(1)])
        .await;

    assert_eq!((result.succeeded, result.failed), (1, 1));
    let error = result.error_at(1).unwrap();
    assert!(error.message.contains("slots"));
    assert_eq!(forge.store.rows(tcf_model::TOKENS_TABLE).len(), 2);
}

/// Status batch with a missing token.
#[tokio::test]
async fn status_batch_reports_missing_tokens() {
    let forge = Forge::default();
    let a = forge.create(feature_config(0)).await;
    let b = forge.create(feature_config(1)).await;

    let result = forge
        .service
        .update_statuses(vec![
            (a, TokenStatus::UnderReview),
            (TokenId::new(), TokenStatus::Approved),
            (b, TokenStatus::Ready),
        ])
        .await;

    assert_eq!((result.succeeded, result.failed), (2, 1));
    assert!(result.error_at(1).unwrap().message.contains("not found"));
    assert_eq!(forge.service.load_token(a).await.unwrap().status, TokenStatus::UnderReview);
    assert_eq!(forge.service.load_token(b).await.unwrap().status, TokenStatus::Ready);
}

#[derive(Debug)]
struct RequireSymbol;

impl ConfigValidator for RequireSymbol {
    fn validate(&self, config: &TokenConfig) -> Result<(), String> {
        if config.symbol.trim().is_empty() {
            Err("symbol is required".into())
        } else {
            Ok(())
        }
    }
}

/// Pre-flight validation rejects the whole batch before any write.
#[tokio::test]
async fn preflight_rejects_batch_before_writes() {
    let mut settings = ForgeSettings::default();
    settings.batch.preflight_validation = true;
    let forge = Forge::new(settings);
    let service = TokenService::new(forge.store.clone(), forge.clock.clone(), Arc::new(forge.service.settings().clone()))
        .with_validator(Arc::new(RequireSymbol));

    let mut blank = feature_config(0);
    blank.symbol = " ".into();
    let result = service
        .create_tokens(forge.project, vec![feature_config(0), blank])
        .await;

    assert!(result.rejected);
    assert_eq!(result.validity, vec![true, false]);
    assert!(forge.store.rows(tcf_model::TOKENS_TABLE).is_empty());
}

/// Two child tables fail during delete; the rest and the main row go.
#[tokio::test]
async fn delete_clears_tables_independently() {
    let forge = Forge::default();
    let token_id = forge.create(erc1400_config()).await;
    for table in ERC1400_TABLES {
        assert_eq!(forge.store.rows(table).len(), 1, "{table}");
    }

    forge
        .store
        .fail("token_erc1400_documents", Op::Delete, Fault::Unavailable);
    forge
        .store
        .fail("token_erc1400_controllers", Op::Delete, Fault::Internal);

    let report = forge.service.delete_token(forge.project, token_id).await.unwrap();
    assert!(report.token_deleted);
    assert!(!report.is_complete());
    assert_eq!(report.children.properties.status, SyncStatus::Success);

    let mut failed: Vec<&str> = report
        .children
        .failures()
        .into_iter()
        .map(|r| r.collection.as_str())
        .collect();
    failed.sort_unstable();
    assert_eq!(failed, vec!["controllers", "documents"]);

    assert!(forge.store.rows("token_erc1400_properties").is_empty());
    for table in ERC1400_TABLES {
        let expected = usize::from(table.ends_with("documents") || table.ends_with("controllers"));
        assert_eq!(forge.store.rows(table).len(), expected, "{table}");
    }

    let err = forge.service.get_token(token_id).await.unwrap_err();
    assert!(matches!(err, ForgeError::NotFound { entity: "token", .. }));
}

/// Delete batch: the item succeeds once the main row is gone.
#[tokio::test]
async fn delete_batch_counts_main_row() {
    let forge = Forge::default();
    let a = forge.create(erc3525_config(1)).await;
    let b = forge.create(feature_config(0)).await;
    forge
        .store
        .fail("token_erc3525_slots", Op::Delete, Fault::Unavailable);

    let result = forge
        .service
        .delete_tokens(forge.project, vec![a, TokenId::new(), b])
        .await;

    assert_eq!((result.succeeded, result.failed), (2, 1));
    let first = result.results[0].as_ref().unwrap();
    assert!(first.token_deleted);
    assert!(!first.is_complete());
    assert!(result.results[2].as_ref().unwrap().is_complete());
    assert!(forge.store.rows(tcf_model::TOKENS_TABLE).is_empty());
}

/// Every standard creates, reads back, and deletes cleanly.
#[tokio::test]
async fn every_standard_round_trips_through_storage() {
    let forge = Forge::default();
    for standard in Standard::ALL {
        let config = config_for(standard);
        let write = forge.service.create_token(forge.project, config.clone()).await.unwrap();
        assert!(write.is_complete(), "{standard}");

        let snapshot = forge.service.get_token(write.token.id).await.unwrap();
        assert_eq!(snapshot.token.standard, standard);
        assert_eq!(
            snapshot.collections.len(),
            config.standard.collections().into_iter().filter(|(_, rows)| rows.is_some()).count(),
            "{standard}"
        );

        let report = forge.service.delete_token(forge.project, write.token.id).await.unwrap();
        assert!(report.is_complete(), "{standard}");
    }
    assert!(forge.store.rows(tcf_model::TOKENS_TABLE).is_empty());
}

/// Global templates import into any project; project templates stay private.
#[tokio::test]
async fn template_visibility() {
    let forge = Forge::default();
    let global = forge
        .service
        .save_template(None, "Bond", &erc3525_config(2))
        .await
        .unwrap();
    let private = forge
        .service
        .save_template(Some(tcf_model::ProjectId::new()), "Private", &erc3525_config(1))
        .await
        .unwrap();

    let result = forge
        .service
        .import_from_templates(
            forge.project,
            vec![
                ImportRequest {
                    template_id: global,
                    name: Some("Series A".into()),
                    symbol: None,
                },
                ImportRequest {
                    template_id: private,
                    name: None,
                    symbol: None,
                },
                ImportRequest {
                    template_id: TemplateId::new(),
                    name: None,
                    symbol: None,
                },
            ],
        )
        .await;

    assert_eq!((result.succeeded, result.failed), (1, 2));
    let imported = result.results[0].as_ref().unwrap();
    assert_eq!(imported.token.name, "Series A");
    assert_eq!(imported.token.symbol, "FXB");
    assert_eq!(forge.store.rows("token_erc3525_slots").len(), 2);
}

/// A clone copies children but not deployment state.
#[tokio::test]
async fn clone_copies_children_only() {
    let forge = Forge::default();
    let source = forge.create(erc3525_config(3)).await;
    forge
        .orchestrator
        .deploy_token(forge.deploy_request(source, tcf_core::DeployOptions::new("0xwallet")))
        .await
        .unwrap();

    let result = forge
        .service
        .clone_tokens(
            forge.project,
            vec![
                CloneRequest {
                    source,
                    name: None,
                    symbol: Some("FXB2".into()),
                },
                CloneRequest {
                    source: TokenId::new(),
                    name: None,
                    symbol: None,
                },
            ],
        )
        .await;

    assert_eq!((result.succeeded, result.failed), (1, 1));
    let copy = &result.results[0].as_ref().unwrap().token;
    assert_eq!(copy.name, "Fixture Bond (Copy)");
    assert_eq!(copy.symbol, "FXB2");
    assert_eq!(copy.status, TokenStatus::Draft);
    assert!(copy.address.is_none());

    let snapshot = forge.service.get_token(copy.id).await.unwrap();
    assert_eq!(snapshot.collection_len("slots"), 3);
    assert_eq!(forge.store.rows("token_erc3525_slots").len(), 6);
}
