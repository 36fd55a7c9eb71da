//! Deployment admission and the attempt ledger.
//!
//! Guarantees exercised here:
//! - Windows are per (user, project) and slide with the clock.
//! - The request that would exceed a ceiling is denied with a retry hint and
//!   leaves no attempt row behind.
//! - A ledger the limiter cannot read admits the request.
//! - Ledger write failures are handled differently: a failed start aborts the
//!   deployment, a failed completion does not.

use chrono::Duration;
use pretty_assertions::assert_eq;
use serde_json::Value;
use tcf_core::{AuditEventType, DeployOptions, ForgeError, ForgeSettings};
use tcf_deploy::{LimitWindow, DEPLOYMENT_ATTEMPTS_TABLE};
use tcf_model::{TokenId, UserId};
use tcf_test_utils::{feature_config, Fault, Forge, Op};

const WALLET: &str = "0x9999999999999999999999999999999999999999";

fn limited(per_hour: usize, per_day: usize) -> Forge {
    let mut settings = ForgeSettings::default();
    settings.rate_limits.per_hour = per_hour;
    settings.rate_limits.per_day = per_day;
    Forge::new(settings)
}

async fn deploy(forge: &Forge, token_id: TokenId) -> Result<(), ForgeError> {
    forge
        .orchestrator
        .deploy_token(forge.deploy_request(token_id, DeployOptions::new(WALLET)))
        .await
        .map(|_| ())
}

async fn deploy_new(forge: &Forge) -> Result<(), ForgeError> {
    let token_id = forge.create(feature_config(0)).await;
    deploy(forge, token_id).await
}

/// The twentieth deployment in an hour is admitted, the twenty-first is not.
#[tokio::test]
async fn hourly_ceiling_is_exact() {
    let forge = limited(20, 50);
    for _ in 0..20 {
        deploy_new(&forge).await.unwrap();
    }

    let err = deploy_new(&forge).await.unwrap_err();
    assert!(matches!(
        err,
        ForgeError::AdmissionDenied {
            window: LimitWindow::Hourly,
            count: 20,
            limit: 20,
            ..
        }
    ));
    assert_eq!(err.retry_after_secs(), Some(3_600));
    assert!(err.is_retryable());

    assert_eq!(forge.store.rows(DEPLOYMENT_ATTEMPTS_TABLE).len(), 20);
    assert_eq!(forge.audit.events_of(AuditEventType::AdmissionDenied).len(), 1);
    assert_eq!(forge.chain.deploys().len(), 20);

    forge.clock.advance(Duration::minutes(61));
    deploy_new(&forge).await.unwrap();
}

/// The daily window keeps counting after the hourly one rolled over.
#[tokio::test]
async fn daily_ceiling_outlives_hourly_window() {
    let forge = limited(10, 3);
    for _ in 0..3 {
        deploy_new(&forge).await.unwrap();
        forge.clock.advance(Duration::hours(2));
    }

    let err = deploy_new(&forge).await.unwrap_err();
    assert!(matches!(
        err,
        ForgeError::AdmissionDenied {
            window: LimitWindow::Daily,
            count: 3,
            limit: 3,
            retry_after_secs: 86_400,
        }
    ));

    forge.clock.advance(Duration::hours(20));
    deploy_new(&forge).await.unwrap();
}

/// Another user of the same project has their own window.
#[tokio::test]
async fn windows_are_per_user() {
    let forge = limited(1, 50);
    deploy_new(&forge).await.unwrap();
    assert!(matches!(
        deploy_new(&forge).await,
        Err(ForgeError::AdmissionDenied { .. })
    ));

    let token_id = forge.create(feature_config(0)).await;
    let mut request = forge.deploy_request(token_id, DeployOptions::new(WALLET));
    request.user = UserId::new();
    forge.orchestrator.deploy_token(request).await.unwrap();
}

/// An unreadable ledger admits rather than blocks.
#[tokio::test]
async fn count_failure_fails_open() {
    let forge = limited(1, 1);
    forge
        .store
        .fail(DEPLOYMENT_ATTEMPTS_TABLE, Op::Count, Fault::Unavailable);

    deploy_new(&forge).await.unwrap();
    deploy_new(&forge).await.unwrap();
    assert_eq!(forge.store.rows(DEPLOYMENT_ATTEMPTS_TABLE).len(), 2);
}

/// Disabled limits never consult the ledger.
#[tokio::test]
async fn disabled_limits_skip_counting() {
    let mut settings = ForgeSettings::default();
    settings.rate_limits.enabled = false;
    settings.rate_limits.per_hour = 1;
    let forge = Forge::new(settings);

    deploy_new(&forge).await.unwrap();
    deploy_new(&forge).await.unwrap();
    assert_eq!(forge.store.calls(DEPLOYMENT_ATTEMPTS_TABLE, Op::Count), 0);
}

/// Without a start record the deployment does not reach the chain.
#[tokio::test]
async fn start_record_failure_aborts() {
    let forge = Forge::default();
    forge
        .store
        .fail(DEPLOYMENT_ATTEMPTS_TABLE, Op::Insert, Fault::Unavailable);

    let err = deploy_new(&forge).await.unwrap_err();
    assert!(matches!(err, ForgeError::Infrastructure(_)));
    assert!(err.is_retryable());
    assert!(forge.chain.deploys().is_empty());
}

/// A lost completion write leaves the attempt open but the deployment stands.
#[tokio::test]
async fn completion_failure_is_not_fatal() {
    let forge = Forge::default();
    forge
        .store
        .fail(DEPLOYMENT_ATTEMPTS_TABLE, Op::Update, Fault::Internal);

    let token_id = forge.create(feature_config(0)).await;
    deploy(&forge, token_id).await.unwrap();

    let rows = forge.store.rows(DEPLOYMENT_ATTEMPTS_TABLE);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["status"], Value::from("started"));
    assert!(forge.service.load_token(token_id).await.unwrap().is_deployed());
}

/// Completed attempts still count toward the window.
#[tokio::test]
async fn failed_attempts_count_too() {
    let forge = limited(2, 50);
    forge.chain.fail_template(
        tcf_deploy::ContractTemplate::Basic,
        tcf_deploy::ChainError::Rejected("revert".into()),
    );

    assert!(matches!(
        deploy_new(&forge).await,
        Err(ForgeError::StrategyExecutionFailed { .. })
    ));
    assert!(matches!(
        deploy_new(&forge).await,
        Err(ForgeError::StrategyExecutionFailed { .. })
    ));
    assert!(matches!(
        deploy_new(&forge).await,
        Err(ForgeError::AdmissionDenied { .. })
    ));

    let statuses: Vec<Value> = forge
        .store
        .rows(DEPLOYMENT_ATTEMPTS_TABLE)
        .into_iter()
        .map(|r| r["status"].clone())
        .collect();
    assert_eq!(statuses, vec![Value::from("failed"), Value::from("failed")]);
}
