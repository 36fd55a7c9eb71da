//! Deployment rate limiter and attempt ledger
//!
//! Hourly and daily sliding windows over `deployment_attempts` rows, counted
//! per (user, project) by `started_at`. The limiter is best effort: admission
//! is a read, the start record a later write, with no lock in between. A
//! failing count query admits the request.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tcf_model::{format_timestamp, Clock, ProjectId, TokenId, UserId};
use tcf_store::{Filter, Query, StoreError, StructuredStore};

/// Table holding one row per deployment start
pub const DEPLOYMENT_ATTEMPTS_TABLE: &str = "deployment_attempts";

/// Retry-after for a full hourly window
pub const HOURLY_RETRY_AFTER_SECS: u64 = 3_600;

/// Retry-after for a full daily window
pub const DAILY_RETRY_AFTER_SECS: u64 = 86_400;

/// Window ceilings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Enforce limits at all
    pub enabled: bool,
    /// Deployments per rolling hour
    pub per_hour: usize,
    /// Deployments per rolling day
    pub per_day: usize,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            per_hour: 10,
            per_day: 50,
        }
    }
}

/// Attempt lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    /// Deployment in flight (or abandoned)
    Started,
    /// Deployment succeeded
    Success,
    /// Deployment failed
    Failed,
}

impl AttemptStatus {
    fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

/// Window that denied admission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitWindow {
    /// Rolling hour
    Hourly,
    /// Rolling day
    Daily,
}

/// Admission decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Admission {
    /// Go ahead
    Allowed {
        /// Attempts in the rolling hour, `None` when unknown
        hourly: Option<usize>,
        /// Attempts in the rolling day, `None` when unknown
        daily: Option<usize>,
    },
    /// Over a ceiling
    Denied {
        /// Window at its ceiling
        window: LimitWindow,
        /// Attempts counted in that window
        count: usize,
        /// Window ceiling
        limit: usize,
        /// Seconds to wait
        retry_after_secs: u64,
    },
}

impl Admission {
    /// Check if the request may proceed
    #[inline]
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Sliding-window rate limiter backed by the structured store
#[derive(Debug, Clone)]
pub struct RateLimiter {
    store: Arc<dyn StructuredStore>,
    clock: Arc<dyn Clock>,
    settings: RateLimitSettings,
}

impl RateLimiter {
    /// Limiter over a store and clock
    #[must_use]
    pub fn new(store: Arc<dyn StructuredStore>, clock: Arc<dyn Clock>, settings: RateLimitSettings) -> Self {
        Self {
            store,
            clock,
            settings,
        }
    }

    /// Active settings
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &RateLimitSettings {
        &self.settings
    }

    /// Decide whether a deployment may start
    pub async fn check_admission(&self, user: &UserId, project: &ProjectId) -> Admission {
        if !self.settings.enabled {
            return Admission::Allowed {
                hourly: None,
                daily: None,
            };
        }

        let now = self.clock.now();
        let hourly = match self.count_since(user, project, now - Duration::hours(1)).await {
            Ok(n) => n,
            Err(e) => return Self::fail_open(&e),
        };
        if hourly >= self.settings.per_hour {
            tracing::info!(%user, %project, count = hourly, limit = self.settings.per_hour, "hourly deployment limit reached");
            return Admission::Denied {
                window: LimitWindow::Hourly,
                count: hourly,
                limit: self.settings.per_hour,
                retry_after_secs: HOURLY_RETRY_AFTER_SECS,
            };
        }

        let daily = match self.count_since(user, project, now - Duration::days(1)).await {
            Ok(n) => n,
            Err(e) => return Self::fail_open(&e),
        };
        if daily >= self.settings.per_day {
            tracing::info!(%user, %project, count = daily, limit = self.settings.per_day, "daily deployment limit reached");
            return Admission::Denied {
                window: LimitWindow::Daily,
                count: daily,
                limit: self.settings.per_day,
                retry_after_secs: DAILY_RETRY_AFTER_SECS,
            };
        }

        Admission::Allowed {
            hourly: Some(hourly),
            daily: Some(daily),
        }
    }

    /// Insert a `started` attempt row; returns its id
    ///
    /// # Errors
    /// Returns the store error if the insert fails.
    pub async fn record_start(
        &self,
        user: &UserId,
        project: &ProjectId,
        token: &TokenId,
    ) -> Result<Option<String>, StoreError> {
        let mut row = Map::new();
        row.insert("user_id".into(), Value::String(user.to_string()));
        row.insert("project_id".into(), Value::String(project.to_string()));
        row.insert("token_id".into(), Value::String(token.to_string()));
        row.insert("status".into(), Value::String(AttemptStatus::Started.as_str().into()));
        row.insert("started_at".into(), Value::String(format_timestamp(self.clock.now())));
        row.insert("completed_at".into(), Value::Null);

        let stored = self.store.insert(DEPLOYMENT_ATTEMPTS_TABLE, vec![row]).await?;
        Ok(stored
            .first()
            .and_then(|r| r.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    /// Close the most recent `started` attempt for the triple
    ///
    /// Returns `false` when no open attempt exists.
    ///
    /// # Errors
    /// Returns the store error if the lookup or update fails.
    pub async fn record_completion(
        &self,
        user: &UserId,
        project: &ProjectId,
        token: &TokenId,
        status: AttemptStatus,
        error: Option<&str>,
    ) -> Result<bool, StoreError> {
        let open = Filter::new()
            .eq("user_id", user.to_string())
            .eq("project_id", project.to_string())
            .eq("token_id", token.to_string())
            .eq("status", AttemptStatus::Started.as_str());
        let latest = self
            .store
            .select(
                DEPLOYMENT_ATTEMPTS_TABLE,
                &Query::new(open).order_desc("started_at").limit(1),
            )
            .await?;

        let Some(id) = latest.first().and_then(|r| r.get("id")).cloned() else {
            tracing::warn!(%user, %project, %token, "no open deployment attempt to complete");
            return Ok(false);
        };

        let mut patch = Map::new();
        patch.insert("status".into(), Value::String(status.as_str().into()));
        patch.insert("completed_at".into(), Value::String(format_timestamp(self.clock.now())));
        if let Some(error) = error {
            patch.insert("error".into(), Value::String(error.to_string()));
        }
        self.store
            .update(DEPLOYMENT_ATTEMPTS_TABLE, &patch, &Filter::new().eq("id", id))
            .await?;
        Ok(true)
    }

    async fn count_since(
        &self,
        user: &UserId,
        project: &ProjectId,
        since: chrono::DateTime<chrono::Utc>,
    ) -> Result<usize, StoreError> {
        let filter = Filter::new()
            .eq("user_id", user.to_string())
            .eq("project_id", project.to_string())
            .gte("started_at", format_timestamp(since));
        self.store.count(DEPLOYMENT_ATTEMPTS_TABLE, &filter).await
    }

    fn fail_open(error: &StoreError) -> Admission {
        tracing::warn!(%error, "rate limit check failed, admitting");
        Admission::Allowed {
            hourly: None,
            daily: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tcf_model::ManualClock;
    use tcf_store::InMemoryStore;

    struct Fixture {
        store: Arc<InMemoryStore>,
        clock: Arc<ManualClock>,
        limiter: RateLimiter,
        user: UserId,
        project: ProjectId,
    }

    fn fixture(settings: RateLimitSettings) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let limiter = RateLimiter::new(store.clone(), clock.clone(), settings);
        Fixture {
            store,
            clock,
            limiter,
            user: UserId::new(),
            project: ProjectId::new(),
        }
    }

    #[tokio::test]
    async fn hourly_window_denies_at_ceiling() {
        let f = fixture(RateLimitSettings {
            per_hour: 2,
            ..RateLimitSettings::default()
        });
        for _ in 0..2 {
            assert!(f.limiter.check_admission(&f.user, &f.project).await.is_allowed());
            f.limiter.record_start(&f.user, &f.project, &TokenId::new()).await.unwrap();
        }

        let denied = f.limiter.check_admission(&f.user, &f.project).await;
        assert_eq!(
            denied,
            Admission::Denied {
                window: LimitWindow::Hourly,
                count: 2,
                limit: 2,
                retry_after_secs: HOURLY_RETRY_AFTER_SECS,
            }
        );

        f.clock.advance(Duration::minutes(61));
        assert!(f.limiter.check_admission(&f.user, &f.project).await.is_allowed());
    }

    #[tokio::test]
    async fn daily_window_denies_with_day_retry() {
        let f = fixture(RateLimitSettings {
            per_hour: 100,
            per_day: 3,
            ..RateLimitSettings::default()
        });
        for _ in 0..3 {
            f.limiter.record_start(&f.user, &f.project, &TokenId::new()).await.unwrap();
            f.clock.advance(Duration::hours(2));
        }
        match f.limiter.check_admission(&f.user, &f.project).await {
            Admission::Denied { window, retry_after_secs, .. } => {
                assert_eq!(window, LimitWindow::Daily);
                assert_eq!(retry_after_secs, DAILY_RETRY_AFTER_SECS);
            }
            other => panic!("expected denial, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn windows_are_per_user_and_project() {
        let f = fixture(RateLimitSettings {
            per_hour: 1,
            ..RateLimitSettings::default()
        });
        f.limiter.record_start(&f.user, &f.project, &TokenId::new()).await.unwrap();

        assert!(!f.limiter.check_admission(&f.user, &f.project).await.is_allowed());
        assert!(f.limiter.check_admission(&UserId::new(), &f.project).await.is_allowed());
        assert!(f.limiter.check_admission(&f.user, &ProjectId::new()).await.is_allowed());
    }

    #[tokio::test]
    async fn disabled_limiter_always_admits() {
        let f = fixture(RateLimitSettings {
            enabled: false,
            per_hour: 0,
            per_day: 0,
        });
        assert!(f.limiter.check_admission(&f.user, &f.project).await.is_allowed());
    }

    #[tokio::test]
    async fn completion_closes_latest_open_attempt() {
        let f = fixture(RateLimitSettings::default());
        let token = TokenId::new();

        let first = f.limiter.record_start(&f.user, &f.project, &token).await.unwrap();
        f.clock.advance(Duration::seconds(5));
        let second = f.limiter.record_start(&f.user, &f.project, &token).await.unwrap();

        let closed = f
            .limiter
            .record_completion(&f.user, &f.project, &token, AttemptStatus::Success, None)
            .await
            .unwrap();
        assert!(closed);

        let rows = f.store.rows(DEPLOYMENT_ATTEMPTS_TABLE);
        let status_of = |id: &Option<String>| {
            rows.iter()
                .find(|r| r.get("id").and_then(Value::as_str) == id.as_deref())
                .and_then(|r| r.get("status"))
                .cloned()
        };
        assert_eq!(status_of(&second), Some(Value::String("success".into())));
        assert_eq!(status_of(&first), Some(Value::String("started".into())));
    }

    #[tokio::test]
    async fn completion_without_open_attempt_is_noop() {
        let f = fixture(RateLimitSettings::default());
        let closed = f
            .limiter
            .record_completion(&f.user, &f.project, &TokenId::new(), AttemptStatus::Failed, Some("boom"))
            .await
            .unwrap();
        assert!(!closed);
    }
}
