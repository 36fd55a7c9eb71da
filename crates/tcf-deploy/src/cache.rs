//! Deployment recommendation cache using moka
//!
//! Entries are keyed by token id and the token's `updated_at`, so any write
//! to the token makes older entries unreachable; they age out through the
//! capacity bound and TTL.

use crate::chain::CostEstimate;
use crate::complexity::ComplexityScore;
use crate::strategy::StrategySelection;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tcf_model::{Standard, TokenId};

/// What the orchestrator would do for a token right now
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Token
    pub token_id: TokenId,
    /// Standard
    pub standard: Standard,
    /// Complexity of the stored configuration
    pub complexity: ComplexityScore,
    /// Strategy the selector picks with no override
    pub selection: StrategySelection,
    /// Chain-side estimate, when the deployer answered
    pub chain_estimate: Option<CostEstimate>,
    /// Human-readable drivers
    pub reasons: Vec<String>,
}

/// Recommendation cache
#[derive(Debug, Clone)]
pub struct RecommendationCache {
    inner: Cache<(TokenId, String), Arc<Recommendation>>,
}

impl RecommendationCache {
    /// Cache with a capacity bound
    #[inline]
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::new(max_capacity),
        }
    }

    /// Cache with capacity bound and TTL
    #[inline]
    #[must_use]
    pub fn with_ttl(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Cached recommendation for a token version
    pub async fn get(&self, token_id: TokenId, updated_at: &str) -> Option<Arc<Recommendation>> {
        self.inner.get(&(token_id, updated_at.to_string())).await
    }

    /// Store a recommendation for a token version
    pub async fn insert(&self, updated_at: &str, recommendation: Recommendation) -> Arc<Recommendation> {
        let value = Arc::new(recommendation);
        self.inner
            .insert((value.token_id, updated_at.to_string()), value.clone())
            .await;
        value
    }
}

impl Default for RecommendationCache {
    fn default() -> Self {
        Self::with_ttl(1_024, Duration::from_secs(300))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complexity::ComplexityAnalyzer;
    use crate::strategy::{DeploymentStrategy, StrategySelector};
    use tcf_model::mapping::empty_config;

    fn recommendation(token_id: TokenId) -> Recommendation {
        let complexity = ComplexityAnalyzer::default().analyze(&empty_config(Standard::Erc20));
        let selection = StrategySelector::default().select(&complexity, DeploymentStrategy::Auto);
        Recommendation {
            token_id,
            standard: Standard::Erc20,
            complexity,
            selection,
            chain_estimate: None,
            reasons: Vec::new(),
        }
    }

    #[tokio::test]
    async fn hit_only_for_same_version() {
        let cache = RecommendationCache::new(16);
        let token = TokenId::new();
        cache.insert("2025-01-01T00:00:00.000Z", recommendation(token)).await;

        assert!(cache.get(token, "2025-01-01T00:00:00.000Z").await.is_some());
        assert!(cache.get(token, "2025-01-01T00:00:01.000Z").await.is_none());
        assert!(cache.get(TokenId::new(), "2025-01-01T00:00:00.000Z").await.is_none());
    }
}
