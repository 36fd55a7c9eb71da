//! Deployment orchestrator
//!
//! Owns the deploy flow: ownership and standard checks, rate limit
//! admission, attempt ledger, complexity analysis, strategy selection, the
//! run state machine, execution with at most one fallback, and recording the
//! outcome on the token and in the audit trail.

use crate::audit::{AuditEvent, AuditEventType, AuditSink, Severity};
use crate::error::{ForgeError, ForgeResult};
use crate::service::TokenService;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tcf_deploy::{
    Admission, AttemptStatus, ChainDeployer, ComplexityAnalyzer, ComplexityScore, ContractTemplate,
    DeployError, DeploymentOutcome, DeploymentPayload, DeploymentStrategy, ExecutionContext,
    ExecutorSet, GasConfig, RateLimiter, Recommendation, RecommendationCache, RunState,
    StrategyExecutor, StrategyRun, StrategySelection, StrategySelector, Verification,
};
use tcf_model::{format_timestamp, Clock, ProjectId, Token, TokenId, UserId};

/// Caller choices for one deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployOptions {
    /// Deploying wallet
    pub wallet: String,
    /// Strategy override (`auto` lets the selector decide)
    #[serde(default)]
    pub strategy: DeploymentStrategy,
    /// Target network (settings default when absent)
    #[serde(default)]
    pub network: Option<String>,
    /// Gas overrides
    #[serde(default)]
    pub gas: Option<GasConfig>,
}

impl DeployOptions {
    /// Automatic strategy on the default network
    pub fn new(wallet: impl Into<String>) -> Self {
        Self {
            wallet: wallet.into(),
            strategy: DeploymentStrategy::Auto,
            network: None,
            gas: None,
        }
    }

    /// Force a strategy
    #[must_use]
    pub fn with_strategy(mut self, strategy: DeploymentStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Target a network
    #[must_use]
    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    /// Gas overrides
    #[must_use]
    pub fn with_gas(mut self, gas: GasConfig) -> Self {
        self.gas = Some(gas);
        self
    }
}

/// One deploy request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployRequest {
    /// Token to deploy
    pub token_id: TokenId,
    /// Requesting user
    pub user: UserId,
    /// Project the token must belong to
    pub project: ProjectId,
    /// Options
    pub options: DeployOptions,
}

/// Successful deployment with the decisions that led to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentReport {
    /// Token after the deployment fields were written
    pub token: Token,
    /// Chain outcome
    pub outcome: DeploymentOutcome,
    /// Strategy the selector chose
    pub selection: StrategySelection,
    /// Complexity of the deployed configuration
    pub complexity: ComplexityScore,
    /// Run states in order
    pub run_history: Vec<RunState>,
    /// Attempt ledger row id
    pub attempt_id: Option<String>,
}

struct Executed {
    outcome: DeploymentOutcome,
    selection: StrategySelection,
    complexity: ComplexityScore,
    run_history: Vec<RunState>,
}

/// Deployment orchestrator
#[derive(Debug, Clone)]
pub struct DeploymentOrchestrator {
    service: TokenService,
    chain: Arc<dyn ChainDeployer>,
    executors: ExecutorSet,
    analyzer: ComplexityAnalyzer,
    selector: StrategySelector,
    limiter: RateLimiter,
    audit: Arc<dyn AuditSink>,
    cache: RecommendationCache,
    clock: Arc<dyn Clock>,
}

impl DeploymentOrchestrator {
    /// Orchestrator using the service's store and settings
    #[must_use]
    pub fn new(
        service: TokenService,
        chain: Arc<dyn ChainDeployer>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let settings = service.settings().clone();
        Self {
            executors: ExecutorSet::new(chain.clone()),
            analyzer: ComplexityAnalyzer::new(settings.complexity.clone()),
            selector: StrategySelector::new(settings.deployment.selector()),
            limiter: RateLimiter::new(service.store().clone(), clock.clone(), settings.rate_limits.clone()),
            cache: RecommendationCache::with_ttl(
                settings.deployment.recommendation_cache_capacity,
                settings.deployment.recommendation_ttl(),
            ),
            service,
            chain,
            audit,
            clock,
        }
    }

    /// Replace the executor for one strategy
    ///
    /// # Errors
    /// [`ForgeError::Deploy`] for an `auto` executor.
    pub fn with_executor(mut self, executor: Arc<dyn StrategyExecutor>) -> ForgeResult<Self> {
        self.executors.register(executor)?;
        Ok(self)
    }

    /// Token service
    #[inline]
    #[must_use]
    pub fn service(&self) -> &TokenService {
        &self.service
    }

    /// Rate limiter
    #[inline]
    #[must_use]
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Deploy a token
    ///
    /// # Errors
    /// - [`ForgeError::AdmissionDenied`] when a rate window is full
    /// - [`ForgeError::StrategyExecutionFailed`] when the strategy and its
    ///   fallback failed; the token row is left unchanged
    /// - [`ForgeError::NotFound`], [`ForgeError::OwnershipMismatch`],
    ///   [`ForgeError::UnsupportedStandard`] before anything is recorded
    /// - any other error after the attempt was started; the attempt is
    ///   closed as failed and a failure event is appended first
    pub async fn deploy_token(&self, request: DeployRequest) -> ForgeResult<DeploymentReport> {
        let DeployRequest {
            token_id,
            user,
            project,
            options,
        } = request;

        let token = self.service.owned_token(project, token_id).await?;
        if !self.service.settings().deployment.supports(token.standard) {
            return Err(ForgeError::UnsupportedStandard(token.standard));
        }

        if let Admission::Denied {
            window,
            count,
            limit,
            retry_after_secs,
        } = self.limiter.check_admission(&user, &project).await
        {
            self.audit(
                AuditEvent::new(
                    token_id,
                    AuditEventType::AdmissionDenied,
                    Severity::Warning,
                    format!("deployment limit reached: {count}/{limit}"),
                    self.clock.now(),
                )
                .with_data(json!({"window": window, "retry_after_secs": retry_after_secs})),
            )
            .await;
            return Err(ForgeError::AdmissionDenied {
                window,
                count,
                limit,
                retry_after_secs,
            });
        }

        let attempt_id = self.limiter.record_start(&user, &project, &token_id).await?;

        let executed = match self.execute_attempt(token_id, &options).await {
            Ok(executed) => executed,
            Err(error) => {
                self.record_failure(&user, &project, token_id, &error, None).await;
                return Err(error);
            }
        };
        let Executed {
            outcome,
            selection,
            complexity,
            run_history,
        } = executed;

        let token = match self
            .service
            .record_deployment(token_id, &outcome, self.clock.now())
            .await
        {
            Ok(token) => token,
            Err(error) => {
                self.record_failure(&user, &project, token_id, &error, Some(&outcome))
                    .await;
                return Err(error);
            }
        };
        tracing::info!(%token_id, address = %outcome.address, strategy = %outcome.strategy, gas = outcome.gas_used, "deployment succeeded");
        self.audit(
            AuditEvent::new(
                token_id,
                AuditEventType::DeploymentSucceeded,
                Severity::Info,
                format!("deployed at {}", outcome.address),
                self.clock.now(),
            )
            .with_data(json!({
                "strategy": outcome.strategy,
                "address": outcome.address,
                "tx_hash": outcome.tx_hash,
                "gas_used": outcome.gas_used,
                "chunks": outcome.chunk_receipts.len(),
                "fallback_from": outcome.fallback_from,
            })),
        )
        .await;
        self.complete(&user, &project, token_id, AttemptStatus::Success, None)
            .await;

        Ok(DeploymentReport {
            token,
            outcome,
            selection,
            complexity,
            run_history,
            attempt_id,
        })
    }

    /// Everything between the start record and writing the outcome back
    async fn execute_attempt(&self, token_id: TokenId, options: &DeployOptions) -> ForgeResult<Executed> {
        let snapshot = self.service.get_token(token_id).await?;
        let config = snapshot.to_config()?;
        let network = options
            .network
            .clone()
            .unwrap_or_else(|| self.service.settings().deployment.default_network.clone());
        let payload = DeploymentPayload::from_config(token_id, &config, network);
        let complexity = self.analyzer.analyze_payload(&payload);
        let selection = self.selector.select(&complexity, options.strategy);

        let mut run = StrategyRun::new();
        run.select(selection.strategy)?;
        run.execute()?;
        tracing::info!(
            %token_id,
            strategy = %selection.strategy,
            reason = ?selection.reason,
            level = %complexity.level,
            "deployment started"
        );
        self.audit(
            AuditEvent::new(
                token_id,
                AuditEventType::DeploymentStarted,
                Severity::Info,
                format!("deploying with {}", selection.strategy),
                self.clock.now(),
            )
            .with_data(json!({
                "strategy": selection.strategy,
                "reason": selection.reason,
                "level": complexity.level,
                "estimated_cost": complexity.estimated_cost,
                "network": payload.network,
            })),
        )
        .await;

        let ctx = ExecutionContext {
            payload: &payload,
            score: &complexity,
            wallet: &options.wallet,
            gas: options.gas.as_ref(),
            inter_chunk_delay: self.service.settings().deployment.inter_chunk_delay(),
        };
        let outcome = self.execute_with_fallback(token_id, &mut run, &ctx).await?;

        Ok(Executed {
            outcome,
            selection,
            complexity,
            run_history: run.history().to_vec(),
        })
    }

    async fn execute_with_fallback(
        &self,
        token_id: TokenId,
        run: &mut StrategyRun,
        ctx: &ExecutionContext<'_>,
    ) -> ForgeResult<DeploymentOutcome> {
        let primary = run.active_strategy().unwrap_or_default();
        let error = match self.executors.get(primary)?.execute(ctx).await {
            Ok(outcome) => {
                run.succeed()?;
                return Ok(outcome);
            }
            Err(error) => error,
        };

        let Some(fallback) = self.selector.fallback_for(primary) else {
            tracing::warn!(%token_id, strategy = %primary, %error, "deployment failed, no fallback");
            run.fail()?;
            return Err(ForgeError::StrategyExecutionFailed {
                strategy: primary,
                source: error,
                fallback: None,
            });
        };

        tracing::warn!(%token_id, strategy = %primary, %fallback, %error, "strategy failed, falling back");
        self.audit(
            AuditEvent::new(
                token_id,
                AuditEventType::StrategyFallback,
                Severity::Warning,
                format!("{primary} failed, retrying with {fallback}"),
                self.clock.now(),
            )
            .with_data(json!({
                "failed": primary,
                "fallback": fallback,
                "error": error.to_string(),
                "partial_address": error.partial_address(),
            })),
        )
        .await;
        run.fall_back(fallback)?;

        match self.executors.get(fallback)?.execute(ctx).await {
            Ok(mut outcome) => {
                run.succeed()?;
                outcome.fallback_from = Some(primary);
                Ok(outcome)
            }
            Err(fallback_error) => {
                run.fail()?;
                Err(ForgeError::StrategyExecutionFailed {
                    strategy: primary,
                    source: error,
                    fallback: Some((fallback, fallback_error)),
                })
            }
        }
    }

    /// Close a started attempt that did not end in a recorded deployment
    ///
    /// `deployed` is set when the chain call succeeded but the outcome could
    /// not be written to the token; its address and hash go into the event.
    async fn record_failure(
        &self,
        user: &UserId,
        project: &ProjectId,
        token_id: TokenId,
        error: &ForgeError,
        deployed: Option<&DeploymentOutcome>,
    ) {
        let partial_address = match error {
            ForgeError::StrategyExecutionFailed { source, .. } => source.partial_address().map(str::to_string),
            _ => None,
        };
        let (message, data) = if let Some(outcome) = deployed {
            tracing::error!(%token_id, %error, address = %outcome.address, tx_hash = %outcome.tx_hash, "deployed but outcome not recorded");
            (
                format!("deployed at {} but outcome not recorded: {error}", outcome.address),
                json!({
                    "partial_address": partial_address,
                    "address": outcome.address,
                    "tx_hash": outcome.tx_hash,
                    "strategy": outcome.strategy,
                    "gas_used": outcome.gas_used,
                }),
            )
        } else {
            tracing::error!(%token_id, %error, "deployment failed");
            (error.to_string(), json!({"partial_address": partial_address}))
        };
        self.audit(
            AuditEvent::new(
                token_id,
                AuditEventType::DeploymentFailed,
                Severity::Error,
                message.clone(),
                self.clock.now(),
            )
            .with_data(data),
        )
        .await;
        self.complete(user, project, token_id, AttemptStatus::Failed, Some(message.as_str()))
            .await;
    }

    async fn complete(
        &self,
        user: &UserId,
        project: &ProjectId,
        token_id: TokenId,
        status: AttemptStatus,
        error: Option<&str>,
    ) {
        if let Err(e) = self
            .limiter
            .record_completion(user, project, &token_id, status, error)
            .await
        {
            tracing::warn!(%token_id, error = %e, "attempt completion not recorded");
        }
    }

    async fn audit(&self, event: AuditEvent) {
        let event_type = event.event_type;
        if let Err(e) = self.audit.append(event).await {
            tracing::warn!(?event_type, error = %e, "audit append failed");
        }
    }

    /// What a deployment of the token's current configuration would do
    ///
    /// Cached per token version; any write to the token invalidates it.
    ///
    /// # Errors
    /// [`ForgeError::NotFound`] or the store error.
    pub async fn get_deployment_recommendation(&self, token_id: TokenId) -> ForgeResult<Arc<Recommendation>> {
        let token = self.service.load_token(token_id).await?;
        let version = format_timestamp(token.updated_at);
        if let Some(hit) = self.cache.get(token_id, &version).await {
            tracing::trace!(%token_id, "recommendation cache hit");
            return Ok(hit);
        }

        let config = self.service.get_token(token_id).await?.to_config()?;
        let network = self.service.settings().deployment.default_network.clone();
        let payload = DeploymentPayload::from_config(token_id, &config, network);
        let complexity = self.analyzer.analyze_payload(&payload);
        let selection = self.selector.select(&complexity, DeploymentStrategy::Auto);

        let template = match selection.strategy {
            DeploymentStrategy::Basic | DeploymentStrategy::Legacy | DeploymentStrategy::Auto => {
                ContractTemplate::Basic
            }
            DeploymentStrategy::Enhanced | DeploymentStrategy::Chunked => ContractTemplate::Enhanced,
        };
        let chain_estimate = match self.chain.estimate_cost(&payload.with_template(template)).await {
            Ok(estimate) => Some(estimate),
            Err(e) => {
                tracing::warn!(%token_id, error = %e, "chain cost estimate unavailable");
                None
            }
        };

        let mut reasons = complexity.reasons.clone();
        reasons.push(format!("{} selected ({:?})", selection.strategy, selection.reason));
        if chain_estimate.as_ref().is_some_and(|e| e.exceeds_ceiling) {
            reasons.push("chain estimate exceeds the transaction ceiling".to_string());
        }

        let recommendation = Recommendation {
            token_id,
            standard: token.standard,
            complexity,
            selection,
            chain_estimate,
            reasons,
        };
        Ok(self.cache.insert(&version, recommendation).await)
    }

    /// Check a deployed token's contract on a network
    ///
    /// # Errors
    /// [`ForgeError::NotFound`] when the token or its deployment is missing,
    /// [`ForgeError::Deploy`] when the chain cannot answer.
    pub async fn verify_deployment(&self, token_id: TokenId, network: Option<&str>) -> ForgeResult<Verification> {
        let token = self.service.load_token(token_id).await?;
        let address = token
            .address
            .ok_or_else(|| ForgeError::not_found("deployment", token_id))?;
        let network = network.map_or_else(
            || self.service.settings().deployment.default_network.clone(),
            str::to_string,
        );

        let verification = self
            .chain
            .verify(&address, &network)
            .await
            .map_err(DeployError::from)?;

        let severity = if verification.verified {
            Severity::Info
        } else {
            Severity::Warning
        };
        self.audit(
            AuditEvent::new(
                token_id,
                AuditEventType::DeploymentVerified,
                severity,
                format!("verification on {network}: {}", verification.verified),
                self.clock.now(),
            )
            .with_data(json!({
                "address": verification.address,
                "verified": verification.verified,
                "detail": verification.detail,
            })),
        )
        .await;
        Ok(verification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditLog;
    use crate::config::ForgeSettings;
    use chrono::Utc;
    use tcf_deploy::SimulatedChainDeployer;
    use tcf_model::{Erc20Config, Feature, ManualClock, StandardConfig, TokenConfig, TokenStatus};
    use tcf_store::InMemoryStore;

    struct Harness {
        orchestrator: DeploymentOrchestrator,
        audit: Arc<MemoryAuditLog>,
        project: ProjectId,
    }

    fn harness(chain: SimulatedChainDeployer) -> Harness {
        let mut settings = ForgeSettings::default();
        settings.deployment.inter_chunk_delay_ms = 0;
        let store = Arc::new(InMemoryStore::with_platform_schema());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let service = TokenService::new(store, clock.clone(), Arc::new(settings));
        let audit = Arc::new(MemoryAuditLog::new());
        Harness {
            orchestrator: DeploymentOrchestrator::new(service, Arc::new(chain), audit.clone(), clock),
            audit,
            project: ProjectId::new(),
        }
    }

    async fn coin(h: &Harness, features: &[Feature]) -> TokenId {
        let mut config = TokenConfig::new("Coin", "CN", StandardConfig::Erc20(Erc20Config::default()));
        config.standard.features_mut().extend(features.iter().copied());
        h.orchestrator
            .service()
            .create_token(h.project, config)
            .await
            .unwrap()
            .token
            .id
    }

    fn request(h: &Harness, token_id: TokenId) -> DeployRequest {
        DeployRequest {
            token_id,
            user: UserId::new(),
            project: h.project,
            options: DeployOptions::new("0xwallet"),
        }
    }

    #[tokio::test]
    async fn basic_deployment_marks_token_deployed() {
        let h = harness(SimulatedChainDeployer::default());
        let token_id = coin(&h, &[]).await;

        let report = h.orchestrator.deploy_token(request(&h, token_id)).await.unwrap();
        assert_eq!(report.outcome.strategy, DeploymentStrategy::Basic);
        assert_eq!(report.token.status, TokenStatus::Deployed);
        assert_eq!(report.token.address.as_deref(), Some(report.outcome.address.as_str()));
        assert_eq!(report.run_history.last(), Some(&RunState::Succeeded));
        assert_eq!(h.audit.events_of(AuditEventType::DeploymentSucceeded).len(), 1);
        assert!(h.audit.verify_integrity().is_ok());
    }

    #[tokio::test]
    async fn wrong_project_is_rejected_before_ledger() {
        let h = harness(SimulatedChainDeployer::default());
        let token_id = coin(&h, &[]).await;
        let mut req = request(&h, token_id);
        req.project = ProjectId::new();

        let err = h.orchestrator.deploy_token(req).await.unwrap_err();
        assert!(matches!(err, ForgeError::OwnershipMismatch { .. }));
        assert!(h.audit.is_empty());
    }

    #[tokio::test]
    async fn failure_leaves_token_untouched() {
        let h = harness(SimulatedChainDeployer::with_gas_ceiling(1_000));
        let token_id = coin(&h, &[]).await;

        let err = h.orchestrator.deploy_token(request(&h, token_id)).await.unwrap_err();
        assert!(matches!(
            err,
            ForgeError::StrategyExecutionFailed {
                strategy: DeploymentStrategy::Basic,
                fallback: None,
                ..
            }
        ));
        let token = h.orchestrator.service().load_token(token_id).await.unwrap();
        assert!(token.address.is_none());
        assert_eq!(token.status, TokenStatus::Draft);
        assert_eq!(h.audit.events_of(AuditEventType::DeploymentFailed).len(), 1);
    }

    #[tokio::test]
    async fn recommendation_cached_until_token_changes() {
        let h = harness(SimulatedChainDeployer::default());
        let token_id = coin(&h, &[Feature::Mintable]).await;

        let first = h.orchestrator.get_deployment_recommendation(token_id).await.unwrap();
        let again = h.orchestrator.get_deployment_recommendation(token_id).await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert!(first.chain_estimate.is_some());

        h.orchestrator
            .service()
            .update_status(token_id, TokenStatus::Ready)
            .await
            .unwrap();
        let fresh = h.orchestrator.get_deployment_recommendation(token_id).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &fresh));
    }

    #[tokio::test]
    async fn verify_requires_deployment() {
        let h = harness(SimulatedChainDeployer::default());
        let token_id = coin(&h, &[]).await;

        let err = h.orchestrator.verify_deployment(token_id, None).await.unwrap_err();
        assert!(matches!(err, ForgeError::NotFound { entity: "deployment", .. }));

        h.orchestrator.deploy_token(request(&h, token_id)).await.unwrap();
        let verification = h.orchestrator.verify_deployment(token_id, None).await.unwrap();
        assert!(verification.verified);
        assert!(!h.orchestrator.verify_deployment(token_id, Some("mainnet")).await.unwrap().verified);
        assert_eq!(h.audit.events_of(AuditEventType::DeploymentVerified).len(), 2);
    }
}
