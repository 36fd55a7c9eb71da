//! Strategy executors
//!
//! One executor per concrete strategy. Executors talk to the chain only
//! through [`ChainDeployer`] and never touch the store; recording outcomes
//! is the orchestrator's job.

use crate::chain::{ChainDeployer, ChainReceipt, ContractTemplate, DeploymentPayload, GasConfig};
use crate::complexity::ComplexityScore;
use crate::error::DeployError;
use crate::strategy::DeploymentStrategy;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Inputs shared by every executor
#[derive(Debug, Clone, Copy)]
pub struct ExecutionContext<'a> {
    /// What to deploy
    pub payload: &'a DeploymentPayload,
    /// Complexity of the payload (carries the chunk plan)
    pub score: &'a ComplexityScore,
    /// Deploying wallet
    pub wallet: &'a str,
    /// Gas overrides
    pub gas: Option<&'a GasConfig>,
    /// Pause between chunk submissions
    pub inter_chunk_delay: Duration,
}

/// Receipt of one configuration chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkReceipt {
    /// Chunk index in the plan
    pub index: usize,
    /// Transaction hash
    pub tx_hash: String,
    /// Gas consumed
    pub gas_used: u64,
    /// Records carried
    pub records: usize,
}

/// Successful deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentOutcome {
    /// Strategy that produced the deployment
    pub strategy: DeploymentStrategy,
    /// Contract address
    pub address: String,
    /// Hash of the contract creation transaction
    pub tx_hash: String,
    /// Gas across every transaction
    pub gas_used: u64,
    /// Configuration chunk receipts (chunked only)
    #[serde(default)]
    pub chunk_receipts: Vec<ChunkReceipt>,
    /// Strategy that failed before a fallback succeeded
    #[serde(default)]
    pub fallback_from: Option<DeploymentStrategy>,
}

impl DeploymentOutcome {
    fn from_receipt(strategy: DeploymentStrategy, receipt: ChainReceipt) -> Result<Self, DeployError> {
        let address = receipt.address.ok_or(DeployError::MissingAddress)?;
        Ok(Self {
            strategy,
            address,
            tx_hash: receipt.tx_hash,
            gas_used: receipt.gas_used,
            chunk_receipts: Vec::new(),
            fallback_from: None,
        })
    }
}

/// Executes one deployment strategy
#[async_trait]
pub trait StrategyExecutor: Send + Sync + std::fmt::Debug {
    /// Run the deployment
    async fn execute(&self, ctx: &ExecutionContext<'_>) -> Result<DeploymentOutcome, DeployError>;

    /// Strategy this executor implements
    fn strategy(&self) -> DeploymentStrategy;
}

/// Single transaction on the plain template
#[derive(Debug, Clone)]
pub struct BasicExecutor {
    chain: Arc<dyn ChainDeployer>,
}

impl BasicExecutor {
    /// Executor over a chain deployer
    #[must_use]
    pub fn new(chain: Arc<dyn ChainDeployer>) -> Self {
        Self { chain }
    }
}

#[async_trait]
impl StrategyExecutor for BasicExecutor {
    async fn execute(&self, ctx: &ExecutionContext<'_>) -> Result<DeploymentOutcome, DeployError> {
        let payload = ctx.payload.clone().with_template(ContractTemplate::Basic);
        let receipt = self.chain.deploy(&payload, ctx.wallet, ctx.gas).await?;
        DeploymentOutcome::from_receipt(DeploymentStrategy::Basic, receipt)
    }

    fn strategy(&self) -> DeploymentStrategy {
        DeploymentStrategy::Basic
    }
}

/// Single transaction on the enhanced template
#[derive(Debug, Clone)]
pub struct EnhancedExecutor {
    chain: Arc<dyn ChainDeployer>,
}

impl EnhancedExecutor {
    /// Executor over a chain deployer
    #[must_use]
    pub fn new(chain: Arc<dyn ChainDeployer>) -> Self {
        Self { chain }
    }
}

#[async_trait]
impl StrategyExecutor for EnhancedExecutor {
    async fn execute(&self, ctx: &ExecutionContext<'_>) -> Result<DeploymentOutcome, DeployError> {
        let payload = ctx.payload.clone().with_template(ContractTemplate::Enhanced);
        let receipt = self.chain.deploy(&payload, ctx.wallet, ctx.gas).await?;
        DeploymentOutcome::from_receipt(DeploymentStrategy::Enhanced, receipt)
    }

    fn strategy(&self) -> DeploymentStrategy {
        DeploymentStrategy::Enhanced
    }
}

/// Base contract first, then the chunk plan's record chunks in order
#[derive(Debug, Clone)]
pub struct ChunkedExecutor {
    chain: Arc<dyn ChainDeployer>,
}

impl ChunkedExecutor {
    /// Executor over a chain deployer
    #[must_use]
    pub fn new(chain: Arc<dyn ChainDeployer>) -> Self {
        Self { chain }
    }
}

#[async_trait]
impl StrategyExecutor for ChunkedExecutor {
    async fn execute(&self, ctx: &ExecutionContext<'_>) -> Result<DeploymentOutcome, DeployError> {
        let base = ctx.payload.base_only().with_template(ContractTemplate::Enhanced);
        let receipt = self.chain.deploy(&base, ctx.wallet, ctx.gas).await?;
        let mut outcome = DeploymentOutcome::from_receipt(DeploymentStrategy::Chunked, receipt)?;

        let chunks = ctx.score.chunk_plan.materialize(ctx.payload);
        tracing::info!(address = %outcome.address, chunks = chunks.len(), "base contract deployed, submitting configuration");

        for chunk in chunks {
            if !ctx.inter_chunk_delay.is_zero() {
                tokio::time::sleep(ctx.inter_chunk_delay).await;
            }
            let receipt = self
                .chain
                .submit_configuration(&outcome.address, &chunk, ctx.wallet, ctx.gas)
                .await
                .map_err(|source| DeployError::ChunkFailed {
                    index: chunk.index,
                    address: outcome.address.clone(),
                    source,
                })?;

            tracing::debug!(index = chunk.index, records = chunk.record_count(), gas = receipt.gas_used, "chunk submitted");
            outcome.gas_used += receipt.gas_used;
            outcome.chunk_receipts.push(ChunkReceipt {
                index: chunk.index,
                tx_hash: receipt.tx_hash,
                gas_used: receipt.gas_used,
                records: chunk.record_count(),
            });
        }
        Ok(outcome)
    }

    fn strategy(&self) -> DeploymentStrategy {
        DeploymentStrategy::Chunked
    }
}

/// Retired deployment path; every call fails
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyExecutor;

#[async_trait]
impl StrategyExecutor for LegacyExecutor {
    async fn execute(&self, _ctx: &ExecutionContext<'_>) -> Result<DeploymentOutcome, DeployError> {
        Err(DeployError::StrategyDisabled(DeploymentStrategy::Legacy))
    }

    fn strategy(&self) -> DeploymentStrategy {
        DeploymentStrategy::Legacy
    }
}

/// Executors for every concrete strategy
#[derive(Debug, Clone)]
pub struct ExecutorSet {
    basic: Arc<dyn StrategyExecutor>,
    enhanced: Arc<dyn StrategyExecutor>,
    chunked: Arc<dyn StrategyExecutor>,
    legacy: Arc<dyn StrategyExecutor>,
}

impl ExecutorSet {
    /// Default executors over one chain deployer
    #[must_use]
    pub fn new(chain: Arc<dyn ChainDeployer>) -> Self {
        Self {
            basic: Arc::new(BasicExecutor::new(chain.clone())),
            enhanced: Arc::new(EnhancedExecutor::new(chain.clone())),
            chunked: Arc::new(ChunkedExecutor::new(chain)),
            legacy: Arc::new(LegacyExecutor),
        }
    }

    /// Replace the executor for its strategy
    ///
    /// # Errors
    /// Returns [`DeployError::NotExecutable`] for an `auto` executor.
    pub fn register(&mut self, executor: Arc<dyn StrategyExecutor>) -> Result<(), DeployError> {
        match executor.strategy() {
            DeploymentStrategy::Basic => self.basic = executor,
            DeploymentStrategy::Enhanced => self.enhanced = executor,
            DeploymentStrategy::Chunked => self.chunked = executor,
            DeploymentStrategy::Legacy => self.legacy = executor,
            DeploymentStrategy::Auto => return Err(DeployError::NotExecutable(DeploymentStrategy::Auto)),
        }
        Ok(())
    }

    /// Executor for a strategy
    ///
    /// # Errors
    /// Returns [`DeployError::NotExecutable`] for `auto`.
    pub fn get(&self, strategy: DeploymentStrategy) -> Result<&Arc<dyn StrategyExecutor>, DeployError> {
        match strategy {
            DeploymentStrategy::Basic => Ok(&self.basic),
            DeploymentStrategy::Enhanced => Ok(&self.enhanced),
            DeploymentStrategy::Chunked => Ok(&self.chunked),
            DeploymentStrategy::Legacy => Ok(&self.legacy),
            DeploymentStrategy::Auto => Err(DeployError::NotExecutable(strategy)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complexity::{ComplexityAnalyzer, ComplexitySettings};
    use crate::error::ChainError;
    use crate::simulated::SimulatedChainDeployer;
    use serde_json::json;
    use tcf_model::{Erc3525Config, Record, StandardConfig, TokenConfig, TokenId};

    fn payload(slots: usize) -> DeploymentPayload {
        let rows: Vec<Record> = (0..slots)
            .map(|i| json!({"slot_id": format!("s{i}")}).as_object().cloned().unwrap())
            .collect();
        let config = TokenConfig::new(
            "Bond",
            "BND",
            StandardConfig::Erc3525(Erc3525Config {
                slots: Some(rows),
                ..Erc3525Config::default()
            }),
        );
        DeploymentPayload::from_config(TokenId::new(), &config, "testnet")
    }

    fn ctx<'a>(payload: &'a DeploymentPayload, score: &'a ComplexityScore) -> ExecutionContext<'a> {
        ExecutionContext {
            payload,
            score,
            wallet: "0xwallet",
            gas: None,
            inter_chunk_delay: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn basic_deploys_in_one_transaction() {
        let chain = Arc::new(SimulatedChainDeployer::default());
        let payload = payload(3);
        let score = ComplexityAnalyzer::default().analyze_payload(&payload);

        let outcome = BasicExecutor::new(chain).execute(&ctx(&payload, &score)).await.unwrap();
        assert_eq!(outcome.strategy, DeploymentStrategy::Basic);
        assert!(outcome.address.starts_with("0x"));
        assert!(outcome.chunk_receipts.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn chunked_submits_every_record_chunk() {
        let chain = Arc::new(SimulatedChainDeployer::default());
        let payload = payload(100);
        let settings = ComplexitySettings {
            transaction_ceiling: 3_000_000,
            ..ComplexitySettings::default()
        };
        let score = ComplexityAnalyzer::new(settings).analyze_payload(&payload);

        let outcome = ChunkedExecutor::new(chain).execute(&ctx(&payload, &score)).await.unwrap();
        let carried: usize = outcome.chunk_receipts.iter().map(|r| r.records).sum();
        assert_eq!(carried, 100);
        assert_eq!(outcome.chunk_receipts.len(), score.chunk_plan.record_chunks().len());
    }

    #[tokio::test]
    async fn enhanced_reports_gas_errors() {
        let chain = Arc::new(SimulatedChainDeployer::with_gas_ceiling(1_000_000));
        let payload = payload(0);
        let score = ComplexityAnalyzer::default().analyze_payload(&payload);

        let err = EnhancedExecutor::new(chain).execute(&ctx(&payload, &score)).await.unwrap_err();
        assert!(matches!(err, DeployError::Chain(ChainError::GasLimitExceeded { .. })));
    }

    #[tokio::test]
    async fn legacy_always_fails() {
        let payload = payload(0);
        let score = ComplexityAnalyzer::default().analyze_payload(&payload);
        let err = LegacyExecutor.execute(&ctx(&payload, &score)).await.unwrap_err();
        assert_eq!(err, DeployError::StrategyDisabled(DeploymentStrategy::Legacy));
    }

    #[test]
    fn auto_has_no_executor() {
        let set = ExecutorSet::new(Arc::new(SimulatedChainDeployer::default()));
        assert!(set.get(DeploymentStrategy::Auto).is_err());
        assert_eq!(set.get(DeploymentStrategy::Chunked).unwrap().strategy(), DeploymentStrategy::Chunked);
    }
}
