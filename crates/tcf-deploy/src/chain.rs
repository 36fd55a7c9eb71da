//! Chain deployer interface
//!
//! Contract ABI encoding and transport live behind [`ChainDeployer`]; this
//! crate only decides what to send and in which order.

use crate::error::ChainError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tcf_model::{FeatureSet, Record, Standard, TokenConfig, TokenId};

/// Contract template a deployment targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractTemplate {
    /// Plain standard implementation
    #[default]
    Basic,
    /// Extended implementation with feature modules
    Enhanced,
}

/// Gas overrides for a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GasConfig {
    /// Hard gas limit
    #[serde(default)]
    pub gas_limit: Option<u64>,
    /// Max fee per gas in wei
    #[serde(default)]
    pub max_fee_per_gas: Option<u64>,
    /// Priority fee in wei
    #[serde(default)]
    pub max_priority_fee_per_gas: Option<u64>,
}

/// Everything a chain deployer needs to deploy one token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentPayload {
    /// Token being deployed
    pub token_id: TokenId,
    /// Standard
    pub standard: Standard,
    /// Token name
    pub name: String,
    /// Token symbol
    pub symbol: String,
    /// Decimals
    pub decimals: u8,
    /// Total supply
    #[serde(default)]
    pub total_supply: Option<String>,
    /// Enabled features
    pub features: FeatureSet,
    /// Scalar properties
    pub properties: Record,
    /// Child records by collection name, in profile order when iterated
    /// through [`ordered_collections`](Self::ordered_collections)
    pub collections: BTreeMap<String, Vec<Record>>,
    /// Target network
    pub network: String,
    /// Contract template
    #[serde(default)]
    pub template: ContractTemplate,
}

impl DeploymentPayload {
    /// Build from a token configuration
    ///
    /// Omitted and empty collections are left out.
    #[must_use]
    pub fn from_config(token_id: TokenId, config: &TokenConfig, network: impl Into<String>) -> Self {
        let collections = config
            .standard
            .collections()
            .into_iter()
            .filter_map(|(name, records)| {
                records
                    .filter(|r| !r.is_empty())
                    .map(|r| (name.to_string(), r.clone()))
            })
            .collect();

        Self {
            token_id,
            standard: config.standard(),
            name: config.name.clone(),
            symbol: config.symbol.clone(),
            decimals: config.decimals,
            total_supply: config.total_supply.clone(),
            features: config.standard.features().clone(),
            properties: config.standard.properties().clone(),
            collections,
            network: network.into(),
            template: ContractTemplate::Basic,
        }
    }

    /// Same payload targeting another template
    #[must_use]
    pub fn with_template(mut self, template: ContractTemplate) -> Self {
        self.template = template;
        self
    }

    /// Copy without child records (chunk 0 of a chunked deployment)
    #[must_use]
    pub fn base_only(&self) -> Self {
        Self {
            collections: BTreeMap::new(),
            ..self.clone()
        }
    }

    /// Collections in the standard's declared order
    pub fn ordered_collections(&self) -> impl Iterator<Item = (&'static str, &[Record])> + '_ {
        tcf_model::profile(self.standard)
            .collections
            .iter()
            .filter_map(|spec| {
                self.collections
                    .get(spec.name)
                    .map(|rows| (spec.name, rows.as_slice()))
            })
    }

    /// Total child record count
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }
}

/// Slice of one collection inside a configuration chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkSlice {
    /// Collection name
    pub collection: String,
    /// Records in submission order
    pub records: Vec<Record>,
}

/// Records submitted to an already deployed contract in one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationChunk {
    /// Position in the chunk plan (chunk 0 is the base contract)
    pub index: usize,
    /// Collection slices in declared order
    pub slices: Vec<ChunkSlice>,
    /// Estimated gas
    pub estimated_cost: u64,
}

impl ConfigurationChunk {
    /// Records in this chunk
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.slices.iter().map(|s| s.records.len()).sum()
    }
}

/// Confirmed transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainReceipt {
    /// Contract address (deployments only)
    pub address: Option<String>,
    /// Transaction hash
    pub tx_hash: String,
    /// Gas consumed
    pub gas_used: u64,
    /// Block the transaction landed in
    pub block_number: u64,
}

/// Gas estimate from the chain side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostEstimate {
    /// Estimated gas for a single-transaction deployment
    pub gas: u64,
    /// Whether that exceeds the chain's per-transaction ceiling
    pub exceeds_ceiling: bool,
}

/// Result of a post-deployment check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    /// Checked address
    pub address: String,
    /// Network checked on
    pub network: String,
    /// True when deployed code was found and matches
    pub verified: bool,
    /// Hash of the deployed code, if found
    #[serde(default)]
    pub code_hash: Option<String>,
    /// Why verification failed
    #[serde(default)]
    pub detail: Option<String>,
}

/// On-chain side of a deployment
#[async_trait]
pub trait ChainDeployer: Send + Sync + std::fmt::Debug {
    /// Deploy a contract for the payload
    async fn deploy(
        &self,
        payload: &DeploymentPayload,
        wallet: &str,
        gas: Option<&GasConfig>,
    ) -> Result<ChainReceipt, ChainError>;

    /// Submit one configuration chunk to a deployed contract
    async fn submit_configuration(
        &self,
        address: &str,
        chunk: &ConfigurationChunk,
        wallet: &str,
        gas: Option<&GasConfig>,
    ) -> Result<ChainReceipt, ChainError>;

    /// Estimate the cost of deploying the payload in one transaction
    async fn estimate_cost(&self, payload: &DeploymentPayload) -> Result<CostEstimate, ChainError>;

    /// Check deployed code at an address
    async fn verify(&self, address: &str, network: &str) -> Result<Verification, ChainError>;
}
