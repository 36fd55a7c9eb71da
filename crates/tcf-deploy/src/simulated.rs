//! Deterministic in-process chain
//!
//! Charges gas with the complexity cost model, enforces a per-transaction
//! ceiling, and derives addresses and transaction hashes with blake3. Used by
//! the CLI and by tests that need strategy fallback without a real chain.

use crate::chain::{
    ChainDeployer, ChainReceipt, ConfigurationChunk, ContractTemplate, CostEstimate,
    DeploymentPayload, GasConfig, Verification,
};
use crate::complexity::ComplexitySettings;
use crate::error::ChainError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default per-transaction gas ceiling
pub const DEFAULT_GAS_CEILING: u64 = 30_000_000;

/// Percent surcharge of the enhanced template
const ENHANCED_OVERHEAD_PCT: u64 = 15;

#[derive(Debug, Clone)]
struct DeployedContract {
    network: String,
    code_hash: String,
    configured_records: usize,
}

/// Simulated chain deployer
#[derive(Debug)]
pub struct SimulatedChainDeployer {
    costs: ComplexitySettings,
    gas_ceiling: u64,
    nonce: AtomicU64,
    contracts: DashMap<String, DeployedContract>,
}

impl Default for SimulatedChainDeployer {
    fn default() -> Self {
        Self::with_gas_ceiling(DEFAULT_GAS_CEILING)
    }
}

impl SimulatedChainDeployer {
    /// Chain with a custom gas ceiling
    #[must_use]
    pub fn with_gas_ceiling(gas_ceiling: u64) -> Self {
        Self {
            costs: ComplexitySettings::default(),
            gas_ceiling,
            nonce: AtomicU64::new(0),
            contracts: DashMap::new(),
        }
    }

    /// Use a different cost model
    #[must_use]
    pub fn with_costs(mut self, costs: ComplexitySettings) -> Self {
        self.costs = costs;
        self
    }

    /// Records submitted to a contract after deployment
    #[must_use]
    pub fn configured_records(&self, address: &str) -> Option<usize> {
        self.contracts.get(address).map(|c| c.configured_records)
    }

    /// Deployed contract count
    #[must_use]
    pub fn contract_count(&self) -> usize {
        self.contracts.len()
    }

    fn deployment_gas(&self, payload: &DeploymentPayload) -> u64 {
        let gas = self.costs.payload_cost(payload);
        match payload.template {
            ContractTemplate::Basic => gas,
            ContractTemplate::Enhanced => gas + gas * ENHANCED_OVERHEAD_PCT / 100,
        }
    }

    fn check_gas(&self, required: u64, gas: Option<&GasConfig>) -> Result<(), ChainError> {
        let limit = gas
            .and_then(|g| g.gas_limit)
            .map_or(self.gas_ceiling, |l| l.min(self.gas_ceiling));
        if required > limit {
            Err(ChainError::GasLimitExceeded { required, limit })
        } else {
            Ok(())
        }
    }

    fn next_nonce(&self) -> u64 {
        self.nonce.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn tx_hash(&self, seed: &[u8], nonce: u64) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"tx");
        hasher.update(seed);
        hasher.update(&nonce.to_le_bytes());
        format!("0x{}", hex::encode(hasher.finalize().as_bytes()))
    }
}

#[async_trait]
impl ChainDeployer for SimulatedChainDeployer {
    async fn deploy(
        &self,
        payload: &DeploymentPayload,
        wallet: &str,
        gas: Option<&GasConfig>,
    ) -> Result<ChainReceipt, ChainError> {
        let required = self.deployment_gas(payload);
        self.check_gas(required, gas)?;

        let encoded = serde_json::to_vec(payload).map_err(|e| ChainError::Rejected(e.to_string()))?;
        let nonce = self.next_nonce();
        let code_hash = hex::encode(blake3::hash(&encoded).as_bytes());

        let mut hasher = blake3::Hasher::new();
        hasher.update(wallet.as_bytes());
        hasher.update(&nonce.to_le_bytes());
        hasher.update(&encoded);
        let digest = hex::encode(hasher.finalize().as_bytes());
        let address = format!("0x{}", &digest[..40]);

        self.contracts.insert(
            address.clone(),
            DeployedContract {
                network: payload.network.clone(),
                code_hash,
                configured_records: 0,
            },
        );
        tracing::debug!(%address, gas = required, template = ?payload.template, "simulated deployment");

        Ok(ChainReceipt {
            tx_hash: self.tx_hash(address.as_bytes(), nonce),
            address: Some(address),
            gas_used: required,
            block_number: nonce,
        })
    }

    async fn submit_configuration(
        &self,
        address: &str,
        chunk: &ConfigurationChunk,
        _wallet: &str,
        gas: Option<&GasConfig>,
    ) -> Result<ChainReceipt, ChainError> {
        self.check_gas(chunk.estimated_cost, gas)?;
        let mut contract = self
            .contracts
            .get_mut(address)
            .ok_or_else(|| ChainError::ContractNotFound(address.to_string()))?;
        contract.configured_records += chunk.record_count();

        let nonce = self.next_nonce();
        Ok(ChainReceipt {
            address: None,
            tx_hash: self.tx_hash(address.as_bytes(), nonce),
            gas_used: chunk.estimated_cost,
            block_number: nonce,
        })
    }

    async fn estimate_cost(&self, payload: &DeploymentPayload) -> Result<CostEstimate, ChainError> {
        let gas = self.deployment_gas(payload);
        Ok(CostEstimate {
            gas,
            exceeds_ceiling: gas > self.gas_ceiling,
        })
    }

    async fn verify(&self, address: &str, network: &str) -> Result<Verification, ChainError> {
        let found = self.contracts.get(address).map(|c| c.clone());
        let verification = match found {
            Some(contract) if contract.network == network => Verification {
                address: address.to_string(),
                network: network.to_string(),
                verified: true,
                code_hash: Some(contract.code_hash),
                detail: None,
            },
            Some(contract) => Verification {
                address: address.to_string(),
                network: network.to_string(),
                verified: false,
                code_hash: None,
                detail: Some(format!("contract lives on {}", contract.network)),
            },
            None => Verification {
                address: address.to_string(),
                network: network.to_string(),
                verified: false,
                code_hash: None,
                detail: Some("no code at address".to_string()),
            },
        };
        Ok(verification)
    }
}
