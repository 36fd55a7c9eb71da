//! Testing utilities for the TCF workspace
//!
//! Fixtures per standard, a fault-injecting store, a scripted chain, and a
//! [`Forge`] harness wiring them to a service and an orchestrator.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tcf_core::{DeployOptions, DeployRequest, DeploymentOrchestrator, ForgeSettings, MemoryAuditLog, TokenService};
use tcf_deploy::{
    ChainDeployer, ChainError, ChainReceipt, ConfigurationChunk, ContractTemplate, CostEstimate,
    DeploymentPayload, GasConfig, SimulatedChainDeployer, Verification,
};
use tcf_model::{Feature, ManualClock, ProjectId, Record, Standard, TokenConfig, TokenId, UserId};
use tcf_store::{Filter, InMemoryStore, Query, StoreError, StoreResult, StructuredStore};

// ----------------------------------------------------------------------
// Fixtures
// ----------------------------------------------------------------------

/// Record from a JSON object literal
pub fn record(value: Value) -> Record {
    value.as_object().cloned().expect("fixture record must be a JSON object")
}

/// Records from JSON object literals
pub fn records(values: impl IntoIterator<Item = Value>) -> Vec<Record> {
    values.into_iter().map(record).collect()
}

/// Configuration from its JSON form
pub fn config_from_json(value: Value) -> TokenConfig {
    serde_json::from_value(value).expect("fixture configuration must parse")
}

/// ERC-20 with the given features and nothing else
pub fn erc20_config(features: &[Feature]) -> TokenConfig {
    config_from_json(json!({
        "name": "Fixture Coin",
        "symbol": "FXC",
        "decimals": 18,
        "total_supply": "1000000",
        "standard": "ERC-20",
        "features": features,
    }))
}

/// ERC-20 with `n` light features
pub fn feature_config(n: usize) -> TokenConfig {
    const LIGHT: [Feature; 8] = [
        Feature::Mintable,
        Feature::Burnable,
        Feature::Pausable,
        Feature::Permit,
        Feature::Snapshots,
        Feature::Whitelist,
        Feature::Batching,
        Feature::Reveal,
    ];
    assert!(n <= LIGHT.len(), "only {} light features exist", LIGHT.len());
    erc20_config(&LIGHT[..n])
}

/// ERC-3525 with `n` slots
pub fn erc3525_config(n: usize) -> TokenConfig {
    let slots: Vec<Value> = (1..=n)
        .map(|i| json!({"slot_id": i.to_string(), "slot_name": format!("Slot {i}"), "value_units": "usd"}))
        .collect();
    config_from_json(json!({
        "name": "Fixture Bond",
        "symbol": "FXB",
        "decimals": 0,
        "standard": "ERC-3525",
        "properties": {"value_decimals": 2},
        "slots": slots,
    }))
}

/// ERC-1400 with one row in every collection
pub fn erc1400_config() -> TokenConfig {
    config_from_json(json!({
        "name": "Fixture Security",
        "symbol": "FXS",
        "decimals": 0,
        "standard": "ERC-1400",
        "features": ["transfer_restrictions", "forced_transfers"],
        "properties": {"issuing_jurisdiction": "US"},
        "partitions": [{"partition_id": "A", "name": "Class A"}],
        "controllers": [{"address": "0x1111111111111111111111111111111111111111"}],
        "documents": [{"name": "Prospectus", "uri": "ipfs://doc"}],
        "corporate_actions": [{"action_type": "dividend"}],
        "regulatory_filings": [{"filing_type": "10-K"}],
        "partition_balances": [{"partition_id": "A", "holder_address": "0x2222222222222222222222222222222222222222", "balance": "10"}],
    }))
}

/// Small configuration of any standard, one row per collection
pub fn config_for(standard: Standard) -> TokenConfig {
    let raw = match standard {
        Standard::Erc20 => json!({
            "standard": "ERC-20",
            "fee_tiers": [{"tier_name": "retail", "fee_bps": 30}],
        }),
        Standard::Erc721 => json!({
            "standard": "ERC-721",
            "attributes": [{"trait_type": "color"}],
            "mint_phases": [{"phase_name": "public"}],
        }),
        Standard::Erc1155 => json!({
            "standard": "ERC-1155",
            "types": [{"token_type_id": "1", "name": "Sword"}],
            "crafting_recipes": [{"recipe_id": "r1"}],
            "discount_tiers": [{"min_quantity": 10, "discount_bps": 50}],
            "balances": [{"token_type_id": "1", "address": "0x3333333333333333333333333333333333333333"}],
        }),
        Standard::Erc1400 => return erc1400_config(),
        Standard::Erc3525 => return erc3525_config(1),
        Standard::Erc4626 => json!({
            "standard": "ERC-4626",
            "strategy_params": [{"name": "target_apy", "value": "0.05"}],
            "asset_allocations": [{"asset": "USDC", "percentage": "100"}],
            "fee_tiers": [{"tier_name": "base"}],
            "performance_metrics": [{"metric": "tvl"}],
        }),
    };
    let mut raw = record(raw);
    raw.insert("name".into(), Value::String(format!("Fixture {standard}")));
    raw.insert("symbol".into(), Value::String("FIX".into()));
    config_from_json(Value::Object(raw))
}

// ----------------------------------------------------------------------
// Fault-injecting store
// ----------------------------------------------------------------------

/// Store operation, for fault targeting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Select,
    Insert,
    Update,
    Delete,
    Upsert,
    Count,
    Replace,
}

/// Injected failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Unavailable,
    UniqueViolation,
    Internal,
}

impl Fault {
    fn error(self, table: &str) -> StoreError {
        match self {
            Fault::Unavailable => StoreError::Unavailable(format!("injected outage on {table}")),
            Fault::UniqueViolation => StoreError::UniqueViolation {
                table: table.to_string(),
                constraint: "injected".into(),
                detail: "duplicate key".into(),
            },
            Fault::Internal => StoreError::Internal(format!("injected failure on {table}")),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Armed {
    fault: Fault,
    remaining: Option<usize>,
}

/// In-memory store that fails chosen (table, operation) pairs
#[derive(Debug, Default)]
pub struct FaultyStore {
    inner: InMemoryStore,
    faults: Mutex<HashMap<(String, Op), Armed>>,
    calls: Mutex<Vec<(String, Op)>>,
}

impl FaultyStore {
    pub fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            faults: Mutex::default(),
            calls: Mutex::default(),
        }
    }

    /// Platform schema, no faults
    pub fn platform() -> Self {
        Self::new(InMemoryStore::with_platform_schema())
    }

    /// Fail every call of `op` on `table`
    pub fn fail(&self, table: &str, op: Op, fault: Fault) {
        self.faults.lock().insert(
            (table.to_string(), op),
            Armed {
                fault,
                remaining: None,
            },
        );
    }

    /// Fail the next `times` calls of `op` on `table`
    pub fn fail_times(&self, table: &str, op: Op, fault: Fault, times: usize) {
        self.faults.lock().insert(
            (table.to_string(), op),
            Armed {
                fault,
                remaining: Some(times),
            },
        );
    }

    /// Remove every fault
    pub fn heal(&self) {
        self.faults.lock().clear();
    }

    /// Calls of `op` on `table` so far
    pub fn calls(&self, table: &str, op: Op) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|(t, o)| t == table && *o == op)
            .count()
    }

    /// Wrapped store
    pub fn inner(&self) -> &InMemoryStore {
        &self.inner
    }

    /// Every row of a table
    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.inner.rows(table)
    }

    fn check(&self, table: &str, op: Op) -> StoreResult<()> {
        self.calls.lock().push((table.to_string(), op));
        let mut faults = self.faults.lock();
        let key = (table.to_string(), op);
        let Some(armed) = faults.get_mut(&key) else {
            return Ok(());
        };
        let fault = armed.fault;
        match armed.remaining {
            None => {}
            Some(0) => {
                faults.remove(&key);
                return Ok(());
            }
            Some(n) => {
                armed.remaining = Some(n - 1);
                if n == 1 {
                    faults.remove(&key);
                }
            }
        }
        Err(fault.error(table))
    }
}

#[async_trait]
impl StructuredStore for FaultyStore {
    async fn select(&self, table: &str, query: &Query) -> StoreResult<Vec<Record>> {
        self.check(table, Op::Select)?;
        self.inner.select(table, query).await
    }

    async fn insert(&self, table: &str, rows: Vec<Record>) -> StoreResult<Vec<Record>> {
        self.check(table, Op::Insert)?;
        self.inner.insert(table, rows).await
    }

    async fn update(&self, table: &str, patch: &Record, filter: &Filter) -> StoreResult<usize> {
        self.check(table, Op::Update)?;
        self.inner.update(table, patch, filter).await
    }

    async fn delete(&self, table: &str, filter: &Filter) -> StoreResult<usize> {
        self.check(table, Op::Delete)?;
        self.inner.delete(table, filter).await
    }

    async fn upsert(
        &self,
        table: &str,
        rows: Vec<Record>,
        conflict_keys: &[&str],
        ignore_duplicates: bool,
    ) -> StoreResult<Vec<Record>> {
        self.check(table, Op::Upsert)?;
        self.inner
            .upsert(table, rows, conflict_keys, ignore_duplicates)
            .await
    }

    async fn count(&self, table: &str, filter: &Filter) -> StoreResult<usize> {
        self.check(table, Op::Count)?;
        self.inner.count(table, filter).await
    }

    async fn replace(&self, table: &str, filter: &Filter, rows: Vec<Record>) -> StoreResult<Vec<Record>> {
        self.check(table, Op::Replace)?;
        self.inner.replace(table, filter, rows).await
    }

    fn supports_atomic_replace(&self) -> bool {
        self.inner.supports_atomic_replace()
    }
}

// ----------------------------------------------------------------------
// Scripted chain
// ----------------------------------------------------------------------

/// Simulated chain with scripted failures
#[derive(Debug, Default)]
pub struct ScriptedChainDeployer {
    inner: SimulatedChainDeployer,
    template_failures: Mutex<HashMap<ContractTemplate, ChainError>>,
    chunk_failures: Mutex<HashMap<usize, ChainError>>,
    estimate_failure: Mutex<Option<ChainError>>,
    deploys: Mutex<Vec<ContractTemplate>>,
    chunks: Mutex<HashSet<usize>>,
}

impl ScriptedChainDeployer {
    pub fn new(inner: SimulatedChainDeployer) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// Every deploy on `template` fails with `error`
    pub fn fail_template(&self, template: ContractTemplate, error: ChainError) {
        self.template_failures.lock().insert(template, error);
    }

    /// Submitting chunk `index` fails with `error`
    pub fn fail_chunk(&self, index: usize, error: ChainError) {
        self.chunk_failures.lock().insert(index, error);
    }

    /// Cost estimates fail with `error`
    pub fn fail_estimates(&self, error: ChainError) {
        *self.estimate_failure.lock() = Some(error);
    }

    /// Templates of every deploy call, in order
    pub fn deploys(&self) -> Vec<ContractTemplate> {
        self.deploys.lock().clone()
    }

    /// Chunk indexes successfully submitted
    pub fn submitted_chunks(&self) -> HashSet<usize> {
        self.chunks.lock().clone()
    }

    /// Underlying simulated chain
    pub fn simulated(&self) -> &SimulatedChainDeployer {
        &self.inner
    }
}

#[async_trait]
impl ChainDeployer for ScriptedChainDeployer {
    async fn deploy(
        &self,
        payload: &DeploymentPayload,
        wallet: &str,
        gas: Option<&GasConfig>,
    ) -> Result<ChainReceipt, ChainError> {
        self.deploys.lock().push(payload.template);
        let scripted = self.template_failures.lock().get(&payload.template).cloned();
        if let Some(error) = scripted {
            return Err(error);
        }
        self.inner.deploy(payload, wallet, gas).await
    }

    async fn submit_configuration(
        &self,
        address: &str,
        chunk: &ConfigurationChunk,
        wallet: &str,
        gas: Option<&GasConfig>,
    ) -> Result<ChainReceipt, ChainError> {
        let scripted = self.chunk_failures.lock().get(&chunk.index).cloned();
        if let Some(error) = scripted {
            return Err(error);
        }
        let receipt = self.inner.submit_configuration(address, chunk, wallet, gas).await?;
        self.chunks.lock().insert(chunk.index);
        Ok(receipt)
    }

    async fn estimate_cost(&self, payload: &DeploymentPayload) -> Result<CostEstimate, ChainError> {
        let scripted = self.estimate_failure.lock().clone();
        if let Some(error) = scripted {
            return Err(error);
        }
        self.inner.estimate_cost(payload).await
    }

    async fn verify(&self, address: &str, network: &str) -> Result<Verification, ChainError> {
        self.inner.verify(address, network).await
    }
}

// ----------------------------------------------------------------------
// Harness
// ----------------------------------------------------------------------

/// Service and orchestrator over a faulty store, manual clock, scripted chain
#[derive(Debug)]
pub struct Forge {
    pub store: Arc<FaultyStore>,
    pub clock: Arc<ManualClock>,
    pub chain: Arc<ScriptedChainDeployer>,
    pub audit: Arc<MemoryAuditLog>,
    pub service: TokenService,
    pub orchestrator: DeploymentOrchestrator,
    pub project: ProjectId,
    pub user: UserId,
}

impl Forge {
    /// Harness with settings; chunk pauses are always zero
    pub fn new(settings: ForgeSettings) -> Self {
        Self::with_chain(settings, SimulatedChainDeployer::default())
    }

    /// Harness over a specific simulated chain
    pub fn with_chain(mut settings: ForgeSettings, chain: SimulatedChainDeployer) -> Self {
        settings.deployment.inter_chunk_delay_ms = 0;
        let store = Arc::new(FaultyStore::platform());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
                .single()
                .expect("valid fixture time"),
        ));
        let chain = Arc::new(ScriptedChainDeployer::new(chain));
        let audit = Arc::new(MemoryAuditLog::new());
        let service = TokenService::new(store.clone(), clock.clone(), Arc::new(settings));
        let orchestrator =
            DeploymentOrchestrator::new(service.clone(), chain.clone(), audit.clone(), clock.clone());
        Self {
            store,
            clock,
            chain,
            audit,
            service,
            orchestrator,
            project: ProjectId::new(),
            user: UserId::new(),
        }
    }

    /// Create a token in the harness project, panicking on error
    pub async fn create(&self, config: TokenConfig) -> TokenId {
        self.service
            .create_token(self.project, config)
            .await
            .expect("fixture token creation")
            .token
            .id
    }

    /// Deploy request for the harness user and project
    pub fn deploy_request(&self, token_id: TokenId, options: DeployOptions) -> DeployRequest {
        DeployRequest {
            token_id,
            user: self.user,
            project: self.project,
            options,
        }
    }
}

impl Default for Forge {
    fn default() -> Self {
        Self::new(ForgeSettings::default())
    }
}
