//! Main token row and snapshot

use crate::config::TokenConfig;
use crate::error::ModelError;
use crate::ids::{ProjectId, TokenId};
use crate::mapping::rebuild_standard;
use crate::record::Record;
use crate::standard::Standard;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Table holding the main token rows
pub const TOKENS_TABLE: &str = "tokens";

/// Token lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    /// Being edited
    #[default]
    Draft,
    /// Submitted for review
    UnderReview,
    /// Approved for deployment
    Approved,
    /// Cleared to deploy
    Ready,
    /// Live on chain
    Deployed,
    /// Deployed and paused
    Paused,
    /// Sent back by review
    Rejected,
}

/// Main token row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// Token id
    pub id: TokenId,
    /// Owning project
    pub project_id: ProjectId,
    /// Standard; fixed at creation
    pub standard: Standard,
    /// Display name
    pub name: String,
    /// Ticker symbol
    pub symbol: String,
    /// Decimal places
    pub decimals: u8,
    /// Lifecycle status
    #[serde(default)]
    pub status: TokenStatus,
    /// Initial supply as a decimal string
    #[serde(default)]
    pub total_supply: Option<String>,
    /// Free-form description
    #[serde(default)]
    pub description: Option<String>,
    /// Editor blocks, stored as-is
    #[serde(default)]
    pub blocks: Record,
    /// Free-form metadata
    #[serde(default)]
    pub metadata: Record,
    /// Contract address once deployed
    #[serde(default)]
    pub address: Option<String>,
    /// Creation transaction hash
    #[serde(default)]
    pub tx_hash: Option<String>,
    /// Deployment state reported by the chain side
    #[serde(default)]
    pub deployment_status: Option<String>,
    /// When the deployment was recorded
    #[serde(default)]
    pub deployed_at: Option<DateTime<Utc>>,
    /// Row creation time
    pub created_at: DateTime<Utc>,
    /// Last write; strictly increasing per token
    pub updated_at: DateTime<Utc>,
}

impl Token {
    /// New draft token from a configuration
    #[must_use]
    pub fn from_config(project_id: ProjectId, config: &TokenConfig, now: DateTime<Utc>) -> Self {
        Self {
            id: TokenId::new(),
            project_id,
            standard: config.standard(),
            name: config.name.clone(),
            symbol: config.symbol.clone(),
            decimals: config.decimals,
            status: TokenStatus::Draft,
            total_supply: config.total_supply.clone(),
            description: config.description.clone(),
            blocks: config.blocks.clone(),
            metadata: config.metadata.clone(),
            address: None,
            tx_hash: None,
            deployment_status: None,
            deployed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the token carries a chain address
    #[inline]
    #[must_use]
    pub fn is_deployed(&self) -> bool {
        self.address.is_some()
    }

    /// Convert to a store row
    ///
    /// # Errors
    /// Returns [`ModelError::Serialization`] if the row cannot be encoded.
    pub fn to_record(&self) -> Result<Record, ModelError> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Err(ModelError::invalid_record("token did not encode as an object")),
        }
    }

    /// Parse a store row
    ///
    /// # Errors
    /// Returns [`ModelError::Serialization`] if the row is malformed.
    pub fn from_record(record: Record) -> Result<Self, ModelError> {
        Ok(serde_json::from_value(Value::Object(record))?)
    }
}

/// Token row with its property record and collections
#[derive(Debug, Clone, PartialEq)]
pub struct TokenSnapshot {
    /// Main row
    pub token: Token,
    /// Property record (empty if missing)
    pub properties: Record,
    /// Collection rows by collection name
    pub collections: BTreeMap<String, Vec<Record>>,
}

impl TokenSnapshot {
    /// Rebuild the configuration this snapshot represents
    ///
    /// # Errors
    /// Returns an error if stored rows do not fit the standard's shape.
    pub fn to_config(&self) -> Result<TokenConfig, ModelError> {
        let standard = rebuild_standard(self.token.standard, &self.properties, &self.collections)?;
        Ok(TokenConfig {
            name: self.token.name.clone(),
            symbol: self.token.symbol.clone(),
            decimals: self.token.decimals,
            total_supply: self.token.total_supply.clone(),
            description: self.token.description.clone(),
            blocks: self.token.blocks.clone(),
            metadata: self.token.metadata.clone(),
            standard,
        })
    }

    /// Row count of one collection
    #[must_use]
    pub fn collection_len(&self, name: &str) -> usize {
        self.collections.get(name).map_or(0, Vec::len)
    }
}
