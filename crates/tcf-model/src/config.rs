//! Token configuration: core scalars plus one variant per standard
//!
//! ```json
//! {
//!   "name": "Harbor Notes", "symbol": "HBN", "decimals": 0,
//!   "standard": "ERC-3525",
//!   "features": ["vesting"],
//!   "properties": {"value_decimals": 2},
//!   "slots": [{"slot_id": "2031", "slot_name": "2031 tranche"}]
//! }
//! ```
//!
//! A collection field that is absent is "omitted"; `[]` is an explicit empty
//! list and is treated as a wipe request on update.

use crate::record::Record;
use crate::standard::{FeatureSet, Standard};
use crate::token::TokenStatus;
use serde::{Deserialize, Serialize};

fn default_decimals() -> u8 {
    18
}

/// Caller-supplied token configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Token name
    pub name: String,
    /// Ticker symbol
    pub symbol: String,
    /// Decimal places
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    /// Total supply as a decimal string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_supply: Option<String>,
    /// Free-text description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Free-form attribute bag
    #[serde(default)]
    pub blocks: Record,
    /// Free-form metadata bag
    #[serde(default)]
    pub metadata: Record,
    /// Standard-specific configuration
    #[serde(flatten)]
    pub standard: StandardConfig,
}

impl TokenConfig {
    /// Create a configuration with default decimals and empty bags
    #[must_use]
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, standard: StandardConfig) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            decimals: default_decimals(),
            total_supply: None,
            description: None,
            blocks: Record::new(),
            metadata: Record::new(),
            standard,
        }
    }

    /// With decimals
    #[inline]
    #[must_use]
    pub fn with_decimals(mut self, decimals: u8) -> Self {
        self.decimals = decimals;
        self
    }

    /// With total supply
    #[inline]
    #[must_use]
    pub fn with_total_supply(mut self, supply: impl Into<String>) -> Self {
        self.total_supply = Some(supply.into());
        self
    }

    /// Standard of this configuration
    #[inline]
    #[must_use]
    pub fn standard(&self) -> Standard {
        self.standard.standard()
    }
}

/// Tagged variant: one configuration shape per standard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "standard")]
pub enum StandardConfig {
    #[serde(rename = "ERC-20")]
    Erc20(Erc20Config),
    #[serde(rename = "ERC-721")]
    Erc721(Erc721Config),
    #[serde(rename = "ERC-1155")]
    Erc1155(Erc1155Config),
    #[serde(rename = "ERC-1400")]
    Erc1400(Erc1400Config),
    #[serde(rename = "ERC-3525")]
    Erc3525(Erc3525Config),
    #[serde(rename = "ERC-4626")]
    Erc4626(Erc4626Config),
}

/// Fungible token configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Erc20Config {
    #[serde(default)]
    pub features: FeatureSet,
    #[serde(default)]
    pub properties: Record,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_tiers: Option<Vec<Record>>,
}

/// Non-fungible token configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Erc721Config {
    #[serde(default)]
    pub features: FeatureSet,
    #[serde(default)]
    pub properties: Record,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mint_phases: Option<Vec<Record>>,
}

/// Multi-token configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Erc1155Config {
    #[serde(default)]
    pub features: FeatureSet,
    #[serde(default)]
    pub properties: Record,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crafting_recipes: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_tiers: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balances: Option<Vec<Record>>,
}

/// Partitioned security token configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Erc1400Config {
    #[serde(default)]
    pub features: FeatureSet,
    #[serde(default)]
    pub properties: Record,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partitions: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controllers: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corporate_actions: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regulatory_filings: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_balances: Option<Vec<Record>>,
}

/// Semi-fungible slot token configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Erc3525Config {
    #[serde(default)]
    pub features: FeatureSet,
    #[serde(default)]
    pub properties: Record,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slots: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocations: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_schedules: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_adjustments: Option<Vec<Record>>,
}

/// Tokenized vault configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Erc4626Config {
    #[serde(default)]
    pub features: FeatureSet,
    #[serde(default)]
    pub properties: Record,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy_params: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_allocations: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_tiers: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance_metrics: Option<Vec<Record>>,
}

impl StandardConfig {
    /// Standard carried by this variant
    #[must_use]
    pub fn standard(&self) -> Standard {
        match self {
            StandardConfig::Erc20(_) => Standard::Erc20,
            StandardConfig::Erc721(_) => Standard::Erc721,
            StandardConfig::Erc1155(_) => Standard::Erc1155,
            StandardConfig::Erc1400(_) => Standard::Erc1400,
            StandardConfig::Erc3525(_) => Standard::Erc3525,
            StandardConfig::Erc4626(_) => Standard::Erc4626,
        }
    }

    /// Enabled features
    #[must_use]
    pub fn features(&self) -> &FeatureSet {
        match self {
            StandardConfig::Erc20(c) => &c.features,
            StandardConfig::Erc721(c) => &c.features,
            StandardConfig::Erc1155(c) => &c.features,
            StandardConfig::Erc1400(c) => &c.features,
            StandardConfig::Erc3525(c) => &c.features,
            StandardConfig::Erc4626(c) => &c.features,
        }
    }

    /// Mutable feature set
    pub fn features_mut(&mut self) -> &mut FeatureSet {
        match self {
            StandardConfig::Erc20(c) => &mut c.features,
            StandardConfig::Erc721(c) => &mut c.features,
            StandardConfig::Erc1155(c) => &mut c.features,
            StandardConfig::Erc1400(c) => &mut c.features,
            StandardConfig::Erc3525(c) => &mut c.features,
            StandardConfig::Erc4626(c) => &mut c.features,
        }
    }

    /// Scalar standard properties
    #[must_use]
    pub fn properties(&self) -> &Record {
        match self {
            StandardConfig::Erc20(c) => &c.properties,
            StandardConfig::Erc721(c) => &c.properties,
            StandardConfig::Erc1155(c) => &c.properties,
            StandardConfig::Erc1400(c) => &c.properties,
            StandardConfig::Erc3525(c) => &c.properties,
            StandardConfig::Erc4626(c) => &c.properties,
        }
    }

    /// Collection payloads by name, in profile order
    ///
    /// `None` means the collection was omitted from the configuration.
    #[must_use]
    pub fn collections(&self) -> Vec<(&'static str, Option<&Vec<Record>>)> {
        match self {
            StandardConfig::Erc20(c) => vec![("fee_tiers", c.fee_tiers.as_ref())],
            StandardConfig::Erc721(c) => vec![
                ("attributes", c.attributes.as_ref()),
                ("mint_phases", c.mint_phases.as_ref()),
            ],
            StandardConfig::Erc1155(c) => vec![
                ("types", c.types.as_ref()),
                ("crafting_recipes", c.crafting_recipes.as_ref()),
                ("discount_tiers", c.discount_tiers.as_ref()),
                ("balances", c.balances.as_ref()),
            ],
            StandardConfig::Erc1400(c) => vec![
                ("partitions", c.partitions.as_ref()),
                ("controllers", c.controllers.as_ref()),
                ("documents", c.documents.as_ref()),
                ("corporate_actions", c.corporate_actions.as_ref()),
                ("regulatory_filings", c.regulatory_filings.as_ref()),
                ("partition_balances", c.partition_balances.as_ref()),
            ],
            StandardConfig::Erc3525(c) => vec![
                ("slots", c.slots.as_ref()),
                ("allocations", c.allocations.as_ref()),
                ("payment_schedules", c.payment_schedules.as_ref()),
                ("value_adjustments", c.value_adjustments.as_ref()),
            ],
            StandardConfig::Erc4626(c) => vec![
                ("strategy_params", c.strategy_params.as_ref()),
                ("asset_allocations", c.asset_allocations.as_ref()),
                ("fee_tiers", c.fee_tiers.as_ref()),
                ("performance_metrics", c.performance_metrics.as_ref()),
            ],
        }
    }

    /// Total number of child records across all present collections
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.collections()
            .into_iter()
            .filter_map(|(_, records)| records.map(Vec::len))
            .sum()
    }
}

/// Partial update of an existing token
///
/// `standard_config`, when present, must carry the token's existing standard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_supply: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Record>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Record>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TokenStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_config: Option<StandardConfig>,
}

impl TokenPatch {
    /// Create empty patch
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With new name
    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// With new status
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: TokenStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// With standard-specific configuration
    #[inline]
    #[must_use]
    pub fn with_standard_config(mut self, config: StandardConfig) -> Self {
        self.standard_config = Some(config);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::standard::Feature;
    use serde_json::json;

    #[test]
    fn config_deserializes_flattened_variant() {
        let raw = json!({
            "name": "Harbor Notes",
            "symbol": "HBN",
            "decimals": 0,
            "standard": "ERC-3525",
            "features": ["vesting"],
            "properties": {"value_decimals": 2},
            "slots": [{"slot_id": "2031"}]
        });
        let config: TokenConfig = serde_json::from_value(raw).unwrap();

        assert_eq!(config.standard(), Standard::Erc3525);
        assert_eq!(config.decimals, 0);
        assert!(config.standard.features().contains(&Feature::Vesting));
        let StandardConfig::Erc3525(inner) = &config.standard else {
            panic!("expected ERC-3525 variant");
        };
        assert_eq!(inner.slots.as_ref().map(Vec::len), Some(1));
        assert!(inner.allocations.is_none());
    }

    #[test]
    fn omitted_and_empty_collections_differ() {
        let raw = json!({
            "name": "Vault", "symbol": "VLT", "standard": "ERC-4626",
            "fee_tiers": []
        });
        let config: TokenConfig = serde_json::from_value(raw).unwrap();
        let collections = config.standard.collections();

        let fee_tiers = collections.iter().find(|(n, _)| *n == "fee_tiers").unwrap();
        assert_eq!(fee_tiers.1.map(Vec::len), Some(0));
        let params = collections.iter().find(|(n, _)| *n == "strategy_params").unwrap();
        assert!(params.1.is_none());
    }

    #[test]
    fn default_decimals_is_eighteen() {
        let raw = json!({"name": "Coin", "symbol": "C", "standard": "ERC-20"});
        let config: TokenConfig = serde_json::from_value(raw).unwrap();
        assert_eq!(config.decimals, 18);
    }

    #[test]
    fn record_count_sums_present_collections() {
        let config = StandardConfig::Erc1400(Erc1400Config {
            partitions: Some(vec![Record::new(), Record::new()]),
            controllers: Some(vec![Record::new()]),
            ..Default::default()
        });
        assert_eq!(config.record_count(), 3);
    }

    #[test]
    fn collections_follow_profile_order() {
        for standard in Standard::ALL {
            let names: Vec<_> = crate::profile(standard)
                .collections
                .iter()
                .map(|c| c.name)
                .collect();
            let config = crate::mapping::empty_config(standard);
            let declared: Vec<_> = config.collections().into_iter().map(|(n, _)| n).collect();
            assert_eq!(names, declared, "{standard}");
        }
    }
}
