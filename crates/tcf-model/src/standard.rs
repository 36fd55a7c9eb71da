//! Token standards and configurable features

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

/// Token standard (mutually exclusive per token, immutable after creation)
///
/// New standards are added by extending this enum and registering a
/// [`StandardProfile`](crate::StandardProfile).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Standard {
    /// Fungible token
    #[serde(rename = "ERC-20")]
    Erc20,
    /// Non-fungible token
    #[serde(rename = "ERC-721")]
    Erc721,
    /// Multi-token
    #[serde(rename = "ERC-1155")]
    Erc1155,
    /// Partitioned security token
    #[serde(rename = "ERC-1400")]
    Erc1400,
    /// Semi-fungible slot token
    #[serde(rename = "ERC-3525")]
    Erc3525,
    /// Tokenized vault
    #[serde(rename = "ERC-4626")]
    Erc4626,
}

impl Standard {
    /// Every shipped standard
    pub const ALL: [Standard; 6] = [
        Standard::Erc20,
        Standard::Erc721,
        Standard::Erc1155,
        Standard::Erc1400,
        Standard::Erc3525,
        Standard::Erc4626,
    ];

    /// Canonical name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Standard::Erc20 => "ERC-20",
            Standard::Erc721 => "ERC-721",
            Standard::Erc1155 => "ERC-1155",
            Standard::Erc1400 => "ERC-1400",
            Standard::Erc3525 => "ERC-3525",
            Standard::Erc4626 => "ERC-4626",
        }
    }
}

impl std::fmt::Display for Standard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Standard {
    type Err = ModelError;

    /// Accepts `ERC-20`, `ERC20`, and `erc20` spellings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_uppercase();
        Standard::ALL
            .into_iter()
            .find(|std| std.as_str().replace('-', "") == normalized)
            .ok_or_else(|| ModelError::UnknownStandard(s.to_string()))
    }
}

/// Feature weight class used by complexity scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FeatureWeight {
    /// Single storage flag or modifier
    Light = 1,
    /// Extra state and logic on the transfer path
    Medium = 2,
    /// Separate subsystem (voting, staking, bridging, ...)
    Heavy = 3,
}

/// Advanced features a configuration can switch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Owner can mint after deployment
    Mintable,
    /// Holders can burn
    Burnable,
    /// Transfers can be paused
    Pausable,
    /// Signature-based approvals
    Permit,
    /// Balance snapshots
    Snapshots,
    /// Transfers limited to listed addresses
    Whitelist,
    /// Batched transfers and mints
    Batching,
    /// Delayed metadata reveal
    Reveal,
    /// Royalty payments on resale
    Royalties,
    /// Marketplace fee split
    MarketplaceFees,
    /// Per-token metadata URIs that change
    DynamicUris,
    /// Rule-based transfer restrictions
    TransferRestrictions,
    /// Fee taken on every transfer
    FeeOnTransfer,
    /// Vesting schedules
    Vesting,
    /// Controller-forced transfers
    ForcedTransfers,
    /// On-chain governance
    GovernanceVoting,
    /// Item crafting
    CraftingRecipes,
    /// Staking and rewards
    Staking,
    /// Cross-chain bridging
    CrossChainBridge,
    /// Pluggable yield strategies
    YieldStrategies,
}

impl Feature {
    /// Weight class of this feature
    #[must_use]
    pub fn weight(self) -> FeatureWeight {
        match self {
            Feature::Mintable
            | Feature::Burnable
            | Feature::Pausable
            | Feature::Permit
            | Feature::Snapshots
            | Feature::Whitelist
            | Feature::Batching
            | Feature::Reveal => FeatureWeight::Light,
            Feature::Royalties
            | Feature::MarketplaceFees
            | Feature::DynamicUris
            | Feature::TransferRestrictions
            | Feature::FeeOnTransfer
            | Feature::Vesting
            | Feature::ForcedTransfers => FeatureWeight::Medium,
            Feature::GovernanceVoting
            | Feature::CraftingRecipes
            | Feature::Staking
            | Feature::CrossChainBridge
            | Feature::YieldStrategies => FeatureWeight::Heavy,
        }
    }

    /// Check if this feature alone pushes a configuration to `high`
    #[inline]
    #[must_use]
    pub fn is_heavy(self) -> bool {
        self.weight() == FeatureWeight::Heavy
    }
}

/// Ordered set of enabled features
pub type FeatureSet = BTreeSet<Feature>;
