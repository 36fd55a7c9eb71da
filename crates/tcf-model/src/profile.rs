//! Standard profile table
//!
//! Maps each [`Standard`] to its property table and the child collections it
//! declares. Collection order is dependency order: a collection listed later
//! may reference rows of one listed earlier (balances reference partitions,
//! allocations reference slots), and chunked deployment preserves it.

use crate::standard::Standard;

/// Default used when a required field is missing from a child record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDefault {
    /// `<prefix>-<n>` from the 1-based position in the desired list, skipping
    /// values already supplied
    Positional(&'static str),
    /// Fixed text
    Text(&'static str),
    /// Fixed integer
    Integer(i64),
    /// Fixed boolean
    Flag(bool),
}

/// Required scalar field with its deterministic default
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredField {
    /// Column name
    pub field: &'static str,
    /// Value synthesized when the column is missing
    pub default: FieldDefault,
}

impl RequiredField {
    const fn positional(field: &'static str, prefix: &'static str) -> Self {
        Self {
            field,
            default: FieldDefault::Positional(prefix),
        }
    }

    const fn text(field: &'static str, value: &'static str) -> Self {
        Self {
            field,
            default: FieldDefault::Text(value),
        }
    }

    const fn integer(field: &'static str, value: i64) -> Self {
        Self {
            field,
            default: FieldDefault::Integer(value),
        }
    }

    const fn flag(field: &'static str, value: bool) -> Self {
        Self {
            field,
            default: FieldDefault::Flag(value),
        }
    }
}

/// Declared child collection of a standard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionSpec {
    /// Collection name as it appears in configurations
    pub name: &'static str,
    /// Backing table
    pub table: &'static str,
    /// Natural key columns (empty when the collection is fully replaceable)
    pub natural_key: &'static [&'static str],
    /// Required columns and their defaults
    pub required: &'static [RequiredField],
    /// Estimated on-chain cost per record
    pub unit_cost: u64,
}

impl CollectionSpec {
    /// Natural key, if the collection declares one
    #[inline]
    #[must_use]
    pub fn natural_key(&self) -> Option<&'static [&'static str]> {
        if self.natural_key.is_empty() {
            None
        } else {
            Some(self.natural_key)
        }
    }

    /// Upsert conflict target: `token_id` followed by the natural key
    #[must_use]
    pub fn conflict_key(&self) -> Option<Vec<&'static str>> {
        self.natural_key().map(|key| {
            std::iter::once("token_id")
                .chain(key.iter().copied())
                .collect()
        })
    }
}

/// Profile of one standard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardProfile {
    /// The standard
    pub standard: Standard,
    /// Table holding the single property record per token
    pub property_table: &'static str,
    /// Declared collections in dependency order
    pub collections: &'static [CollectionSpec],
}

impl StandardProfile {
    /// Look up a collection by name
    #[must_use]
    pub fn collection(&self, name: &str) -> Option<&'static CollectionSpec> {
        self.collections.iter().find(|c| c.name == name)
    }

    /// Property table followed by every collection table
    #[must_use]
    pub fn tables(&self) -> Vec<&'static str> {
        std::iter::once(self.property_table)
            .chain(self.collections.iter().map(|c| c.table))
            .collect()
    }
}

/// Profile for a standard
#[must_use]
pub fn profile(standard: Standard) -> &'static StandardProfile {
    match standard {
        Standard::Erc20 => &ERC20,
        Standard::Erc721 => &ERC721,
        Standard::Erc1155 => &ERC1155,
        Standard::Erc1400 => &ERC1400,
        Standard::Erc3525 => &ERC3525,
        Standard::Erc4626 => &ERC4626,
    }
}

const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

static ERC20: StandardProfile = StandardProfile {
    standard: Standard::Erc20,
    property_table: "token_erc20_properties",
    collections: &[CollectionSpec {
        name: "fee_tiers",
        table: "token_erc20_fee_tiers",
        natural_key: &["tier_name"],
        required: &[
            RequiredField::positional("tier_name", "tier"),
            RequiredField::integer("fee_bps", 0),
        ],
        unit_cost: 60_000,
    }],
};

static ERC721: StandardProfile = StandardProfile {
    standard: Standard::Erc721,
    property_table: "token_erc721_properties",
    collections: &[
        CollectionSpec {
            name: "attributes",
            table: "token_erc721_attributes",
            natural_key: &["trait_type"],
            required: &[RequiredField::positional("trait_type", "trait")],
            unit_cost: 45_000,
        },
        CollectionSpec {
            name: "mint_phases",
            table: "token_erc721_mint_phases",
            natural_key: &["phase_name"],
            required: &[
                RequiredField::positional("phase_name", "phase"),
                RequiredField::integer("max_per_wallet", 0),
            ],
            unit_cost: 90_000,
        },
    ],
};

static ERC1155: StandardProfile = StandardProfile {
    standard: Standard::Erc1155,
    property_table: "token_erc1155_properties",
    collections: &[
        CollectionSpec {
            name: "types",
            table: "token_erc1155_types",
            natural_key: &["token_type_id"],
            required: &[
                RequiredField::positional("token_type_id", "type"),
                RequiredField::text("name", "Unnamed type"),
                RequiredField::text("fungibility_type", "non-fungible"),
            ],
            unit_cost: 120_000,
        },
        CollectionSpec {
            name: "crafting_recipes",
            table: "token_erc1155_crafting_recipes",
            natural_key: &["recipe_id"],
            required: &[
                RequiredField::positional("recipe_id", "recipe"),
                RequiredField::text("recipe_name", "Recipe"),
                RequiredField::flag("is_active", true),
            ],
            unit_cost: 180_000,
        },
        CollectionSpec {
            name: "discount_tiers",
            table: "token_erc1155_discount_tiers",
            natural_key: &[],
            required: &[
                RequiredField::integer("min_quantity", 1),
                RequiredField::integer("discount_percentage", 0),
            ],
            unit_cost: 50_000,
        },
        CollectionSpec {
            name: "balances",
            table: "token_erc1155_balances",
            natural_key: &["token_type_id", "address"],
            required: &[
                RequiredField::positional("token_type_id", "type"),
                RequiredField::text("address", ZERO_ADDRESS),
                RequiredField::text("amount", "0"),
            ],
            unit_cost: 40_000,
        },
    ],
};

static ERC1400: StandardProfile = StandardProfile {
    standard: Standard::Erc1400,
    property_table: "token_erc1400_properties",
    collections: &[
        CollectionSpec {
            name: "partitions",
            table: "token_erc1400_partitions",
            natural_key: &["partition_id"],
            required: &[
                RequiredField::positional("partition_id", "partition"),
                RequiredField::text("name", "Default partition"),
                RequiredField::text("partition_type", "equity"),
            ],
            unit_cost: 150_000,
        },
        CollectionSpec {
            name: "controllers",
            table: "token_erc1400_controllers",
            natural_key: &["address"],
            required: &[RequiredField::positional("address", "controller")],
            unit_cost: 50_000,
        },
        CollectionSpec {
            name: "documents",
            table: "token_erc1400_documents",
            natural_key: &[],
            required: &[
                RequiredField::positional("name", "document"),
                RequiredField::text("document_uri", ""),
                RequiredField::text("document_type", "general"),
            ],
            unit_cost: 80_000,
        },
        CollectionSpec {
            name: "corporate_actions",
            table: "token_erc1400_corporate_actions",
            natural_key: &[],
            required: &[
                RequiredField::text("action_type", "notice"),
                RequiredField::text("status", "pending"),
            ],
            unit_cost: 100_000,
        },
        CollectionSpec {
            name: "regulatory_filings",
            table: "token_erc1400_regulatory_filings",
            natural_key: &[],
            required: &[
                RequiredField::text("filing_type", "general"),
                RequiredField::text("jurisdiction", "unspecified"),
            ],
            unit_cost: 70_000,
        },
        CollectionSpec {
            name: "partition_balances",
            table: "token_erc1400_partition_balances",
            natural_key: &["partition_id", "holder_address"],
            required: &[
                RequiredField::positional("partition_id", "partition"),
                RequiredField::text("holder_address", ZERO_ADDRESS),
                RequiredField::text("balance", "0"),
            ],
            unit_cost: 45_000,
        },
    ],
};

static ERC3525: StandardProfile = StandardProfile {
    standard: Standard::Erc3525,
    property_table: "token_erc3525_properties",
    collections: &[
        CollectionSpec {
            name: "slots",
            table: "token_erc3525_slots",
            natural_key: &["slot_id"],
            required: &[
                RequiredField::positional("slot_id", "slot"),
                RequiredField::text("slot_name", "Slot"),
                RequiredField::text("value_units", "units"),
            ],
            unit_cost: 140_000,
        },
        CollectionSpec {
            name: "allocations",
            table: "token_erc3525_allocations",
            natural_key: &[],
            required: &[
                RequiredField::text("slot_id", "slot-1"),
                RequiredField::text("recipient", ZERO_ADDRESS),
                RequiredField::text("value", "0"),
            ],
            unit_cost: 60_000,
        },
        CollectionSpec {
            name: "payment_schedules",
            table: "token_erc3525_payment_schedules",
            natural_key: &[],
            required: &[
                RequiredField::text("payment_type", "interest"),
                RequiredField::text("payment_amount", "0"),
            ],
            unit_cost: 70_000,
        },
        CollectionSpec {
            name: "value_adjustments",
            table: "token_erc3525_value_adjustments",
            natural_key: &[],
            required: &[
                RequiredField::text("adjustment_type", "manual"),
                RequiredField::text("adjustment_amount", "0"),
            ],
            unit_cost: 60_000,
        },
    ],
};

static ERC4626: StandardProfile = StandardProfile {
    standard: Standard::Erc4626,
    property_table: "token_erc4626_properties",
    collections: &[
        CollectionSpec {
            name: "strategy_params",
            table: "token_erc4626_strategy_params",
            natural_key: &["name"],
            required: &[
                RequiredField::positional("name", "param"),
                RequiredField::text("value", ""),
            ],
            unit_cost: 55_000,
        },
        CollectionSpec {
            name: "asset_allocations",
            table: "token_erc4626_asset_allocations",
            natural_key: &["asset"],
            required: &[
                RequiredField::positional("asset", "asset"),
                RequiredField::text("percentage", "0"),
            ],
            unit_cost: 90_000,
        },
        CollectionSpec {
            name: "fee_tiers",
            table: "token_erc4626_fee_tiers",
            natural_key: &["tier_name"],
            required: &[
                RequiredField::positional("tier_name", "tier"),
                RequiredField::text("management_fee_rate", "0"),
            ],
            unit_cost: 60_000,
        },
        CollectionSpec {
            name: "performance_metrics",
            table: "token_erc4626_performance_metrics",
            natural_key: &[],
            required: &[RequiredField::text("total_assets", "0")],
            unit_cost: 30_000,
        },
    ],
};
