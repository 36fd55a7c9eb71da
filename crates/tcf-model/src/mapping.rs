//! Standard property mapping
//!
//! Pure functions between a [`StandardConfig`] and its stored shape: one
//! property record plus named collection payloads. Dispatch goes through the
//! profile table so the mapping never guesses field names.

use crate::config::{
    Erc1155Config, Erc1400Config, Erc20Config, Erc3525Config, Erc4626Config, Erc721Config,
    StandardConfig,
};
use crate::error::ModelError;
use crate::profile::{profile, CollectionSpec};
use crate::record::{strip_system_fields, Record};
use crate::standard::Standard;
use serde_json::Value;
use std::collections::BTreeMap;

/// Property key that carries the feature list in the property record
pub const FEATURES_FIELD: &str = "features";

/// Desired rows for one declared collection
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionPayload {
    /// Declared collection
    pub spec: &'static CollectionSpec,
    /// Desired rows (empty means an explicit empty list)
    pub records: Vec<Record>,
}

/// Stored shape of a standard configuration
#[derive(Debug, Clone, PartialEq)]
pub struct MappedConfig {
    /// Standard
    pub standard: Standard,
    /// Property table
    pub property_table: &'static str,
    /// Scalar property record (without `token_id`)
    pub properties: Record,
    /// Present collections in profile order; omitted ones are absent
    pub collections: Vec<CollectionPayload>,
}

impl MappedConfig {
    /// Payload for a collection, if present
    #[must_use]
    pub fn collection(&self, name: &str) -> Option<&CollectionPayload> {
        self.collections.iter().find(|p| p.spec.name == name)
    }
}

/// Map a configuration into its property record and collection payloads
#[must_use]
pub fn map_standard(config: &StandardConfig) -> MappedConfig {
    let profile = profile(config.standard());

    let mut properties = config.properties().clone();
    let features: Vec<Value> = config
        .features()
        .iter()
        .filter_map(|f| serde_json::to_value(f).ok())
        .collect();
    properties.insert(FEATURES_FIELD.to_string(), Value::Array(features));

    let collections = config
        .collections()
        .into_iter()
        .filter_map(|(name, records)| {
            let spec = profile.collection(name)?;
            records.map(|records| CollectionPayload {
                spec,
                records: records.clone(),
            })
        })
        .collect();

    MappedConfig {
        standard: profile.standard,
        property_table: profile.property_table,
        properties,
        collections,
    }
}

/// Rebuild a configuration from stored rows
///
/// Store-owned fields are dropped; collections missing from `collections`
/// come back as omitted.
///
/// # Errors
/// Returns [`ModelError::Serialization`] when stored rows do not fit the
/// standard's shape.
pub fn rebuild_standard(
    standard: Standard,
    properties: &Record,
    collections: &BTreeMap<String, Vec<Record>>,
) -> Result<StandardConfig, ModelError> {
    let profile = profile(standard);
    let mut properties = strip_system_fields(properties);
    let features = properties
        .remove(FEATURES_FIELD)
        .unwrap_or_else(|| Value::Array(Vec::new()));

    let mut object = Record::new();
    object.insert(
        "standard".to_string(),
        Value::String(standard.as_str().to_string()),
    );
    object.insert(FEATURES_FIELD.to_string(), features);
    object.insert("properties".to_string(), Value::Object(properties));

    for spec in profile.collections {
        if let Some(rows) = collections.get(spec.name) {
            let rows = rows
                .iter()
                .map(|r| Value::Object(strip_system_fields(r)))
                .collect();
            object.insert(spec.name.to_string(), Value::Array(rows));
        }
    }

    Ok(serde_json::from_value(Value::Object(object))?)
}

/// Empty configuration of a standard
#[must_use]
pub fn empty_config(standard: Standard) -> StandardConfig {
    match standard {
        Standard::Erc20 => StandardConfig::Erc20(Erc20Config::default()),
        Standard::Erc721 => StandardConfig::Erc721(Erc721Config::default()),
        Standard::Erc1155 => StandardConfig::Erc1155(Erc1155Config::default()),
        Standard::Erc1400 => StandardConfig::Erc1400(Erc1400Config::default()),
        Standard::Erc3525 => StandardConfig::Erc3525(Erc3525Config::default()),
        Standard::Erc4626 => StandardConfig::Erc4626(Erc4626Config::default()),
    }
}
