//! TCF Model - tokens, standards, and configuration shapes
//!
//! The data vocabulary shared by every TCF crate:
//! - [`Token`]: the main token row and its lifecycle status
//! - [`Standard`] and [`StandardProfile`]: the pluggable standard table with
//!   property tables, child collections, and natural keys
//! - [`TokenConfig`]: tagged-variant configuration, one variant per standard
//! - [`mapping`]: configuration to {property record, collection payloads}
//! - [`Clock`]: injectable time source
//!
//! # Example
//!
//! ```rust,ignore
//! use tcf_model::{mapping, TokenConfig};
//!
//! let config: TokenConfig = serde_json::from_str(raw)?;
//! let mapped = mapping::map_standard(&config.standard);
//! for payload in &mapped.collections {
//!     println!("{} -> {} rows", payload.spec.table, payload.records.len());
//! }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod clock;
pub mod config;
pub mod error;
pub mod ids;
pub mod mapping;
pub mod profile;
pub mod record;
pub mod standard;
pub mod token;

pub use clock::{format_timestamp, Clock, ManualClock, SystemClock};
pub use config::{
    Erc1155Config, Erc1400Config, Erc20Config, Erc3525Config, Erc4626Config, Erc721Config,
    StandardConfig, TokenConfig, TokenPatch,
};
pub use error::ModelError;
pub use ids::{ProjectId, TemplateId, TokenId, UserId};
pub use mapping::{CollectionPayload, MappedConfig};
pub use profile::{profile, CollectionSpec, FieldDefault, RequiredField, StandardProfile};
pub use record::Record;
pub use standard::{Feature, FeatureSet, FeatureWeight, Standard};
pub use token::{Token, TokenSnapshot, TokenStatus, TOKENS_TABLE};
