//! TCF Structured Store
//!
//! The relational collaborator every other crate writes through.
//!
//! # Core Concepts
//!
//! - [`StructuredStore`]: select/insert/update/delete/upsert by filter, plus
//!   `count` and an optionally atomic `replace`
//! - [`Filter`] and [`Query`]: conjunctive conditions, ordering, limits
//! - [`StoreError`]: classifiable failures; [`StoreError::is_unique_violation`]
//!   drives the reconciler's conflict ladder
//! - [`InMemoryStore`]: concurrent in-process store with declared unique
//!   indexes, used by tests, simulations, and the CLI
//!
//! # Example
//!
//! ```rust,ignore
//! use tcf_store::{Filter, InMemoryStore, Query, StructuredStore};
//!
//! let store = InMemoryStore::with_platform_schema();
//! store.insert("token_erc3525_slots", vec![row]).await?;
//! let rows = store
//!     .select("token_erc3525_slots", &Query::new(Filter::new().eq("token_id", id)))
//!     .await?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod filter;
mod memory;
mod store;

pub use error::{ErrorCode, StoreError, StoreResult};
pub use filter::{compare_values, Condition, Filter, OrderBy, Query};
pub use memory::InMemoryStore;
pub use store::StructuredStore;
