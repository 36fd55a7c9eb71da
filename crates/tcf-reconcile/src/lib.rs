//! TCF Reconcile - property records and child collections
//!
//! Brings a token's stored rows in line with its configuration:
//! - [`normalize`]: fills required fields with deterministic defaults
//! - [`RecordReconciler`]: full replace or keyed sync per collection, with a
//!   conflict ladder on unique violations
//! - [`SyncReport`]: per-collection results keyed by collection name
//!
//! # Example
//!
//! ```rust,ignore
//! use tcf_reconcile::{EmptyListMode, RecordReconciler};
//!
//! let reconciler = RecordReconciler::new(store);
//! let report = reconciler
//!     .sync_token(token_id, &mapping::map_standard(&config.standard), EmptyListMode::Ignore)
//!     .await;
//! assert!(report.is_success(), "{}", report.failure_summary());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod normalize;
mod reconciler;
mod report;

pub use reconciler::{Desired, EmptyListMode, ReconcileOptions, RecordReconciler};
pub use report::{CollectionResult, Resolution, SyncReport, SyncStatus, PROPERTIES};
