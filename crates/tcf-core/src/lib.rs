//! TCF Core - token operations and deployment orchestration
//!
//! Ties the store, reconciler, and deployment crates into the platform's
//! entry points.
//!
//! # Core Concepts
//!
//! - [`TokenService`]: create, read, update, delete, status, template import,
//!   and clone, single and batched
//! - [`BatchExecutor`]: sequential batches with isolated failures and an
//!   optional pre-flight pass
//! - [`DeploymentOrchestrator`]: admission, strategy selection, execution
//!   with fallback, outcome recording, recommendations, verification
//! - [`AuditSink`]: append-only deployment events
//! - [`ForgeSettings`]: TOML settings injected into all of the above
//!
//! # Example
//!
//! ```rust,ignore
//! use tcf_core::prelude::*;
//!
//! let settings = Arc::new(ForgeSettings::load("forge.toml")?);
//! let store = Arc::new(InMemoryStore::with_platform_schema());
//! let service = TokenService::new(store, Arc::new(SystemClock), settings);
//! let orchestrator = DeploymentOrchestrator::new(
//!     service.clone(),
//!     Arc::new(SimulatedChainDeployer::default()),
//!     Arc::new(MemoryAuditLog::new()),
//!     Arc::new(SystemClock),
//! );
//!
//! let token = service.create_token(project, config).await?.token;
//! let report = orchestrator
//!     .deploy_token(DeployRequest {
//!         token_id: token.id,
//!         user,
//!         project,
//!         options: DeployOptions::new("0xwallet"),
//!     })
//!     .await?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod audit;
pub mod batch;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod service;

pub use audit::{
    AuditEvent, AuditEventType, AuditSink, ChainedEvent, IntegrityViolation, MemoryAuditLog,
    Severity, StoreAuditSink, DEPLOYMENT_EVENTS_TABLE,
};
pub use batch::{BatchExecutor, BatchItemError, BatchResult};
pub use config::{BatchSettings, DeploymentSettings, ForgeSettings};
pub use error::{ForgeError, ForgeResult};
pub use orchestrator::{DeployOptions, DeployRequest, DeploymentOrchestrator, DeploymentReport};
pub use service::{
    CloneRequest, ConfigValidator, DeleteReport, ImportRequest, TokenService, TokenWrite,
    TOKEN_TEMPLATES_TABLE,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
pub mod prelude {
    pub use crate::audit::{AuditSink, MemoryAuditLog, StoreAuditSink};
    pub use crate::batch::BatchResult;
    pub use crate::config::ForgeSettings;
    pub use crate::error::{ForgeError, ForgeResult};
    pub use crate::orchestrator::{DeployOptions, DeployRequest, DeploymentOrchestrator};
    pub use crate::service::{TokenService, TokenWrite};
    pub use std::sync::Arc;
    pub use tcf_deploy::{DeploymentStrategy, SimulatedChainDeployer};
    pub use tcf_model::{ProjectId, SystemClock, TokenConfig, TokenId, UserId};
    pub use tcf_store::InMemoryStore;
}
