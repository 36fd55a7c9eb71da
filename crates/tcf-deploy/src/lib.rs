//! TCF Deploy - complexity, strategies, and the chain boundary
//!
//! Decides how a token configuration reaches the chain:
//! - [`ComplexityAnalyzer`]: weighted feature score, cost estimate, chunk plan
//! - [`StrategySelector`]: basic / enhanced / chunked, with one fallback
//! - [`StrategyRun`]: the run state machine
//! - [`ExecutorSet`]: one [`StrategyExecutor`] per concrete strategy
//! - [`RateLimiter`]: hourly and daily admission windows over attempt rows
//! - [`RecommendationCache`]: moka cache of recommendations per token version
//! - [`ChainDeployer`]: the on-chain collaborator, with a
//!   [`SimulatedChainDeployer`] for offline runs
//!
//! # Example
//!
//! ```rust,ignore
//! use tcf_deploy::{ComplexityAnalyzer, DeploymentStrategy, StrategySelector};
//!
//! let score = ComplexityAnalyzer::default().analyze(&config.standard);
//! let selection = StrategySelector::default().select(&score, DeploymentStrategy::Auto);
//! println!("{} ({:?})", selection.strategy, selection.reason);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod cache;
pub mod chain;
pub mod complexity;
pub mod error;
pub mod executor;
pub mod limiter;
pub mod simulated;
pub mod strategy;

pub use cache::{Recommendation, RecommendationCache};
pub use chain::{
    ChainDeployer, ChainReceipt, ChunkSlice, ConfigurationChunk, ContractTemplate, CostEstimate,
    DeploymentPayload, GasConfig, Verification,
};
pub use complexity::{
    ChunkPlan, ChunkRange, ComplexityAnalyzer, ComplexityLevel, ComplexityScore,
    ComplexitySettings, PlannedChunk,
};
pub use error::{ChainError, DeployError};
pub use executor::{
    BasicExecutor, ChunkReceipt, ChunkedExecutor, DeploymentOutcome, EnhancedExecutor,
    ExecutionContext, ExecutorSet, LegacyExecutor, StrategyExecutor,
};
pub use limiter::{
    Admission, AttemptStatus, LimitWindow, RateLimitSettings, RateLimiter,
    DEPLOYMENT_ATTEMPTS_TABLE,
};
pub use simulated::SimulatedChainDeployer;
pub use strategy::{
    allowed_transitions, validate_transition, DeploymentStrategy, FallbackTarget, RunState,
    SelectionReason, SelectorSettings, StrategyRun, StrategySelection, StrategySelector,
};
