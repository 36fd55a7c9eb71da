//! Error taxonomy for token operations and deployments

use tcf_deploy::{DeployError, DeploymentStrategy, LimitWindow};
use tcf_model::{ModelError, ProjectId, Standard, TokenId};
use tcf_store::{ErrorCode, StoreError};

/// Top-level error type
#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    /// Entity does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity ("token", "template")
        entity: &'static str,
        /// Identifier looked up
        id: String,
    },

    /// Token belongs to another project
    #[error("token {token} does not belong to project {project}")]
    OwnershipMismatch {
        /// Token
        token: TokenId,
        /// Project the caller claimed
        project: ProjectId,
    },

    /// Unique constraint could not be resolved by the conflict ladder
    #[error("constraint violation in {collection}: {detail}")]
    ConstraintViolation {
        /// Collection (or `properties`)
        collection: String,
        /// Last store error
        detail: String,
    },

    /// Some collections of a token failed to sync; the rest were written
    #[error("token {token} synced partially: {summary}")]
    IncompleteSync {
        /// Token
        token: TokenId,
        /// Failed collections with their errors
        summary: String,
    },

    /// Rate limit window is full
    #[error("deployment limit reached ({window:?} {count}/{limit}), retry after {retry_after_secs}s")]
    AdmissionDenied {
        /// Window at its ceiling
        window: LimitWindow,
        /// Attempts counted
        count: usize,
        /// Window ceiling
        limit: usize,
        /// Seconds to wait
        retry_after_secs: u64,
    },

    /// Primary strategy failed and fallback did not recover
    #[error("deployment with {strategy} failed: {source}")]
    StrategyExecutionFailed {
        /// Primary strategy
        strategy: DeploymentStrategy,
        /// Primary failure
        #[source]
        source: DeployError,
        /// Fallback strategy and its failure, when one ran
        fallback: Option<(DeploymentStrategy, DeployError)>,
    },

    /// Store failure
    #[error("infrastructure error: {0}")]
    Infrastructure(#[from] StoreError),

    /// Deployment machinery failure outside strategy execution
    #[error("deployment error: {0}")]
    Deploy(#[from] DeployError),

    /// Stored data or input could not be interpreted
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// Update tried to change the token's standard
    #[error("token {token} is {current}; standard cannot change to {requested}")]
    StandardImmutable {
        /// Token
        token: TokenId,
        /// Stored standard
        current: Standard,
        /// Standard carried by the patch
        requested: Standard,
    },

    /// Standard disabled in settings
    #[error("standard {0} is not supported by this deployment")]
    UnsupportedStandard(Standard),

    /// Input failed a validation rule
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Settings could not be loaded
    #[error("settings error: {0}")]
    Config(String),
}

impl ForgeError {
    /// Create not-found error
    #[inline]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Create invalid configuration error
    #[inline]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Check if the same call may succeed later
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::AdmissionDenied { .. } => true,
            Self::Infrastructure(e) => e.code() == ErrorCode::Unavailable,
            Self::Deploy(e) => e.is_retryable(),
            Self::StrategyExecutionFailed { source, fallback, .. } => {
                source.is_retryable() || fallback.as_ref().is_some_and(|(_, e)| e.is_retryable())
            }
            _ => false,
        }
    }

    /// Seconds to wait before retrying, when known
    #[must_use]
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::AdmissionDenied { retry_after_secs, .. } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

/// Result alias for token operations
pub type ForgeResult<T> = Result<T, ForgeError>;
