//! Deployment and chain errors

use crate::strategy::{DeploymentStrategy, RunState};

/// Errors reported by a chain deployer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// Transaction would exceed the gas ceiling
    #[error("gas limit exceeded: required {required}, limit {limit}")]
    GasLimitExceeded {
        /// Gas the transaction needs
        required: u64,
        /// Applicable ceiling
        limit: u64,
    },

    /// Chain rejected the transaction
    #[error("transaction rejected: {0}")]
    Rejected(String),

    /// No contract at the address
    #[error("contract not found: {0}")]
    ContractNotFound(String),

    /// Node unreachable
    #[error("chain unavailable: {0}")]
    Unavailable(String),

    /// Transaction not confirmed in time
    #[error("timed out waiting for {0}")]
    Timeout(String),
}

impl ChainError {
    /// Check if the same call may succeed later
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}

/// Strategy execution errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeployError {
    /// Chain call failed
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// Base contract deployed but a configuration chunk failed
    #[error("chunk {index} failed after base deployment at {address}: {source}")]
    ChunkFailed {
        /// Chunk index in the plan
        index: usize,
        /// Address of the already deployed base contract
        address: String,
        /// Underlying chain error
        #[source]
        source: ChainError,
    },

    /// Strategy is permanently disabled
    #[error("deployment strategy {0} is disabled")]
    StrategyDisabled(DeploymentStrategy),

    /// Strategy has no executor (`auto` must be resolved first)
    #[error("deployment strategy {0} cannot be executed directly")]
    NotExecutable(DeploymentStrategy),

    /// Chain accepted a deployment without returning an address
    #[error("chain returned no contract address")]
    MissingAddress,

    /// Run state machine violation
    #[error("illegal run transition {from:?} -> {to:?}")]
    IllegalTransition {
        /// Current state
        from: RunState,
        /// Requested state
        to: RunState,
    },
}

impl DeployError {
    /// Check if the failure may clear on retry
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Chain(e) | Self::ChunkFailed { source: e, .. } => e.is_retryable(),
            _ => false,
        }
    }

    /// Address of a partially deployed contract, if any
    #[must_use]
    pub fn partial_address(&self) -> Option<&str> {
        match self {
            Self::ChunkFailed { address, .. } => Some(address),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(ChainError::Unavailable("rpc".into()).is_retryable());
        assert!(!ChainError::Rejected("revert".into()).is_retryable());

        let chunk = DeployError::ChunkFailed {
            index: 2,
            address: "0xabc".into(),
            source: ChainError::Timeout("receipt".into()),
        };
        assert!(chunk.is_retryable());
        assert_eq!(chunk.partial_address(), Some("0xabc"));
        assert!(!DeployError::StrategyDisabled(DeploymentStrategy::Legacy).is_retryable());
    }
}
