//! Error types for the model layer

use crate::standard::Standard;

/// Model errors: parsing ids, standards, and stored rows
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Identifier is not a valid ULID
    #[error("invalid id: {0}")]
    InvalidId(String),

    /// Standard name not recognised
    #[error("unknown standard: '{0}'")]
    UnknownStandard(String),

    /// Configuration variant does not match the expected standard
    #[error("standard mismatch: expected {expected}, got {actual}")]
    StandardMismatch {
        /// Standard the caller expected
        expected: Standard,
        /// Standard carried by the configuration
        actual: Standard,
    },

    /// Stored row could not be interpreted
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// JSON conversion failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ModelError {
    /// Create invalid record error
    #[inline]
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord(message.into())
    }
}
