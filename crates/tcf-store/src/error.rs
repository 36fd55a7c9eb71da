//! Store error classification

/// Coarse error code consumed by callers deciding how to recover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Unique constraint violated
    UniqueViolation,
    /// Backend unreachable or timed out
    Unavailable,
    /// Request rejected before execution
    InvalidRequest,
    /// Anything else
    Internal,
}

/// Structured store errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Unique constraint violated
    #[error("unique constraint {constraint} violated on {table}: {detail}")]
    UniqueViolation {
        /// Table name
        table: String,
        /// Constraint columns joined with `+`
        constraint: String,
        /// Offending key
        detail: String,
    },

    /// Backend unreachable
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Malformed request
    #[error("invalid request on {table}: {message}")]
    InvalidRequest {
        /// Table name
        table: String,
        /// Reason
        message: String,
    },

    /// Other backend failure
    #[error("store error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Error code for recovery decisions
    #[inline]
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::UniqueViolation { .. } => ErrorCode::UniqueViolation,
            Self::Unavailable(_) => ErrorCode::Unavailable,
            Self::InvalidRequest { .. } => ErrorCode::InvalidRequest,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Check if this is a unique constraint violation
    #[inline]
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        self.code() == ErrorCode::UniqueViolation
    }

    /// Create invalid request error
    #[inline]
    pub fn invalid_request(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            table: table.into(),
            message: message.into(),
        }
    }
}

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
