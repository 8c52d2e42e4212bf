//! Domain errors - error types for the domain layer

use thiserror::Error;

/// Domain layer errors
///
/// Every variant is a validation failure of caller-supplied input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("Invalid user id: {0:?}")]
    InvalidUserId(String),

    #[error("Invalid group id: {0:?}")]
    InvalidGroupId(String),

    #[error("Invalid presence status: {0}")]
    InvalidStatus(String),

    #[error("Invalid tie-break policy: {0}")]
    InvalidTieBreak(String),
}

impl DomainError {
    /// Get an error code string for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidUserId(_) => "INVALID_USER_ID",
            Self::InvalidGroupId(_) => "INVALID_GROUP_ID",
            Self::InvalidStatus(_) => "INVALID_STATUS",
            Self::InvalidTieBreak(_) => "INVALID_TIE_BREAK",
        }
    }
}
