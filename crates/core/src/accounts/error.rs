//! Account registry errors.

use rust_decimal::Decimal;
use tally_shared::{AppError, ErrorKind};
use tally_shared::types::AccountId;
use thiserror::Error;

/// Errors raised by the account registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccountError {
    /// Account code is empty.
    #[error("Account code cannot be empty")]
    EmptyCode,

    /// Account code is already in use.
    #[error("Account code already exists: {0}")]
    DuplicateCode(String),

    /// The requested parent/child relationship is not allowed.
    #[error("Invalid hierarchy: {reason}")]
    InvalidHierarchy {
        /// Why the relationship was rejected.
        reason: String,
    },

    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Account code not found.
    #[error("Account code not found: {0}")]
    CodeNotFound(String),

    /// Parent account not found.
    #[error("Parent account not found: {0}")]
    ParentNotFound(AccountId),

    /// Walking the parent chain revisited an account.
    #[error("Cycle detected in account hierarchy at {at}")]
    CycleDetected {
        /// First account seen twice.
        at: AccountId,
    },

    /// A cached group total disagrees with the sum of its children.
    #[error("Rollup mismatch on account {account_id}: cached {cached}, computed {computed}")]
    RollupMismatch {
        /// Group account.
        account_id: AccountId,
        /// Cached balance.
        cached: Decimal,
        /// Recomputed balance.
        computed: Decimal,
    },

    /// Persistence layer failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl AccountError {
    /// Returns the error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyCode => "EMPTY_ACCOUNT_CODE",
            Self::DuplicateCode(_) => "DUPLICATE_ACCOUNT_CODE",
            Self::InvalidHierarchy { .. } => "INVALID_HIERARCHY",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::CodeNotFound(_) => "ACCOUNT_CODE_NOT_FOUND",
            Self::ParentNotFound(_) => "PARENT_NOT_FOUND",
            Self::CycleDetected { .. } => "ACCOUNT_CYCLE_DETECTED",
            Self::RollupMismatch { .. } => "ROLLUP_MISMATCH",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Classifies the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyCode | Self::InvalidHierarchy { .. } => ErrorKind::Validation,
            Self::DuplicateCode(_) => ErrorKind::Conflict,
            Self::AccountNotFound(_) | Self::CodeNotFound(_) | Self::ParentNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::CycleDetected { .. } | Self::RollupMismatch { .. } => ErrorKind::Consistency,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }
}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        Self::new(err.kind(), err.error_code(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(AccountError::DuplicateCode("1000".into()).kind(), ErrorKind::Conflict);
        assert_eq!(
            AccountError::CycleDetected { at: AccountId::new() }.kind(),
            ErrorKind::Consistency
        );
        assert_eq!(AccountError::EmptyCode.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_into_app_error_keeps_code() {
        let app: AppError = AccountError::DuplicateCode("1000".into()).into();
        assert_eq!(app.error_code(), "DUPLICATE_ACCOUNT_CODE");
        assert_eq!(app.kind(), ErrorKind::Conflict);
        assert!(app.to_string().contains("1000"));
    }
}
