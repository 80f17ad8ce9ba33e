//! Engine-wide error taxonomy.
//!
//! Every component error (ledger, registry, dimensions, reconciliation,
//! COGS) classifies itself into one [`ErrorKind`] and converts into
//! [`AppError`] at the boundary consumed by surrounding modules.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Classification of an engine failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Caller input is malformed. Never partially applied.
    Validation,
    /// The request conflicts with existing state (duplicate code, duplicate
    /// reversal, already allocated). Safe to retry after correcting intent.
    Conflict,
    /// Stored data violates an invariant (rollup mismatch, cycle). Logged as critical.
    Consistency,
    /// A referenced account, dimension, entry or run does not exist.
    NotFound,
    /// The persistence layer failed (poisoned lock, snapshot I/O).
    Storage,
}

impl ErrorKind {
    /// Returns the string representation of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Conflict => "conflict",
            Self::Consistency => "consistency",
            Self::NotFound => "not_found",
            Self::Storage => "storage",
        }
    }

    /// Returns true if errors of this kind must be logged as critical.
    #[must_use]
    pub const fn is_critical(self) -> bool {
        matches!(self, Self::Consistency)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boundary error returned to surrounding modules.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppError {
    /// Caller input is malformed.
    #[error("Validation error [{code}]: {message}")]
    Validation {
        /// Machine-readable code of the originating error.
        code: String,
        /// Human-readable message.
        message: String,
    },

    /// Conflict with existing state.
    #[error("Conflict [{code}]: {message}")]
    Conflict {
        /// Machine-readable code of the originating error.
        code: String,
        /// Human-readable message.
        message: String,
    },

    /// Stored data violates an invariant.
    #[error("Consistency error [{code}]: {message}")]
    Consistency {
        /// Machine-readable code of the originating error.
        code: String,
        /// Human-readable message.
        message: String,
    },

    /// Referenced entity does not exist.
    #[error("Not found [{code}]: {message}")]
    NotFound {
        /// Machine-readable code of the originating error.
        code: String,
        /// Human-readable message.
        message: String,
    },

    /// Persistence layer failure.
    #[error("Storage error [{code}]: {message}")]
    Storage {
        /// Machine-readable code of the originating error.
        code: String,
        /// Human-readable message.
        message: String,
    },
}

impl AppError {
    /// Builds an `AppError` of the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind, code: &str, message: impl Into<String>) -> Self {
        let code = code.to_string();
        let message = message.into();
        match kind {
            ErrorKind::Validation => Self::Validation { code, message },
            ErrorKind::Conflict => Self::Conflict { code, message },
            ErrorKind::Consistency => Self::Consistency { code, message },
            ErrorKind::NotFound => Self::NotFound { code, message },
            ErrorKind::Storage => Self::Storage { code, message },
        }
    }

    /// Returns the kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Consistency { .. } => ErrorKind::Consistency,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Storage { .. } => ErrorKind::Storage,
        }
    }

    /// Returns the error code of the originating component error.
    #[must_use]
    pub fn error_code(&self) -> &str {
        match self {
            Self::Validation { code, .. }
            | Self::Conflict { code, .. }
            | Self::Consistency { code, .. }
            | Self::NotFound { code, .. }
            | Self::Storage { code, .. } => code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ErrorKind::Validation, "validation")]
    #[case(ErrorKind::Conflict, "conflict")]
    #[case(ErrorKind::Consistency, "consistency")]
    #[case(ErrorKind::NotFound, "not_found")]
    #[case(ErrorKind::Storage, "storage")]
    fn test_kind_round_trips_through_app_error(#[case] kind: ErrorKind, #[case] name: &str) {
        let err = AppError::new(kind, "SOME_CODE", "message");
        assert_eq!(err.kind(), kind);
        assert_eq!(err.error_code(), "SOME_CODE");
        assert_eq!(kind.to_string(), name);
    }

    #[test]
    fn test_only_consistency_is_critical() {
        assert!(ErrorKind::Consistency.is_critical());
        assert!(!ErrorKind::Validation.is_critical());
        assert!(!ErrorKind::Conflict.is_critical());
        assert!(!ErrorKind::NotFound.is_critical());
        assert!(!ErrorKind::Storage.is_critical());
    }

    #[test]
    fn test_error_display() {
        let err = AppError::new(ErrorKind::Conflict, "ALREADY_REVERSED", "tx reversed");
        assert_eq!(err.to_string(), "Conflict [ALREADY_REVERSED]: tx reversed");

        let err = AppError::new(ErrorKind::NotFound, "ACCOUNT_NOT_FOUND", "missing");
        assert_eq!(err.to_string(), "Not found [ACCOUNT_NOT_FOUND]: missing");
    }
}
