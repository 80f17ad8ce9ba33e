//! Reconciliation error types.

use rust_decimal::Decimal;
use tally_shared::types::{AccountId, JournalEntryId, ReconciliationItemId, ReconciliationRunId};
use tally_shared::{AppError, ErrorKind};
use thiserror::Error;

use super::types::RunStatus;
use crate::dimension::DimensionError;
use crate::ledger::LedgerError;

/// Errors that can occur during reconciliation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReconciliationError {
    /// Run does not exist.
    #[error("Reconciliation run not found: {0}")]
    RunNotFound(ReconciliationRunId),

    /// Item does not exist.
    #[error("Reconciliation item not found: {0}")]
    ItemNotFound(ReconciliationItemId),

    /// Reconciled account does not exist.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Candidate ledger line does not exist.
    #[error("Journal entry not found: {0}")]
    EntryNotFound(JournalEntryId),

    /// Candidate ledger line is on another account.
    #[error("Journal entry {entry_id} is not posted to account {account_id}")]
    EntryAccountMismatch {
        /// Candidate line.
        entry_id: JournalEntryId,
        /// Reconciled account.
        account_id: AccountId,
    },

    /// Candidate ledger line is already paired with another item.
    #[error("Journal entry {entry_id} is already matched by item {item_id}")]
    EntryAlreadyMatched {
        /// Candidate line.
        entry_id: JournalEntryId,
        /// Item holding the match.
        item_id: ReconciliationItemId,
    },

    /// The run's state does not allow the operation.
    #[error("Invalid run transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: RunStatus,
        /// Attempted status.
        to: RunStatus,
    },

    /// Items remain unmatched or the difference exceeds tolerance.
    #[error("{count} unresolved items, difference {difference}")]
    UnresolvedItems {
        /// Unresolved items.
        count: usize,
        /// Remaining difference.
        difference: Decimal,
    },

    /// Adjustment description is empty.
    #[error("Adjustment description is required")]
    DescriptionRequired,

    /// Adjustment amount is zero.
    #[error("Adjustment amount must be non-zero")]
    ZeroAdjustment,

    /// Offset account code is not in the chart.
    #[error("Offset account not found: {0}")]
    OffsetAccountMissing(String),

    /// Reading or posting through the ledger failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Tagging an adjustment posting or resolving a dimension failed.
    #[error(transparent)]
    Dimension(#[from] DimensionError),

    /// Aggregation was aborted.
    #[error("Aggregation aborted")]
    Aborted,

    /// Persistence layer failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl ReconciliationError {
    /// Returns the error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::RunNotFound(_) => "RUN_NOT_FOUND",
            Self::ItemNotFound(_) => "ITEM_NOT_FOUND",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::EntryNotFound(_) => "ENTRY_NOT_FOUND",
            Self::EntryAccountMismatch { .. } => "ENTRY_ACCOUNT_MISMATCH",
            Self::EntryAlreadyMatched { .. } => "ENTRY_ALREADY_MATCHED",
            Self::InvalidTransition { .. } => "INVALID_RUN_TRANSITION",
            Self::UnresolvedItems { .. } => "UNRESOLVED_ITEMS",
            Self::DescriptionRequired => "DESCRIPTION_REQUIRED",
            Self::ZeroAdjustment => "ZERO_ADJUSTMENT",
            Self::OffsetAccountMissing(_) => "OFFSET_ACCOUNT_MISSING",
            Self::Ledger(inner) => inner.error_code(),
            Self::Dimension(inner) => inner.error_code(),
            Self::Aborted => "ABORTED",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Classifies the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RunNotFound(_)
            | Self::ItemNotFound(_)
            | Self::AccountNotFound(_)
            | Self::EntryNotFound(_)
            | Self::OffsetAccountMissing(_) => ErrorKind::NotFound,
            Self::EntryAlreadyMatched { .. } | Self::InvalidTransition { .. } => ErrorKind::Conflict,
            Self::Ledger(inner) => inner.kind(),
            Self::Dimension(inner) => inner.kind(),
            Self::Storage(_) => ErrorKind::Storage,
            Self::EntryAccountMismatch { .. }
            | Self::UnresolvedItems { .. }
            | Self::DescriptionRequired
            | Self::ZeroAdjustment
            | Self::Aborted => ErrorKind::Validation,
        }
    }
}

impl From<ReconciliationError> for AppError {
    fn from(err: ReconciliationError) -> Self {
        Self::new(err.kind(), err.error_code(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_ledger_errors_keep_their_code() {
        let err = ReconciliationError::from(LedgerError::AccountNotFound(AccountId::new()));
        assert_eq!(err.error_code(), "ACCOUNT_NOT_FOUND");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_unresolved_items_is_validation() {
        let err = ReconciliationError::UnresolvedItems {
            count: 1,
            difference: dec!(50),
        };
        let app: AppError = err.into();
        assert_eq!(app.kind(), ErrorKind::Validation);
        assert_eq!(app.error_code(), "UNRESOLVED_ITEMS");
    }
}
