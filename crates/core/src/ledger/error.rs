//! Ledger error types for validation and state errors.

use rust_decimal::Decimal;
use tally_shared::types::{AccountId, Currency, JournalEntryId, TransactionId};
use tally_shared::{AppError, ErrorKind};
use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// Transaction must have at least 2 legs.
    #[error("Transaction must have at least 2 legs, got {count}")]
    InsufficientLegs {
        /// Number of legs supplied.
        count: usize,
    },

    /// Transaction is not balanced (debits != credits).
    #[error("Transaction is not balanced. Debit: {debit}, Credit: {credit}")]
    UnbalancedEntry {
        /// Total debit amount.
        debit: Decimal,
        /// Total credit amount.
        credit: Decimal,
    },

    /// Leg amount is zero or negative.
    #[error("Leg {index} amount must be positive, got {amount}")]
    NonPositiveAmount {
        /// Position of the leg.
        index: usize,
        /// Amount supplied.
        amount: Decimal,
    },

    /// Leg amount carries more fractional digits than the ledger scale.
    #[error("Leg {index} amount {amount} exceeds ledger scale of {scale} digits")]
    ExcessPrecision {
        /// Position of the leg.
        index: usize,
        /// Amount supplied.
        amount: Decimal,
        /// Configured scale.
        scale: u32,
    },

    /// All legs are on the same side.
    #[error("Transaction must have both debit and credit legs")]
    SingleSided,

    /// Legs are denominated in more than one currency.
    #[error("Account {account_id} is in {found}, transaction is in {expected}")]
    CurrencyMismatch {
        /// Account whose currency differs.
        account_id: AccountId,
        /// Currency of the first leg.
        expected: Currency,
        /// Currency of this leg.
        found: Currency,
    },

    /// Reversal requires a reason.
    #[error("Reversal reason is required")]
    ReversalReasonRequired,

    // ========== Account Errors ==========
    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Account is inactive and cannot be used.
    #[error("Account {0} is inactive")]
    AccountInactive(AccountId),

    /// Account is a group and does not accept direct postings.
    #[error("Account {0} is a group account and does not allow direct posting")]
    GroupAccountPosting(AccountId),

    // ========== Transaction State Errors ==========
    /// Transaction not found.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// Journal line not found.
    #[error("Journal entry not found: {0}")]
    EntryNotFound(JournalEntryId),

    /// A reversal already exists for this transaction.
    #[error("Transaction {transaction_id} already reversed by {reversal_id}")]
    AlreadyReversed {
        /// Original transaction.
        transaction_id: TransactionId,
        /// Existing reversal.
        reversal_id: TransactionId,
    },

    /// Reversals cannot themselves be reversed; post a new entry instead.
    #[error("Transaction {0} is a reversal and cannot be reversed")]
    CannotReverseReversal(TransactionId),

    // ========== Consistency Errors ==========
    /// Cached balance drifted from the replayed posted lines.
    #[error("Balance drift on account {account_id}: cached {cached}, replayed {replayed}")]
    BalanceDrift {
        /// Account.
        account_id: AccountId,
        /// Cached direct balance.
        cached: Decimal,
        /// Balance replayed from posted lines.
        replayed: Decimal,
    },

    // ========== Storage Errors ==========
    /// Persistence layer failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    /// Returns the error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InsufficientLegs { .. } => "INSUFFICIENT_LEGS",
            Self::UnbalancedEntry { .. } => "UNBALANCED_ENTRY",
            Self::NonPositiveAmount { .. } => "NON_POSITIVE_AMOUNT",
            Self::ExcessPrecision { .. } => "EXCESS_PRECISION",
            Self::SingleSided => "SINGLE_SIDED",
            Self::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            Self::ReversalReasonRequired => "REVERSAL_REASON_REQUIRED",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::AccountInactive(_) => "ACCOUNT_INACTIVE",
            Self::GroupAccountPosting(_) => "GROUP_ACCOUNT_POSTING",
            Self::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            Self::EntryNotFound(_) => "ENTRY_NOT_FOUND",
            Self::AlreadyReversed { .. } => "ALREADY_REVERSED",
            Self::CannotReverseReversal(_) => "CANNOT_REVERSE_REVERSAL",
            Self::BalanceDrift { .. } => "BALANCE_DRIFT",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Classifies the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InsufficientLegs { .. }
            | Self::UnbalancedEntry { .. }
            | Self::NonPositiveAmount { .. }
            | Self::ExcessPrecision { .. }
            | Self::SingleSided
            | Self::CurrencyMismatch { .. }
            | Self::ReversalReasonRequired
            | Self::AccountInactive(_)
            | Self::GroupAccountPosting(_)
            | Self::CannotReverseReversal(_) => ErrorKind::Validation,

            Self::AlreadyReversed { .. } => ErrorKind::Conflict,

            Self::AccountNotFound(_) | Self::TransactionNotFound(_) | Self::EntryNotFound(_) => {
                ErrorKind::NotFound
            }

            Self::BalanceDrift { .. } => ErrorKind::Consistency,

            Self::Storage(_) => ErrorKind::Storage,
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        Self::new(err.kind(), err.error_code(), err.to_string())
    }
}
