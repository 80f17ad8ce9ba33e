//! Double-entry bookkeeping logic.
//!
//! This module implements the core ledger functionality:
//! - Posting validation (leg count, account resolution, balance)
//! - The journal with its transaction, account and idempotency indexes
//! - Reversal by compensating transaction

pub mod entry;
pub mod error;
pub mod journal;
pub mod reversal;
pub mod transaction;
pub mod types;
pub mod validation;

#[cfg(test)]
mod journal_props;
#[cfg(test)]
mod validation_props;

pub use entry::JournalLine;
pub use error::LedgerError;
pub use journal::{Journal, PreparedPosting};
pub use reversal::ReversalService;
pub use transaction::Transaction;
pub use types::{
    Direction, LegAllocation, LegInput, Origin, PostingRules, PostingTotals, TransactionHeader,
    TransactionStatus,
};
