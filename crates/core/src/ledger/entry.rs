//! Journal line domain type.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{AccountId, BranchId, JournalEntryId, TransactionId};

use super::types::{Direction, Origin};
use crate::accounts::NormalBalance;

/// One debit or credit leg of a posted transaction.
///
/// Exactly one of `debit`/`credit` is non-zero. Lines are never mutated
/// after posting except for the `reversed` flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    /// Unique identifier for this line.
    pub id: JournalEntryId,
    /// The transaction this line belongs to.
    pub transaction_id: TransactionId,
    /// The account affected.
    pub account_id: AccountId,
    /// Economic date (copied from the transaction header).
    pub date: NaiveDate,
    /// Debit amount (zero for credit lines).
    pub debit: Decimal,
    /// Credit amount (zero for debit lines).
    pub credit: Decimal,
    /// Optional description.
    pub description: Option<String>,
    /// Originating module.
    pub origin: Origin,
    /// Branch copied from the header.
    pub branch_id: Option<BranchId>,
    /// Line this one compensates, for reversal lines.
    pub reversal_of: Option<JournalEntryId>,
    /// Set once the owning transaction has been reversed.
    pub reversed: bool,
    /// Global insertion order.
    pub sequence: u64,
}

impl JournalLine {
    /// Side of the line.
    #[must_use]
    pub fn direction(&self) -> Direction {
        if self.debit.is_zero() {
            Direction::Credit
        } else {
            Direction::Debit
        }
    }

    /// Unsigned amount, `abs(debit - credit)`.
    #[must_use]
    pub fn amount(&self) -> Decimal {
        (self.debit - self.credit).abs()
    }

    /// Signed amount: positive for debits, negative for credits.
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        self.debit - self.credit
    }

    /// Balance effect on an account with the given normal side.
    #[must_use]
    pub fn balance_effect(&self, normal: NormalBalance) -> Decimal {
        normal.signed_movement(self.debit, self.credit)
    }
}
