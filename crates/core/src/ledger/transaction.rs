//! Transaction header aggregate.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{BranchId, TransactionId};

use super::types::{Origin, TransactionStatus};

/// The economic event grouping two or more journal lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier.
    pub id: TransactionId,
    /// Economic date.
    pub date: NaiveDate,
    /// Free-text particulars.
    pub particulars: String,
    /// Originating module.
    pub origin: Origin,
    /// External reference.
    pub reference: Option<String>,
    /// Branch.
    pub branch_id: Option<BranchId>,
    /// Idempotency key supplied by the caller.
    pub idempotency_key: Option<String>,
    /// Current status.
    pub status: TransactionStatus,
    /// Sum of the debit legs (equal to the credit legs).
    pub total_amount: Decimal,
    /// Transaction this one reverses.
    pub reversal_of: Option<TransactionId>,
    /// Transaction that reversed this one.
    pub reversed_by: Option<TransactionId>,
    /// When the posting was prepared.
    pub prepared_at: DateTime<Utc>,
    /// When the posting was committed.
    pub posted_at: Option<DateTime<Utc>>,
    /// Global insertion order.
    pub sequence: u64,
}

impl Transaction {
    /// Returns true if the transaction has been reversed.
    #[must_use]
    pub fn is_reversed(&self) -> bool {
        self.status == TransactionStatus::Reversed
    }

    /// Returns true if this transaction is itself a reversal.
    #[must_use]
    pub const fn is_reversal(&self) -> bool {
        self.reversal_of.is_some()
    }
}
