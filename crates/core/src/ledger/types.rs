//! Ledger domain types for posting and reversal.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{AccountId, BranchId, DimensionId, DimensionValueId, RoundingPolicy};

/// Side of a journal line.
///
/// In double-entry bookkeeping:
/// - Debits increase asset/expense accounts, decrease liability/equity/revenue accounts
/// - Credits decrease asset/expense accounts, increase liability/equity/revenue accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Debit leg.
    Debit,
    /// Credit leg.
    Credit,
}

impl Direction {
    /// The other side.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Debit => Self::Credit,
            Self::Credit => Self::Debit,
        }
    }
}

/// Module that originated a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Manual journal.
    Manual,
    /// Sales invoicing.
    Sales,
    /// Purchasing.
    Purchases,
    /// Banking and payments.
    Banking,
    /// Manufacturing.
    Manufacturing,
    /// Reconciliation adjustments.
    Reconciliation,
    /// Cost-of-goods-sold attribution.
    Cogs,
    /// Compensating reversal of another transaction.
    Reversal,
}

/// Transaction lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Prepared but not committed.
    Draft,
    /// Committed to the ledger (immutable).
    Posted,
    /// Posted and later compensated by a reversal (immutable).
    Reversed,
}

impl TransactionStatus {
    /// Returns true if the transaction can no longer change.
    #[must_use]
    pub const fn is_immutable(self) -> bool {
        matches!(self, Self::Posted | Self::Reversed)
    }
}

/// Header describing the economic event behind a posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionHeader {
    /// Economic date of the event; drives as-of balances.
    pub date: NaiveDate,
    /// Free-text particulars.
    pub particulars: String,
    /// Originating module.
    pub origin: Origin,
    /// External reference (invoice number, statement reference).
    pub reference: Option<String>,
    /// Branch the event belongs to.
    pub branch_id: Option<BranchId>,
    /// Key that makes retries of the same post return the first result.
    pub idempotency_key: Option<String>,
}

impl TransactionHeader {
    /// Creates a header with no reference, branch or idempotency key.
    #[must_use]
    pub fn new(date: NaiveDate, particulars: impl Into<String>, origin: Origin) -> Self {
        Self {
            date,
            particulars: particulars.into(),
            origin,
            reference: None,
            branch_id: None,
            idempotency_key: None,
        }
    }

    /// Sets the external reference.
    #[must_use]
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Sets the branch.
    #[must_use]
    pub const fn with_branch(mut self, branch_id: BranchId) -> Self {
        self.branch_id = Some(branch_id);
        self
    }

    /// Sets the idempotency key.
    #[must_use]
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// A dimension split attached to a leg at posting time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegAllocation {
    /// Dimension axis.
    pub dimension_id: DimensionId,
    /// Value on that axis.
    pub value_id: DimensionValueId,
    /// Share of the leg amount, 0 to 100.
    pub percentage: Decimal,
}

/// One leg of a posting request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegInput {
    /// Account to post to.
    pub account_id: AccountId,
    /// Amount, strictly positive; the sign is carried by `direction`.
    pub amount: Decimal,
    /// Debit or credit.
    pub direction: Direction,
    /// Optional line description.
    pub description: Option<String>,
    /// Dimension splits applied atomically with the posting.
    #[serde(default)]
    pub allocations: Vec<LegAllocation>,
}

impl LegInput {
    /// A debit leg.
    #[must_use]
    pub const fn debit(account_id: AccountId, amount: Decimal) -> Self {
        Self::new(account_id, amount, Direction::Debit)
    }

    /// A credit leg.
    #[must_use]
    pub const fn credit(account_id: AccountId, amount: Decimal) -> Self {
        Self::new(account_id, amount, Direction::Credit)
    }

    /// A leg on the given side.
    #[must_use]
    pub const fn new(account_id: AccountId, amount: Decimal, direction: Direction) -> Self {
        Self {
            account_id,
            amount,
            direction,
            description: None,
            allocations: Vec::new(),
        }
    }

    /// Sets the line description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Adds a dimension split.
    #[must_use]
    pub fn with_allocation(
        mut self,
        dimension_id: DimensionId,
        value_id: DimensionValueId,
        percentage: Decimal,
    ) -> Self {
        self.allocations.push(LegAllocation {
            dimension_id,
            value_id,
            percentage,
        });
        self
    }
}

/// Rules applied when validating a posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostingRules {
    /// Maximum fractional digits on a leg amount.
    pub scale: u32,
    /// Rounding policy for derived amounts.
    pub rounding: RoundingPolicy,
    /// Reject postings to group accounts.
    pub strict_group_posting: bool,
}

impl Default for PostingRules {
    fn default() -> Self {
        Self {
            scale: 4,
            rounding: RoundingPolicy::Bankers,
            strict_group_posting: true,
        }
    }
}

/// Totals for a set of legs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingTotals {
    /// Sum of debit legs.
    pub total_debit: Decimal,
    /// Sum of credit legs.
    pub total_credit: Decimal,
}

impl PostingTotals {
    /// True when debits equal credits exactly.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.total_debit == self.total_credit
    }
}
