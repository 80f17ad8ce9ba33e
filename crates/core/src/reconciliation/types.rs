//! Reconciliation domain types.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::config::{CashFlowClass, OffsetAccounts};
use tally_shared::types::{
    AccountId, AdjustmentId, DateRange, DimensionValueId, JournalEntryId, ReconciliationItemId, ReconciliationRunId,
    TransactionId,
};

use crate::accounts::NormalBalance;
use crate::ledger::Direction;

/// Lifecycle of a reconciliation run.
///
/// `Draft -> InProgress -> Completed`, with `Discrepancy` reached when a
/// completion leaves a difference above tolerance. A discrepancy run can be
/// reopened; a completed run is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created, nothing matched yet.
    Draft,
    /// Items or adjustments recorded.
    InProgress,
    /// Closed within tolerance.
    Completed,
    /// Closed with a difference above tolerance.
    Discrepancy,
}

impl RunStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Discrepancy => "discrepancy",
        }
    }

    /// True while items and adjustments may still be recorded.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Draft | Self::InProgress)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolution state of a statement item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Paired with a ledger line of equal amount.
    Matched,
    /// No ledger line paired.
    Unmatched,
    /// Paired with a ledger line whose amount differs beyond tolerance.
    Variance,
    /// Explained by a reconciliation adjustment.
    Adjusted,
}

/// One line from the external statement.
///
/// `amount` is signed from the account's point of view: positive values
/// increase the account's balance (deposits on a bank account).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementLine {
    /// Value date on the statement.
    pub date: NaiveDate,
    /// Statement narrative.
    pub description: String,
    /// Signed amount.
    pub amount: Decimal,
    /// Bank reference, if any.
    pub reference: Option<String>,
    /// Dimension value the statement attributes the line to.
    pub dimension_value_id: Option<DimensionValueId>,
}

impl StatementLine {
    /// Creates a statement line without reference or dimension.
    #[must_use]
    pub fn new(date: NaiveDate, description: impl Into<String>, amount: Decimal) -> Self {
        Self {
            date,
            description: description.into(),
            amount,
            reference: None,
            dimension_value_id: None,
        }
    }

    /// Sets the bank reference.
    #[must_use]
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Tags the line with a dimension value.
    #[must_use]
    pub const fn with_dimension_value(mut self, value_id: DimensionValueId) -> Self {
        self.dimension_value_id = Some(value_id);
        self
    }
}

/// A statement line and how it was resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationItem {
    /// Item ID.
    pub id: ReconciliationItemId,
    /// Owning run.
    pub run_id: ReconciliationRunId,
    /// The statement line.
    pub statement: StatementLine,
    /// Paired ledger line, if any.
    pub journal_entry_id: Option<JournalEntryId>,
    /// Balance effect of the paired ledger line.
    pub ledger_amount: Option<Decimal>,
    /// Statement amount minus ledger amount (the full statement amount
    /// when unpaired, zero once adjusted).
    pub difference: Decimal,
    /// Resolution state.
    pub status: ItemStatus,
    /// Adjustment explaining the item.
    pub adjustment_id: Option<AdjustmentId>,
    /// Keyword classification of the statement narrative.
    pub cash_flow_class: CashFlowClass,
    /// When the item was recorded.
    pub created_at: DateTime<Utc>,
}

impl ReconciliationItem {
    /// True once paired with a ledger line within tolerance.
    #[must_use]
    pub fn is_matched(&self) -> bool {
        self.status == ItemStatus::Matched
    }

    /// True while the item blocks completion.
    #[must_use]
    pub fn is_unresolved(&self) -> bool {
        matches!(self.status, ItemStatus::Unmatched | ItemStatus::Variance) && self.adjustment_id.is_none()
    }
}

/// Kind of bank-initiated item an adjustment books.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentCategory {
    /// Fees and charges.
    BankCharge,
    /// Interest credited.
    InterestIncome,
    /// Interest charged.
    InterestExpense,
    /// Taxes withheld or charged.
    Tax,
    /// Anything else.
    Other,
}

impl AdjustmentCategory {
    /// Returns the string representation of the category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BankCharge => "bank_charge",
            Self::InterestIncome => "interest_income",
            Self::InterestExpense => "interest_expense",
            Self::Tax => "tax",
            Self::Other => "other",
        }
    }

    /// Side of the reconciled account's leg for a positive amount.
    ///
    /// Interest income increases the account; everything else reduces it.
    #[must_use]
    pub const fn account_direction(self) -> Direction {
        match self {
            Self::InterestIncome => Direction::Debit,
            Self::BankCharge | Self::InterestExpense | Self::Tax | Self::Other => Direction::Credit,
        }
    }

    /// Configured offset account code.
    #[must_use]
    pub fn offset_code(self, offsets: &OffsetAccounts) -> &str {
        match self {
            Self::BankCharge => &offsets.bank_charge,
            Self::InterestIncome => &offsets.interest_income,
            Self::InterestExpense => &offsets.interest_expense,
            Self::Tax => &offsets.tax,
            Self::Other => &offsets.other,
        }
    }
}

impl std::fmt::Display for AdjustmentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdjustmentCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bank_charge" | "bank_charges" | "fee" => Ok(Self::BankCharge),
            "interest_income" => Ok(Self::InterestIncome),
            "interest_expense" => Ok(Self::InterestExpense),
            "tax" | "vat" => Ok(Self::Tax),
            "other" => Ok(Self::Other),
            _ => Err(format!("Unknown adjustment category: {s}")),
        }
    }
}

/// A bank-initiated item booked to the ledger when the run completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjustment {
    /// Adjustment ID.
    pub id: AdjustmentId,
    /// Owning run.
    pub run_id: ReconciliationRunId,
    /// Narrative copied onto the posting.
    pub description: String,
    /// Posted amount. The category picks which side the reconciled account
    /// sits on; a negative amount flips it.
    pub amount: Decimal,
    /// Category.
    pub category: AdjustmentCategory,
    /// Dimension value the posting is tagged with.
    pub dimension_value_id: Option<DimensionValueId>,
    /// Statement item the adjustment explains.
    pub item_id: Option<ReconciliationItemId>,
    /// Posting created on completion.
    pub transaction_id: Option<TransactionId>,
    /// When the adjustment was recorded.
    pub created_at: DateTime<Utc>,
}

impl Adjustment {
    /// Side of the reconciled account's leg.
    #[must_use]
    pub fn account_direction(&self) -> Direction {
        let direction = self.category.account_direction();
        if self.amount.is_sign_negative() {
            direction.opposite()
        } else {
            direction
        }
    }

    /// Effect of the posting on the reconciled account's balance.
    #[must_use]
    pub fn account_effect(&self, normal: NormalBalance) -> Decimal {
        let amount = self.amount.abs();
        match self.account_direction() {
            Direction::Debit => normal.signed_movement(amount, Decimal::ZERO),
            Direction::Credit => normal.signed_movement(Decimal::ZERO, amount),
        }
    }

    /// True once booked to the ledger.
    #[must_use]
    pub const fn is_posted(&self) -> bool {
        self.transaction_id.is_some()
    }
}

/// Input for an adjustment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentInput {
    /// Narrative.
    pub description: String,
    /// See [`Adjustment::amount`].
    pub amount: Decimal,
    /// Category.
    pub category: AdjustmentCategory,
    /// Optional dimension value.
    pub dimension_value_id: Option<DimensionValueId>,
}

impl AdjustmentInput {
    /// Creates an untagged adjustment.
    #[must_use]
    pub fn new(description: impl Into<String>, amount: Decimal, category: AdjustmentCategory) -> Self {
        Self {
            description: description.into(),
            amount,
            category,
            dimension_value_id: None,
        }
    }

    /// Tags the adjustment with a dimension value.
    #[must_use]
    pub const fn with_dimension_value(mut self, value_id: DimensionValueId) -> Self {
        self.dimension_value_id = Some(value_id);
        self
    }
}

/// Comparison between an account's ledger balance and a statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationRun {
    /// Run ID.
    pub id: ReconciliationRunId,
    /// Reconciled account.
    pub account_id: AccountId,
    /// Optional statement period; defaults to a single day.
    pub period: DateRange,
    /// Statement closing date.
    pub statement_date: NaiveDate,
    /// Statement closing balance.
    pub statement_balance: Decimal,
    /// Ledger balance at `statement_date`, read when the run starts and
    /// again once completion has posted its adjustments.
    pub book_balance: Decimal,
    /// `statement_balance - (book_balance + effect of unposted adjustments)`.
    pub difference: Decimal,
    /// Lifecycle state.
    pub status: RunStatus,
    /// When the run was started.
    pub created_at: DateTime<Utc>,
    /// When the run was last completed.
    pub completed_at: Option<DateTime<Utc>>,
}

/// Input for starting a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRunInput {
    /// Account to reconcile.
    pub account_id: AccountId,
    /// Statement closing date.
    pub statement_date: NaiveDate,
    /// Statement closing balance.
    pub statement_balance: Decimal,
    /// First day the statement covers; the closing date when omitted.
    pub period_start: Option<NaiveDate>,
}

impl StartRunInput {
    /// Creates an input covering only the closing date.
    #[must_use]
    pub const fn new(account_id: AccountId, statement_date: NaiveDate, statement_balance: Decimal) -> Self {
        Self {
            account_id,
            statement_date,
            statement_balance,
            period_start: None,
        }
    }

    /// Sets the first day of the statement period.
    #[must_use]
    pub const fn from_date(mut self, start: NaiveDate) -> Self {
        self.period_start = Some(start);
        self
    }
}

/// Outcome of a completion check, applied after adjustments are posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionPlan {
    /// Run being completed.
    pub run_id: ReconciliationRunId,
    /// Statement closing balance.
    pub statement_balance: Decimal,
    /// Ledger balance once the pending adjustments are posted.
    pub book_balance: Decimal,
    /// Final difference.
    pub difference: Decimal,
    /// Largest difference that still completes.
    pub tolerance: Decimal,
    /// Status the run moves to.
    pub status: RunStatus,
    /// Adjustments still to be posted.
    pub pending_adjustments: Vec<Adjustment>,
    /// Unresolved items at completion time (non-zero only when forced).
    pub unresolved_count: usize,
}

impl CompletionPlan {
    /// Re-derives the outcome from the ledger balance read after the
    /// adjustments were posted.
    ///
    /// Returns false when the ledger did not land on the projected balance;
    /// the run then closes on the observed difference, as a `Discrepancy`
    /// unless that difference is within tolerance.
    pub fn confirm(&mut self, ledger_balance: Decimal) -> bool {
        let landed = ledger_balance == self.book_balance;
        self.book_balance = ledger_balance;
        self.difference = self.statement_balance - ledger_balance;
        if self.difference.abs() > self.tolerance {
            self.status = RunStatus::Discrepancy;
        }
        landed
    }
}
