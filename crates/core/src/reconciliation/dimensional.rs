//! Per-dimension-value reconciliation of a multi-branch account.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{AccountId, DateRange, DimensionId, DimensionValueId};

use super::types::{Adjustment, ReconciliationItem};
use crate::accounts::NormalBalance;
use crate::dimension::DimensionBook;
use crate::ledger::JournalLine;

/// Ledger, statement and pending adjustment totals for one value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionVarianceRow {
    /// Value, or `None` for the untagged row.
    pub value_id: Option<DimensionValueId>,
    /// Value code, or `None` for the untagged row.
    pub value_code: Option<String>,
    /// Ledger movement attributed to the value.
    pub ledger_amount: Decimal,
    /// Statement movement attributed to the value.
    pub statement_amount: Decimal,
    /// Effect of adjustments not yet posted.
    pub pending_adjustments: Decimal,
    /// `statement - ledger - pending`.
    pub variance: Decimal,
}

impl DimensionVarianceRow {
    fn new(value_id: Option<DimensionValueId>, value_code: Option<String>) -> Self {
        Self {
            value_id,
            value_code,
            ledger_amount: Decimal::ZERO,
            statement_amount: Decimal::ZERO,
            pending_adjustments: Decimal::ZERO,
            variance: Decimal::ZERO,
        }
    }
}

/// Account-level and per-value variance for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionReconciliation {
    /// Reconciled account.
    pub account_id: AccountId,
    /// Axis the rows are grouped by.
    pub dimension_id: DimensionId,
    /// Period covered.
    pub period: DateRange,
    /// Rows sorted by value path; the untagged row is last when present.
    pub rows: Vec<DimensionVarianceRow>,
    /// Sum of ledger movement.
    pub total_ledger: Decimal,
    /// Sum of statement movement.
    pub total_statement: Decimal,
    /// Sum of pending adjustment effects.
    pub total_pending_adjustments: Decimal,
    /// Account-level variance.
    pub total_variance: Decimal,
}

impl DimensionReconciliation {
    /// Row for a value (`None` selects the untagged row).
    #[must_use]
    pub fn row(&self, value_id: Option<DimensionValueId>) -> Option<&DimensionVarianceRow> {
        self.rows.iter().find(|r| r.value_id == value_id)
    }
}

/// Inputs of [`reconcile_by_dimension`].
#[derive(Debug, Clone, Copy)]
pub struct DimensionalInputs<'a> {
    /// Reconciled account.
    pub account_id: AccountId,
    /// Its normal side.
    pub normal: NormalBalance,
    /// Axis to group by.
    pub dimension_id: DimensionId,
    /// Period covered.
    pub period: DateRange,
    /// Ledger lines on the account inside the period.
    pub lines: &'a [&'a JournalLine],
    /// Statement items of the account's runs inside the period.
    pub items: &'a [&'a ReconciliationItem],
    /// Adjustments not yet posted.
    pub pending: &'a [&'a Adjustment],
}

/// Groups ledger movement, statement movement and pending adjustments by
/// value of one dimension.
///
/// Ledger lines contribute their allocation amounts on the axis; any part
/// of a line not covered by assignments lands in the untagged row, as do
/// statement items and adjustments tagged with no value (or a value of
/// another dimension).
#[must_use]
pub fn reconcile_by_dimension(book: &DimensionBook, inputs: DimensionalInputs<'_>) -> DimensionReconciliation {
    let mut rows: BTreeMap<Option<DimensionValueId>, DimensionVarianceRow> = BTreeMap::new();
    let on_axis = |value_id: Option<DimensionValueId>| {
        value_id.filter(|v| book.value(*v).is_some_and(|value| value.dimension_id == inputs.dimension_id))
    };

    for line in inputs.lines.iter().filter(|l| inputs.period.contains(l.date)) {
        let effect = line.balance_effect(inputs.normal);
        let sign = if effect.is_sign_negative() { -Decimal::ONE } else { Decimal::ONE };
        let mut attributed = Decimal::ZERO;
        for assignment in book.assignments_for_pair(line.id, inputs.dimension_id) {
            let share = assignment.allocation_amount * sign;
            row(&mut rows, book, Some(assignment.value_id)).ledger_amount += share;
            attributed += share;
        }
        let remainder = effect - attributed;
        if !remainder.is_zero() {
            row(&mut rows, book, None).ledger_amount += remainder;
        }
    }

    for item in inputs.items.iter().filter(|i| inputs.period.contains(i.statement.date)) {
        row(&mut rows, book, on_axis(item.statement.dimension_value_id)).statement_amount += item.statement.amount;
    }

    for adjustment in inputs.pending {
        row(&mut rows, book, on_axis(adjustment.dimension_value_id)).pending_adjustments += adjustment.account_effect(inputs.normal);
    }

    let mut rows: Vec<DimensionVarianceRow> = rows
        .into_values()
        .map(|mut r| {
            r.variance = r.statement_amount - r.ledger_amount - r.pending_adjustments;
            r
        })
        .collect();
    rows.sort_by_key(|r| {
        (
            r.value_id.is_none(),
            r.value_id.and_then(|v| book.value(v)).map(|v| v.path.clone()),
        )
    });

    let total_ledger = rows.iter().map(|r| r.ledger_amount).sum();
    let total_statement = rows.iter().map(|r| r.statement_amount).sum();
    let total_pending_adjustments = rows.iter().map(|r| r.pending_adjustments).sum();
    let total_variance = rows.iter().map(|r| r.variance).sum();

    DimensionReconciliation {
        account_id: inputs.account_id,
        dimension_id: inputs.dimension_id,
        period: inputs.period,
        rows,
        total_ledger,
        total_statement,
        total_pending_adjustments,
        total_variance,
    }
}

fn row<'m>(
    rows: &'m mut BTreeMap<Option<DimensionValueId>, DimensionVarianceRow>,
    book: &DimensionBook,
    value_id: Option<DimensionValueId>,
) -> &'m mut DimensionVarianceRow {
    rows.entry(value_id).or_insert_with(|| {
        DimensionVarianceRow::new(value_id, value_id.and_then(|v| book.value(v)).map(|v| v.code.clone()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::{AllocationRules, AssignInput, CreateDimensionInput, CreateDimensionValueInput};
    use crate::ledger::Origin;
    use crate::reconciliation::{AdjustmentCategory, ItemStatus, StatementLine};
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;
    use tally_shared::config::CashFlowClass;
    use tally_shared::types::{
        AdjustmentId, JournalEntryId, ReconciliationItemId, ReconciliationRunId, TransactionId,
    };

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 7, day).unwrap()
    }

    fn june() -> DateRange {
        DateRange::new(date(1), date(31)).unwrap()
    }

    fn line(account_id: AccountId, debit: Decimal, credit: Decimal) -> JournalLine {
        JournalLine {
            id: JournalEntryId::new(),
            transaction_id: TransactionId::new(),
            account_id,
            date: date(5),
            debit,
            credit,
            description: None,
            origin: Origin::Banking,
            branch_id: None,
            reversal_of: None,
            reversed: false,
            sequence: 0,
        }
    }

    fn item(amount: Decimal, value: Option<DimensionValueId>) -> ReconciliationItem {
        let mut statement = StatementLine::new(date(6), "deposit", amount);
        statement.dimension_value_id = value;
        ReconciliationItem {
            id: ReconciliationItemId::new(),
            run_id: ReconciliationRunId::new(),
            statement,
            journal_entry_id: None,
            ledger_amount: None,
            difference: amount,
            status: ItemStatus::Unmatched,
            adjustment_id: None,
            cash_flow_class: CashFlowClass::Unclassified,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_branch_rows_and_untagged_bucket() {
        let mut book = DimensionBook::new();
        let branch = book
            .create_dimension(CreateDimensionInput::new("BR", "Branch"), Utc::now())
            .unwrap();
        let north = book.create_value(CreateDimensionValueInput::new(branch.id, "N", "North")).unwrap();
        let south = book.create_value(CreateDimensionValueInput::new(branch.id, "S", "South")).unwrap();

        let account = AccountId::new();
        let north_deposit = line(account, dec!(300), Decimal::ZERO);
        let untagged_payment = line(account, Decimal::ZERO, dec!(40));
        let plan = book
            .prepare_assign(
                &north_deposit,
                &AssignInput::new(north_deposit.id, branch.id, north.id, dec!(100)),
                AllocationRules::default(),
                Utc::now(),
            )
            .unwrap();
        book.apply(plan);

        let items = [item(dec!(300), Some(north.id)), item(dec!(120), Some(south.id)), item(dec!(-40), None)];
        let item_refs: Vec<&ReconciliationItem> = items.iter().collect();
        let fee = Adjustment {
            id: AdjustmentId::new(),
            run_id: ReconciliationRunId::new(),
            description: "fee".to_string(),
            amount: dec!(5),
            category: AdjustmentCategory::BankCharge,
            dimension_value_id: Some(south.id),
            item_id: None,
            transaction_id: None,
            created_at: Utc::now(),
        };

        let report = reconcile_by_dimension(
            &book,
            DimensionalInputs {
                account_id: account,
                normal: NormalBalance::Debit,
                dimension_id: branch.id,
                period: june(),
                lines: &[&north_deposit, &untagged_payment],
                items: &item_refs,
                pending: &[&fee],
            },
        );

        let north_row = report.row(Some(north.id)).unwrap();
        assert_eq!(north_row.ledger_amount, dec!(300));
        assert_eq!(north_row.variance, Decimal::ZERO);

        let south_row = report.row(Some(south.id)).unwrap();
        assert_eq!(south_row.statement_amount, dec!(120));
        assert_eq!(south_row.pending_adjustments, dec!(-5));
        assert_eq!(south_row.variance, dec!(125));

        let untagged = report.row(None).unwrap();
        assert_eq!(untagged.ledger_amount, dec!(-40));
        assert_eq!(untagged.variance, Decimal::ZERO);
        assert_eq!(report.rows.last().unwrap().value_id, None);

        assert_eq!(report.total_ledger, dec!(260));
        assert_eq!(report.total_statement, dec!(380));
        assert_eq!(report.total_variance, dec!(125));
    }
}
