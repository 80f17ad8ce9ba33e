//! Period revenue-versus-COGS reporting by dimension value.
//!
//! Revenue is joined from the posted revenue line of each invoice line and
//! split across that line's allocations by quantity. Revenue rows follow the sales-side
//! dimensions, COGS rows the production-side dimensions, so a dimension
//! variance shows up as margin moving between rows.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{
    CogsAllocationId, DateRange, DimensionId, DimensionValueId, InvoiceLineId, JournalEntryId, RoundingPolicy,
};

use super::error::CogsError;
use super::types::{CogsAllocation, DimensionVariance};
use crate::allocation::AllocationUtil;
use crate::cancel::AbortSignal;
use crate::dimension::DimensionBook;
use crate::ledger::JournalLine;

/// A data-quality issue found while building the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum CogsWarning {
    /// The allocation has no matched revenue.
    ZeroRevenue {
        /// Allocation.
        allocation_id: CogsAllocationId,
        /// Invoice line.
        invoice_line_id: InvoiceLineId,
    },
    /// The revenue line was reversed; its revenue counts as zero.
    RevenueReversed {
        /// Allocation.
        allocation_id: CogsAllocationId,
        /// Reversed revenue line.
        journal_entry_id: JournalEntryId,
    },
    /// Production and sales dimensions differ.
    DimensionVariance {
        /// Allocation.
        allocation_id: CogsAllocationId,
        /// Differing dimensions.
        variances: Vec<DimensionVariance>,
    },
}

/// Revenue, COGS and margin for one dimension value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginRow {
    /// Dimension, `None` for the untagged row.
    pub dimension_id: Option<DimensionId>,
    /// Dimension code.
    pub dimension_code: Option<String>,
    /// Value, `None` for the untagged row.
    pub value_id: Option<DimensionValueId>,
    /// Value code.
    pub value_code: Option<String>,
    /// Revenue attributed to the value.
    pub revenue: Decimal,
    /// COGS attributed to the value.
    pub cogs: Decimal,
    /// `revenue - cogs`.
    pub gross_margin: Decimal,
    /// Margin as a percentage of revenue; `None` without revenue.
    pub margin_percentage: Option<Decimal>,
}

impl MarginRow {
    fn finish(&mut self) {
        self.gross_margin = self.revenue - self.cogs;
        self.margin_percentage = margin_percentage(self.revenue, self.gross_margin);
    }
}

/// Result of [`reconcile_period`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CogsPeriodReport {
    /// Period covered (by sale date).
    pub period: DateRange,
    /// Rows sorted by dimension code then value path.
    pub rows: Vec<MarginRow>,
    /// Allocations with no dimension on a side.
    pub untagged: MarginRow,
    /// Total revenue.
    pub total_revenue: Decimal,
    /// Total COGS.
    pub total_cogs: Decimal,
    /// `total_revenue - total_cogs`.
    pub gross_margin: Decimal,
    /// Margin as a percentage of revenue.
    pub margin_percentage: Option<Decimal>,
    /// Allocations included.
    pub allocation_count: usize,
    /// Data-quality warnings.
    pub warnings: Vec<CogsWarning>,
}

impl CogsPeriodReport {
    /// Row for a value.
    #[must_use]
    pub fn row(&self, value_id: DimensionValueId) -> Option<&MarginRow> {
        self.rows.iter().find(|r| r.value_id == Some(value_id))
    }
}

fn margin_percentage(revenue: Decimal, margin: Decimal) -> Option<Decimal> {
    (!revenue.is_zero()).then(|| (margin * Decimal::ONE_HUNDRED / revenue).round_dp(2))
}

/// Revenue of each allocation in `group`, all sold on one invoice line.
///
/// The posted line is split by allocated quantity and the rounding residue
/// lands on the largest quantity, so a fully allocated line is reproduced
/// exactly.
fn split_line_revenue<'a>(
    group: &[&CogsAllocation],
    revenue_line: &impl Fn(JournalEntryId) -> Option<&'a JournalLine>,
    scale: u32,
    rounding: RoundingPolicy,
) -> Vec<(Decimal, Option<CogsWarning>)> {
    let Some(first) = group.first() else {
        return Vec::new();
    };
    let zero = |allocation: &CogsAllocation| CogsWarning::ZeroRevenue {
        allocation_id: allocation.id,
        invoice_line_id: allocation.invoice_line.id,
    };
    let unearned = || {
        group
            .iter()
            .copied()
            .map(|a| (Decimal::ZERO, Some(zero(a))))
            .collect::<Vec<_>>()
    };

    let Some(entry_id) = first.invoice_line.revenue_entry_id else {
        return unearned();
    };
    let Some(line) = revenue_line(entry_id) else {
        return unearned();
    };
    if line.reversed {
        return group
            .iter()
            .map(|a| {
                let warning = CogsWarning::RevenueReversed {
                    allocation_id: a.id,
                    journal_entry_id: entry_id,
                };
                (Decimal::ZERO, Some(warning))
            })
            .collect();
    }

    let quantities: Vec<Decimal> = group.iter().map(|a| a.quantity).collect();
    let shares = AllocationUtil::allocate_by_ratio(
        line.credit - line.debit,
        &quantities,
        first.invoice_line.quantity_sold,
        scale,
        rounding,
    );
    if shares.is_empty() {
        return unearned();
    }
    group
        .iter()
        .copied()
        .zip(shares)
        .map(|(a, revenue)| (revenue, revenue.is_zero().then(|| zero(a))))
        .collect()
}

/// Aggregates revenue against COGS for allocations sold inside `period`.
///
/// `revenue_line` resolves posted journal lines by id. Allocations of the
/// same invoice line share its revenue by quantity. Zero revenue and
/// reversed revenue are reported as warnings, never dropped. Checks
/// `signal` once per invoice line and once per allocation.
pub fn reconcile_period<'a>(
    allocations: &[&CogsAllocation],
    revenue_line: impl Fn(JournalEntryId) -> Option<&'a JournalLine>,
    dimensions: &DimensionBook,
    period: DateRange,
    scale: u32,
    rounding: RoundingPolicy,
    signal: &AbortSignal,
) -> Result<CogsPeriodReport, CogsError> {
    let mut rows: BTreeMap<DimensionValueId, MarginRow> = BTreeMap::new();
    let mut untagged = MarginRow::default();
    let mut warnings = Vec::new();
    let mut total_revenue = Decimal::ZERO;
    let mut total_cogs = Decimal::ZERO;
    let mut allocation_count = 0;

    let row_for = |rows: &mut BTreeMap<DimensionValueId, MarginRow>, value_id: DimensionValueId| {
        let value = dimensions.value(value_id);
        let dimension_id = value.map(|v| v.dimension_id);
        rows.entry(value_id).or_insert_with(|| MarginRow {
            dimension_id,
            dimension_code: dimension_id.and_then(|d| dimensions.definition(d)).map(|d| d.code.clone()),
            value_id: Some(value_id),
            value_code: value.map(|v| v.code.clone()),
            ..MarginRow::default()
        });
    };

    let in_period: Vec<&CogsAllocation> = allocations
        .iter()
        .copied()
        .filter(|a| period.contains(a.invoice_line.sale_date))
        .collect();

    let mut by_line: BTreeMap<InvoiceLineId, Vec<&CogsAllocation>> = BTreeMap::new();
    for allocation in &in_period {
        by_line.entry(allocation.invoice_line.id).or_default().push(*allocation);
    }
    let mut revenue_of: HashMap<CogsAllocationId, (Decimal, Option<CogsWarning>)> = HashMap::new();
    for group in by_line.values() {
        if signal.is_aborted() {
            return Err(CogsError::Aborted);
        }
        let shares = split_line_revenue(group, &revenue_line, scale, rounding);
        revenue_of.extend(group.iter().map(|a| a.id).zip(shares));
    }

    for allocation in in_period {
        if signal.is_aborted() {
            return Err(CogsError::Aborted);
        }
        allocation_count += 1;

        let (revenue, warning) = revenue_of.remove(&allocation.id).unwrap_or_default();
        warnings.extend(warning);
        if allocation.has_dimension_variance() {
            warnings.push(CogsWarning::DimensionVariance {
                allocation_id: allocation.id,
                variances: allocation.dimension_variances.clone(),
            });
        }
        total_revenue += revenue;
        total_cogs += allocation.total_cogs;

        if allocation.sales_dimensions.is_empty() {
            untagged.revenue += revenue;
        }
        for value_id in &allocation.sales_dimensions {
            row_for(&mut rows, *value_id);
            if let Some(row) = rows.get_mut(value_id) {
                row.revenue += revenue;
            }
        }

        if allocation.production_dimensions.is_empty() {
            untagged.cogs += allocation.total_cogs;
        }
        for value_id in &allocation.production_dimensions {
            row_for(&mut rows, *value_id);
            if let Some(row) = rows.get_mut(value_id) {
                row.cogs += allocation.total_cogs;
            }
        }
    }

    let mut rows: Vec<MarginRow> = rows
        .into_values()
        .map(|mut row| {
            row.finish();
            row
        })
        .collect();
    rows.sort_by_key(|r| {
        (
            r.dimension_code.clone(),
            r.value_id.and_then(|v| dimensions.value(v)).map(|v| v.path.clone()),
        )
    });
    untagged.finish();

    let gross_margin = total_revenue - total_cogs;
    Ok(CogsPeriodReport {
        period,
        rows,
        untagged,
        total_revenue,
        total_cogs,
        gross_margin,
        margin_percentage: margin_percentage(total_revenue, gross_margin),
        allocation_count,
        warnings,
    })
}
