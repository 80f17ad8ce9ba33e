//! Dimensional breakdown of posted lines.
//!
//! A line contributes to the dimensioned rows of a dimension only when its
//! assignments on that dimension cover exactly 100%. Anything less lands in
//! the dimension's unallocated bucket so the totals stay auditable.

use std::collections::HashMap;

use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{DimensionId, DimensionValueId};

use super::book::DimensionBook;
use super::error::DimensionError;
use super::filter::{AnalysisFilter, ResolvedFilter};
use crate::cancel::AbortSignal;
use crate::ledger::{Direction, JournalLine};

/// Debit and credit totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    /// Sum of debits.
    pub debit: Decimal,
    /// Sum of credits.
    pub credit: Decimal,
}

impl Movement {
    /// Debit minus credit.
    #[must_use]
    pub fn net(&self) -> Decimal {
        self.debit - self.credit
    }

    fn add(&mut self, direction: Direction, amount: Decimal) {
        match direction {
            Direction::Debit => self.debit += amount,
            Direction::Credit => self.credit += amount,
        }
    }

    fn merge(&mut self, other: Self) {
        self.debit += other.debit;
        self.credit += other.credit;
    }
}

/// Totals attributed to one dimension value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRow {
    /// Dimension.
    pub dimension_id: DimensionId,
    /// Dimension code.
    pub dimension_code: String,
    /// Value.
    pub value_id: DimensionValueId,
    /// Value code.
    pub value_code: String,
    /// Hierarchical path of the value.
    pub path: String,
    /// Debit and credit totals.
    pub movement: Movement,
    /// Debit minus credit.
    pub net: Decimal,
}

/// Lines excluded from one dimension's rows for lack of full coverage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnallocatedBucket {
    /// Dimension.
    pub dimension_id: DimensionId,
    /// Dimension code.
    pub dimension_code: String,
    /// Lines with zero or partial coverage.
    pub entry_count: usize,
    /// Full line amounts of those lines.
    pub movement: Movement,
    /// Debit minus credit.
    pub net: Decimal,
}

/// Result of [`analyze`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Rows sorted by dimension code then value path.
    pub rows: Vec<AnalysisRow>,
    /// One bucket per dimension that had uncovered lines.
    pub unallocated: Vec<UnallocatedBucket>,
    /// Lines that passed the filter.
    pub entries_considered: usize,
}

impl AnalysisReport {
    /// Row for a value, if it received anything.
    #[must_use]
    pub fn row(&self, value_id: DimensionValueId) -> Option<&AnalysisRow> {
        self.rows.iter().find(|r| r.value_id == value_id)
    }

    /// Totals of a value plus all of its descendants.
    #[must_use]
    pub fn subtree_movement(&self, book: &DimensionBook, value_id: DimensionValueId) -> Movement {
        let members = book.subtree(value_id);
        let mut total = Movement::default();
        for row in self.rows.iter().filter(|r| members.contains(&r.value_id)) {
            total.merge(row.movement);
        }
        total
    }
}

#[derive(Default)]
struct Accumulator {
    rows: HashMap<(DimensionId, DimensionValueId), Movement>,
    unallocated: HashMap<DimensionId, (usize, Movement)>,
    considered: usize,
}

impl Accumulator {
    fn merge(mut self, other: Self) -> Self {
        for (key, movement) in other.rows {
            self.rows.entry(key).or_default().merge(movement);
        }
        for (key, (count, movement)) in other.unallocated {
            let slot = self.unallocated.entry(key).or_default();
            slot.0 += count;
            slot.1.merge(movement);
        }
        self.considered += other.considered;
        self
    }

    fn add_line(&mut self, book: &DimensionBook, filter: &ResolvedFilter, dimensions: &[DimensionId], line: &JournalLine) {
        if !filter.matches_line(book, line) {
            return;
        }
        self.considered += 1;
        let direction = line.direction();

        for dimension_id in dimensions {
            let pair = book.assignments_for_pair(line.id, *dimension_id);
            let covered: Decimal = pair.iter().map(|a| a.allocation_percentage).sum();
            if covered == Decimal::ONE_HUNDRED {
                for assignment in pair {
                    if filter.allows(*dimension_id, assignment.value_id) {
                        self.rows
                            .entry((*dimension_id, assignment.value_id))
                            .or_default()
                            .add(direction, assignment.allocation_amount);
                    }
                }
            } else {
                let slot = self.unallocated.entry(*dimension_id).or_default();
                slot.0 += 1;
                slot.1.add(direction, line.amount());
            }
        }
    }
}

/// Breaks posted lines down by dimension value.
///
/// Pure read; aggregation runs in parallel and checks `signal` once per
/// line, returning [`DimensionError::Aborted`] as soon as it is raised.
pub fn analyze(
    book: &DimensionBook,
    lines: &[&JournalLine],
    filter: &AnalysisFilter,
    signal: &AbortSignal,
) -> Result<AnalysisReport, DimensionError> {
    let resolved = filter.resolve(book);
    let dimensions: Vec<DimensionId> = if filter.dimension_values.is_empty() {
        book.definitions().into_iter().map(|d| d.id).collect()
    } else {
        filter.dimension_values.keys().copied().collect()
    };

    let acc = lines
        .par_iter()
        .try_fold(Accumulator::default, |mut acc, line| {
            if signal.is_aborted() {
                return Err(DimensionError::Aborted);
            }
            acc.add_line(book, &resolved, &dimensions, line);
            Ok(acc)
        })
        .try_reduce(Accumulator::default, |a, b| Ok(a.merge(b)))?;

    if signal.is_aborted() {
        return Err(DimensionError::Aborted);
    }

    let code_of = |id: DimensionId| book.definition(id).map(|d| d.code.clone()).unwrap_or_default();

    let mut rows: Vec<AnalysisRow> = acc
        .rows
        .into_iter()
        .map(|((dimension_id, value_id), movement)| {
            let value = book.value(value_id);
            AnalysisRow {
                dimension_id,
                dimension_code: code_of(dimension_id),
                value_id,
                value_code: value.map(|v| v.code.clone()).unwrap_or_default(),
                path: value.map(|v| v.path.clone()).unwrap_or_default(),
                net: movement.net(),
                movement,
            }
        })
        .collect();
    rows.sort_by(|a, b| a.dimension_code.cmp(&b.dimension_code).then_with(|| a.path.cmp(&b.path)));

    let mut unallocated: Vec<UnallocatedBucket> = acc
        .unallocated
        .into_iter()
        .map(|(dimension_id, (entry_count, movement))| UnallocatedBucket {
            dimension_id,
            dimension_code: code_of(dimension_id),
            entry_count,
            net: movement.net(),
            movement,
        })
        .collect();
    unallocated.sort_by(|a, b| a.dimension_code.cmp(&b.dimension_code));

    Ok(AnalysisReport {
        rows,
        unallocated,
        entries_considered: acc.considered,
    })
}
