//! Dimensional filtering for analysis reads.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tally_shared::types::{BranchId, DateRange, DimensionId, DimensionValueId};

use super::book::DimensionBook;
use crate::ledger::JournalLine;

/// Filter for dimensional analysis.
///
/// A dimension listed with no values is reported in full; listed values
/// restrict both the qualifying lines and the reported rows (descendants of
/// a listed value are included). An empty filter reports every dimension
/// over every line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisFilter {
    /// Dimensions to report, each with an optional value restriction.
    pub dimension_values: BTreeMap<DimensionId, Vec<DimensionValueId>>,
    /// Only lines dated inside the range.
    pub date_range: Option<DateRange>,
    /// Only lines posted for one of these branches.
    pub branch_ids: Vec<BranchId>,
}

impl AnalysisFilter {
    /// Creates a new empty filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports `dimension_id` without restricting its values.
    #[must_use]
    pub fn with_dimension(mut self, dimension_id: DimensionId) -> Self {
        self.dimension_values.entry(dimension_id).or_default();
        self
    }

    /// Restricts `dimension_id` to `value_id` (and its descendants).
    #[must_use]
    pub fn with_value(mut self, dimension_id: DimensionId, value_id: DimensionValueId) -> Self {
        self.dimension_values.entry(dimension_id).or_default().push(value_id);
        self
    }

    /// Restricts lines to a date range.
    #[must_use]
    pub const fn within(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    /// Restricts lines to a branch.
    #[must_use]
    pub fn for_branch(mut self, branch_id: BranchId) -> Self {
        self.branch_ids.push(branch_id);
        self
    }

    /// Returns true if the filter is empty (matches everything).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dimension_values.is_empty() && self.date_range.is_none() && self.branch_ids.is_empty()
    }

    /// Expands value restrictions to include descendants.
    #[must_use]
    pub fn resolve(&self, book: &DimensionBook) -> ResolvedFilter {
        let allowed = self
            .dimension_values
            .iter()
            .map(|(dimension_id, values)| {
                let expanded: Option<HashSet<DimensionValueId>> = (!values.is_empty())
                    .then(|| values.iter().flat_map(|v| book.subtree(*v)).collect());
                (*dimension_id, expanded)
            })
            .collect();
        ResolvedFilter {
            allowed,
            date_range: self.date_range,
            branch_ids: self.branch_ids.iter().copied().collect(),
        }
    }
}

/// An [`AnalysisFilter`] with hierarchy restrictions expanded.
#[derive(Debug, Clone)]
pub struct ResolvedFilter {
    /// `None` means every value of the dimension.
    pub(crate) allowed: BTreeMap<DimensionId, Option<HashSet<DimensionValueId>>>,
    date_range: Option<DateRange>,
    branch_ids: HashSet<BranchId>,
}

impl ResolvedFilter {
    /// True if the value is reportable on its dimension.
    #[must_use]
    pub fn allows(&self, dimension_id: DimensionId, value_id: DimensionValueId) -> bool {
        match self.allowed.get(&dimension_id) {
            Some(Some(values)) => values.contains(&value_id),
            Some(None) => true,
            None => self.allowed.is_empty(),
        }
    }

    /// True if the line passes the date, branch and value restrictions.
    #[must_use]
    pub fn matches_line(&self, book: &DimensionBook, line: &JournalLine) -> bool {
        if let Some(range) = self.date_range
            && !range.contains(line.date)
        {
            return false;
        }
        if !self.branch_ids.is_empty() && !line.branch_id.is_some_and(|b| self.branch_ids.contains(&b)) {
            return false;
        }
        let assignments = book.assignments_for(line.id);
        self.allowed.iter().all(|(dimension_id, values)| match values {
            None => true,
            Some(values) => assignments
                .iter()
                .any(|a| a.dimension_id == *dimension_id && values.contains(&a.value_id)),
        })
    }
}
