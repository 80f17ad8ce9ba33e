//! Dimension repository for dimensions, values and assignments.

use chrono::Utc;
use tally_core::AbortSignal;
use tally_core::dimension::{
    AllocationRules, AnalysisFilter, AnalysisReport, AssignInput, CreateDimensionInput, CreateDimensionValueInput,
    DimensionAssignment, DimensionDefinition, DimensionError, DimensionValue, ValidationResult, analyze,
};
use tally_shared::types::{BatchReport, DimensionId, DimensionValueId, JournalEntryId};
use tracing::{error, info, warn};

use crate::store::{Database, Tables};

/// Repository for the dimension allocator.
#[derive(Debug, Clone)]
pub struct DimensionRepository {
    db: Database,
}

impl DimensionRepository {
    /// Creates a new dimension repository.
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    // ========================================================================
    // Dimension Operations
    // ========================================================================

    /// Creates a dimension.
    ///
    /// # Errors
    ///
    /// Returns an error if the code is empty or already used, or the
    /// maximum depth is zero.
    pub fn create_dimension(&self, input: CreateDimensionInput) -> Result<DimensionDefinition, DimensionError> {
        let mut tables = self.db.write()?;
        let definition = tables.dimensions.create_dimension(input, Utc::now())?;
        info!(dimension_id = %definition.id, code = %definition.code, "Dimension created");
        Ok(definition)
    }

    /// Finds a dimension by code.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub fn find_dimension_by_code(&self, code: &str) -> Result<Option<DimensionDefinition>, DimensionError> {
        Ok(self.db.read()?.dimensions.definition_by_code(code).cloned())
    }

    /// Lists every dimension, sorted by code.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub fn list_dimensions(&self) -> Result<Vec<DimensionDefinition>, DimensionError> {
        Ok(self
            .db
            .read()?
            .dimensions
            .definitions()
            .into_iter()
            .cloned()
            .collect())
    }

    // ========================================================================
    // Value Operations
    // ========================================================================

    /// Creates a value, computing its level and path from the parent.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The dimension or parent does not exist
    /// - The code is already used on this dimension
    /// - The dimension is flat and a parent is given
    /// - The value would sit deeper than the dimension allows
    pub fn create_value(&self, input: CreateDimensionValueInput) -> Result<DimensionValue, DimensionError> {
        let mut tables = self.db.write()?;
        let value = tables.dimensions.create_value(input)?;
        info!(
            value_id = %value.id,
            dimension_id = %value.dimension_id,
            path = %value.path,
            "Dimension value created"
        );
        Ok(value)
    }

    /// Moves a value (and its subtree) under a new parent, or to the root.
    ///
    /// # Errors
    ///
    /// Returns an error if the move would create a cycle or exceed the
    /// dimension's maximum depth.
    pub fn move_value(
        &self,
        value_id: DimensionValueId,
        new_parent: Option<DimensionValueId>,
    ) -> Result<DimensionValue, DimensionError> {
        let mut tables = self.db.write()?;
        let moved = tables
            .dimensions
            .move_value(value_id, new_parent)
            .inspect_err(|e| {
                if e.kind().is_critical() {
                    error!(severity = "critical", value_id = %value_id, error = %e, "Dimension hierarchy is corrupt");
                }
            })?;
        info!(value_id = %value_id, new_parent = ?new_parent, path = %moved.path, "Dimension value moved");
        Ok(moved)
    }

    /// Deactivates a value. Existing assignments are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the value does not exist.
    pub fn deactivate_value(&self, value_id: DimensionValueId) -> Result<DimensionValue, DimensionError> {
        let mut tables = self.db.write()?;
        let value = tables.dimensions.deactivate_value(value_id)?;
        info!(value_id = %value_id, "Dimension value deactivated");
        Ok(value)
    }

    /// Values of a dimension.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub fn values_of(&self, dimension_id: DimensionId) -> Result<Vec<DimensionValue>, DimensionError> {
        Ok(self
            .db
            .read()?
            .dimensions
            .values_of(dimension_id)
            .into_iter()
            .cloned()
            .collect())
    }

    // ========================================================================
    // Assignment Operations
    // ========================================================================

    /// Assigns a posted line to a dimension value.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The line, dimension or value does not exist, or is inactive
    /// - The value belongs to another dimension
    /// - The percentage is outside 0..=100 or the pair would exceed 100%
    /// - A single-value dimension already has an assignment (insert mode)
    pub fn assign(&self, input: AssignInput) -> Result<DimensionAssignment, DimensionError> {
        let mut tables = self.db.write()?;
        let assignment = Self::assign_locked(&mut tables, self.db.rules().allocation, &input)?;
        info!(
            assignment_id = %assignment.id,
            journal_entry_id = %assignment.journal_entry_id,
            value_id = %assignment.value_id,
            percentage = %assignment.allocation_percentage,
            amount = %assignment.allocation_amount,
            "Dimension assigned"
        );
        Ok(assignment)
    }

    /// Applies many assignments under one write guard, recording each
    /// failure instead of stopping at the first.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store is unavailable.
    pub fn bulk_assign(&self, inputs: Vec<AssignInput>) -> Result<BatchReport<DimensionAssignment>, DimensionError> {
        let mut tables = self.db.write()?;
        let rules = self.db.rules().allocation;
        let mut report = BatchReport::new();
        for (index, input) in inputs.iter().enumerate() {
            report.record(index, Self::assign_locked(&mut tables, rules, input));
        }
        if !report.is_complete() {
            warn!(
                succeeded = report.succeeded.len(),
                failed = report.failures.len(),
                "Bulk assignment finished with failures"
            );
        }
        info!(succeeded = report.succeeded.len(), "Bulk assignment finished");
        Ok(report)
    }

    fn assign_locked(
        tables: &mut Tables,
        rules: AllocationRules,
        input: &AssignInput,
    ) -> Result<DimensionAssignment, DimensionError> {
        let line = tables
            .journal
            .line(input.journal_entry_id)
            .ok_or(DimensionError::EntryNotFound(input.journal_entry_id))?;
        let plan = tables.dimensions.prepare_assign(line, input, rules, Utc::now())?;
        tables
            .dimensions
            .apply(plan)
            .ok_or_else(|| DimensionError::Storage("planned assignment was not applied".to_string()))
    }

    /// Assignments of a line.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub fn assignments_for(&self, entry_id: JournalEntryId) -> Result<Vec<DimensionAssignment>, DimensionError> {
        Ok(self
            .db
            .read()?
            .dimensions
            .assignments_for(entry_id)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Checks a line's assignments against the dimensions that apply to its
    /// account.
    ///
    /// # Errors
    ///
    /// Returns an error if the line does not exist.
    pub fn validate(&self, entry_id: JournalEntryId) -> Result<ValidationResult, DimensionError> {
        let tables = self.db.read()?;
        let line = tables
            .journal
            .line(entry_id)
            .ok_or(DimensionError::EntryNotFound(entry_id))?;
        let account_type = tables
            .chart
            .get(line.account_id)
            .map(|a| a.account_type)
            .ok_or(DimensionError::EntryNotFound(entry_id))?;
        let result = tables.dimensions.validate_line(line, account_type);
        if !result.is_valid() {
            warn!(journal_entry_id = %entry_id, errors = result.errors.len(), "Line fails dimension validation");
        }
        Ok(result)
    }

    /// Breaks posted lines down by dimension value.
    ///
    /// Pure read; returns [`DimensionError::Aborted`] if `signal` is raised.
    ///
    /// # Errors
    ///
    /// Returns an error if the read is aborted.
    pub fn analyze(&self, filter: &AnalysisFilter, signal: &AbortSignal) -> Result<AnalysisReport, DimensionError> {
        let tables = self.db.read()?;
        let lines = tables.journal.lines();
        let report = analyze(&tables.dimensions, &lines, filter, signal)?;

        for bucket in report.unallocated.iter().filter(|b| b.entry_count > 0) {
            warn!(
                dimension = %bucket.dimension_code,
                entries = bucket.entry_count,
                net = %bucket.net,
                "Lines without full dimension coverage"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use tally_core::accounts::{AccountType, CreateAccountInput};
    use tally_core::ledger::{LegInput, Origin, TransactionHeader};
    use tally_shared::{EngineConfig, ErrorKind};

    use crate::repositories::{AccountRepository, LedgerRepository};

    struct Fixture {
        dims: DimensionRepository,
        expense_line: JournalEntryId,
        dimension: DimensionId,
        a: DimensionValueId,
        b: DimensionValueId,
    }

    fn fixture(multi: bool) -> Fixture {
        let db = Database::new(EngineConfig::default()).unwrap();
        let accounts = AccountRepository::new(db.clone());
        let ledger = LedgerRepository::new(db.clone());
        let dims = DimensionRepository::new(db);

        let expense = accounts
            .create_account(CreateAccountInput::new("6000", "Rent", AccountType::Expense))
            .unwrap();
        let cash = accounts
            .create_account(CreateAccountInput::new("1100", "Cash", AccountType::Asset))
            .unwrap();
        let tx = ledger
            .post(
                TransactionHeader::new(NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(), "Rent", Origin::Purchases),
                vec![LegInput::debit(expense.id, dec!(900)), LegInput::credit(cash.id, dec!(900))],
            )
            .unwrap();
        let expense_line = ledger.legs_for(tx.id).unwrap()[0].id;

        let mut input = CreateDimensionInput::new("CC", "Cost center");
        if multi {
            input = input.multi_value();
        }
        let dimension = dims.create_dimension(input).unwrap().id;
        let a = dims
            .create_value(CreateDimensionValueInput::new(dimension, "A", "Center A"))
            .unwrap()
            .id;
        let b = dims
            .create_value(CreateDimensionValueInput::new(dimension, "B", "Center B"))
            .unwrap()
            .id;
        Fixture {
            dims,
            expense_line,
            dimension,
            a,
            b,
        }
    }

    #[test]
    fn test_assign_unknown_line_is_not_found() {
        let f = fixture(true);
        let err = f
            .dims
            .assign(AssignInput::new(JournalEntryId::new(), f.dimension, f.a, dec!(100)))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_bulk_assign_keeps_going_after_failure() {
        let f = fixture(true);
        let report = f
            .dims
            .bulk_assign(vec![
                AssignInput::new(f.expense_line, f.dimension, f.a, dec!(60)),
                AssignInput::new(f.expense_line, f.dimension, f.b, dec!(60)),
                AssignInput::new(f.expense_line, f.dimension, f.b, dec!(40)),
            ])
            .unwrap();

        assert_eq!(report.succeeded.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 1);
        assert_eq!(report.failures[0].error.error_code(), "PERCENTAGE_OVERFLOW");

        let amounts: Vec<_> = f
            .dims
            .assignments_for(f.expense_line)
            .unwrap()
            .into_iter()
            .map(|a| a.allocation_amount)
            .collect();
        assert_eq!(amounts.iter().copied().sum::<rust_decimal::Decimal>(), dec!(900));
    }

    #[test]
    fn test_single_value_dimension_rejects_second_assignment() {
        let f = fixture(false);
        f.dims
            .assign(AssignInput::new(f.expense_line, f.dimension, f.a, dec!(100)))
            .unwrap();
        let err = f
            .dims
            .assign(AssignInput::new(f.expense_line, f.dimension, f.b, dec!(100)))
            .unwrap_err();
        assert!(matches!(err, DimensionError::DuplicateAssignment { .. }));

        let replaced = f
            .dims
            .assign(AssignInput::new(f.expense_line, f.dimension, f.b, dec!(100)).replacing())
            .unwrap();
        assert_eq!(replaced.value_id, f.b);
        assert_eq!(f.dims.assignments_for(f.expense_line).unwrap().len(), 1);
    }

    #[test]
    fn test_validate_reports_nothing_without_scoped_dimensions() {
        let f = fixture(true);
        let result = f.dims.validate(f.expense_line).unwrap();
        assert!(result.is_valid());
    }

    #[test]
    fn test_move_value_rejects_cycle() {
        let db = Database::new(EngineConfig::default()).unwrap();
        let dims = DimensionRepository::new(db);
        let dimension = dims
            .create_dimension(CreateDimensionInput::new("DEPT", "Department").hierarchical(5))
            .unwrap()
            .id;
        let root = dims
            .create_value(CreateDimensionValueInput::new(dimension, "OPS", "Operations"))
            .unwrap();
        let child = dims
            .create_value(CreateDimensionValueInput::new(dimension, "WH", "Warehouse").under(root.id))
            .unwrap();

        let err = dims.move_value(root.id, Some(child.id)).unwrap_err();
        assert!(matches!(err, DimensionError::CircularReference { .. }));

        let moved = dims.move_value(child.id, None).unwrap();
        assert_eq!(moved.hierarchy_level, 1);
        assert_eq!(moved.path, "WH");
    }
}
