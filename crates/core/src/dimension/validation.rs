//! Allocation completeness checks for a single journal line.

use rust_decimal::Decimal;
use tracing::debug;

use super::book::DimensionBook;
use super::types::{DimensionIssue, ValidationResult};
use crate::accounts::AccountType;
use crate::ledger::JournalLine;

impl DimensionBook {
    /// Checks every active dimension against the line's assignments.
    ///
    /// A required in-scope dimension with no assignment is an error. An
    /// incomplete percentage sum is an error on required dimensions and a
    /// warning otherwise. Optional dimensions scoped to specific account
    /// types warn when an in-scope line carries nothing.
    #[must_use]
    pub fn validate_line(&self, line: &JournalLine, account_type: AccountType) -> ValidationResult {
        let mut result = ValidationResult {
            journal_entry_id: line.id,
            errors: Vec::new(),
            warnings: Vec::new(),
        };

        for definition in self.definitions().into_iter().filter(|d| d.is_active) {
            let in_scope = definition.applies_to_type(account_type);
            let pair = self.assignments_for_pair(line.id, definition.id);

            if pair.is_empty() {
                if !in_scope {
                    continue;
                }
                if definition.is_required {
                    result.errors.push(DimensionIssue::MissingRequired {
                        dimension_id: definition.id,
                        dimension_code: definition.code.clone(),
                    });
                } else if !definition.applies_to.is_empty() {
                    result.warnings.push(DimensionIssue::Unallocated {
                        dimension_id: definition.id,
                        dimension_code: definition.code.clone(),
                    });
                }
                continue;
            }

            let total_percentage: Decimal = pair.iter().map(|a| a.allocation_percentage).sum();
            if total_percentage != Decimal::ONE_HUNDRED {
                let issue = DimensionIssue::IncompleteAllocation {
                    dimension_id: definition.id,
                    dimension_code: definition.code.clone(),
                    total_percentage,
                };
                if definition.is_required {
                    result.errors.push(issue);
                } else {
                    result.warnings.push(issue);
                }
            }
        }

        debug!(
            journal_entry_id = %line.id,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "Validated line dimensions"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::{AllocationRules, AssignInput, CreateDimensionInput, CreateDimensionValueInput};
    use crate::ledger::Origin;
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;
    use tally_shared::types::{AccountId, JournalEntryId, TransactionId};

    fn expense_line() -> JournalLine {
        JournalLine {
            id: JournalEntryId::new(),
            transaction_id: TransactionId::new(),
            account_id: AccountId::new(),
            date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
            debit: dec!(900),
            credit: Decimal::ZERO,
            description: None,
            origin: Origin::Purchases,
            branch_id: None,
            reversal_of: None,
            reversed: false,
            sequence: 0,
        }
    }

    #[test]
    fn test_missing_required_is_error() {
        let mut book = DimensionBook::new();
        book.create_dimension(CreateDimensionInput::new("CC", "Cost center").required(), Utc::now())
            .unwrap();
        let result = book.validate_line(&expense_line(), AccountType::Expense);
        assert!(!result.is_valid());
        assert!(matches!(result.errors[0], DimensionIssue::MissingRequired { .. }));
    }

    #[test]
    fn test_out_of_scope_dimension_ignored() {
        let mut book = DimensionBook::new();
        book.create_dimension(
            CreateDimensionInput::new("CC", "Cost center")
                .required()
                .applies_to(vec![AccountType::Expense]),
            Utc::now(),
        )
        .unwrap();
        let result = book.validate_line(&expense_line(), AccountType::Asset);
        assert!(result.is_valid());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_scoped_optional_dimension_warns_when_unallocated() {
        let mut book = DimensionBook::new();
        book.create_dimension(
            CreateDimensionInput::new("PRJ", "Project").applies_to(vec![AccountType::Expense]),
            Utc::now(),
        )
        .unwrap();
        let result = book.validate_line(&expense_line(), AccountType::Expense);
        assert!(result.is_valid());
        assert!(matches!(result.warnings[0], DimensionIssue::Unallocated { .. }));
    }

    #[test]
    fn test_incomplete_allocation_severity_follows_required_flag() {
        let mut book = DimensionBook::new();
        let required = book
            .create_dimension(CreateDimensionInput::new("CC", "Cost center").required().multi_value(), Utc::now())
            .unwrap();
        let optional = book
            .create_dimension(CreateDimensionInput::new("PRJ", "Project").multi_value(), Utc::now())
            .unwrap();
        let cc = book
            .create_value(CreateDimensionValueInput::new(required.id, "A", "A"))
            .unwrap();
        let prj = book
            .create_value(CreateDimensionValueInput::new(optional.id, "P1", "P1"))
            .unwrap();

        let line = expense_line();
        for (dim, value) in [(required.id, cc.id), (optional.id, prj.id)] {
            let plan = book
                .prepare_assign(
                    &line,
                    &AssignInput::new(line.id, dim, value, dec!(60)),
                    AllocationRules::default(),
                    Utc::now(),
                )
                .unwrap();
            book.apply(plan);
        }

        let result = book.validate_line(&line, AccountType::Expense);
        assert_eq!(
            result.errors,
            vec![DimensionIssue::IncompleteAllocation {
                dimension_id: required.id,
                dimension_code: "CC".to_string(),
                total_percentage: dec!(60),
            }]
        );
        assert_eq!(result.warnings.len(), 1);
    }
}
