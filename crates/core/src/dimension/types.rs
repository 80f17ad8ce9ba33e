//! Dimension domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{AssignmentId, DimensionId, DimensionValueId, JournalEntryId, RoundingPolicy};

use crate::accounts::AccountType;

/// A named analysis axis (cost center, project, department, branch).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionDefinition {
    /// Dimension ID.
    pub id: DimensionId,
    /// Unique code (e.g. "COST_CENTER").
    pub code: String,
    /// Display name.
    pub name: String,
    /// Every in-scope line must carry a complete allocation.
    pub is_required: bool,
    /// A line may be split across several values.
    pub allows_multiple_values: bool,
    /// Values may have parents.
    pub supports_hierarchy: bool,
    /// Deepest level a value may sit at (roots are level 1).
    pub max_hierarchy_depth: u32,
    /// Account types the dimension applies to; empty means all.
    pub applies_to: Vec<AccountType>,
    /// Inactive dimensions accept no new assignments.
    pub is_active: bool,
    /// When the dimension was created.
    pub created_at: DateTime<Utc>,
}

impl DimensionDefinition {
    /// True if lines on accounts of `account_type` are in scope.
    #[must_use]
    pub fn applies_to_type(&self, account_type: AccountType) -> bool {
        self.applies_to.is_empty() || self.applies_to.contains(&account_type)
    }
}

/// Input for creating a dimension.
#[derive(Debug, Clone)]
pub struct CreateDimensionInput {
    /// Unique code.
    pub code: String,
    /// Display name.
    pub name: String,
    /// See [`DimensionDefinition::is_required`].
    pub is_required: bool,
    /// See [`DimensionDefinition::allows_multiple_values`].
    pub allows_multiple_values: bool,
    /// See [`DimensionDefinition::supports_hierarchy`].
    pub supports_hierarchy: bool,
    /// See [`DimensionDefinition::max_hierarchy_depth`].
    pub max_hierarchy_depth: u32,
    /// See [`DimensionDefinition::applies_to`].
    pub applies_to: Vec<AccountType>,
}

impl CreateDimensionInput {
    /// Optional, single-valued, flat dimension applying to every account.
    #[must_use]
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            is_required: false,
            allows_multiple_values: false,
            supports_hierarchy: false,
            max_hierarchy_depth: 1,
            applies_to: Vec::new(),
        }
    }

    /// Marks the dimension as required.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    /// Allows a line to be split across values.
    #[must_use]
    pub const fn multi_value(mut self) -> Self {
        self.allows_multiple_values = true;
        self
    }

    /// Enables hierarchy up to `max_depth` levels.
    #[must_use]
    pub const fn hierarchical(mut self, max_depth: u32) -> Self {
        self.supports_hierarchy = true;
        self.max_hierarchy_depth = max_depth;
        self
    }

    /// Restricts the dimension to the given account types.
    #[must_use]
    pub fn applies_to(mut self, types: impl IntoIterator<Item = AccountType>) -> Self {
        self.applies_to = types.into_iter().collect();
        self
    }
}

/// One value on a dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionValue {
    /// Value ID.
    pub id: DimensionValueId,
    /// Owning dimension.
    pub dimension_id: DimensionId,
    /// Code, unique within the dimension.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Parent value.
    pub parent_id: Option<DimensionValueId>,
    /// 1 for roots.
    pub hierarchy_level: u32,
    /// Codes from the root down, joined with '/'.
    pub path: String,
    /// Inactive values accept no new assignments.
    pub is_active: bool,
}

/// Input for creating a dimension value.
#[derive(Debug, Clone)]
pub struct CreateDimensionValueInput {
    /// Owning dimension.
    pub dimension_id: DimensionId,
    /// Code, unique within the dimension.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Parent value.
    pub parent_id: Option<DimensionValueId>,
}

impl CreateDimensionValueInput {
    /// A root value.
    #[must_use]
    pub fn new(dimension_id: DimensionId, code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            dimension_id,
            code: code.into(),
            name: name.into(),
            parent_id: None,
        }
    }

    /// Places the value under `parent_id`.
    #[must_use]
    pub const fn under(mut self, parent_id: DimensionValueId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

/// Where an assignment's amount came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountSource {
    /// Computed from the line amount and the percentage.
    Derived,
    /// Supplied by the caller.
    Explicit,
}

/// Links one journal line to one dimension value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionAssignment {
    /// Assignment ID.
    pub id: AssignmentId,
    /// Journal line.
    pub journal_entry_id: JournalEntryId,
    /// Dimension axis.
    pub dimension_id: DimensionId,
    /// Value on that axis.
    pub value_id: DimensionValueId,
    /// Share of the line, 0 to 100.
    pub allocation_percentage: Decimal,
    /// Amount attributed to the value.
    pub allocation_amount: Decimal,
    /// Whether the amount was derived or supplied.
    pub amount_source: AmountSource,
    /// When the assignment was created.
    pub created_at: DateTime<Utc>,
}

/// How an assignment interacts with existing ones on the same pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignMode {
    /// Fail if the assignment would duplicate an existing one.
    #[default]
    Insert,
    /// Replace the existing assignment (single-value dimensions replace the
    /// whole pair; multi-value dimensions replace the same value).
    Replace,
}

/// Input for a single assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignInput {
    /// Journal line.
    pub journal_entry_id: JournalEntryId,
    /// Dimension axis.
    pub dimension_id: DimensionId,
    /// Value on that axis.
    pub value_id: DimensionValueId,
    /// Share of the line, 0 to 100.
    pub percentage: Decimal,
    /// Explicit amount; derived from the percentage when `None`.
    pub amount: Option<Decimal>,
    /// Insert or replace.
    #[serde(default)]
    pub mode: AssignMode,
}

impl AssignInput {
    /// An insert with a derived amount.
    #[must_use]
    pub const fn new(
        journal_entry_id: JournalEntryId,
        dimension_id: DimensionId,
        value_id: DimensionValueId,
        percentage: Decimal,
    ) -> Self {
        Self {
            journal_entry_id,
            dimension_id,
            value_id,
            percentage,
            amount: None,
            mode: AssignMode::Insert,
        }
    }

    /// Supplies an explicit amount.
    #[must_use]
    pub const fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Switches to replace mode.
    #[must_use]
    pub const fn replacing(mut self) -> Self {
        self.mode = AssignMode::Replace;
        self
    }
}

/// Rounding applied to derived allocation amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationRules {
    /// Fractional digits of derived amounts.
    pub scale: u32,
    /// Rounding policy.
    pub rounding: RoundingPolicy,
}

impl Default for AllocationRules {
    fn default() -> Self {
        Self {
            scale: 4,
            rounding: RoundingPolicy::Bankers,
        }
    }
}

/// A problem found when validating a line's dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum DimensionIssue {
    /// A required dimension has no assignment.
    MissingRequired {
        /// Dimension.
        dimension_id: DimensionId,
        /// Dimension code.
        dimension_code: String,
    },
    /// Percentages on the pair do not sum to 100.
    IncompleteAllocation {
        /// Dimension.
        dimension_id: DimensionId,
        /// Dimension code.
        dimension_code: String,
        /// Sum of percentages found.
        total_percentage: Decimal,
    },
    /// An in-scope optional dimension has no assignment.
    Unallocated {
        /// Dimension.
        dimension_id: DimensionId,
        /// Dimension code.
        dimension_code: String,
    },
}

/// Outcome of validating a line's dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Line validated.
    pub journal_entry_id: JournalEntryId,
    /// Hard failures.
    pub errors: Vec<DimensionIssue>,
    /// Soft issues.
    pub warnings: Vec<DimensionIssue>,
}

impl ValidationResult {
    /// True when there are no hard failures.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}
