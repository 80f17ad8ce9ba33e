//! Dimension allocator errors.

use rust_decimal::Decimal;
use tally_shared::types::{DimensionId, DimensionValueId, JournalEntryId};
use tally_shared::{AppError, ErrorKind};
use thiserror::Error;

/// Errors raised by the dimension allocator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DimensionError {
    /// Dimension or value code is empty.
    #[error("Code cannot be empty")]
    EmptyCode,

    /// Dimension code already exists.
    #[error("Dimension code already exists: {0}")]
    DuplicateDimensionCode(String),

    /// Value code already exists in the dimension.
    #[error("Dimension value code already exists: {0}")]
    DuplicateValueCode(String),

    /// Dimension not found.
    #[error("Dimension not found: {0}")]
    DimensionNotFound(DimensionId),

    /// Dimension value not found.
    #[error("Dimension value not found: {0}")]
    ValueNotFound(DimensionValueId),

    /// Journal line not found.
    #[error("Journal entry not found: {0}")]
    EntryNotFound(JournalEntryId),

    /// Dimension is inactive.
    #[error("Dimension {0} is inactive")]
    DimensionInactive(DimensionId),

    /// Dimension value is inactive.
    #[error("Dimension value {0} is inactive")]
    ValueInactive(DimensionValueId),

    /// Value belongs to another dimension.
    #[error("Dimension value {value_id} does not belong to dimension {dimension_id}")]
    ValueDimensionMismatch {
        /// Value supplied.
        value_id: DimensionValueId,
        /// Dimension expected.
        dimension_id: DimensionId,
    },

    /// Percentage outside 0..=100.
    #[error("Allocation percentage must be between 0 and 100, got {0}")]
    InvalidPercentage(Decimal),

    /// Explicit amount negative or larger than the line.
    #[error("Allocation amount {amount} must be between 0 and the line amount {line_amount}")]
    InvalidAmount {
        /// Amount supplied.
        amount: Decimal,
        /// Line amount.
        line_amount: Decimal,
    },

    /// Percentages on one (entry, dimension) pair would exceed 100.
    #[error("Allocation on dimension {dimension_id} would total {total}%")]
    PercentageOverflow {
        /// Dimension.
        dimension_id: DimensionId,
        /// Resulting total.
        total: Decimal,
    },

    /// The pair already has an assignment and replace mode was not requested.
    #[error("Entry {journal_entry_id} already has an assignment on dimension {dimension_id}")]
    DuplicateAssignment {
        /// Line.
        journal_entry_id: JournalEntryId,
        /// Dimension.
        dimension_id: DimensionId,
    },

    /// Dimension definition is malformed.
    #[error("Invalid dimension definition: {0}")]
    InvalidDefinition(String),

    /// Dimension does not support parents.
    #[error("Dimension {0} does not support hierarchy")]
    HierarchyNotSupported(DimensionId),

    /// Parent change would create a cycle.
    #[error("Moving {value_id} under {parent_id} would create a cycle")]
    CircularReference {
        /// Value being moved.
        value_id: DimensionValueId,
        /// Proposed parent.
        parent_id: DimensionValueId,
    },

    /// Stored parent links already contain a cycle.
    #[error("Cycle detected in dimension hierarchy at {0}")]
    CycleDetected(DimensionValueId),

    /// Hierarchy would exceed the dimension's maximum depth.
    #[error("Hierarchy depth {depth} exceeds maximum {max}")]
    MaxDepthExceeded {
        /// Maximum allowed.
        max: u32,
        /// Depth that would result.
        depth: u32,
    },

    /// Aggregation was aborted.
    #[error("Aggregation aborted")]
    Aborted,

    /// Persistence layer failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl DimensionError {
    /// Returns the error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyCode => "EMPTY_CODE",
            Self::DuplicateDimensionCode(_) => "DUPLICATE_DIMENSION_CODE",
            Self::DuplicateValueCode(_) => "DUPLICATE_VALUE_CODE",
            Self::DimensionNotFound(_) => "DIMENSION_NOT_FOUND",
            Self::ValueNotFound(_) => "DIMENSION_VALUE_NOT_FOUND",
            Self::EntryNotFound(_) => "ENTRY_NOT_FOUND",
            Self::DimensionInactive(_) => "DIMENSION_INACTIVE",
            Self::ValueInactive(_) => "DIMENSION_VALUE_INACTIVE",
            Self::ValueDimensionMismatch { .. } => "VALUE_DIMENSION_MISMATCH",
            Self::InvalidPercentage(_) => "INVALID_PERCENTAGE",
            Self::InvalidAmount { .. } => "INVALID_ALLOCATION_AMOUNT",
            Self::PercentageOverflow { .. } => "PERCENTAGE_OVERFLOW",
            Self::DuplicateAssignment { .. } => "DUPLICATE_ASSIGNMENT",
            Self::InvalidDefinition(_) => "INVALID_DIMENSION_DEFINITION",
            Self::HierarchyNotSupported(_) => "HIERARCHY_NOT_SUPPORTED",
            Self::CircularReference { .. } => "CIRCULAR_REFERENCE",
            Self::CycleDetected(_) => "DIMENSION_CYCLE_DETECTED",
            Self::MaxDepthExceeded { .. } => "MAX_DEPTH_EXCEEDED",
            Self::Aborted => "ABORTED",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Classifies the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateDimensionCode(_) | Self::DuplicateValueCode(_) | Self::DuplicateAssignment { .. } => {
                ErrorKind::Conflict
            }
            Self::DimensionNotFound(_) | Self::ValueNotFound(_) | Self::EntryNotFound(_) => ErrorKind::NotFound,
            Self::CycleDetected(_) => ErrorKind::Consistency,
            Self::Storage(_) => ErrorKind::Storage,
            Self::EmptyCode
            | Self::DimensionInactive(_)
            | Self::ValueInactive(_)
            | Self::ValueDimensionMismatch { .. }
            | Self::InvalidPercentage(_)
            | Self::InvalidAmount { .. }
            | Self::PercentageOverflow { .. }
            | Self::InvalidDefinition(_)
            | Self::HierarchyNotSupported(_)
            | Self::CircularReference { .. }
            | Self::MaxDepthExceeded { .. }
            | Self::Aborted => ErrorKind::Validation,
        }
    }
}

impl From<DimensionError> for AppError {
    fn from(err: DimensionError) -> Self {
        Self::new(err.kind(), err.error_code(), err.to_string())
    }
}
