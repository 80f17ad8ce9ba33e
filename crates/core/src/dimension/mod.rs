//! Dimension allocator.
//!
//! Cost-center, project and department splits attached to journal lines:
//! - Dimension definitions and hierarchical values
//! - Percentage assignments with derived or explicit amounts
//! - Completeness validation per line
//! - Parallel, abortable breakdown of posted activity by value

pub mod analysis;
pub mod book;
pub mod error;
pub mod filter;
pub mod types;
mod validation;

#[cfg(test)]
mod book_props;

pub use analysis::{AnalysisReport, AnalysisRow, Movement, UnallocatedBucket, analyze};
pub use book::{AssignmentPlan, DimensionBook};
pub use error::DimensionError;
pub use filter::{AnalysisFilter, ResolvedFilter};
pub use types::*;
