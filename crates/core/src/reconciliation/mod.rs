//! Reconciliation engine.
//!
//! Proves a ledger balance against an external statement:
//! - Runs with a `Draft -> InProgress -> Completed | Discrepancy` lifecycle
//! - Statement items paired with ledger lines (manual or automatic)
//! - Bank-initiated adjustments booked through the ledger on completion
//! - Per-dimension-value variance for multi-branch accounts

pub mod book;
pub mod dimensional;
pub mod error;
pub mod matching;
pub mod types;

pub use book::{MatchContext, ReconciliationBook, adjustment_posting};
pub use dimensional::{DimensionReconciliation, DimensionVarianceRow, DimensionalInputs, reconcile_by_dimension};
pub use error::ReconciliationError;
pub use matching::{MatchRules, best_candidate, classify};
pub use types::*;
