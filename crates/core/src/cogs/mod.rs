//! Cost-attribution bridge.
//!
//! Links production cost (quantity x unit cost) to the sales that consume
//! it, posts COGS through the ledger tagged with production-side
//! dimensions, and reports margin by dimension value per period.

pub mod book;
pub mod error;
pub mod margin;
pub mod types;

#[cfg(test)]
mod margin_props;

pub use book::{CogsBook, CostRules, cogs_posting};
pub use error::CogsError;
pub use margin::{CogsPeriodReport, CogsWarning, MarginRow, reconcile_period};
pub use types::*;
