//! Repositories over the shared store.
//!
//! Each repository is a cheap handle on the same [`crate::Database`]; any
//! number can be cloned across threads.

pub mod account;
pub mod cogs;
pub mod dimension;
pub mod ledger;
pub mod reconciliation;

pub use account::{AccountRepository, IntegrityReport};
pub use cogs::CogsRepository;
pub use dimension::DimensionRepository;
pub use ledger::LedgerRepository;
pub use reconciliation::ReconciliationRepository;
