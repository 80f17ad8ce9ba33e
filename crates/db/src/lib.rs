//! Storage layer and engine facade for Tally.
//!
//! This crate provides:
//! - An in-process transactional store (one `RwLock` over every table)
//! - Repositories for accounts, ledger, dimensions, reconciliation and COGS
//! - Version-keyed caching of as-of balances
//! - JSON snapshots for persistence across restarts

pub mod cache;
pub mod engine;
pub mod repositories;
pub mod snapshot;
pub mod store;

pub use cache::BalanceCache;
pub use engine::Engine;
pub use repositories::{
    AccountRepository, CogsRepository, DimensionRepository, IntegrityReport, LedgerRepository, ReconciliationRepository,
};
pub use snapshot::Snapshot;
pub use store::{Database, PostingError, StoreError};
