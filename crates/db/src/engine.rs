//! Engine facade tying the repositories to one store.

use std::path::Path;

use chrono::Utc;
use tally_shared::EngineConfig;
use tracing::info;

use crate::repositories::{
    AccountRepository, CogsRepository, DimensionRepository, LedgerRepository, ReconciliationRepository,
};
use crate::snapshot::Snapshot;
use crate::store::{Database, StoreError};

/// Entry point for embedding services.
///
/// Cloning is cheap; clones share the same store.
#[derive(Debug, Clone)]
pub struct Engine {
    db: Database,
}

impl Engine {
    /// Creates an engine with empty tables.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: EngineConfig) -> Result<Self, StoreError> {
        Ok(Self {
            db: Database::new(config)?,
        })
    }

    /// Creates an engine from `.env`, config files and `TALLY__*` variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or is invalid.
    pub fn from_env() -> Result<Self, StoreError> {
        let config = EngineConfig::load().map_err(|e| StoreError::Config(e.to_string()))?;
        Self::new(config)
    }

    /// Restores an engine from a snapshot file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, decoded or restored,
    /// or if the configuration is invalid.
    pub fn load_snapshot(config: EngineConfig, path: &Path) -> Result<Self, StoreError> {
        let tables = Snapshot::load(path)?.restore()?;
        info!(
            accounts = tables.chart.len(),
            transactions = tables.journal.transaction_count(),
            "Engine restored from snapshot"
        );
        Ok(Self {
            db: Database::with_tables(config, tables)?,
        })
    }

    /// Wraps an existing store.
    #[must_use]
    pub const fn from_database(db: Database) -> Self {
        Self { db }
    }

    /// The underlying store.
    #[must_use]
    pub const fn database(&self) -> &Database {
        &self.db
    }

    /// Account registry.
    #[must_use]
    pub fn accounts(&self) -> AccountRepository {
        AccountRepository::new(self.db.clone())
    }

    /// Journal postings.
    #[must_use]
    pub fn ledger(&self) -> LedgerRepository {
        LedgerRepository::new(self.db.clone())
    }

    /// Dimensions and allocations.
    #[must_use]
    pub fn dimensions(&self) -> DimensionRepository {
        DimensionRepository::new(self.db.clone())
    }

    /// Statement reconciliation.
    #[must_use]
    pub fn reconciliation(&self) -> ReconciliationRepository {
        ReconciliationRepository::new(self.db.clone())
    }

    /// Production-to-sales cost bridge.
    #[must_use]
    pub fn cogs(&self) -> CogsRepository {
        CogsRepository::new(self.db.clone())
    }

    /// Copies the current state under the read guard.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub fn snapshot(&self) -> Result<Snapshot, StoreError> {
        Ok(Snapshot::capture(&*self.db.read()?, Utc::now()))
    }

    /// Writes the current state to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable or the file cannot be
    /// written.
    pub fn save_snapshot(&self, path: &Path) -> Result<(), StoreError> {
        self.snapshot()?.save(path)
    }
}
