//! In-process transactional store.
//!
//! All tables live behind one `RwLock`. Every mutating repository call takes
//! the write guard once, validates everything it is about to change, and
//! only then applies the change, so a failed call leaves no trace. Reads
//! share the read guard and never block each other.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tally_core::accounts::{AccountError, ChartOfAccounts, HierarchyRules};
use tally_core::cogs::{CogsBook, CogsError, CostRules};
use tally_core::dimension::{AllocationRules, AssignmentPlan, DimensionAssignment, DimensionBook, DimensionError};
use tally_core::ledger::{Journal, LedgerError, LegInput, PostingRules, PreparedPosting, Transaction, TransactionHeader};
use tally_core::reconciliation::{MatchRules, ReconciliationBook, ReconciliationError};
use tally_shared::config::EngineConfig;
use tally_shared::types::Currency;
use tally_shared::{AppError, ErrorKind};
use thiserror::Error;
use tracing::info;

use crate::cache::BalanceCache;

/// Errors raised by the store itself.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A writer panicked while holding the lock.
    #[error("Store lock poisoned")]
    Poisoned,

    /// Configuration could not be turned into engine rules.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Snapshot file could not be read or written.
    #[error("Snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot contents could not be encoded or decoded.
    #[error("Snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Snapshot rows violate an invariant.
    #[error("Snapshot restore failed: {0}")]
    Restore(String),
}

impl StoreError {
    /// Returns the error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Poisoned => "STORE_POISONED",
            Self::Config(_) => "INVALID_CONFIG",
            Self::Io(_) => "SNAPSHOT_IO",
            Self::Serialization(_) => "SNAPSHOT_FORMAT",
            Self::Restore(_) => "SNAPSHOT_RESTORE",
        }
    }

    /// Classifies the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Validation,
            Self::Restore(_) => ErrorKind::Consistency,
            Self::Poisoned | Self::Io(_) | Self::Serialization(_) => ErrorKind::Storage,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self::new(err.kind(), err.error_code(), err.to_string())
    }
}

impl From<StoreError> for AccountError {
    fn from(err: StoreError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<StoreError> for DimensionError {
    fn from(err: StoreError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<StoreError> for ReconciliationError {
    fn from(err: StoreError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<StoreError> for CogsError {
    fn from(err: StoreError) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Failure of a posting that may carry dimension allocations.
#[derive(Debug, Error)]
pub enum PostingError {
    /// The ledger rejected the posting.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A leg allocation was rejected.
    #[error(transparent)]
    Dimension(#[from] DimensionError),

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PostingError {
    /// Returns the error code of the underlying failure.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Ledger(inner) => inner.error_code(),
            Self::Dimension(inner) => inner.error_code(),
            Self::Store(inner) => inner.error_code(),
        }
    }

    /// Classifies the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Ledger(inner) => inner.kind(),
            Self::Dimension(inner) => inner.kind(),
            Self::Store(inner) => inner.kind(),
        }
    }
}

impl From<PostingError> for AppError {
    fn from(err: PostingError) -> Self {
        Self::new(err.kind(), err.error_code(), err.to_string())
    }
}

impl From<PostingError> for ReconciliationError {
    fn from(err: PostingError) -> Self {
        match err {
            PostingError::Ledger(inner) => Self::Ledger(inner),
            PostingError::Dimension(inner) => Self::Dimension(inner),
            PostingError::Store(inner) => inner.into(),
        }
    }
}

impl From<PostingError> for CogsError {
    fn from(err: PostingError) -> Self {
        match err {
            PostingError::Ledger(inner) => Self::Ledger(inner),
            PostingError::Dimension(inner) => Self::Dimension(inner),
            PostingError::Store(inner) => inner.into(),
        }
    }
}

/// Every table of the engine.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    /// Accounts with cached totals.
    pub chart: ChartOfAccounts,
    /// Posted transactions and lines.
    pub journal: Journal,
    /// Dimensions, values and assignments.
    pub dimensions: DimensionBook,
    /// Reconciliation runs, items and adjustments.
    pub reconciliations: ReconciliationBook,
    /// Production orders and COGS allocations.
    pub cogs: CogsBook,
    /// Bumped on every change that can move an as-of balance.
    pub version: u64,
}

/// A posting validated against the current tables.
#[derive(Debug)]
pub enum StagedPosting {
    /// The idempotency key was already used; nothing will be written.
    Replay(Transaction),
    /// A new posting with its dimension plans.
    Fresh {
        /// Validated header and lines.
        posting: PreparedPosting,
        /// One plan per (line, dimension) pair carried by the legs.
        plans: Vec<AssignmentPlan>,
    },
    /// A reversal with the assignments copied from the original lines.
    Reversal {
        /// Validated compensating posting.
        posting: PreparedPosting,
        /// Assignments for the reversing lines.
        mirrored: Vec<DimensionAssignment>,
    },
}

impl Tables {
    /// Validates a posting and its leg allocations without writing.
    pub fn stage_posting(
        &self,
        header: TransactionHeader,
        legs: Vec<LegInput>,
        rules: &Rules,
        now: DateTime<Utc>,
    ) -> Result<StagedPosting, PostingError> {
        if let Some(existing) = header
            .idempotency_key
            .as_deref()
            .and_then(|key| self.journal.find_by_idempotency_key(key))
        {
            return Ok(StagedPosting::Replay(existing.clone()));
        }

        let posting = self
            .journal
            .prepare_posting(&self.chart, header, legs, rules.posting, now)?;

        let mut plans = Vec::new();
        for (line, allocations) in posting.lines.iter().zip(&posting.allocations) {
            if allocations.is_empty() {
                continue;
            }
            plans.extend(
                self.dimensions
                    .prepare_leg_allocations(line, allocations, rules.allocation, now)?,
            );
        }
        Ok(StagedPosting::Fresh { posting, plans })
    }

    /// Validates a reversal and copies the original lines' assignments.
    pub fn stage_reversal(
        &self,
        transaction_id: tally_shared::types::TransactionId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<StagedPosting, LedgerError> {
        let posting = self.journal.prepare_reversal(transaction_id, reason, now)?;
        let mirrored = posting
            .lines
            .iter()
            .filter_map(|line| line.reversal_of.map(|original| (original, line.id)))
            .flat_map(|(original, reversing)| self.dimensions.mirror_assignments(original, reversing, now))
            .collect();
        Ok(StagedPosting::Reversal { posting, mirrored })
    }

    /// Applies a staged posting. Cannot fail.
    pub fn commit(&mut self, staged: StagedPosting, now: DateTime<Utc>) -> Transaction {
        match staged {
            StagedPosting::Replay(transaction) => {
                info!(
                    transaction_id = %transaction.id,
                    idempotency_key = transaction.idempotency_key.as_deref().unwrap_or_default(),
                    "Idempotent replay, returning existing transaction"
                );
                transaction
            }
            StagedPosting::Fresh { posting, plans } => {
                let transaction = self.journal.commit(&mut self.chart, posting, now);
                for plan in plans {
                    self.dimensions.apply(plan);
                }
                self.version += 1;
                transaction
            }
            StagedPosting::Reversal { posting, mirrored } => {
                let transaction = self.journal.commit(&mut self.chart, posting, now);
                self.dimensions.insert_assignments(mirrored);
                self.version += 1;
                transaction
            }
        }
    }
}

/// Rules derived once from [`EngineConfig`].
#[derive(Debug, Clone)]
pub struct Rules {
    /// Posting validation.
    pub posting: PostingRules,
    /// Derived allocation amounts.
    pub allocation: AllocationRules,
    /// COGS totals.
    pub cost: CostRules,
    /// Account tree shape.
    pub hierarchy: HierarchyRules,
    /// Currency for top-level accounts created without one.
    pub base_currency: Currency,
    /// Statement auto-match.
    pub matching: MatchRules,
    /// Largest difference a run may complete with.
    pub completion_tolerance: Decimal,
}

impl Rules {
    /// Builds the rules from configuration.
    pub fn from_config(config: &EngineConfig) -> Result<Self, StoreError> {
        let ledger = &config.ledger;
        let base_currency = ledger
            .base_currency
            .parse::<Currency>()
            .map_err(StoreError::Config)?;
        Ok(Self {
            posting: PostingRules {
                scale: ledger.scale,
                rounding: ledger.rounding,
                strict_group_posting: ledger.strict_group_posting,
            },
            allocation: AllocationRules {
                scale: ledger.scale,
                rounding: ledger.rounding,
            },
            cost: CostRules {
                scale: ledger.scale,
                rounding: ledger.rounding,
            },
            hierarchy: HierarchyRules {
                strict_group_posting: ledger.strict_group_posting,
                allow_cross_type_parenting: ledger.allow_cross_type_parenting,
            },
            base_currency,
            matching: MatchRules {
                match_tolerance: config.reconciliation.match_tolerance,
                date_window_days: config.reconciliation.date_window_days,
            },
            completion_tolerance: config.reconciliation.completion_tolerance,
        })
    }
}

/// Shared handle to the store. Cheap to clone.
#[derive(Clone)]
pub struct Database {
    tables: Arc<RwLock<Tables>>,
    config: Arc<EngineConfig>,
    rules: Arc<Rules>,
    cache: BalanceCache,
}

impl Database {
    /// Opens an empty store.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: EngineConfig) -> Result<Self, StoreError> {
        Self::with_tables(config, Tables::default())
    }

    /// Opens a store over existing tables.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_tables(config: EngineConfig, tables: Tables) -> Result<Self, StoreError> {
        let rules = Rules::from_config(&config)?;
        let cache = BalanceCache::new(&config.cache);
        Ok(Self {
            tables: Arc::new(RwLock::new(tables)),
            config: Arc::new(config),
            rules: Arc::new(rules),
            cache,
        })
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Rules derived from the configuration.
    #[must_use]
    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    /// As-of balance cache.
    #[must_use]
    pub const fn cache(&self) -> &BalanceCache {
        &self.cache
    }

    /// Takes the shared read guard.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if a writer panicked.
    pub fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables.read().map_err(|_| StoreError::Poisoned)
    }

    /// Takes the exclusive write guard.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if a writer panicked.
    pub fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables.write().map_err(|_| StoreError::Poisoned)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}
