//! JSON snapshots of the whole store.
//!
//! A snapshot holds source rows only. Cached account totals are rebuilt by
//! replaying the journal on restore, so a snapshot can never carry a drifted
//! balance back in.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_core::accounts::{Account, ChartOfAccounts};
use tally_core::cogs::{CogsAllocation, CogsBook, ProductionOrder};
use tally_core::dimension::{DimensionAssignment, DimensionBook, DimensionDefinition, DimensionValue};
use tally_core::ledger::{Journal, JournalLine, Transaction};
use tally_core::reconciliation::{Adjustment, ReconciliationBook, ReconciliationItem, ReconciliationRun};
use tracing::info;

use crate::store::{StoreError, Tables};

/// Snapshot layout version written by this build.
pub const SNAPSHOT_FORMAT: u32 = 1;

/// Every stored row, grouped by table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Layout version.
    pub format: u32,
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,
    /// Chart of accounts.
    pub accounts: Vec<Account>,
    /// Transaction headers.
    pub transactions: Vec<Transaction>,
    /// Journal lines.
    pub lines: Vec<JournalLine>,
    /// Dimension definitions.
    pub dimensions: Vec<DimensionDefinition>,
    /// Dimension values.
    pub dimension_values: Vec<DimensionValue>,
    /// Dimension assignments.
    pub assignments: Vec<DimensionAssignment>,
    /// Reconciliation runs.
    pub runs: Vec<ReconciliationRun>,
    /// Statement items.
    pub items: Vec<ReconciliationItem>,
    /// Reconciliation adjustments.
    pub adjustments: Vec<Adjustment>,
    /// Production orders.
    pub production_orders: Vec<ProductionOrder>,
    /// COGS allocations.
    pub allocations: Vec<CogsAllocation>,
}

impl Snapshot {
    /// Copies every row out of the tables.
    #[must_use]
    pub fn capture(tables: &Tables, now: DateTime<Utc>) -> Self {
        Self {
            format: SNAPSHOT_FORMAT,
            taken_at: now,
            accounts: tables.chart.accounts().into_iter().cloned().collect(),
            transactions: tables.journal.transactions().into_iter().cloned().collect(),
            lines: tables.journal.lines().into_iter().cloned().collect(),
            dimensions: tables.dimensions.definitions().into_iter().cloned().collect(),
            dimension_values: tables.dimensions.all_values().into_iter().cloned().collect(),
            assignments: tables
                .dimensions
                .all_assignments()
                .into_iter()
                .cloned()
                .collect(),
            runs: tables.reconciliations.runs().into_iter().cloned().collect(),
            items: tables.reconciliations.all_items().into_iter().cloned().collect(),
            adjustments: tables
                .reconciliations
                .all_adjustments()
                .into_iter()
                .cloned()
                .collect(),
            production_orders: tables.cogs.orders().into_iter().cloned().collect(),
            allocations: tables.cogs.allocations().into_iter().cloned().collect(),
        }
    }

    /// Rebuilds the tables and replays the journal into the chart.
    ///
    /// # Errors
    ///
    /// Returns an error if the layout version is unknown, account codes
    /// collide, the account tree loops, or dimension rows are inconsistent.
    pub fn restore(self) -> Result<Tables, StoreError> {
        if self.format != SNAPSHOT_FORMAT {
            return Err(StoreError::Restore(format!(
                "unsupported snapshot format {} (expected {SNAPSHOT_FORMAT})",
                self.format
            )));
        }
        let mut chart =
            ChartOfAccounts::from_accounts(self.accounts).map_err(|e| StoreError::Restore(e.to_string()))?;
        let journal = Journal::from_parts(self.transactions, self.lines);
        journal.replay_into(&mut chart);
        let dimensions = DimensionBook::from_parts(self.dimensions, self.dimension_values, self.assignments)
            .map_err(|e| StoreError::Restore(e.to_string()))?;

        Ok(Tables {
            chart,
            journal,
            dimensions,
            reconciliations: ReconciliationBook::from_parts(self.runs, self.items, self.adjustments),
            cogs: CogsBook::from_parts(self.production_orders, self.allocations),
            version: 0,
        })
    }

    /// Writes the snapshot as pretty JSON.
    ///
    /// The file is written next to `path` and renamed into place, so an
    /// interrupted save leaves the previous snapshot intact.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or any file operation fails.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(self)?;
        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, path)?;

        info!(
            path = %path.display(),
            accounts = self.accounts.len(),
            transactions = self.transactions.len(),
            "Snapshot saved"
        );
        Ok(())
    }

    /// Reads a snapshot written by [`Snapshot::save`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let contents = std::fs::read_to_string(path)?;
        let snapshot: Self = serde_json::from_str(&contents)?;
        info!(
            path = %path.display(),
            format = snapshot.format,
            taken_at = %snapshot.taken_at,
            "Snapshot loaded"
        );
        Ok(snapshot)
    }
}
