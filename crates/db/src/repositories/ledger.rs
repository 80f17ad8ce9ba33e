//! Ledger repository: posting, reversal and journal reads.

use chrono::Utc;
use tally_core::ledger::{JournalLine, LedgerError, LegInput, Transaction, TransactionHeader};
use tally_shared::types::{AccountId, DateRange, TransactionId};
use tracing::{error, info};

use crate::store::{Database, PostingError};

/// Repository for journal postings.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    db: Database,
}

impl LedgerRepository {
    /// Creates a new ledger repository.
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// Posts a balanced transaction with its leg allocations.
    ///
    /// A header whose idempotency key was already used returns the
    /// transaction posted the first time and writes nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Fewer than two legs, or only one side
    /// - An account is missing, inactive or a group account
    /// - A leg amount is not positive or exceeds the ledger scale
    /// - Debits and credits differ
    /// - A leg allocation is rejected by the dimension allocator
    pub fn post(&self, header: TransactionHeader, legs: Vec<LegInput>) -> Result<Transaction, PostingError> {
        let now = Utc::now();
        let mut tables = self.db.write()?;
        let staged = tables
            .stage_posting(header, legs, self.db.rules(), now)
            .inspect_err(|e| error!(error = %e, code = e.error_code(), "Failed to post transaction"))?;
        let transaction = tables.commit(staged, now);

        info!(
            transaction_id = %transaction.id,
            origin = ?transaction.origin,
            amount = %transaction.total_amount,
            sequence = transaction.sequence,
            "Transaction posted"
        );
        Ok(transaction)
    }

    /// Posts the compensating transaction for `transaction_id`.
    ///
    /// The original stays in the journal, marked reversed; the reversing
    /// lines carry copies of the original lines' dimension assignments.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The reason is blank
    /// - The transaction does not exist
    /// - It was already reversed, or is itself a reversal
    pub fn reverse(&self, transaction_id: TransactionId, reason: &str) -> Result<Transaction, LedgerError> {
        let now = Utc::now();
        let mut tables = self.db.write()?;
        let staged = tables
            .stage_reversal(transaction_id, reason, now)
            .inspect_err(|e| error!(transaction_id = %transaction_id, error = %e, "Failed to reverse transaction"))?;
        let reversal = tables.commit(staged, now);

        info!(
            transaction_id = %transaction_id,
            reversal_id = %reversal.id,
            reason,
            "Transaction reversed"
        );
        Ok(reversal)
    }

    /// Finds a transaction by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, LedgerError> {
        Ok(self.db.read()?.journal.transaction(id).cloned())
    }

    /// Finds the transaction posted with an idempotency key.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Transaction>, LedgerError> {
        Ok(self.db.read()?.journal.find_by_idempotency_key(key).cloned())
    }

    /// All legs of a transaction in posting order.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction does not exist.
    pub fn legs_for(&self, id: TransactionId) -> Result<Vec<JournalLine>, LedgerError> {
        let tables = self.db.read()?;
        tables
            .journal
            .transaction(id)
            .ok_or(LedgerError::TransactionNotFound(id))?;
        Ok(tables.journal.legs_for(id).into_iter().cloned().collect())
    }

    /// Lines posted directly to an account, optionally within a date range.
    ///
    /// # Errors
    ///
    /// Returns an error if the account does not exist.
    pub fn lines_for_account(
        &self,
        account_id: AccountId,
        range: Option<DateRange>,
    ) -> Result<Vec<JournalLine>, LedgerError> {
        let tables = self.db.read()?;
        tables
            .chart
            .get(account_id)
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        Ok(tables
            .journal
            .lines_for_account(account_id, range)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Every transaction in posting order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub fn transactions(&self) -> Result<Vec<Transaction>, LedgerError> {
        Ok(self
            .db
            .read()?
            .journal
            .transactions()
            .into_iter()
            .cloned()
            .collect())
    }
}
