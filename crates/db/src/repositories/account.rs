//! Account repository: chart of accounts, balances and integrity checks.

use chrono::{NaiveDate, Utc};
use tally_core::accounts::{Account, AccountError, AccountTotals, CreateAccountInput, IfrsTag, ifrs_tag};
use tally_shared::AppError;
use tally_shared::types::{AccountId, Money};
use tracing::{error, info};

use crate::store::Database;

/// Result of [`AccountRepository::verify_integrity`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    /// Accounts examined.
    pub accounts_checked: usize,
    /// Consistency problems found (rollup mismatch, balance drift, cycles).
    pub issues: Vec<AppError>,
}

impl IntegrityReport {
    /// True when no issue was found.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Repository for account registry operations.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    db: Database,
}

impl AccountRepository {
    /// Creates a new account repository.
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// Creates an account.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The code is empty or already used
    /// - The parent is missing, inactive, of another type (unless cross-type
    ///   parenting is allowed) or already carries postings
    pub fn create_account(&self, input: CreateAccountInput) -> Result<Account, AccountError> {
        let rules = self.db.rules();
        let mut tables = self.db.write()?;
        let account = tables
            .chart
            .create(input, rules.hierarchy, rules.base_currency, Utc::now())?;
        tables.version += 1;

        info!(
            account_id = %account.id,
            code = %account.code,
            account_type = %account.account_type,
            parent_id = ?account.parent_id,
            "Account created"
        );
        Ok(account)
    }

    /// Soft-deactivates an account. It keeps its history and balance but
    /// rejects new postings.
    ///
    /// # Errors
    ///
    /// Returns an error if the account does not exist.
    pub fn deactivate_account(&self, id: AccountId) -> Result<Account, AccountError> {
        let mut tables = self.db.write()?;
        let account = tables.chart.deactivate(id)?;
        info!(account_id = %id, code = %account.code, "Account deactivated");
        Ok(account)
    }

    /// Finds an account by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, AccountError> {
        Ok(self.db.read()?.chart.get(id).cloned())
    }

    /// Finds an account by code.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub fn find_by_code(&self, code: &str) -> Result<Option<Account>, AccountError> {
        Ok(self.db.read()?.chart.find_by_code(code).cloned())
    }

    /// Lists every account, sorted by code.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub fn list(&self) -> Result<Vec<Account>, AccountError> {
        Ok(self.db.read()?.chart.accounts().into_iter().cloned().collect())
    }

    /// Direct children of an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the account does not exist.
    pub fn children(&self, id: AccountId) -> Result<Vec<Account>, AccountError> {
        let tables = self.db.read()?;
        tables.chart.require(id)?;
        Ok(tables
            .chart
            .children(id)
            .iter()
            .filter_map(|child| tables.chart.get(*child).cloned())
            .collect())
    }

    /// Parent chain of an account, nearest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the account does not exist or the chain loops.
    pub fn ancestors(&self, id: AccountId) -> Result<Vec<Account>, AccountError> {
        let tables = self.db.read()?;
        let chain = tables.chart.ancestors(id).inspect_err(|e| {
            if e.kind().is_critical() {
                error!(severity = "critical", account_id = %id, error = %e, "Account hierarchy is corrupt");
            }
        })?;
        Ok(chain
            .into_iter()
            .filter_map(|a| tables.chart.get(a).cloned())
            .collect())
    }

    /// Balance as of a date (today when `None`), computed from posted lines.
    ///
    /// Group accounts include their whole subtree. Reads are cached per
    /// store version.
    ///
    /// # Errors
    ///
    /// Returns an error if the account does not exist.
    pub fn get_balance(&self, id: AccountId, as_of: Option<NaiveDate>) -> Result<Money, AccountError> {
        let tables = self.db.read()?;
        let currency = tables.chart.require(id)?.currency;
        let as_of = as_of.unwrap_or_else(|| Utc::now().date_naive());

        let amount = self
            .db
            .cache()
            .get_or_try_compute(id, as_of, tables.version, || {
                tables
                    .journal
                    .balance_as_of(&tables.chart, id, as_of)
                    .map_err(|_| AccountError::AccountNotFound(id))
            })?;
        Ok(Money::new(amount, currency))
    }

    /// Denormalised totals maintained by the ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if the account does not exist.
    pub fn cached_balance(&self, id: AccountId) -> Result<AccountTotals, AccountError> {
        Ok(self.db.read()?.chart.require(id)?.totals)
    }

    /// Recomputes an account's subtree bottom-up and propagates the result
    /// to its ancestors.
    ///
    /// # Errors
    ///
    /// Returns an error if the account does not exist.
    pub fn rollup(&self, id: AccountId) -> Result<Money, AccountError> {
        let mut tables = self.db.write()?;
        let totals = tables.chart.rollup(id)?;
        let currency = tables.chart.require(id)?.currency;
        Ok(Money::new(totals.balance, currency))
    }

    /// Compares every cached total with a replay of the posted lines and
    /// every group with the sum of its children.
    ///
    /// Findings are returned, not raised; each one is logged as critical.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub fn verify_integrity(&self) -> Result<IntegrityReport, AccountError> {
        let tables = self.db.read()?;
        let accounts = tables.chart.accounts();

        let mut issues: Vec<AppError> = Vec::new();
        for account in &accounts {
            if let Err(e) = tables.chart.ancestors(account.id) {
                error!(severity = "critical", account_id = %account.id, error = %e, "Cycle in account hierarchy");
                issues.push(e.into());
            }
        }
        for mismatch in tables.chart.rollup_mismatches() {
            error!(severity = "critical", error = %mismatch, "Group total disagrees with its children");
            issues.push(mismatch.into());
        }
        for drift in tables.journal.balance_drift(&tables.chart) {
            error!(severity = "critical", error = %drift, "Cached balance drifted from posted lines");
            issues.push(drift.into());
        }

        info!(
            accounts_checked = accounts.len(),
            issues = issues.len(),
            "Integrity check finished"
        );
        Ok(IntegrityReport {
            accounts_checked: accounts.len(),
            issues,
        })
    }

    /// Rebuilds every cached total by replaying posted lines, then rolls up
    /// every group. Returns the number of accounts rebuilt.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub fn rebuild_balances(&self) -> Result<usize, AccountError> {
        let mut guard = self.db.write()?;
        let tables = &mut *guard;
        tables.journal.replay_into(&mut tables.chart);
        tables.version += 1;
        let rebuilt = tables.chart.len();
        info!(accounts = rebuilt, "Balances rebuilt from posted lines");
        Ok(rebuilt)
    }

    /// IFRS presentation tag of an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the account does not exist.
    pub fn ifrs_tag(&self, id: AccountId) -> Result<IfrsTag, AccountError> {
        let tables = self.db.read()?;
        let account = tables.chart.require(id)?;
        Ok(ifrs_tag(account.account_type, &account.category))
    }
}
