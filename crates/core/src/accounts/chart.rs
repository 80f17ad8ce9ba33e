//! Chart of accounts tree.
//!
//! Accounts live in a flat table keyed by id; parent links are ids. Each
//! account caches two sets of totals: `direct` (opening balance plus its own
//! postings) and `totals` (`direct` plus every child's `totals`). Movements
//! update `direct` on the posted account and then roll up bottom-up along
//! the parent chain.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tally_shared::types::{AccountId, Currency};

use super::balance::AccountTotals;
use super::error::AccountError;
use super::types::{Account, CreateAccountInput, HierarchyRules};

/// In-memory chart of accounts with code and children indexes.
#[derive(Debug, Clone, Default)]
pub struct ChartOfAccounts {
    accounts: HashMap<AccountId, Account>,
    by_code: HashMap<String, AccountId>,
    children: HashMap<AccountId, Vec<AccountId>>,
}

impl ChartOfAccounts {
    /// Creates an empty chart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a chart from stored accounts.
    ///
    /// Cached totals are reset to the opening balances; callers replay posted
    /// lines and then call [`Self::rollup_all`].
    pub fn from_accounts(accounts: impl IntoIterator<Item = Account>) -> Result<Self, AccountError> {
        let mut sorted: Vec<Account> = accounts.into_iter().collect();
        sorted.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.code.cmp(&b.code)));

        let mut chart = Self::new();
        for mut account in sorted {
            if chart.by_code.contains_key(&account.code) {
                return Err(AccountError::DuplicateCode(account.code));
            }
            account.direct = AccountTotals::opening(account.opening_balance);
            account.totals = account.direct;
            chart.by_code.insert(account.code.clone(), account.id);
            chart.accounts.insert(account.id, account);
        }

        let links: Vec<(AccountId, AccountId)> = chart
            .accounts
            .values()
            .filter_map(|a| a.parent_id.map(|p| (p, a.id)))
            .collect();
        for (parent, child) in links {
            if !chart.accounts.contains_key(&parent) {
                return Err(AccountError::ParentNotFound(parent));
            }
            chart.children.entry(parent).or_default().push(child);
        }
        for kids in chart.children.values_mut() {
            kids.sort_by_key(|id| chart.accounts.get(id).map(|a| a.code.clone()));
        }

        for id in chart.accounts.keys() {
            chart.ancestors(*id)?;
        }
        Ok(chart)
    }

    /// Number of accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// True if the chart has no accounts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Looks up an account.
    #[must_use]
    pub fn get(&self, id: AccountId) -> Option<&Account> {
        self.accounts.get(&id)
    }

    /// Looks up an account or fails with `AccountNotFound`.
    pub fn require(&self, id: AccountId) -> Result<&Account, AccountError> {
        self.get(id).ok_or(AccountError::AccountNotFound(id))
    }

    /// Looks up an account by code.
    #[must_use]
    pub fn find_by_code(&self, code: &str) -> Option<&Account> {
        self.by_code.get(code).and_then(|id| self.accounts.get(id))
    }

    /// Direct children of an account.
    #[must_use]
    pub fn children(&self, id: AccountId) -> &[AccountId] {
        self.children.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Every account, sorted by code.
    #[must_use]
    pub fn accounts(&self) -> Vec<&Account> {
        let mut all: Vec<&Account> = self.accounts.values().collect();
        all.sort_by(|a, b| a.code.cmp(&b.code));
        all
    }

    /// The account and all of its descendants, parents before children.
    #[must_use]
    pub fn subtree(&self, id: AccountId) -> Vec<AccountId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// Parent chain of an account, nearest parent first.
    ///
    /// Walks parent links with a visited set and fails with `CycleDetected`
    /// if any account is reached twice.
    pub fn ancestors(&self, id: AccountId) -> Result<Vec<AccountId>, AccountError> {
        let mut chain = Vec::new();
        let mut visited = HashSet::from([id]);
        let mut current = self.require(id)?.parent_id;
        while let Some(parent) = current {
            if !visited.insert(parent) {
                return Err(AccountError::CycleDetected { at: parent });
            }
            chain.push(parent);
            current = self.require(parent)?.parent_id;
        }
        Ok(chain)
    }

    /// Checks that `input` may be added to the chart.
    pub fn validate_new(&self, input: &CreateAccountInput, rules: HierarchyRules) -> Result<(), AccountError> {
        if input.code.trim().is_empty() {
            return Err(AccountError::EmptyCode);
        }
        if self.by_code.contains_key(&input.code) {
            return Err(AccountError::DuplicateCode(input.code.clone()));
        }

        let Some(parent_id) = input.parent_id else {
            return Ok(());
        };
        let parent = self.get(parent_id).ok_or(AccountError::ParentNotFound(parent_id))?;

        if !parent.is_active {
            return Err(AccountError::InvalidHierarchy {
                reason: format!("parent {} is inactive", parent.code),
            });
        }
        if !rules.allow_cross_type_parenting && parent.account_type != input.account_type {
            return Err(AccountError::InvalidHierarchy {
                reason: format!(
                    "{} account cannot be nested under {} account {}",
                    input.account_type, parent.account_type, parent.code
                ),
            });
        }
        if input.currency.is_some_and(|c| c != parent.currency) {
            return Err(AccountError::InvalidHierarchy {
                reason: format!("currency differs from parent {} ({})", parent.code, parent.currency),
            });
        }
        if rules.strict_group_posting && parent.has_direct_activity() {
            return Err(AccountError::InvalidHierarchy {
                reason: format!("parent {} already carries postings or an opening balance", parent.code),
            });
        }
        Ok(())
    }

    /// Validates and adds an account.
    ///
    /// Children inherit their parent's currency when none is given; top-level
    /// accounts fall back to `base_currency`.
    pub fn create(
        &mut self,
        input: CreateAccountInput,
        rules: HierarchyRules,
        base_currency: Currency,
        now: DateTime<Utc>,
    ) -> Result<Account, AccountError> {
        self.validate_new(&input, rules)?;

        let currency = input
            .currency
            .or_else(|| input.parent_id.and_then(|p| self.get(p)).map(|p| p.currency))
            .unwrap_or(base_currency);
        let direct = AccountTotals::opening(input.opening_balance);
        let account = Account {
            id: AccountId::new(),
            code: input.code,
            name: input.name,
            account_type: input.account_type,
            category: input.category,
            parent_id: input.parent_id,
            is_group: false,
            is_active: true,
            currency,
            opening_balance: input.opening_balance,
            direct,
            totals: direct,
            created_at: now,
        };

        self.by_code.insert(account.code.clone(), account.id);
        if let Some(parent_id) = account.parent_id {
            self.children.entry(parent_id).or_default().push(account.id);
            if let Some(parent) = self.accounts.get_mut(&parent_id) {
                parent.is_group = true;
            }
        }
        let id = account.id;
        self.accounts.insert(id, account.clone());
        self.propagate(id);
        Ok(account)
    }

    /// Soft-deactivates an account. History and balances are kept.
    pub fn deactivate(&mut self, id: AccountId) -> Result<Account, AccountError> {
        let account = self.accounts.get_mut(&id).ok_or(AccountError::AccountNotFound(id))?;
        account.is_active = false;
        Ok(account.clone())
    }

    /// Records a posted movement on `id` and rolls it up the parent chain.
    ///
    /// Unknown ids are ignored; callers resolve every account before
    /// committing.
    pub fn apply_movement(&mut self, id: AccountId, debit: Decimal, credit: Decimal) {
        self.apply_direct(id, debit, credit);
        self.propagate(id);
    }

    /// Records a movement on `id` without rolling it up. Used when replaying
    /// many lines before a single [`Self::rollup_all`].
    pub fn apply_direct(&mut self, id: AccountId, debit: Decimal, credit: Decimal) {
        if let Some(account) = self.accounts.get_mut(&id) {
            let normal = account.normal_balance();
            account.direct.apply(normal, debit, credit);
        }
    }

    /// Resets every cached total to the opening balance.
    pub fn reset_movements(&mut self) {
        for account in self.accounts.values_mut() {
            account.direct = AccountTotals::opening(account.opening_balance);
            account.totals = account.direct;
        }
    }

    /// Totals of `id` recomputed from `direct` values down the whole subtree,
    /// ignoring cached rollups.
    pub fn computed_totals(&self, id: AccountId) -> Result<AccountTotals, AccountError> {
        let account = self.require(id)?;
        let mut totals = account.direct;
        for child in self.children(id) {
            totals = totals.combine(self.computed_totals(*child)?);
        }
        Ok(totals)
    }

    /// Recomputes the cached rollup of `id`'s subtree bottom-up, then
    /// propagates the result to its ancestors.
    pub fn rollup(&mut self, id: AccountId) -> Result<AccountTotals, AccountError> {
        self.require(id)?;
        for node in self.subtree(id).into_iter().rev() {
            self.refresh(node);
        }
        self.propagate(id);
        Ok(self.require(id)?.totals)
    }

    /// Recomputes every cached rollup bottom-up.
    pub fn rollup_all(&mut self) {
        let roots: Vec<AccountId> = self
            .accounts
            .values()
            .filter(|a| a.parent_id.is_none())
            .map(|a| a.id)
            .collect();
        for root in roots {
            for node in self.subtree(root).into_iter().rev() {
                self.refresh(node);
            }
        }
    }

    /// Groups whose cached totals disagree with their children.
    #[must_use]
    pub fn rollup_mismatches(&self) -> Vec<AccountError> {
        let mut issues = Vec::new();
        for account in self.accounts() {
            let expected = self
                .children(account.id)
                .iter()
                .filter_map(|c| self.get(*c))
                .fold(account.direct, |acc, child| acc.combine(child.totals));
            if expected != account.totals {
                issues.push(AccountError::RollupMismatch {
                    account_id: account.id,
                    cached: account.totals.balance,
                    computed: expected.balance,
                });
            }
        }
        issues
    }

    /// Sets `totals = direct + sum(children.totals)` for one account.
    fn refresh(&mut self, id: AccountId) {
        let Some(direct) = self.accounts.get(&id).map(|a| a.direct) else {
            return;
        };
        let totals = self
            .children(id)
            .iter()
            .filter_map(|c| self.accounts.get(c))
            .fold(direct, |acc, child| acc.combine(child.totals));
        if let Some(account) = self.accounts.get_mut(&id) {
            account.totals = totals;
        }
    }

    /// Refreshes `id` and then each ancestor, bottom-up. The walk is bounded
    /// by the chart size so a corrupted parent link cannot loop forever.
    fn propagate(&mut self, id: AccountId) {
        let mut current = Some(id);
        let mut steps = 0;
        while let Some(node) = current {
            if steps > self.accounts.len() {
                break;
            }
            self.refresh(node);
            current = self.accounts.get(&node).and_then(|a| a.parent_id);
            steps += 1;
        }
    }
}
