//! Chart of accounts domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{AccountId, Currency, Money};

use super::balance::AccountTotals;

/// The five fundamental account types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Resources owned.
    Asset,
    /// Obligations owed.
    Liability,
    /// Residual interest of the owners.
    Equity,
    /// Income earned.
    Revenue,
    /// Costs incurred.
    Expense,
}

impl AccountType {
    /// All account types, in statement order.
    pub const ALL: [Self; 5] = [
        Self::Asset,
        Self::Liability,
        Self::Equity,
        Self::Revenue,
        Self::Expense,
    ];

    /// Side on which the account type normally carries its balance.
    ///
    /// - Asset/Expense: debit-normal
    /// - Liability/Equity/Revenue: credit-normal
    #[must_use]
    pub const fn normal_balance(self) -> NormalBalance {
        match self {
            Self::Asset | Self::Expense => NormalBalance::Debit,
            Self::Liability | Self::Equity | Self::Revenue => NormalBalance::Credit,
        }
    }

    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asset => "asset",
            Self::Liability => "liability",
            Self::Equity => "equity",
            Self::Revenue => "revenue",
            Self::Expense => "expense",
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asset" => Ok(Self::Asset),
            "liability" => Ok(Self::Liability),
            "equity" => Ok(Self::Equity),
            "revenue" => Ok(Self::Revenue),
            "expense" => Ok(Self::Expense),
            _ => Err(format!("Unknown account type: {s}")),
        }
    }
}

/// Normal balance side of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalBalance {
    /// Balance grows with debits.
    Debit,
    /// Balance grows with credits.
    Credit,
}

impl NormalBalance {
    /// Balance change caused by a debit/credit movement.
    ///
    /// Debit-normal: `debit - credit`. Credit-normal: `credit - debit`.
    #[must_use]
    pub fn signed_movement(self, debit: Decimal, credit: Decimal) -> Decimal {
        match self {
            Self::Debit => debit - credit,
            Self::Credit => credit - debit,
        }
    }
}

/// A node in the chart of accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account ID.
    pub id: AccountId,
    /// Unique account code (e.g. "1100").
    pub code: String,
    /// Display name.
    pub name: String,
    /// Account type.
    pub account_type: AccountType,
    /// Free-form category (e.g. "current_asset", "cash"), used for IFRS tagging.
    pub category: String,
    /// Parent account, if any.
    pub parent_id: Option<AccountId>,
    /// True once the account has at least one child.
    pub is_group: bool,
    /// Inactive accounts reject new postings.
    pub is_active: bool,
    /// Currency every posting to this account must use.
    pub currency: Currency,
    /// Opening balance on the normal side.
    pub opening_balance: Decimal,
    /// Opening balance plus postings made directly to this account.
    pub direct: AccountTotals,
    /// `direct` plus the rolled-up totals of every child.
    pub totals: AccountTotals,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Normal balance side derived from the account type.
    #[must_use]
    pub const fn normal_balance(&self) -> NormalBalance {
        self.account_type.normal_balance()
    }

    /// Rolled-up balance in the account's currency.
    #[must_use]
    pub const fn balance(&self) -> Money {
        Money::new(self.totals.balance, self.currency)
    }

    /// True if anything has ever been posted directly to this account.
    #[must_use]
    pub fn has_direct_activity(&self) -> bool {
        !self.direct.total_debits.is_zero()
            || !self.direct.total_credits.is_zero()
            || !self.opening_balance.is_zero()
    }
}

/// Input for creating an account.
#[derive(Debug, Clone)]
pub struct CreateAccountInput {
    /// Unique account code.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Account type.
    pub account_type: AccountType,
    /// Free-form category.
    pub category: String,
    /// Parent account.
    pub parent_id: Option<AccountId>,
    /// Currency; the configured base currency when `None`.
    pub currency: Option<Currency>,
    /// Opening balance on the normal side.
    pub opening_balance: Decimal,
}

impl CreateAccountInput {
    /// Creates an input for a top-level account with no opening balance.
    #[must_use]
    pub fn new(code: impl Into<String>, name: impl Into<String>, account_type: AccountType) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            account_type,
            category: String::new(),
            parent_id: None,
            currency: None,
            opening_balance: Decimal::ZERO,
        }
    }

    /// Places the account under `parent_id`.
    #[must_use]
    pub const fn under(mut self, parent_id: AccountId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Sets the category.
    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Sets the currency.
    #[must_use]
    pub const fn currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }

    /// Sets the opening balance.
    #[must_use]
    pub const fn opening_balance(mut self, amount: Decimal) -> Self {
        self.opening_balance = amount;
        self
    }
}

/// Hierarchy rules applied when accounts are created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HierarchyRules {
    /// Group accounts never carry direct activity.
    pub strict_group_posting: bool,
    /// Children may have a different type than their parent.
    pub allow_cross_type_parenting: bool,
}

impl Default for HierarchyRules {
    fn default() -> Self {
        Self {
            strict_group_posting: true,
            allow_cross_type_parenting: false,
        }
    }
}
