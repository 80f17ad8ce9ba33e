//! Account balance totals.
//!
//! Balances follow the normal side of the account:
//! - Asset/Expense: balance += debit - credit
//! - Liability/Equity/Revenue: balance += credit - debit

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::types::NormalBalance;

/// Debit/credit totals and the resulting balance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountTotals {
    /// Sum of debits.
    pub total_debits: Decimal,
    /// Sum of credits.
    pub total_credits: Decimal,
    /// Balance on the normal side, opening balance included.
    pub balance: Decimal,
}

impl AccountTotals {
    /// Totals holding only an opening balance.
    #[must_use]
    pub const fn opening(balance: Decimal) -> Self {
        Self {
            total_debits: Decimal::ZERO,
            total_credits: Decimal::ZERO,
            balance,
        }
    }

    /// Applies a movement.
    pub fn apply(&mut self, normal: NormalBalance, debit: Decimal, credit: Decimal) {
        self.total_debits += debit;
        self.total_credits += credit;
        self.balance += normal.signed_movement(debit, credit);
    }

    /// Field-wise sum.
    #[must_use]
    pub fn combine(self, other: Self) -> Self {
        Self {
            total_debits: self.total_debits + other.total_debits,
            total_credits: self.total_credits + other.total_credits,
            balance: self.balance + other.balance,
        }
    }
}
