//! IFRS presentation tags for accounts.
//!
//! The mapping is a static table keyed by account type and category. It is
//! total: a category missing from the table falls back to the per-type
//! default, so every account receives exactly one tag.

use serde::{Deserialize, Serialize};

use super::types::AccountType;

/// Line item an account is presented under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IfrsTag {
    /// IAS 7 cash and cash equivalents.
    CashAndCashEquivalents,
    /// Trade and other receivables.
    TradeReceivables,
    /// IAS 2 inventories.
    Inventories,
    /// IAS 16 property, plant and equipment.
    PropertyPlantAndEquipment,
    /// IAS 38 intangible assets.
    IntangibleAssets,
    /// Fallback for assets.
    OtherAssets,
    /// Trade and other payables.
    TradePayables,
    /// Loans and borrowings.
    Borrowings,
    /// Current tax liabilities.
    TaxLiabilities,
    /// Fallback for liabilities.
    OtherLiabilities,
    /// Issued capital.
    ShareCapital,
    /// Retained earnings.
    RetainedEarnings,
    /// Fallback for equity.
    OtherEquity,
    /// IFRS 15 revenue from contracts with customers; fallback for revenue.
    Revenue,
    /// Finance income.
    FinanceIncome,
    /// Other operating income.
    OtherIncome,
    /// Cost of sales.
    CostOfSales,
    /// Employee benefits expense.
    EmployeeBenefits,
    /// Depreciation and amortisation.
    DepreciationAndAmortisation,
    /// Finance costs.
    FinanceCosts,
    /// Fallback for expenses.
    OtherExpenses,
}

const MAPPING: &[(AccountType, &str, IfrsTag)] = &[
    (AccountType::Asset, "cash", IfrsTag::CashAndCashEquivalents),
    (AccountType::Asset, "bank", IfrsTag::CashAndCashEquivalents),
    (AccountType::Asset, "receivable", IfrsTag::TradeReceivables),
    (AccountType::Asset, "inventory", IfrsTag::Inventories),
    (AccountType::Asset, "work_in_progress", IfrsTag::Inventories),
    (AccountType::Asset, "fixed_asset", IfrsTag::PropertyPlantAndEquipment),
    (AccountType::Asset, "intangible", IfrsTag::IntangibleAssets),
    (AccountType::Liability, "payable", IfrsTag::TradePayables),
    (AccountType::Liability, "loan", IfrsTag::Borrowings),
    (AccountType::Liability, "tax", IfrsTag::TaxLiabilities),
    (AccountType::Equity, "capital", IfrsTag::ShareCapital),
    (AccountType::Equity, "retained_earnings", IfrsTag::RetainedEarnings),
    (AccountType::Revenue, "sales", IfrsTag::Revenue),
    (AccountType::Revenue, "interest", IfrsTag::FinanceIncome),
    (AccountType::Revenue, "other_income", IfrsTag::OtherIncome),
    (AccountType::Expense, "cogs", IfrsTag::CostOfSales),
    (AccountType::Expense, "payroll", IfrsTag::EmployeeBenefits),
    (AccountType::Expense, "depreciation", IfrsTag::DepreciationAndAmortisation),
    (AccountType::Expense, "interest", IfrsTag::FinanceCosts),
    (AccountType::Expense, "bank_charges", IfrsTag::FinanceCosts),
];

/// Tag used when the category is not in the table.
#[must_use]
pub const fn default_tag(account_type: AccountType) -> IfrsTag {
    match account_type {
        AccountType::Asset => IfrsTag::OtherAssets,
        AccountType::Liability => IfrsTag::OtherLiabilities,
        AccountType::Equity => IfrsTag::OtherEquity,
        AccountType::Revenue => IfrsTag::Revenue,
        AccountType::Expense => IfrsTag::OtherExpenses,
    }
}

/// Maps an account type and category to its presentation tag.
///
/// Categories are compared case-insensitively after trimming.
#[must_use]
pub fn ifrs_tag(account_type: AccountType, category: &str) -> IfrsTag {
    let category = category.trim().to_lowercase();
    MAPPING
        .iter()
        .find(|(ty, cat, _)| *ty == account_type && *cat == category)
        .map_or_else(|| default_tag(account_type), |(_, _, tag)| *tag)
}
