//! Account registry: chart-of-accounts tree, normal balances and rollups.

pub mod balance;
pub mod chart;
pub mod error;
pub mod ifrs;
pub mod types;

pub use balance::AccountTotals;
pub use chart::ChartOfAccounts;
pub use error::AccountError;
pub use ifrs::{IfrsTag, ifrs_tag};
pub use types::{Account, AccountType, CreateAccountInput, HierarchyRules, NormalBalance};
