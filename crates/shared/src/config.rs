//! Engine configuration management.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::RoundingPolicy;

/// Engine configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    /// Ledger posting configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Reconciliation configuration.
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    /// Cost-attribution configuration.
    #[serde(default)]
    pub cogs: CogsConfig,
    /// Balance read cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Ledger posting configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Fractional digits accepted on leg amounts.
    #[serde(default = "default_scale")]
    pub scale: u32,
    /// Rounding policy for every derived amount.
    #[serde(default)]
    pub rounding: RoundingPolicy,
    /// Group accounts never accept direct postings.
    #[serde(default = "default_true")]
    pub strict_group_posting: bool,
    /// Allow a child account to have a different type than its parent.
    #[serde(default)]
    pub allow_cross_type_parenting: bool,
    /// Currency assigned to accounts created without one.
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
}

fn default_scale() -> u32 {
    4
}

fn default_true() -> bool {
    true
}

fn default_base_currency() -> String {
    "USD".to_string()
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            scale: default_scale(),
            rounding: RoundingPolicy::default(),
            strict_group_posting: true,
            allow_cross_type_parenting: false,
            base_currency: default_base_currency(),
        }
    }
}

/// Reconciliation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconciliationConfig {
    /// Maximum difference between a statement amount and a ledger amount
    /// for a match to be accepted.
    #[serde(default)]
    pub match_tolerance: Decimal,
    /// Maximum remaining difference for a run to complete.
    #[serde(default)]
    pub completion_tolerance: Decimal,
    /// Days either side of the statement line date searched by auto-match.
    #[serde(default = "default_date_window_days")]
    pub date_window_days: i64,
    /// Offset account codes per adjustment category.
    #[serde(default)]
    pub offset_accounts: OffsetAccounts,
    /// Keyword rules used to classify statement lines by cash-flow activity.
    #[serde(default = "default_classification_rules")]
    pub classification_rules: Vec<ClassificationRule>,
}

fn default_date_window_days() -> i64 {
    3
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            match_tolerance: Decimal::ZERO,
            completion_tolerance: Decimal::ZERO,
            date_window_days: default_date_window_days(),
            offset_accounts: OffsetAccounts::default(),
            classification_rules: default_classification_rules(),
        }
    }
}

/// Account codes that receive the other leg of a reconciliation adjustment.
#[derive(Debug, Clone, Deserialize)]
pub struct OffsetAccounts {
    /// Bank charges and fees.
    #[serde(default = "default_bank_charge_account")]
    pub bank_charge: String,
    /// Interest credited by the bank.
    #[serde(default = "default_interest_income_account")]
    pub interest_income: String,
    /// Interest charged by the bank.
    #[serde(default = "default_interest_expense_account")]
    pub interest_expense: String,
    /// Taxes withheld or charged (VAT, withholding).
    #[serde(default = "default_tax_account")]
    pub tax: String,
    /// Anything else.
    #[serde(default = "default_other_account")]
    pub other: String,
}

fn default_bank_charge_account() -> String {
    "6100".to_string()
}

fn default_interest_income_account() -> String {
    "4200".to_string()
}

fn default_interest_expense_account() -> String {
    "6200".to_string()
}

fn default_tax_account() -> String {
    "2200".to_string()
}

fn default_other_account() -> String {
    "6900".to_string()
}

impl Default for OffsetAccounts {
    fn default() -> Self {
        Self {
            bank_charge: default_bank_charge_account(),
            interest_income: default_interest_income_account(),
            interest_expense: default_interest_expense_account(),
            tax: default_tax_account(),
            other: default_other_account(),
        }
    }
}

/// Cash-flow activity assigned to a statement line.
///
/// Assigned by keyword heuristics; a reporting aid, not an authoritative
/// accounting classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CashFlowClass {
    /// Day-to-day trading activity.
    Operating,
    /// Purchase or disposal of long-lived assets.
    Investing,
    /// Borrowing, repayment, equity and dividends.
    Financing,
    /// No rule matched.
    Unclassified,
}

/// Keyword rule: a description containing `keyword` (case-insensitive)
/// is classified as `class`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClassificationRule {
    /// Keyword searched for in the statement description.
    pub keyword: String,
    /// Class assigned on match.
    pub class: CashFlowClass,
}

impl ClassificationRule {
    fn new(keyword: &str, class: CashFlowClass) -> Self {
        Self {
            keyword: keyword.to_string(),
            class,
        }
    }
}

fn default_classification_rules() -> Vec<ClassificationRule> {
    vec![
        ClassificationRule::new("loan", CashFlowClass::Financing),
        ClassificationRule::new("dividend", CashFlowClass::Financing),
        ClassificationRule::new("capital", CashFlowClass::Financing),
        ClassificationRule::new("equipment", CashFlowClass::Investing),
        ClassificationRule::new("asset", CashFlowClass::Investing),
        ClassificationRule::new("investment", CashFlowClass::Investing),
        ClassificationRule::new("salary", CashFlowClass::Operating),
        ClassificationRule::new("supplier", CashFlowClass::Operating),
        ClassificationRule::new("customer", CashFlowClass::Operating),
        ClassificationRule::new("fee", CashFlowClass::Operating),
        ClassificationRule::new("interest", CashFlowClass::Operating),
    ]
}

/// Cost-attribution configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CogsConfig {
    /// Account debited with the cost of goods sold.
    #[serde(default = "default_cogs_account")]
    pub cogs_account_code: String,
    /// Inventory (or WIP) account credited when goods are sold.
    #[serde(default = "default_inventory_account")]
    pub inventory_account_code: String,
}

fn default_cogs_account() -> String {
    "5000".to_string()
}

fn default_inventory_account() -> String {
    "1300".to_string()
}

impl Default for CogsConfig {
    fn default() -> Self {
        Self {
            cogs_account_code: default_cogs_account(),
            inventory_account_code: default_inventory_account(),
        }
    }
}

/// Balance read cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached as-of balance reads.
    #[serde(default = "default_cache_capacity")]
    pub balance_cache_capacity: u64,
    /// Time-to-live for cached reads, in seconds.
    #[serde(default = "default_cache_ttl")]
    pub balance_cache_ttl_secs: u64,
}

fn default_cache_capacity() -> u64 {
    10_000
}

fn default_cache_ttl() -> u64 {
    300 // 5 minutes
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            balance_cache_capacity: default_cache_capacity(),
            balance_cache_ttl_secs: default_cache_ttl(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_filter() -> String {
    "tally=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}

impl EngineConfig {
    /// Loads configuration from `.env`, config files and the environment.
    ///
    /// Sources, later ones overriding earlier ones:
    /// `config/default`, `config/{RUN_MODE}`, then `TALLY__SECTION__KEY`
    /// environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("TALLY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
