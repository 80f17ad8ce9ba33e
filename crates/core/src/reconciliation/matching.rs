//! Statement-to-ledger matching and narrative classification.

use rust_decimal::Decimal;
use tally_shared::config::{CashFlowClass, ClassificationRule};

use super::types::StatementLine;
use crate::accounts::NormalBalance;
use crate::ledger::JournalLine;

/// Tolerances used when pairing statement lines with ledger lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchRules {
    /// Maximum absolute amount difference for a pairing to count as a match.
    pub match_tolerance: Decimal,
    /// Days either side of the statement date searched by auto-match.
    pub date_window_days: i64,
}

impl Default for MatchRules {
    fn default() -> Self {
        Self {
            match_tolerance: Decimal::ZERO,
            date_window_days: 3,
        }
    }
}

/// Picks the ledger line an unpaired statement line should match.
///
/// Candidates must be within the date window and within tolerance of the
/// statement amount, measured as the line's effect on the account. Ties
/// are broken by the smallest absolute date difference, then a ledger date
/// not after the statement date, then posting order.
#[must_use]
pub fn best_candidate<'a>(
    statement: &StatementLine,
    candidates: &[&'a JournalLine],
    normal: NormalBalance,
    rules: MatchRules,
) -> Option<&'a JournalLine> {
    candidates
        .iter()
        .copied()
        .filter(|line| (line.date - statement.date).num_days().abs() <= rules.date_window_days)
        .filter(|line| (line.balance_effect(normal) - statement.amount).abs() <= rules.match_tolerance)
        .min_by_key(|line| {
            (
                (line.date - statement.date).num_days().abs(),
                line.date > statement.date,
                line.sequence,
            )
        })
}

/// Classifies a statement narrative with the first matching keyword rule.
///
/// A reporting heuristic; the result is not an accounting classification.
#[must_use]
pub fn classify(description: &str, rules: &[ClassificationRule]) -> CashFlowClass {
    let haystack = description.to_lowercase();
    rules
        .iter()
        .find(|rule| haystack.contains(&rule.keyword.to_lowercase()))
        .map_or(CashFlowClass::Unclassified, |rule| rule.class)
}
