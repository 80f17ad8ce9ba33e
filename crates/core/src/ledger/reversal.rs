//! Reversing-line generation.
//!
//! A reversal never deletes history: it is a new transaction whose lines
//! swap debit and credit relative to the original, dated on the original
//! economic date so as-of balances after that date return to their prior
//! values.

use rust_decimal::Decimal;
use tally_shared::types::{JournalEntryId, TransactionId};

use super::entry::JournalLine;
use super::types::Origin;

/// Stateless service for creating reversing lines.
pub struct ReversalService;

impl ReversalService {
    /// Creates reversing lines by swapping debits and credits.
    ///
    /// Each reversing line points back at its original through
    /// `reversal_of`, keeps the account, date and branch, and prefixes the
    /// description with "Reversal: ".
    #[must_use]
    pub fn reversing_lines(original: &[&JournalLine], transaction_id: TransactionId) -> Vec<JournalLine> {
        original
            .iter()
            .map(|line| JournalLine {
                id: JournalEntryId::new(),
                transaction_id,
                account_id: line.account_id,
                date: line.date,
                debit: line.credit,
                credit: line.debit,
                description: Some(format!(
                    "Reversal: {}",
                    line.description.clone().unwrap_or_default()
                )),
                origin: Origin::Reversal,
                branch_id: line.branch_id,
                reversal_of: Some(line.id),
                reversed: false,
                sequence: 0,
            })
            .collect()
    }

    /// Returns true if the lines balance. Always true for posted transactions.
    #[must_use]
    pub fn is_balanced(lines: &[JournalLine]) -> bool {
        let total_debit: Decimal = lines.iter().map(|l| l.debit).sum();
        let total_credit: Decimal = lines.iter().map(|l| l.credit).sum();
        total_debit == total_credit
    }
}
