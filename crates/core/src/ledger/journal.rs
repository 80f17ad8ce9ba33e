//! The journal: posted transactions, their lines, and the indexes used on
//! the posting and reporting hot paths.
//!
//! Posting is split in two phases. `prepare_*` validates against the
//! current state and builds the new rows without touching anything.
//! [`Journal::commit`] then applies a prepared posting and cannot fail, so a
//! caller holding one write guard gets all-or-nothing semantics.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tally_shared::types::{AccountId, Currency, DateRange, JournalEntryId, TransactionId};

use super::entry::JournalLine;
use super::error::LedgerError;
use super::reversal::ReversalService;
use super::transaction::Transaction;
use super::types::{Direction, LegAllocation, LegInput, Origin, PostingRules, TransactionHeader, TransactionStatus};
use super::validation::{validate_amounts, validate_leg_count};
use crate::accounts::{AccountTotals, ChartOfAccounts};

/// A validated posting ready to commit.
#[derive(Debug, Clone)]
pub struct PreparedPosting {
    /// Header row, status `Draft` until committed.
    pub transaction: Transaction,
    /// Lines in leg order.
    pub lines: Vec<JournalLine>,
    /// Dimension splits per line, aligned with `lines`.
    pub allocations: Vec<Vec<LegAllocation>>,
}

/// Posted transactions and lines with their access paths.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    transactions: HashMap<TransactionId, Transaction>,
    lines: HashMap<JournalEntryId, JournalLine>,
    by_transaction: HashMap<TransactionId, Vec<JournalEntryId>>,
    by_account: HashMap<AccountId, Vec<JournalEntryId>>,
    by_idempotency_key: HashMap<String, TransactionId>,
    reversals: HashMap<TransactionId, TransactionId>,
    next_sequence: u64,
}

impl Journal {
    /// Creates an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a journal and its indexes from stored rows.
    #[must_use]
    pub fn from_parts(
        transactions: impl IntoIterator<Item = Transaction>,
        lines: impl IntoIterator<Item = JournalLine>,
    ) -> Self {
        let mut journal = Self::new();
        for tx in transactions {
            journal.index_transaction(&tx);
            journal.next_sequence = journal.next_sequence.max(tx.sequence + 1);
            journal.transactions.insert(tx.id, tx);
        }
        let mut lines: Vec<JournalLine> = lines.into_iter().collect();
        lines.sort_by_key(|l| l.sequence);
        for line in lines {
            journal.next_sequence = journal.next_sequence.max(line.sequence + 1);
            journal.index_line(&line);
            journal.lines.insert(line.id, line);
        }
        journal
    }

    /// Number of transactions.
    #[must_use]
    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    /// Looks up a transaction.
    #[must_use]
    pub fn transaction(&self, id: TransactionId) -> Option<&Transaction> {
        self.transactions.get(&id)
    }

    /// Transaction previously posted with this idempotency key.
    #[must_use]
    pub fn find_by_idempotency_key(&self, key: &str) -> Option<&Transaction> {
        self.by_idempotency_key
            .get(key)
            .and_then(|id| self.transactions.get(id))
    }

    /// Transaction that reversed `id`, if any.
    #[must_use]
    pub fn reversal_for(&self, id: TransactionId) -> Option<TransactionId> {
        self.reversals.get(&id).copied()
    }

    /// Looks up a line.
    #[must_use]
    pub fn line(&self, id: JournalEntryId) -> Option<&JournalLine> {
        self.lines.get(&id)
    }

    /// All legs of a transaction in posting order.
    #[must_use]
    pub fn legs_for(&self, id: TransactionId) -> Vec<&JournalLine> {
        self.by_transaction
            .get(&id)
            .map(|ids| ids.iter().filter_map(|l| self.lines.get(l)).collect())
            .unwrap_or_default()
    }

    /// Lines posted directly to an account, optionally limited to a date
    /// range, in posting order.
    #[must_use]
    pub fn lines_for_account(&self, account_id: AccountId, range: Option<DateRange>) -> Vec<&JournalLine> {
        self.by_account
            .get(&account_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|l| self.lines.get(l))
                    .filter(|l| range.is_none_or(|r| r.contains(l.date)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every line, in posting order.
    #[must_use]
    pub fn lines(&self) -> Vec<&JournalLine> {
        let mut all: Vec<&JournalLine> = self.lines.values().collect();
        all.sort_by_key(|l| l.sequence);
        all
    }

    /// Every transaction, in posting order.
    #[must_use]
    pub fn transactions(&self) -> Vec<&Transaction> {
        let mut all: Vec<&Transaction> = self.transactions.values().collect();
        all.sort_by_key(|t| t.sequence);
        all
    }

    /// Validates a posting request.
    ///
    /// Order: leg count, account resolution (first missing id), account
    /// state and currency, amounts and balance.
    pub fn prepare_posting(
        &self,
        chart: &ChartOfAccounts,
        header: TransactionHeader,
        legs: Vec<LegInput>,
        rules: PostingRules,
        now: DateTime<Utc>,
    ) -> Result<PreparedPosting, LedgerError> {
        validate_leg_count(&legs)?;

        let accounts = legs
            .iter()
            .map(|leg| {
                chart
                    .get(leg.account_id)
                    .ok_or(LedgerError::AccountNotFound(leg.account_id))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut currency: Option<Currency> = None;
        for account in &accounts {
            if !account.is_active {
                return Err(LedgerError::AccountInactive(account.id));
            }
            if rules.strict_group_posting && account.is_group {
                return Err(LedgerError::GroupAccountPosting(account.id));
            }
            match currency {
                None => currency = Some(account.currency),
                Some(expected) if expected != account.currency => {
                    return Err(LedgerError::CurrencyMismatch {
                        account_id: account.id,
                        expected,
                        found: account.currency,
                    });
                }
                Some(_) => {}
            }
        }

        let totals = validate_amounts(&legs, rules.scale)?;

        let transaction = Transaction {
            id: TransactionId::new(),
            date: header.date,
            particulars: header.particulars,
            origin: header.origin,
            reference: header.reference,
            branch_id: header.branch_id,
            idempotency_key: header.idempotency_key,
            status: TransactionStatus::Draft,
            total_amount: totals.total_debit,
            reversal_of: None,
            reversed_by: None,
            prepared_at: now,
            posted_at: None,
            sequence: 0,
        };

        let mut lines = Vec::with_capacity(legs.len());
        let mut allocations = Vec::with_capacity(legs.len());
        for leg in legs {
            let (debit, credit) = match leg.direction {
                Direction::Debit => (leg.amount, Decimal::ZERO),
                Direction::Credit => (Decimal::ZERO, leg.amount),
            };
            lines.push(JournalLine {
                id: JournalEntryId::new(),
                transaction_id: transaction.id,
                account_id: leg.account_id,
                date: transaction.date,
                debit,
                credit,
                description: leg.description,
                origin: transaction.origin,
                branch_id: transaction.branch_id,
                reversal_of: None,
                reversed: false,
                sequence: 0,
            });
            allocations.push(leg.allocations);
        }

        Ok(PreparedPosting {
            transaction,
            lines,
            allocations,
        })
    }

    /// Validates a reversal request and builds the compensating posting.
    pub fn prepare_reversal(
        &self,
        transaction_id: TransactionId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<PreparedPosting, LedgerError> {
        if reason.trim().is_empty() {
            return Err(LedgerError::ReversalReasonRequired);
        }
        let original = self
            .transactions
            .get(&transaction_id)
            .ok_or(LedgerError::TransactionNotFound(transaction_id))?;
        if let Some(reversal_id) = self.reversal_for(transaction_id) {
            return Err(LedgerError::AlreadyReversed {
                transaction_id,
                reversal_id,
            });
        }
        if original.is_reversal() {
            return Err(LedgerError::CannotReverseReversal(transaction_id));
        }

        let transaction = Transaction {
            id: TransactionId::new(),
            date: original.date,
            particulars: format!("Reversal of {}: {}", original.particulars, reason.trim()),
            origin: Origin::Reversal,
            reference: original.reference.clone(),
            branch_id: original.branch_id,
            idempotency_key: None,
            status: TransactionStatus::Draft,
            total_amount: original.total_amount,
            reversal_of: Some(transaction_id),
            reversed_by: None,
            prepared_at: now,
            posted_at: None,
            sequence: 0,
        };
        let lines = ReversalService::reversing_lines(&self.legs_for(transaction_id), transaction.id);
        let allocations = vec![Vec::new(); lines.len()];

        Ok(PreparedPosting {
            transaction,
            lines,
            allocations,
        })
    }

    /// Commits a prepared posting and updates the chart's cached totals.
    ///
    /// Must be called under the same write guard as the `prepare_*` call
    /// that produced `posting`.
    pub fn commit(
        &mut self,
        chart: &mut ChartOfAccounts,
        posting: PreparedPosting,
        now: DateTime<Utc>,
    ) -> Transaction {
        let PreparedPosting {
            mut transaction,
            lines,
            ..
        } = posting;

        transaction.status = TransactionStatus::Posted;
        transaction.posted_at = Some(now);
        transaction.sequence = self.bump_sequence();

        for mut line in lines {
            line.sequence = self.bump_sequence();
            chart.apply_movement(line.account_id, line.debit, line.credit);
            self.index_line(&line);
            self.lines.insert(line.id, line);
        }

        if let Some(original_id) = transaction.reversal_of {
            if let Some(original) = self.transactions.get_mut(&original_id) {
                original.status = TransactionStatus::Reversed;
                original.reversed_by = Some(transaction.id);
            }
            let original_lines = self.by_transaction.get(&original_id).cloned().unwrap_or_default();
            for line_id in original_lines {
                if let Some(line) = self.lines.get_mut(&line_id) {
                    line.reversed = true;
                }
            }
        }

        self.index_transaction(&transaction);
        self.transactions.insert(transaction.id, transaction.clone());
        transaction
    }

    /// Balance of an account as of a date, computed from posted lines only.
    ///
    /// Group accounts include every descendant. Each account contributes
    /// its opening balance plus its lines dated on or before `as_of`.
    pub fn balance_as_of(
        &self,
        chart: &ChartOfAccounts,
        account_id: AccountId,
        as_of: NaiveDate,
    ) -> Result<Decimal, LedgerError> {
        chart
            .get(account_id)
            .ok_or(LedgerError::AccountNotFound(account_id))?;

        let mut balance = Decimal::ZERO;
        for id in chart.subtree(account_id) {
            let Some(account) = chart.get(id) else {
                continue;
            };
            let normal = account.normal_balance();
            balance += account.opening_balance;
            balance += self
                .lines_for_account(id, None)
                .into_iter()
                .filter(|l| l.date <= as_of)
                .map(|l| l.balance_effect(normal))
                .sum::<Decimal>();
        }
        Ok(balance)
    }

    /// Direct totals of one account replayed from its posted lines.
    pub fn replayed_totals(&self, chart: &ChartOfAccounts, account_id: AccountId) -> Result<AccountTotals, LedgerError> {
        let account = chart
            .get(account_id)
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        let normal = account.normal_balance();
        let mut totals = AccountTotals::opening(account.opening_balance);
        for line in self.lines_for_account(account_id, None) {
            totals.apply(normal, line.debit, line.credit);
        }
        Ok(totals)
    }

    /// Accounts whose cached direct totals differ from a replay of their lines.
    #[must_use]
    pub fn balance_drift(&self, chart: &ChartOfAccounts) -> Vec<LedgerError> {
        chart
            .accounts()
            .into_iter()
            .filter_map(|account| {
                let replayed = self.replayed_totals(chart, account.id).ok()?;
                (replayed != account.direct).then(|| LedgerError::BalanceDrift {
                    account_id: account.id,
                    cached: account.direct.balance,
                    replayed: replayed.balance,
                })
            })
            .collect()
    }

    /// Rebuilds every cached total in `chart` by replaying posted lines.
    pub fn replay_into(&self, chart: &mut ChartOfAccounts) {
        chart.reset_movements();
        for line in self.lines() {
            chart.apply_direct(line.account_id, line.debit, line.credit);
        }
        chart.rollup_all();
    }

    fn bump_sequence(&mut self) -> u64 {
        let seq = self.next_sequence;
        self.next_sequence += 1;
        seq
    }

    fn index_transaction(&mut self, tx: &Transaction) {
        if let Some(key) = &tx.idempotency_key {
            self.by_idempotency_key.insert(key.clone(), tx.id);
        }
        if let Some(original) = tx.reversal_of {
            self.reversals.insert(original, tx.id);
        }
    }

    fn index_line(&mut self, line: &JournalLine) {
        self.by_transaction
            .entry(line.transaction_id)
            .or_default()
            .push(line.id);
        self.by_account.entry(line.account_id).or_default().push(line.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::{AccountType, CreateAccountInput, HierarchyRules};
    use rust_decimal_macros::dec;

    struct Fixture {
        chart: ChartOfAccounts,
        journal: Journal,
        ar: AccountId,
        revenue: AccountId,
        receivables_group: AccountId,
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, d).unwrap()
    }

    fn fixture() -> Fixture {
        let mut chart = ChartOfAccounts::new();
        let rules = HierarchyRules::default();
        let now = Utc::now();
        let group = chart
            .create(CreateAccountInput::new("1200", "Receivables", AccountType::Asset), rules, Currency::Usd, now)
            .unwrap();
        let ar = chart
            .create(
                CreateAccountInput::new("1210", "Trade receivables", AccountType::Asset).under(group.id),
                rules,
                Currency::Usd,
                now,
            )
            .unwrap();
        let revenue = chart
            .create(CreateAccountInput::new("4000", "Sales", AccountType::Revenue), rules, Currency::Usd, now)
            .unwrap();
        Fixture {
            chart,
            journal: Journal::new(),
            ar: ar.id,
            revenue: revenue.id,
            receivables_group: group.id,
        }
    }

    fn sale(f: &Fixture, amount: Decimal, day: u32) -> PreparedPosting {
        f.journal
            .prepare_posting(
                &f.chart,
                TransactionHeader::new(date(day), "Invoice", Origin::Sales),
                vec![LegInput::debit(f.ar, amount), LegInput::credit(f.revenue, amount)],
                PostingRules::default(),
                Utc::now(),
            )
            .unwrap()
    }

    #[test]
    fn test_post_updates_balances_and_rollup() {
        let mut f = fixture();
        let prepared = sale(&f, dec!(1000), 10);
        let tx = f.journal.commit(&mut f.chart, prepared, Utc::now());

        assert_eq!(tx.status, TransactionStatus::Posted);
        assert_eq!(tx.total_amount, dec!(1000));
        assert_eq!(f.chart.get(f.ar).unwrap().totals.balance, dec!(1000));
        assert_eq!(f.chart.get(f.revenue).unwrap().totals.balance, dec!(1000));
        assert_eq!(f.chart.get(f.receivables_group).unwrap().totals.balance, dec!(1000));
        assert_eq!(f.journal.legs_for(tx.id).len(), 2);
    }

    #[test]
    fn test_first_missing_account_reported_before_balance() {
        let f = fixture();
        let missing = AccountId::new();
        let err = f
            .journal
            .prepare_posting(
                &f.chart,
                TransactionHeader::new(date(1), "Bad", Origin::Manual),
                vec![LegInput::debit(missing, dec!(10)), LegInput::credit(f.revenue, dec!(5))],
                PostingRules::default(),
                Utc::now(),
            )
            .unwrap_err();
        assert_eq!(err, LedgerError::AccountNotFound(missing));
    }

    #[test]
    fn test_group_account_rejects_posting() {
        let f = fixture();
        let err = f
            .journal
            .prepare_posting(
                &f.chart,
                TransactionHeader::new(date(1), "Bad", Origin::Manual),
                vec![
                    LegInput::debit(f.receivables_group, dec!(10)),
                    LegInput::credit(f.revenue, dec!(10)),
                ],
                PostingRules::default(),
                Utc::now(),
            )
            .unwrap_err();
        assert_eq!(err, LedgerError::GroupAccountPosting(f.receivables_group));
    }

    #[test]
    fn test_reversal_restores_balances() {
        let mut f = fixture();
        let prepared = sale(&f, dec!(1000), 10);
        let tx = f.journal.commit(&mut f.chart, prepared, Utc::now());

        let reversal = f.journal.prepare_reversal(tx.id, "customer cancelled", Utc::now()).unwrap();
        assert_eq!(reversal.transaction.date, tx.date);
        let rev = f.journal.commit(&mut f.chart, reversal, Utc::now());

        assert_eq!(f.chart.get(f.ar).unwrap().totals.balance, Decimal::ZERO);
        assert_eq!(f.chart.get(f.revenue).unwrap().totals.balance, Decimal::ZERO);
        assert_eq!(f.chart.get(f.receivables_group).unwrap().totals.balance, Decimal::ZERO);

        let original = f.journal.transaction(tx.id).unwrap();
        assert_eq!(original.status, TransactionStatus::Reversed);
        assert_eq!(original.reversed_by, Some(rev.id));
        assert!(f.journal.legs_for(tx.id).iter().all(|l| l.reversed));
        assert_eq!(f.journal.reversal_for(tx.id), Some(rev.id));
    }

    #[test]
    fn test_second_reversal_conflicts() {
        let mut f = fixture();
        let prepared = sale(&f, dec!(50), 3);
        let tx = f.journal.commit(&mut f.chart, prepared, Utc::now());
        let reversal = f.journal.prepare_reversal(tx.id, "dup", Utc::now()).unwrap();
        let rev = f.journal.commit(&mut f.chart, reversal, Utc::now());

        let err = f.journal.prepare_reversal(tx.id, "again", Utc::now()).unwrap_err();
        assert_eq!(
            err,
            LedgerError::AlreadyReversed {
                transaction_id: tx.id,
                reversal_id: rev.id,
            }
        );
        assert_eq!(
            f.journal.prepare_reversal(rev.id, "undo", Utc::now()).unwrap_err(),
            LedgerError::CannotReverseReversal(rev.id)
        );
    }

    #[test]
    fn test_reversal_requires_reason() {
        let mut f = fixture();
        let prepared = sale(&f, dec!(50), 3);
        let tx = f.journal.commit(&mut f.chart, prepared, Utc::now());
        assert_eq!(
            f.journal.prepare_reversal(tx.id, "  ", Utc::now()).unwrap_err(),
            LedgerError::ReversalReasonRequired
        );
    }

    #[test]
    fn test_balance_as_of_uses_economic_date() {
        let mut f = fixture();
        let first = sale(&f, dec!(100), 5);
        f.journal.commit(&mut f.chart, first, Utc::now());
        let second = sale(&f, dec!(40), 20);
        f.journal.commit(&mut f.chart, second, Utc::now());

        assert_eq!(f.journal.balance_as_of(&f.chart, f.ar, date(4)).unwrap(), Decimal::ZERO);
        assert_eq!(f.journal.balance_as_of(&f.chart, f.ar, date(5)).unwrap(), dec!(100));
        assert_eq!(f.journal.balance_as_of(&f.chart, f.ar, date(28)).unwrap(), dec!(140));
        assert_eq!(
            f.journal.balance_as_of(&f.chart, f.receivables_group, date(28)).unwrap(),
            dec!(140)
        );
    }

    #[test]
    fn test_replay_matches_incremental_totals() {
        let mut f = fixture();
        for day in 1..=5 {
            let prepared = sale(&f, Decimal::from(day * 10), day);
            f.journal.commit(&mut f.chart, prepared, Utc::now());
        }
        assert!(f.journal.balance_drift(&f.chart).is_empty());

        let before = f.chart.get(f.receivables_group).unwrap().totals;
        let mut rebuilt = ChartOfAccounts::from_accounts(f.chart.accounts().into_iter().cloned()).unwrap();
        f.journal.replay_into(&mut rebuilt);
        assert_eq!(rebuilt.get(f.receivables_group).unwrap().totals, before);
    }

    #[test]
    fn test_from_parts_restores_indexes() {
        let mut f = fixture();
        let posting = f
            .journal
            .prepare_posting(
                &f.chart,
                TransactionHeader::new(date(1), "Invoice", Origin::Sales).with_idempotency_key("inv-1"),
                vec![LegInput::debit(f.ar, dec!(10)), LegInput::credit(f.revenue, dec!(10))],
                PostingRules::default(),
                Utc::now(),
            )
            .unwrap();
        let tx = f.journal.commit(&mut f.chart, posting, Utc::now());

        let restored = Journal::from_parts(
            f.journal.transactions().into_iter().cloned(),
            f.journal.lines().into_iter().cloned(),
        );
        assert_eq!(restored.find_by_idempotency_key("inv-1").map(|t| t.id), Some(tx.id));
        assert_eq!(restored.legs_for(tx.id).len(), 2);
        assert_eq!(restored.lines_for_account(f.ar, None).len(), 1);
    }
}
