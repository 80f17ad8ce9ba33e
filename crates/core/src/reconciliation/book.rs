//! Reconciliation runs, statement items and adjustments.
//!
//! Runs follow `Draft -> InProgress -> Completed | Discrepancy`. Matching
//! and adjustments mutate only this book; completion is split into a
//! [`CompletionPlan`] (validated, no side effects) and [`apply_completion`]
//! once the adjustment postings are committed to the ledger.
//!
//! [`apply_completion`]: ReconciliationBook::apply_completion

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tally_shared::config::ClassificationRule;
use tally_shared::types::{
    AccountId, AdjustmentId, DateRange, DimensionId, DimensionValueId, JournalEntryId, ReconciliationItemId,
    ReconciliationRunId, TransactionId,
};

use super::error::ReconciliationError;
use super::matching::{MatchRules, best_candidate, classify};
use super::types::{
    Adjustment, AdjustmentInput, CompletionPlan, ItemStatus, ReconciliationItem, ReconciliationRun, RunStatus,
    StartRunInput, StatementLine,
};
use crate::accounts::NormalBalance;
use crate::ledger::{Direction, JournalLine, LegInput, Origin, TransactionHeader};

/// Everything needed to pair one statement line.
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'a> {
    /// Normal side of the reconciled account.
    pub normal: NormalBalance,
    /// Posted lines on the reconciled account.
    pub account_lines: &'a [&'a JournalLine],
    /// Tolerances.
    pub rules: MatchRules,
    /// Cash-flow keyword rules.
    pub classification: &'a [ClassificationRule],
}

/// Reconciliation state with its access paths.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationBook {
    runs: HashMap<ReconciliationRunId, ReconciliationRun>,
    items: HashMap<ReconciliationItemId, ReconciliationItem>,
    items_by_run: HashMap<ReconciliationRunId, Vec<ReconciliationItemId>>,
    unresolved_by_run: HashMap<ReconciliationRunId, Vec<ReconciliationItemId>>,
    adjustments: HashMap<AdjustmentId, Adjustment>,
    adjustments_by_run: HashMap<ReconciliationRunId, Vec<AdjustmentId>>,
    matched_entries: HashMap<JournalEntryId, ReconciliationItemId>,
}

impl ReconciliationBook {
    /// Creates an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a book and its indexes from stored rows.
    #[must_use]
    pub fn from_parts(
        runs: impl IntoIterator<Item = ReconciliationRun>,
        items: impl IntoIterator<Item = ReconciliationItem>,
        adjustments: impl IntoIterator<Item = Adjustment>,
    ) -> Self {
        let mut book = Self::new();
        for run in runs {
            book.runs.insert(run.id, run);
        }
        let mut items: Vec<ReconciliationItem> = items.into_iter().collect();
        items.sort_by_key(|i| i.id);
        for item in items {
            book.insert_item(item);
        }
        let mut adjustments: Vec<Adjustment> = adjustments.into_iter().collect();
        adjustments.sort_by_key(|a| a.id);
        for adjustment in adjustments {
            book.adjustments_by_run
                .entry(adjustment.run_id)
                .or_default()
                .push(adjustment.id);
            book.adjustments.insert(adjustment.id, adjustment);
        }
        book
    }

    // ========== Reads ==========

    /// Looks up a run.
    #[must_use]
    pub fn run(&self, id: ReconciliationRunId) -> Option<&ReconciliationRun> {
        self.runs.get(&id)
    }

    /// Looks up a run, failing when absent.
    pub fn require_run(&self, id: ReconciliationRunId) -> Result<&ReconciliationRun, ReconciliationError> {
        self.runs.get(&id).ok_or(ReconciliationError::RunNotFound(id))
    }

    /// Every run, oldest first.
    #[must_use]
    pub fn runs(&self) -> Vec<&ReconciliationRun> {
        let mut all: Vec<&ReconciliationRun> = self.runs.values().collect();
        all.sort_by_key(|r| r.id);
        all
    }

    /// Runs for one account, oldest first.
    #[must_use]
    pub fn runs_for_account(&self, account_id: AccountId) -> Vec<&ReconciliationRun> {
        self.runs().into_iter().filter(|r| r.account_id == account_id).collect()
    }

    /// Looks up an item.
    #[must_use]
    pub fn item(&self, id: ReconciliationItemId) -> Option<&ReconciliationItem> {
        self.items.get(&id)
    }

    /// Every item, oldest first.
    #[must_use]
    pub fn all_items(&self) -> Vec<&ReconciliationItem> {
        let mut all: Vec<&ReconciliationItem> = self.items.values().collect();
        all.sort_by_key(|i| i.id);
        all
    }

    /// Items of a run in recording order.
    #[must_use]
    pub fn items_for(&self, run_id: ReconciliationRunId) -> Vec<&ReconciliationItem> {
        self.collect_items(self.items_by_run.get(&run_id))
    }

    /// Items of a run still blocking completion.
    #[must_use]
    pub fn unresolved_items(&self, run_id: ReconciliationRunId) -> Vec<&ReconciliationItem> {
        self.collect_items(self.unresolved_by_run.get(&run_id))
    }

    /// Adjustments of a run in recording order.
    #[must_use]
    pub fn adjustments_for(&self, run_id: ReconciliationRunId) -> Vec<&Adjustment> {
        self.adjustments_by_run
            .get(&run_id)
            .map(|ids| ids.iter().filter_map(|id| self.adjustments.get(id)).collect())
            .unwrap_or_default()
    }

    /// Every adjustment, oldest first.
    #[must_use]
    pub fn all_adjustments(&self) -> Vec<&Adjustment> {
        let mut all: Vec<&Adjustment> = self.adjustments.values().collect();
        all.sort_by_key(|a| a.id);
        all
    }

    /// Item holding a ledger line, if it has been paired.
    #[must_use]
    pub fn matched_by(&self, entry_id: JournalEntryId) -> Option<ReconciliationItemId> {
        self.matched_entries.get(&entry_id).copied()
    }

    /// Statement items of an account's runs dated inside `period`.
    #[must_use]
    pub fn items_in_period(&self, account_id: AccountId, period: DateRange) -> Vec<&ReconciliationItem> {
        self.all_items()
            .into_iter()
            .filter(|i| {
                self.runs.get(&i.run_id).is_some_and(|r| r.account_id == account_id) && period.contains(i.statement.date)
            })
            .collect()
    }

    /// Unposted adjustments of an account's runs closing inside `period`.
    #[must_use]
    pub fn pending_adjustments_in_period(&self, account_id: AccountId, period: DateRange) -> Vec<&Adjustment> {
        self.all_adjustments()
            .into_iter()
            .filter(|a| {
                !a.is_posted()
                    && self
                        .runs
                        .get(&a.run_id)
                        .is_some_and(|r| r.account_id == account_id && period.contains(r.statement_date))
            })
            .collect()
    }

    fn collect_items(&self, ids: Option<&Vec<ReconciliationItemId>>) -> Vec<&ReconciliationItem> {
        ids.map(|ids| ids.iter().filter_map(|id| self.items.get(id)).collect())
            .unwrap_or_default()
    }

    // ========== Mutations ==========

    /// Starts a run with `difference = statement_balance - book_balance`.
    pub fn start(&mut self, input: StartRunInput, book_balance: Decimal, now: DateTime<Utc>) -> ReconciliationRun {
        let start = input
            .period_start
            .filter(|s| *s <= input.statement_date)
            .unwrap_or(input.statement_date);
        let run = ReconciliationRun {
            id: ReconciliationRunId::new(),
            account_id: input.account_id,
            period: DateRange {
                start,
                end: input.statement_date,
            },
            statement_date: input.statement_date,
            statement_balance: input.statement_balance,
            book_balance,
            difference: input.statement_balance - book_balance,
            status: RunStatus::Draft,
            created_at: now,
            completed_at: None,
        };
        self.runs.insert(run.id, run.clone());
        run
    }

    /// Records a statement line, paired with `candidate` or auto-matched.
    ///
    /// A manual candidate whose amount differs beyond tolerance is kept as a
    /// `Variance` item. Auto-match never pairs a line already held by
    /// another item; when nothing qualifies the item stays `Unmatched`.
    pub fn match_line(
        &mut self,
        run_id: ReconciliationRunId,
        statement: StatementLine,
        candidate: Option<&JournalLine>,
        ctx: MatchContext<'_>,
        now: DateTime<Utc>,
    ) -> Result<ReconciliationItem, ReconciliationError> {
        let run = self.require_open(run_id)?;
        let account_id = run.account_id;

        let (paired, status) = match candidate {
            Some(line) => {
                if line.account_id != account_id {
                    return Err(ReconciliationError::EntryAccountMismatch {
                        entry_id: line.id,
                        account_id,
                    });
                }
                if let Some(item_id) = self.matched_by(line.id) {
                    return Err(ReconciliationError::EntryAlreadyMatched {
                        entry_id: line.id,
                        item_id,
                    });
                }
                let gap = (statement.amount - line.balance_effect(ctx.normal)).abs();
                let status = if gap <= ctx.rules.match_tolerance {
                    ItemStatus::Matched
                } else {
                    ItemStatus::Variance
                };
                (Some(line), status)
            }
            None => {
                let open: Vec<&JournalLine> = ctx
                    .account_lines
                    .iter()
                    .copied()
                    .filter(|l| l.account_id == account_id && !self.matched_entries.contains_key(&l.id))
                    .collect();
                match best_candidate(&statement, &open, ctx.normal, ctx.rules) {
                    Some(line) => (Some(line), ItemStatus::Matched),
                    None => (None, ItemStatus::Unmatched),
                }
            }
        };

        let ledger_amount = paired.map(|l| l.balance_effect(ctx.normal));
        let item = ReconciliationItem {
            id: ReconciliationItemId::new(),
            run_id,
            cash_flow_class: classify(&statement.description, ctx.classification),
            difference: statement.amount - ledger_amount.unwrap_or_default(),
            journal_entry_id: paired.map(|l| l.id),
            ledger_amount,
            status,
            adjustment_id: None,
            created_at: now,
            statement,
        };

        self.insert_item(item.clone());
        self.mark_in_progress(run_id);
        Ok(item)
    }

    /// Records a bank-initiated adjustment.
    ///
    /// The adjustment moves the run difference by the effect its posting
    /// will have on the reconciled account. The first unresolved item whose
    /// outstanding gap equals that effect is marked `Adjusted`.
    pub fn add_adjustment(
        &mut self,
        run_id: ReconciliationRunId,
        input: AdjustmentInput,
        normal: NormalBalance,
        now: DateTime<Utc>,
    ) -> Result<Adjustment, ReconciliationError> {
        self.require_open(run_id)?;
        if input.description.trim().is_empty() {
            return Err(ReconciliationError::DescriptionRequired);
        }
        if input.amount.is_zero() {
            return Err(ReconciliationError::ZeroAdjustment);
        }

        let mut adjustment = Adjustment {
            id: AdjustmentId::new(),
            run_id,
            description: input.description,
            amount: input.amount,
            category: input.category,
            dimension_value_id: input.dimension_value_id,
            item_id: None,
            transaction_id: None,
            created_at: now,
        };
        let effect = adjustment.account_effect(normal);

        adjustment.item_id = self
            .unresolved_items(run_id)
            .into_iter()
            .find(|i| i.difference == effect)
            .map(|i| i.id);

        if let Some(item_id) = adjustment.item_id {
            if let Some(item) = self.items.get_mut(&item_id) {
                item.status = ItemStatus::Adjusted;
                item.adjustment_id = Some(adjustment.id);
                item.difference = Decimal::ZERO;
            }
            if let Some(ids) = self.unresolved_by_run.get_mut(&run_id) {
                ids.retain(|id| *id != item_id);
            }
        }
        if let Some(run) = self.runs.get_mut(&run_id) {
            run.difference -= effect;
        }
        self.adjustments_by_run.entry(run_id).or_default().push(adjustment.id);
        self.adjustments.insert(adjustment.id, adjustment.clone());
        self.mark_in_progress(run_id);
        Ok(adjustment)
    }

    /// Checks whether a run may complete against the current ledger balance.
    ///
    /// `book_balance` is read from the ledger now and therefore already
    /// contains any adjustments posted by an earlier completion, so only the
    /// pending ones are projected on top of it:
    /// `difference = statement - (book + pending effects)`. The plan carries
    /// the projected balance so the caller can confirm it after posting.
    pub fn prepare_completion(
        &self,
        run_id: ReconciliationRunId,
        book_balance: Decimal,
        normal: NormalBalance,
        completion_tolerance: Decimal,
        force: bool,
    ) -> Result<CompletionPlan, ReconciliationError> {
        let run = self.require_run(run_id)?;
        if !run.status.is_open() {
            return Err(ReconciliationError::InvalidTransition {
                from: run.status,
                to: RunStatus::Completed,
            });
        }

        let pending_adjustments: Vec<Adjustment> = self
            .adjustments_for(run_id)
            .into_iter()
            .filter(|a| !a.is_posted())
            .cloned()
            .collect();
        let pending_effect: Decimal = pending_adjustments.iter().map(|a| a.account_effect(normal)).sum();
        let projected = book_balance + pending_effect;
        let difference = run.statement_balance - projected;
        let unresolved_count = self.unresolved_by_run.get(&run_id).map_or(0, Vec::len);
        let within_tolerance = difference.abs() <= completion_tolerance;

        if !force && (unresolved_count > 0 || !within_tolerance) {
            return Err(ReconciliationError::UnresolvedItems {
                count: unresolved_count,
                difference,
            });
        }

        Ok(CompletionPlan {
            run_id,
            statement_balance: run.statement_balance,
            book_balance: projected,
            difference,
            tolerance: completion_tolerance,
            status: if within_tolerance {
                RunStatus::Completed
            } else {
                RunStatus::Discrepancy
            },
            pending_adjustments,
            unresolved_count,
        })
    }

    /// Closes the run after the plan's adjustments were posted.
    pub fn apply_completion(
        &mut self,
        plan: CompletionPlan,
        postings: &[(AdjustmentId, TransactionId)],
        now: DateTime<Utc>,
    ) -> Option<ReconciliationRun> {
        for (adjustment_id, transaction_id) in postings {
            if let Some(adjustment) = self.adjustments.get_mut(adjustment_id) {
                adjustment.transaction_id = Some(*transaction_id);
            }
        }
        let run = self.runs.get_mut(&plan.run_id)?;
        run.book_balance = plan.book_balance;
        run.difference = plan.difference;
        run.status = plan.status;
        run.completed_at = Some(now);
        Some(run.clone())
    }

    /// Reopens a run closed with a discrepancy.
    pub fn reopen(&mut self, run_id: ReconciliationRunId) -> Result<ReconciliationRun, ReconciliationError> {
        let run = self
            .runs
            .get_mut(&run_id)
            .ok_or(ReconciliationError::RunNotFound(run_id))?;
        if run.status != RunStatus::Discrepancy {
            return Err(ReconciliationError::InvalidTransition {
                from: run.status,
                to: RunStatus::InProgress,
            });
        }
        run.status = RunStatus::InProgress;
        run.completed_at = None;
        Ok(run.clone())
    }

    fn require_open(&self, run_id: ReconciliationRunId) -> Result<&ReconciliationRun, ReconciliationError> {
        let run = self.require_run(run_id)?;
        if run.status.is_open() {
            Ok(run)
        } else {
            Err(ReconciliationError::InvalidTransition {
                from: run.status,
                to: RunStatus::InProgress,
            })
        }
    }

    fn mark_in_progress(&mut self, run_id: ReconciliationRunId) {
        if let Some(run) = self.runs.get_mut(&run_id)
            && run.status == RunStatus::Draft
        {
            run.status = RunStatus::InProgress;
        }
    }

    fn insert_item(&mut self, item: ReconciliationItem) {
        if let Some(entry_id) = item.journal_entry_id {
            self.matched_entries.insert(entry_id, item.id);
        }
        if item.is_unresolved() {
            self.unresolved_by_run.entry(item.run_id).or_default().push(item.id);
        }
        self.items_by_run.entry(item.run_id).or_default().push(item.id);
        self.items.insert(item.id, item);
    }
}

/// Builds the balanced posting for an adjustment.
///
/// The reconciled account takes the category's side (flipped for negative
/// amounts); the offset account takes the other. A dimension value, when
/// present, tags both legs at 100%.
#[must_use]
pub fn adjustment_posting(
    adjustment: &Adjustment,
    account_id: AccountId,
    offset_account_id: AccountId,
    date: NaiveDate,
    dimension: Option<(DimensionId, DimensionValueId)>,
) -> (TransactionHeader, Vec<LegInput>) {
    let amount = adjustment.amount.abs();
    let direction = adjustment.account_direction();
    let header = TransactionHeader::new(
        date,
        format!("Reconciliation adjustment: {}", adjustment.description),
        Origin::Reconciliation,
    )
    .with_reference(adjustment.category.as_str())
    .with_idempotency_key(format!("reconciliation:{}:{}", adjustment.run_id, adjustment.id));

    let mut account_leg = LegInput::new(account_id, amount, direction).with_description(adjustment.description.clone());
    let mut offset_leg = LegInput::new(offset_account_id, amount, direction.opposite())
        .with_description(adjustment.description.clone());
    if let Some((dimension_id, value_id)) = dimension {
        account_leg = account_leg.with_allocation(dimension_id, value_id, Decimal::ONE_HUNDRED);
        offset_leg = offset_leg.with_allocation(dimension_id, value_id, Decimal::ONE_HUNDRED);
    }

    let legs = match direction {
        Direction::Debit => vec![account_leg, offset_leg],
        Direction::Credit => vec![offset_leg, account_leg],
    };
    (header, legs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciliation::AdjustmentCategory;
    use rust_decimal_macros::dec;
    use tally_shared::EngineConfig;
    use tally_shared::config::CashFlowClass;
    use tally_shared::types::TransactionId;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, day).unwrap()
    }

    fn bank_line(account_id: AccountId, day: u32, debit: Decimal, credit: Decimal, sequence: u64) -> JournalLine {
        JournalLine {
            id: JournalEntryId::new(),
            transaction_id: TransactionId::new(),
            account_id,
            date: date(day),
            debit,
            credit,
            description: None,
            origin: Origin::Banking,
            branch_id: None,
            reversal_of: None,
            reversed: false,
            sequence,
        }
    }

    fn ctx<'a>(lines: &'a [&'a JournalLine], rules: &'a [ClassificationRule]) -> MatchContext<'a> {
        MatchContext {
            normal: NormalBalance::Debit,
            account_lines: lines,
            rules: MatchRules::default(),
            classification: rules,
        }
    }

    #[test]
    fn test_balanced_statement_completes_with_zero_difference() {
        let mut book = ReconciliationBook::new();
        let account = AccountId::new();
        let run = book.start(StartRunInput::new(account, date(30), dec!(10000)), dec!(10000), Utc::now());
        assert_eq!(run.status, RunStatus::Draft);
        assert_eq!(run.difference, Decimal::ZERO);

        let plan = book
            .prepare_completion(run.id, dec!(10000), NormalBalance::Debit, Decimal::ZERO, false)
            .unwrap();
        assert_eq!(plan.status, RunStatus::Completed);
        let closed = book.apply_completion(plan, &[], Utc::now()).unwrap();
        assert_eq!(closed.difference, Decimal::ZERO);
        assert_eq!(closed.status, RunStatus::Completed);
    }

    #[test]
    fn test_bank_fee_adjustment_closes_gap() {
        let rules = EngineConfig::default().reconciliation.classification_rules;
        let mut book = ReconciliationBook::new();
        let account = AccountId::new();
        let run = book.start(StartRunInput::new(account, date(30), dec!(9950)), dec!(10000), Utc::now());

        let fee = StatementLine::new(date(28), "Monthly bank fee", dec!(-50));
        let item = book.match_line(run.id, fee, None, ctx(&[], &rules), Utc::now()).unwrap();
        assert_eq!(item.status, ItemStatus::Unmatched);
        assert_eq!(item.cash_flow_class, CashFlowClass::Operating);
        assert_eq!(book.unresolved_items(run.id).len(), 1);

        let err = book
            .prepare_completion(run.id, dec!(10000), NormalBalance::Debit, Decimal::ZERO, false)
            .unwrap_err();
        assert_eq!(
            err,
            ReconciliationError::UnresolvedItems {
                count: 1,
                difference: dec!(-50),
            }
        );

        let adjustment = book
            .add_adjustment(
                run.id,
                AdjustmentInput::new("bank fee", dec!(50), AdjustmentCategory::BankCharge),
                NormalBalance::Debit,
                Utc::now(),
            )
            .unwrap();
        assert_eq!(adjustment.item_id, Some(item.id));
        assert!(book.unresolved_items(run.id).is_empty());
        assert_eq!(book.item(item.id).unwrap().status, ItemStatus::Adjusted);
        assert_eq!(book.run(run.id).unwrap().difference, Decimal::ZERO);

        let mut plan = book
            .prepare_completion(run.id, dec!(10000), NormalBalance::Debit, Decimal::ZERO, false)
            .unwrap();
        assert_eq!(plan.difference, Decimal::ZERO);
        assert_eq!(plan.book_balance, dec!(9950));
        assert_eq!(plan.pending_adjustments.len(), 1);
        assert!(plan.confirm(dec!(9950)));

        let closed = book
            .apply_completion(plan, &[(adjustment.id, TransactionId::new())], Utc::now())
            .unwrap();
        assert_eq!(closed.status, RunStatus::Completed);
        assert_eq!(closed.book_balance, closed.statement_balance);
        assert!(book.adjustments_for(run.id)[0].is_posted());
    }

    #[test]
    fn test_fee_with_statement_sign_does_not_close_gap() {
        let rules = EngineConfig::default().reconciliation.classification_rules;
        let mut book = ReconciliationBook::new();
        let account = AccountId::new();
        let run = book.start(StartRunInput::new(account, date(30), dec!(10050)), dec!(10000), Utc::now());
        let item = book
            .match_line(run.id, StatementLine::new(date(28), "Fee", dec!(50)), None, ctx(&[], &rules), Utc::now())
            .unwrap();

        // A charge credits the bank, so it widens a gap where the statement is above the ledger.
        let adjustment = book
            .add_adjustment(
                run.id,
                AdjustmentInput::new("bank fee", dec!(50), AdjustmentCategory::BankCharge),
                NormalBalance::Debit,
                Utc::now(),
            )
            .unwrap();
        assert_eq!(adjustment.item_id, None);
        assert!(book.item(item.id).unwrap().is_unresolved());
        assert_eq!(book.run(run.id).unwrap().difference, dec!(100));

        let plan = book
            .prepare_completion(run.id, dec!(10000), NormalBalance::Debit, Decimal::ZERO, true)
            .unwrap();
        assert_eq!(plan.status, RunStatus::Discrepancy);
        assert_eq!(plan.book_balance, dec!(9950));
        assert_eq!(plan.difference, dec!(100));
    }

    #[test]
    fn test_ledger_drift_after_posting_is_a_discrepancy() {
        let mut book = ReconciliationBook::new();
        let run = book.start(StartRunInput::new(AccountId::new(), date(30), dec!(700)), dec!(700), Utc::now());
        let mut plan = book
            .prepare_completion(run.id, dec!(700), NormalBalance::Debit, Decimal::ZERO, false)
            .unwrap();
        assert_eq!(plan.status, RunStatus::Completed);

        assert!(!plan.confirm(dec!(690)));
        assert_eq!(plan.status, RunStatus::Discrepancy);
        assert_eq!(plan.difference, dec!(10));
        let closed = book.apply_completion(plan, &[], Utc::now()).unwrap();
        assert_eq!(closed.book_balance, dec!(690));
    }

    #[test]
    fn test_auto_match_consumes_ledger_line_once() {
        let rules = EngineConfig::default().reconciliation.classification_rules;
        let mut book = ReconciliationBook::new();
        let account = AccountId::new();
        let deposit = bank_line(account, 10, dec!(500), Decimal::ZERO, 1);
        let lines = [&deposit];
        let run = book.start(StartRunInput::new(account, date(30), dec!(500)), dec!(500), Utc::now());

        let first = book
            .match_line(run.id, StatementLine::new(date(11), "customer", dec!(500)), None, ctx(&lines, &rules), Utc::now())
            .unwrap();
        assert!(first.is_matched());
        assert_eq!(first.journal_entry_id, Some(deposit.id));
        assert_eq!(book.run(run.id).unwrap().status, RunStatus::InProgress);

        let second = book
            .match_line(run.id, StatementLine::new(date(11), "customer", dec!(500)), None, ctx(&lines, &rules), Utc::now())
            .unwrap();
        assert_eq!(second.status, ItemStatus::Unmatched);
        assert_eq!(book.matched_by(deposit.id), Some(first.id));
    }

    #[test]
    fn test_manual_match_with_different_amount_is_variance() {
        let rules = EngineConfig::default().reconciliation.classification_rules;
        let mut book = ReconciliationBook::new();
        let account = AccountId::new();
        let deposit = bank_line(account, 10, dec!(480), Decimal::ZERO, 1);
        let run = book.start(StartRunInput::new(account, date(30), dec!(500)), dec!(480), Utc::now());

        let item = book
            .match_line(
                run.id,
                StatementLine::new(date(10), "deposit", dec!(500)),
                Some(&deposit),
                ctx(&[], &rules),
                Utc::now(),
            )
            .unwrap();
        assert_eq!(item.status, ItemStatus::Variance);
        assert_eq!(item.difference, dec!(20));
        assert!(item.is_unresolved());

        // The statement amount is not the gap; only an adjustment worth 20 resolves it.
        let unrelated = book
            .add_adjustment(
                run.id,
                AdjustmentInput::new("cash in transit", dec!(500), AdjustmentCategory::InterestIncome),
                NormalBalance::Debit,
                Utc::now(),
            )
            .unwrap();
        assert_eq!(unrelated.item_id, None);
        assert!(book.item(item.id).unwrap().is_unresolved());

        let interest = book
            .add_adjustment(
                run.id,
                AdjustmentInput::new("interest", dec!(20), AdjustmentCategory::InterestIncome),
                NormalBalance::Debit,
                Utc::now(),
            )
            .unwrap();
        assert_eq!(interest.item_id, Some(item.id));
        assert_eq!(book.item(item.id).unwrap().status, ItemStatus::Adjusted);

        let foreign = bank_line(AccountId::new(), 10, dec!(500), Decimal::ZERO, 2);
        let err = book
            .match_line(
                run.id,
                StatementLine::new(date(10), "deposit", dec!(500)),
                Some(&foreign),
                ctx(&[], &rules),
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, ReconciliationError::EntryAccountMismatch { .. }));
    }

    #[test]
    fn test_forced_completion_records_discrepancy_and_reopens() {
        let mut book = ReconciliationBook::new();
        let account = AccountId::new();
        let run = book.start(StartRunInput::new(account, date(30), dec!(1000)), dec!(900), Utc::now());

        let plan = book
            .prepare_completion(run.id, dec!(900), NormalBalance::Debit, Decimal::ZERO, true)
            .unwrap();
        assert_eq!(plan.status, RunStatus::Discrepancy);
        book.apply_completion(plan, &[], Utc::now());

        let err = book
            .add_adjustment(
                run.id,
                AdjustmentInput::new("x", dec!(1), AdjustmentCategory::Other),
                NormalBalance::Debit,
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, ReconciliationError::InvalidTransition { .. }));

        let reopened = book.reopen(run.id).unwrap();
        assert_eq!(reopened.status, RunStatus::InProgress);
    }

    #[test]
    fn test_completed_run_is_final() {
        let mut book = ReconciliationBook::new();
        let run = book.start(StartRunInput::new(AccountId::new(), date(30), dec!(0)), dec!(0), Utc::now());
        let plan = book
            .prepare_completion(run.id, dec!(0), NormalBalance::Debit, Decimal::ZERO, false)
            .unwrap();
        book.apply_completion(plan, &[], Utc::now());

        assert!(matches!(book.reopen(run.id).unwrap_err(), ReconciliationError::InvalidTransition { .. }));
        assert!(matches!(
            book.prepare_completion(run.id, dec!(0), NormalBalance::Debit, Decimal::ZERO, false)
                .unwrap_err(),
            ReconciliationError::InvalidTransition { .. }
        ));
    }

    #[test]
    fn test_adjustment_validation() {
        let mut book = ReconciliationBook::new();
        let run = book.start(StartRunInput::new(AccountId::new(), date(30), dec!(0)), dec!(0), Utc::now());
        assert_eq!(
            book.add_adjustment(
                run.id,
                AdjustmentInput::new(" ", dec!(1), AdjustmentCategory::Tax),
                NormalBalance::Debit,
                Utc::now()
            )
                .unwrap_err(),
            ReconciliationError::DescriptionRequired
        );
        assert_eq!(
            book.add_adjustment(
                run.id,
                AdjustmentInput::new("vat", dec!(0), AdjustmentCategory::Tax),
                NormalBalance::Debit,
                Utc::now()
            )
                .unwrap_err(),
            ReconciliationError::ZeroAdjustment
        );
    }

    #[test]
    fn test_adjustment_posting_for_bank_fee() {
        let adjustment = Adjustment {
            id: AdjustmentId::new(),
            run_id: ReconciliationRunId::new(),
            description: "bank fee".to_string(),
            amount: dec!(50),
            category: AdjustmentCategory::BankCharge,
            dimension_value_id: None,
            item_id: None,
            transaction_id: None,
            created_at: Utc::now(),
        };
        let bank = AccountId::new();
        let charges = AccountId::new();
        let (header, legs) = adjustment_posting(&adjustment, bank, charges, date(30), None);

        assert_eq!(header.origin, Origin::Reconciliation);
        assert!(header.idempotency_key.unwrap().starts_with("reconciliation:"));
        assert_eq!(legs[0].account_id, charges);
        assert_eq!(legs[0].direction, Direction::Debit);
        assert_eq!(legs[1].account_id, bank);
        assert_eq!(legs[1].direction, Direction::Credit);
        assert!(legs.iter().all(|l| l.amount == dec!(50)));
    }
}
