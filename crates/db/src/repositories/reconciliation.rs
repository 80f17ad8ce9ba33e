//! Reconciliation repository: statement runs, matching, adjustments and
//! completion.
//!
//! Completion is the only reconciliation write that touches the ledger:
//! every pending adjustment is staged as a posting first, and nothing is
//! committed unless all of them validate.

use chrono::Utc;
use tally_core::dimension::DimensionError;
use tally_core::ledger::JournalLine;
use tally_core::reconciliation::{
    Adjustment, AdjustmentInput, DimensionReconciliation, DimensionalInputs, MatchContext, MatchRules,
    ReconciliationError, ReconciliationItem, ReconciliationRun, RunStatus, StartRunInput, StatementLine,
    adjustment_posting, reconcile_by_dimension,
};
use tally_shared::config::ClassificationRule;
use tally_shared::types::{
    AccountId, AdjustmentId, BatchReport, DateRange, DimensionId, JournalEntryId, ReconciliationRunId, TransactionId,
};
use tracing::{error, info, warn};

use crate::store::{Database, Tables};

/// Repository for bank and cost-feed reconciliation.
#[derive(Debug, Clone)]
pub struct ReconciliationRepository {
    db: Database,
}

impl ReconciliationRepository {
    /// Creates a new reconciliation repository.
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// Starts a run for an account against a statement closing balance.
    ///
    /// The book balance is the ledger balance as of the statement date.
    ///
    /// # Errors
    ///
    /// Returns an error if the account does not exist.
    pub fn start(&self, input: StartRunInput) -> Result<ReconciliationRun, ReconciliationError> {
        let mut guard = self.db.write()?;
        let tables = &mut *guard;
        if tables.chart.get(input.account_id).is_none() {
            return Err(ReconciliationError::AccountNotFound(input.account_id));
        }
        let book_balance = tables
            .journal
            .balance_as_of(&tables.chart, input.account_id, input.statement_date)?;
        let run = tables.reconciliations.start(input, book_balance, Utc::now());

        info!(
            run_id = %run.id,
            account_id = %run.account_id,
            statement_balance = %run.statement_balance,
            book_balance = %run.book_balance,
            difference = %run.difference,
            "Reconciliation started"
        );
        Ok(run)
    }

    /// Records a statement line, paired with `candidate` or auto-matched.
    ///
    /// Auto-match only considers lines that are neither reversed nor
    /// reversals, and never a line another item already holds.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The run does not exist or is closed
    /// - The candidate does not exist, is on another account or is already matched
    pub fn match_line(
        &self,
        run_id: ReconciliationRunId,
        statement: StatementLine,
        candidate: Option<JournalEntryId>,
    ) -> Result<ReconciliationItem, ReconciliationError> {
        let mut tables = self.db.write()?;
        let item = Self::match_locked(
            &mut tables,
            self.db.rules().matching,
            &self.db.config().reconciliation.classification_rules,
            run_id,
            statement,
            candidate,
        )?;
        info!(
            run_id = %run_id,
            item_id = %item.id,
            status = ?item.status,
            journal_entry_id = ?item.journal_entry_id,
            "Statement line recorded"
        );
        Ok(item)
    }

    /// Auto-matches many statement lines under one write guard, recording
    /// each failure instead of stopping at the first.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store is unavailable.
    pub fn bulk_match(
        &self,
        run_id: ReconciliationRunId,
        lines: Vec<StatementLine>,
    ) -> Result<BatchReport<ReconciliationItem>, ReconciliationError> {
        let rules = self.db.rules().matching;
        let classification = &self.db.config().reconciliation.classification_rules;
        let mut tables = self.db.write()?;
        let mut report = BatchReport::new();
        for (index, statement) in lines.into_iter().enumerate() {
            report.record(
                index,
                Self::match_locked(&mut tables, rules, classification, run_id, statement, None),
            );
        }
        if !report.is_complete() {
            warn!(run_id = %run_id, failed = report.failures.len(), "Bulk match finished with failures");
        }
        info!(run_id = %run_id, recorded = report.succeeded.len(), "Bulk match finished");
        Ok(report)
    }

    fn match_locked(
        tables: &mut Tables,
        rules: MatchRules,
        classification: &[ClassificationRule],
        run_id: ReconciliationRunId,
        statement: StatementLine,
        candidate: Option<JournalEntryId>,
    ) -> Result<ReconciliationItem, ReconciliationError> {
        let Tables {
            chart,
            journal,
            reconciliations,
            ..
        } = tables;

        let account_id = reconciliations.require_run(run_id)?.account_id;
        let normal = chart
            .get(account_id)
            .ok_or(ReconciliationError::AccountNotFound(account_id))?
            .normal_balance();
        let candidate = candidate
            .map(|id| journal.line(id).ok_or(ReconciliationError::EntryNotFound(id)))
            .transpose()?;
        let open_lines: Vec<&JournalLine> = journal
            .lines_for_account(account_id, None)
            .into_iter()
            .filter(|l| !l.reversed && l.reversal_of.is_none())
            .collect();

        let ctx = MatchContext {
            normal,
            account_lines: &open_lines,
            rules,
            classification,
        };
        reconciliations.match_line(run_id, statement, candidate, ctx, Utc::now())
    }

    /// Records a bank-initiated adjustment (fee, interest, tax).
    ///
    /// Nothing is posted until the run completes.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The run does not exist or is closed
    /// - The description is blank or the amount is zero
    /// - The dimension value does not exist
    pub fn add_adjustment(
        &self,
        run_id: ReconciliationRunId,
        input: AdjustmentInput,
    ) -> Result<Adjustment, ReconciliationError> {
        let mut guard = self.db.write()?;
        let tables = &mut *guard;
        if let Some(value_id) = input.dimension_value_id
            && tables.dimensions.value(value_id).is_none()
        {
            return Err(DimensionError::ValueNotFound(value_id).into());
        }
        let account_id = tables.reconciliations.require_run(run_id)?.account_id;
        let normal = tables
            .chart
            .get(account_id)
            .ok_or(ReconciliationError::AccountNotFound(account_id))?
            .normal_balance();
        let adjustment = tables
            .reconciliations
            .add_adjustment(run_id, input, normal, Utc::now())?;
        info!(
            run_id = %run_id,
            adjustment_id = %adjustment.id,
            category = %adjustment.category,
            amount = %adjustment.amount,
            linked_item = ?adjustment.item_id,
            "Adjustment recorded"
        );
        Ok(adjustment)
    }

    /// Completes a run.
    ///
    /// Every pending adjustment is posted against its category's offset
    /// account, then the difference is recomputed from the ledger balance
    /// at the statement date. Within tolerance the run is `Completed`;
    /// otherwise a forced completion ends in `Discrepancy`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The run does not exist or is already closed
    /// - Items are unresolved or the difference exceeds tolerance, and
    ///   `force` is false
    /// - An offset account is missing or an adjustment posting is rejected
    pub fn complete(&self, run_id: ReconciliationRunId, force: bool) -> Result<ReconciliationRun, ReconciliationError> {
        let now = Utc::now();
        let rules = self.db.rules();
        let offsets = &self.db.config().reconciliation.offset_accounts;
        let mut guard = self.db.write()?;
        let tables = &mut *guard;

        let run = tables.reconciliations.require_run(run_id)?.clone();
        let normal = tables
            .chart
            .get(run.account_id)
            .ok_or(ReconciliationError::AccountNotFound(run.account_id))?
            .normal_balance();
        let book_balance = tables
            .journal
            .balance_as_of(&tables.chart, run.account_id, run.statement_date)?;
        let mut plan = tables
            .reconciliations
            .prepare_completion(run_id, book_balance, normal, rules.completion_tolerance, force)
            .inspect_err(|e| warn!(run_id = %run_id, error = %e, "Run cannot complete"))?;

        let mut staged = Vec::with_capacity(plan.pending_adjustments.len());
        for adjustment in &plan.pending_adjustments {
            let code = adjustment.category.offset_code(offsets);
            let offset = tables
                .chart
                .find_by_code(code)
                .ok_or_else(|| ReconciliationError::OffsetAccountMissing(code.to_string()))?;
            let dimension = match adjustment.dimension_value_id {
                Some(value_id) => {
                    let value = tables
                        .dimensions
                        .value(value_id)
                        .ok_or(DimensionError::ValueNotFound(value_id))?;
                    Some((value.dimension_id, value_id))
                }
                None => None,
            };
            let (header, legs) =
                adjustment_posting(adjustment, run.account_id, offset.id, run.statement_date, dimension);
            let posting = tables
                .stage_posting(header, legs, rules, now)
                .inspect_err(|e| error!(run_id = %run_id, adjustment_id = %adjustment.id, error = %e, "Adjustment posting rejected"))?;
            staged.push((adjustment.id, posting));
        }

        let postings: Vec<(AdjustmentId, TransactionId)> = staged
            .into_iter()
            .map(|(adjustment_id, posting)| (adjustment_id, tables.commit(posting, now).id))
            .collect();
        for (adjustment_id, transaction_id) in &postings {
            info!(run_id = %run_id, adjustment_id = %adjustment_id, transaction_id = %transaction_id, "Adjustment posted");
        }

        let ledger_balance = tables
            .journal
            .balance_as_of(&tables.chart, run.account_id, run.statement_date)?;
        if !plan.confirm(ledger_balance) {
            error!(
                severity = "critical",
                run_id = %run_id,
                account_id = %run.account_id,
                statement_balance = %run.statement_balance,
                ledger_balance = %ledger_balance,
                difference = %plan.difference,
                "Ledger balance after adjustments does not match the projected balance"
            );
        }

        let unresolved = plan.unresolved_count;
        let closed = tables
            .reconciliations
            .apply_completion(plan, &postings, now)
            .ok_or(ReconciliationError::RunNotFound(run_id))?;

        if closed.status == RunStatus::Discrepancy {
            warn!(
                run_id = %run_id,
                difference = %closed.difference,
                unresolved,
                "Reconciliation closed with a discrepancy"
            );
        } else {
            info!(run_id = %run_id, adjustments_posted = postings.len(), "Reconciliation completed");
        }
        Ok(closed)
    }

    /// Reopens a run closed with a discrepancy.
    ///
    /// # Errors
    ///
    /// Returns an error if the run does not exist or is not in
    /// `Discrepancy`.
    pub fn reopen(&self, run_id: ReconciliationRunId) -> Result<ReconciliationRun, ReconciliationError> {
        let mut tables = self.db.write()?;
        let run = tables.reconciliations.reopen(run_id)?;
        info!(run_id = %run_id, "Reconciliation reopened");
        Ok(run)
    }

    /// Finds a run by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub fn get_run(&self, run_id: ReconciliationRunId) -> Result<Option<ReconciliationRun>, ReconciliationError> {
        Ok(self.db.read()?.reconciliations.run(run_id).cloned())
    }

    /// Runs of an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub fn runs_for_account(&self, account_id: AccountId) -> Result<Vec<ReconciliationRun>, ReconciliationError> {
        Ok(self
            .db
            .read()?
            .reconciliations
            .runs_for_account(account_id)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Every item of a run in recording order.
    ///
    /// # Errors
    ///
    /// Returns an error if the run does not exist.
    pub fn items_for(&self, run_id: ReconciliationRunId) -> Result<Vec<ReconciliationItem>, ReconciliationError> {
        let tables = self.db.read()?;
        tables.reconciliations.require_run(run_id)?;
        Ok(tables
            .reconciliations
            .items_for(run_id)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Items still needing resolution (unmatched or variance).
    ///
    /// # Errors
    ///
    /// Returns an error if the run does not exist.
    pub fn unmatched_items(&self, run_id: ReconciliationRunId) -> Result<Vec<ReconciliationItem>, ReconciliationError> {
        let tables = self.db.read()?;
        tables.reconciliations.require_run(run_id)?;
        Ok(tables
            .reconciliations
            .unresolved_items(run_id)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Adjustments of a run.
    ///
    /// # Errors
    ///
    /// Returns an error if the run does not exist.
    pub fn adjustments_for(&self, run_id: ReconciliationRunId) -> Result<Vec<Adjustment>, ReconciliationError> {
        let tables = self.db.read()?;
        tables.reconciliations.require_run(run_id)?;
        Ok(tables
            .reconciliations
            .adjustments_for(run_id)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Ledger, statement and pending-adjustment amounts of an account
    /// grouped by the values of one dimension.
    ///
    /// # Errors
    ///
    /// Returns an error if the account or dimension does not exist.
    pub fn reconcile_by_dimension(
        &self,
        account_id: AccountId,
        dimension_id: DimensionId,
        period: DateRange,
    ) -> Result<DimensionReconciliation, ReconciliationError> {
        let tables = self.db.read()?;
        let normal = tables
            .chart
            .get(account_id)
            .ok_or(ReconciliationError::AccountNotFound(account_id))?
            .normal_balance();
        tables
            .dimensions
            .definition(dimension_id)
            .ok_or(DimensionError::DimensionNotFound(dimension_id))?;

        let lines = tables.journal.lines_for_account(account_id, Some(period));
        let items = tables.reconciliations.items_in_period(account_id, period);
        let pending = tables
            .reconciliations
            .pending_adjustments_in_period(account_id, period);

        let report = reconcile_by_dimension(
            &tables.dimensions,
            DimensionalInputs {
                account_id,
                normal,
                dimension_id,
                period,
                lines: &lines,
                items: &items,
                pending: &pending,
            },
        );
        if !report.total_variance.is_zero() {
            warn!(
                account_id = %account_id,
                dimension_id = %dimension_id,
                variance = %report.total_variance,
                "Dimensional reconciliation has variance"
            );
        }
        Ok(report)
    }
}
