//! COGS repository: production orders, cost allocation and period margin.

use chrono::Utc;
use rust_decimal::Decimal;
use tally_core::AbortSignal;
use tally_core::cogs::{
    CogsAllocation, CogsError, CogsPeriodReport, CogsWarning, InvoiceLine, ProductionOrder, RecordProductionInput,
    cogs_posting, reconcile_period,
};
use tally_core::dimension::DimensionError;
use tally_shared::types::{DateRange, ProductionOrderId};
use tracing::{error, info, warn};

use crate::store::{Database, StagedPosting};

/// Repository for the production-to-sales cost bridge.
#[derive(Debug, Clone)]
pub struct CogsRepository {
    db: Database,
}

impl CogsRepository {
    /// Creates a new COGS repository.
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// Registers a completed production run.
    ///
    /// # Errors
    ///
    /// Returns an error if the product code is blank, the quantity or unit
    /// cost is not positive, or a dimension value does not exist.
    pub fn record_production(&self, input: RecordProductionInput) -> Result<ProductionOrder, CogsError> {
        let mut guard = self.db.write()?;
        let tables = &mut *guard;
        for value_id in &input.dimension_values {
            if tables.dimensions.value(*value_id).is_none() {
                return Err(DimensionError::ValueNotFound(*value_id).into());
            }
        }
        let order = tables.cogs.record_production(input, Utc::now())?;

        info!(
            order_id = %order.id,
            product = %order.product_code,
            quantity = %order.quantity_produced,
            unit_cost = %order.unit_cost,
            "Production recorded"
        );
        Ok(order)
    }

    /// Attributes `quantity` units (default: the whole invoice line) of a
    /// production order to a sale and posts Dr COGS / Cr Inventory.
    ///
    /// Both legs carry the production-side dimension values. A sale whose
    /// dimensions differ from production is still allocated, with the
    /// differences recorded on the allocation.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The order does not exist, or the pair was already allocated
    /// - Products differ, or not enough produced or sold units remain
    /// - The COGS or inventory account is not in the chart
    /// - The posting is rejected by the ledger
    pub fn allocate(
        &self,
        order_id: ProductionOrderId,
        invoice_line: InvoiceLine,
        quantity: Option<Decimal>,
    ) -> Result<CogsAllocation, CogsError> {
        let now = Utc::now();
        let rules = self.db.rules();
        let accounts = &self.db.config().cogs;
        let mut guard = self.db.write()?;
        let tables = &mut *guard;

        let plan = tables
            .cogs
            .prepare_allocation(order_id, invoice_line, quantity, &tables.dimensions, rules.cost)
            .inspect_err(|e| warn!(order_id = %order_id, error = %e, "Allocation rejected"))?;

        let cogs_account = tables
            .chart
            .find_by_code(&accounts.cogs_account_code)
            .ok_or_else(|| CogsError::AccountNotConfigured(accounts.cogs_account_code.clone()))?
            .id;
        let inventory_account = tables
            .chart
            .find_by_code(&accounts.inventory_account_code)
            .ok_or_else(|| CogsError::AccountNotConfigured(accounts.inventory_account_code.clone()))?
            .id;

        let (header, legs) = cogs_posting(&plan, cogs_account, inventory_account);
        let staged = tables
            .stage_posting(header, legs, rules, now)
            .inspect_err(|e| error!(order_id = %order_id, error = %e, "COGS posting rejected"))?;
        if matches!(staged, StagedPosting::Replay(_)) {
            error!(
                severity = "critical",
                order_id = %order_id,
                invoice_line_id = %plan.invoice_line.id,
                "COGS posting exists without its allocation"
            );
        }
        let transaction = tables.commit(staged, now);

        let allocation = plan.into_allocation(transaction.id, now);
        tables.cogs.insert(allocation.clone());

        if allocation.has_dimension_variance() {
            warn!(
                allocation_id = %allocation.id,
                variances = allocation.dimension_variances.len(),
                "Production and sales dimensions differ"
            );
        }
        info!(
            allocation_id = %allocation.id,
            order_id = %order_id,
            quantity = %allocation.quantity,
            total_cogs = %allocation.total_cogs,
            transaction_id = %transaction.id,
            "COGS allocated"
        );
        Ok(allocation)
    }

    /// Finds a production order by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub fn order(&self, order_id: ProductionOrderId) -> Result<Option<ProductionOrder>, CogsError> {
        Ok(self.db.read()?.cogs.order(order_id).cloned())
    }

    /// Units of an order not yet attributed to a sale.
    ///
    /// # Errors
    ///
    /// Returns an error if the order does not exist.
    pub fn remaining_quantity(&self, order_id: ProductionOrderId) -> Result<Decimal, CogsError> {
        self.db.read()?.cogs.remaining_quantity(order_id)
    }

    /// Allocations drawn from an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the order does not exist.
    pub fn allocations_for(&self, order_id: ProductionOrderId) -> Result<Vec<CogsAllocation>, CogsError> {
        let tables = self.db.read()?;
        tables.cogs.require_order(order_id)?;
        Ok(tables
            .cogs
            .allocations_for(order_id)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Revenue, COGS and gross margin per dimension value for sales inside
    /// `period`.
    ///
    /// # Errors
    ///
    /// Returns an error if `signal` is raised before the aggregation ends.
    pub fn reconcile_period(&self, period: DateRange, signal: &AbortSignal) -> Result<CogsPeriodReport, CogsError> {
        let cost = self.db.rules().cost;
        let tables = self.db.read()?;
        let journal = &tables.journal;
        let allocations = tables.cogs.allocations();
        let report = reconcile_period(
            &allocations,
            |id| journal.line(id),
            &tables.dimensions,
            period,
            cost.scale,
            cost.rounding,
            signal,
        )?;

        for warning in &report.warnings {
            match warning {
                CogsWarning::ZeroRevenue { allocation_id, .. } => {
                    warn!(allocation_id = %allocation_id, "Allocation has no revenue");
                }
                CogsWarning::RevenueReversed {
                    allocation_id,
                    journal_entry_id,
                } => {
                    warn!(allocation_id = %allocation_id, journal_entry_id = %journal_entry_id, "Revenue line was reversed");
                }
                CogsWarning::DimensionVariance { allocation_id, .. } => {
                    warn!(allocation_id = %allocation_id, "Allocation has a dimension variance");
                }
            }
        }
        info!(
            allocations = report.allocation_count,
            revenue = %report.total_revenue,
            cogs = %report.total_cogs,
            "COGS period reconciled"
        );
        Ok(report)
    }
}
