//! Production orders and the allocations drawn from them.
//!
//! Remaining quantity is always `quantity_produced - sum(allocated)`, read
//! through the per-order index; the (order, invoice line) index makes a
//! repeated allocation a conflict rather than a second posting.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tally_shared::types::{
    AccountId, CogsAllocationId, DimensionId, DimensionValueId, InvoiceLineId, ProductionOrderId, RoundingPolicy,
};

use super::error::CogsError;
use super::types::{AllocationPlan, CogsAllocation, DimensionVariance, InvoiceLine, ProductionOrder, RecordProductionInput};
use crate::dimension::{DimensionBook, DimensionError};
use crate::ledger::{LegInput, Origin, TransactionHeader};

/// Rounding applied to COGS totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostRules {
    /// Fractional digits of the total.
    pub scale: u32,
    /// Rounding policy.
    pub rounding: RoundingPolicy,
}

impl Default for CostRules {
    fn default() -> Self {
        Self {
            scale: 4,
            rounding: RoundingPolicy::Bankers,
        }
    }
}

/// Cost-attribution state with its access paths.
#[derive(Debug, Clone, Default)]
pub struct CogsBook {
    orders: HashMap<ProductionOrderId, ProductionOrder>,
    allocations: HashMap<CogsAllocationId, CogsAllocation>,
    by_order: HashMap<ProductionOrderId, Vec<CogsAllocationId>>,
    by_pair: HashMap<(ProductionOrderId, InvoiceLineId), CogsAllocationId>,
    allocated_by_invoice: HashMap<InvoiceLineId, Decimal>,
}

impl CogsBook {
    /// Creates an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a book and its indexes from stored rows.
    #[must_use]
    pub fn from_parts(
        orders: impl IntoIterator<Item = ProductionOrder>,
        allocations: impl IntoIterator<Item = CogsAllocation>,
    ) -> Self {
        let mut book = Self::new();
        for order in orders {
            book.orders.insert(order.id, order);
        }
        let mut allocations: Vec<CogsAllocation> = allocations.into_iter().collect();
        allocations.sort_by_key(|a| a.id);
        for allocation in allocations {
            book.insert(allocation);
        }
        book
    }

    /// Looks up an order.
    #[must_use]
    pub fn order(&self, id: ProductionOrderId) -> Option<&ProductionOrder> {
        self.orders.get(&id)
    }

    /// Looks up an order, failing when absent.
    pub fn require_order(&self, id: ProductionOrderId) -> Result<&ProductionOrder, CogsError> {
        self.orders.get(&id).ok_or(CogsError::OrderNotFound(id))
    }

    /// Every order, oldest first.
    #[must_use]
    pub fn orders(&self) -> Vec<&ProductionOrder> {
        let mut all: Vec<&ProductionOrder> = self.orders.values().collect();
        all.sort_by_key(|o| o.id);
        all
    }

    /// Looks up an allocation.
    #[must_use]
    pub fn allocation(&self, id: CogsAllocationId) -> Option<&CogsAllocation> {
        self.allocations.get(&id)
    }

    /// Every allocation, oldest first.
    #[must_use]
    pub fn allocations(&self) -> Vec<&CogsAllocation> {
        let mut all: Vec<&CogsAllocation> = self.allocations.values().collect();
        all.sort_by_key(|a| a.id);
        all
    }

    /// Allocations drawn from one order.
    #[must_use]
    pub fn allocations_for(&self, order_id: ProductionOrderId) -> Vec<&CogsAllocation> {
        self.by_order
            .get(&order_id)
            .map(|ids| ids.iter().filter_map(|id| self.allocations.get(id)).collect())
            .unwrap_or_default()
    }

    /// Allocation for an exact (order, invoice line) pair.
    #[must_use]
    pub fn find_pair(&self, order_id: ProductionOrderId, invoice_line_id: InvoiceLineId) -> Option<&CogsAllocation> {
        self.by_pair
            .get(&(order_id, invoice_line_id))
            .and_then(|id| self.allocations.get(id))
    }

    /// Units of an order not yet attributed to a sale.
    pub fn remaining_quantity(&self, order_id: ProductionOrderId) -> Result<Decimal, CogsError> {
        let order = self.require_order(order_id)?;
        let allocated: Decimal = self.allocations_for(order_id).iter().map(|a| a.quantity).sum();
        Ok(order.quantity_produced - allocated)
    }

    /// Units of an invoice line already costed.
    #[must_use]
    pub fn allocated_for_invoice(&self, invoice_line_id: InvoiceLineId) -> Decimal {
        self.allocated_by_invoice
            .get(&invoice_line_id)
            .copied()
            .unwrap_or_default()
    }

    /// Registers a production order.
    pub fn record_production(
        &mut self,
        input: RecordProductionInput,
        now: DateTime<Utc>,
    ) -> Result<ProductionOrder, CogsError> {
        if input.product_code.trim().is_empty() {
            return Err(CogsError::EmptyProductCode);
        }
        if input.quantity_produced <= Decimal::ZERO {
            return Err(CogsError::InvalidQuantity(input.quantity_produced));
        }
        if input.unit_cost <= Decimal::ZERO {
            return Err(CogsError::InvalidUnitCost(input.unit_cost));
        }
        let order = ProductionOrder {
            id: ProductionOrderId::new(),
            product_code: input.product_code,
            quantity_produced: input.quantity_produced,
            unit_cost: input.unit_cost,
            dimension_values: input.dimension_values,
            production_date: input.production_date,
            recorded_at: now,
        };
        self.orders.insert(order.id, order.clone());
        Ok(order)
    }

    /// Validates an allocation of `quantity` units (default: the whole
    /// invoice line) from an order to a sale.
    ///
    /// Checks run in order: pair already processed, quantity, product,
    /// remaining produced units, remaining invoice units. Dimension values
    /// on either side must exist in `dimensions`.
    pub fn prepare_allocation(
        &self,
        order_id: ProductionOrderId,
        invoice_line: InvoiceLine,
        quantity: Option<Decimal>,
        dimensions: &DimensionBook,
        rules: CostRules,
    ) -> Result<AllocationPlan, CogsError> {
        let order = self.require_order(order_id)?;
        if self.by_pair.contains_key(&(order_id, invoice_line.id)) {
            return Err(CogsError::AlreadyAllocated {
                production_order_id: order_id,
                invoice_line_id: invoice_line.id,
            });
        }

        let quantity = quantity.unwrap_or(invoice_line.quantity_sold);
        if quantity <= Decimal::ZERO {
            return Err(CogsError::InvalidQuantity(quantity));
        }
        if order.product_code != invoice_line.product_code {
            return Err(CogsError::ProductMismatch {
                order_product: order.product_code.clone(),
                invoice_product: invoice_line.product_code.clone(),
            });
        }

        let remaining = self.remaining_quantity(order_id)?;
        if quantity > remaining {
            return Err(CogsError::InsufficientProducedQuantity {
                order_id,
                requested: quantity,
                remaining,
            });
        }
        let invoice_remaining = invoice_line.quantity_sold - self.allocated_for_invoice(invoice_line.id);
        if quantity > invoice_remaining {
            return Err(CogsError::InvoiceOverAllocated {
                invoice_line_id: invoice_line.id,
                requested: quantity,
                remaining: invoice_remaining,
            });
        }

        let production = by_dimension(dimensions, &order.dimension_values)?;
        let sales = by_dimension(dimensions, &invoice_line.dimension_values)?;
        let dimension_variances = compare(&production, &sales);

        Ok(AllocationPlan {
            id: CogsAllocationId::new(),
            production_order_id: order_id,
            product_code: order.product_code.clone(),
            quantity,
            unit_cost: order.unit_cost,
            total_cogs: rules.rounding.round(quantity * order.unit_cost, rules.scale),
            production_dimensions: production.into_iter().collect(),
            dimension_variances,
            invoice_line,
        })
    }

    /// Records a committed allocation.
    pub fn insert(&mut self, allocation: CogsAllocation) {
        *self
            .allocated_by_invoice
            .entry(allocation.invoice_line.id)
            .or_default() += allocation.quantity;
        self.by_pair.insert(
            (allocation.production_order_id, allocation.invoice_line.id),
            allocation.id,
        );
        self.by_order
            .entry(allocation.production_order_id)
            .or_default()
            .push(allocation.id);
        self.allocations.insert(allocation.id, allocation);
    }
}

fn by_dimension(
    dimensions: &DimensionBook,
    values: &[DimensionValueId],
) -> Result<BTreeMap<DimensionId, DimensionValueId>, CogsError> {
    let mut out = BTreeMap::new();
    for value_id in values {
        let value = dimensions
            .value(*value_id)
            .ok_or(DimensionError::ValueNotFound(*value_id))?;
        out.entry(value.dimension_id).or_insert(*value_id);
    }
    Ok(out)
}

fn compare(
    production: &BTreeMap<DimensionId, DimensionValueId>,
    sales: &BTreeMap<DimensionId, DimensionValueId>,
) -> Vec<DimensionVariance> {
    let mut dimensions: Vec<DimensionId> = production.keys().chain(sales.keys()).copied().collect();
    dimensions.sort();
    dimensions.dedup();
    dimensions
        .into_iter()
        .filter_map(|dimension_id| {
            let production_value = production.get(&dimension_id).copied();
            let sales_value = sales.get(&dimension_id).copied();
            (production_value != sales_value).then_some(DimensionVariance {
                dimension_id,
                production_value,
                sales_value,
            })
        })
        .collect()
}

/// Builds the balanced COGS posting: debit COGS, credit inventory, both
/// tagged with the production-side dimensions at 100%.
#[must_use]
pub fn cogs_posting(
    plan: &AllocationPlan,
    cogs_account: AccountId,
    inventory_account: AccountId,
) -> (TransactionHeader, Vec<LegInput>) {
    let header = TransactionHeader::new(
        plan.invoice_line.sale_date,
        format!(
            "COGS {} x {} for {}",
            plan.product_code, plan.quantity, plan.invoice_line.invoice_reference
        ),
        Origin::Cogs,
    )
    .with_reference(plan.invoice_line.invoice_reference.clone())
    .with_idempotency_key(plan.idempotency_key());

    let mut debit = LegInput::debit(cogs_account, plan.total_cogs);
    let mut credit = LegInput::credit(inventory_account, plan.total_cogs);
    for (dimension_id, value_id) in &plan.production_dimensions {
        debit = debit.with_allocation(*dimension_id, *value_id, Decimal::ONE_HUNDRED);
        credit = credit.with_allocation(*dimension_id, *value_id, Decimal::ONE_HUNDRED);
    }
    (header, vec![debit, credit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::{CreateDimensionInput, CreateDimensionValueInput};
    use crate::ledger::Direction;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use tally_shared::types::TransactionId;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, day).unwrap()
    }

    fn book_with_order(quantity: Decimal, unit_cost: Decimal) -> (CogsBook, ProductionOrderId) {
        let mut book = CogsBook::new();
        let order = book
            .record_production(RecordProductionInput::new("WIDGET", quantity, unit_cost, date(1)), Utc::now())
            .unwrap();
        (book, order.id)
    }

    fn allocate(book: &mut CogsBook, order: ProductionOrderId, line: InvoiceLine) -> Result<CogsAllocation, CogsError> {
        let plan = book.prepare_allocation(order, line, None, &DimensionBook::new(), CostRules::default())?;
        let allocation = plan.into_allocation(TransactionId::new(), Utc::now());
        book.insert(allocation.clone());
        Ok(allocation)
    }

    #[test]
    fn test_total_cogs_is_quantity_times_unit_cost() {
        let (mut book, order) = book_with_order(dec!(100), dec!(12.50));
        let line = InvoiceLine::new("INV-1", "WIDGET", dec!(8), dec!(20), date(5));
        let allocation = allocate(&mut book, order, line).unwrap();
        assert_eq!(allocation.total_cogs, dec!(100));
        assert_eq!(book.remaining_quantity(order).unwrap(), dec!(92));
    }

    #[test]
    fn test_over_allocation_fails() {
        let (mut book, order) = book_with_order(dec!(10), dec!(3));
        allocate(&mut book, order, InvoiceLine::new("INV-1", "WIDGET", dec!(7), dec!(5), date(5))).unwrap();
        let err = allocate(&mut book, order, InvoiceLine::new("INV-2", "WIDGET", dec!(4), dec!(5), date(6))).unwrap_err();
        assert_eq!(
            err,
            CogsError::InsufficientProducedQuantity {
                order_id: order,
                requested: dec!(4),
                remaining: dec!(3),
            }
        );
    }

    #[test]
    fn test_same_pair_twice_is_conflict() {
        let (mut book, order) = book_with_order(dec!(10), dec!(3));
        let line = InvoiceLine::new("INV-1", "WIDGET", dec!(2), dec!(5), date(5));
        allocate(&mut book, order, line.clone()).unwrap();
        let err = allocate(&mut book, order, line).unwrap_err();
        assert!(matches!(err, CogsError::AlreadyAllocated { .. }));
        assert_eq!(book.allocations_for(order).len(), 1);
    }

    #[test]
    fn test_invoice_line_cannot_receive_more_than_sold() {
        let mut book = CogsBook::new();
        let first = book
            .record_production(RecordProductionInput::new("WIDGET", dec!(5), dec!(2), date(1)), Utc::now())
            .unwrap();
        let second = book
            .record_production(RecordProductionInput::new("WIDGET", dec!(5), dec!(2), date(2)), Utc::now())
            .unwrap();
        let line = InvoiceLine::new("INV-1", "WIDGET", dec!(6), dec!(5), date(5));

        let plan = book
            .prepare_allocation(first.id, line.clone(), Some(dec!(5)), &DimensionBook::new(), CostRules::default())
            .unwrap();
        book.insert(plan.into_allocation(TransactionId::new(), Utc::now()));

        let err = book
            .prepare_allocation(second.id, line, Some(dec!(2)), &DimensionBook::new(), CostRules::default())
            .unwrap_err();
        assert!(matches!(err, CogsError::InvoiceOverAllocated { .. }));
    }

    #[test]
    fn test_product_mismatch_and_bad_input() {
        let (book, order) = book_with_order(dec!(10), dec!(3));
        let other = InvoiceLine::new("INV-1", "GADGET", dec!(1), dec!(5), date(5));
        assert!(matches!(
            book.prepare_allocation(order, other, None, &DimensionBook::new(), CostRules::default())
                .unwrap_err(),
            CogsError::ProductMismatch { .. }
        ));

        let mut book = CogsBook::new();
        assert_eq!(
            book.record_production(RecordProductionInput::new("W", dec!(0), dec!(1), date(1)), Utc::now())
                .unwrap_err(),
            CogsError::InvalidQuantity(dec!(0))
        );
    }

    #[test]
    fn test_dimension_variance_flagged() {
        let mut dims = DimensionBook::new();
        let branch = dims
            .create_dimension(CreateDimensionInput::new("BR", "Branch"), Utc::now())
            .unwrap();
        let plant = dims.create_value(CreateDimensionValueInput::new(branch.id, "PLANT", "Plant")).unwrap();
        let shop = dims.create_value(CreateDimensionValueInput::new(branch.id, "SHOP", "Shop")).unwrap();

        let mut book = CogsBook::new();
        let order = book
            .record_production(
                RecordProductionInput::new("WIDGET", dec!(10), dec!(4), date(1)).with_dimension_value(plant.id),
                Utc::now(),
            )
            .unwrap();
        let line = InvoiceLine::new("INV-9", "WIDGET", dec!(2), dec!(9), date(3)).with_dimension_value(shop.id);

        let plan = book
            .prepare_allocation(order.id, line, None, &dims, CostRules::default())
            .unwrap();
        assert_eq!(plan.production_dimensions, vec![(branch.id, plant.id)]);

        let (header, legs) = cogs_posting(&plan, AccountId::new(), AccountId::new());
        assert_eq!(header.origin, Origin::Cogs);
        assert_eq!(header.idempotency_key.as_deref(), Some(plan.idempotency_key().as_str()));
        assert_eq!(legs[0].direction, Direction::Debit);
        assert_eq!(legs[0].amount, dec!(8));
        assert_eq!(legs[1].allocations[0].value_id, plant.id);

        let allocation = plan.into_allocation(TransactionId::new(), Utc::now());
        assert!(allocation.has_dimension_variance());
        assert_eq!(allocation.dimension_variances[0].sales_value, Some(shop.id));
    }

    #[test]
    fn test_matching_dimensions_have_no_variance() {
        let mut dims = DimensionBook::new();
        let branch = dims
            .create_dimension(CreateDimensionInput::new("BR", "Branch"), Utc::now())
            .unwrap();
        let north = dims.create_value(CreateDimensionValueInput::new(branch.id, "N", "North")).unwrap();
        let mut book = CogsBook::new();
        let order = book
            .record_production(
                RecordProductionInput::new("WIDGET", dec!(10), dec!(4), date(1)).with_dimension_value(north.id),
                Utc::now(),
            )
            .unwrap();
        let line = InvoiceLine::new("INV-9", "WIDGET", dec!(2), dec!(9), date(3)).with_dimension_value(north.id);
        let plan = book
            .prepare_allocation(order.id, line, None, &dims, CostRules::default())
            .unwrap();
        assert!(plan.dimension_variances.is_empty());
    }
}
