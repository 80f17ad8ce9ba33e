//! Cost-attribution domain types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{
    CogsAllocationId, DimensionId, DimensionValueId, InvoiceLineId, JournalEntryId, ProductionOrderId, TransactionId,
};

/// A completed production run with its recorded unit cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionOrder {
    /// Order ID.
    pub id: ProductionOrderId,
    /// Product made.
    pub product_code: String,
    /// Units produced.
    pub quantity_produced: Decimal,
    /// Cost per unit.
    pub unit_cost: Decimal,
    /// Dimension values recorded at production time.
    pub dimension_values: Vec<DimensionValueId>,
    /// Date production finished.
    pub production_date: NaiveDate,
    /// When the order was registered.
    pub recorded_at: DateTime<Utc>,
}

/// Input for registering a production order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordProductionInput {
    /// Product made.
    pub product_code: String,
    /// Units produced.
    pub quantity_produced: Decimal,
    /// Cost per unit.
    pub unit_cost: Decimal,
    /// Production-side dimension values.
    #[serde(default)]
    pub dimension_values: Vec<DimensionValueId>,
    /// Date production finished.
    pub production_date: NaiveDate,
}

impl RecordProductionInput {
    /// Creates an input without dimension values.
    #[must_use]
    pub fn new(
        product_code: impl Into<String>,
        quantity_produced: Decimal,
        unit_cost: Decimal,
        production_date: NaiveDate,
    ) -> Self {
        Self {
            product_code: product_code.into(),
            quantity_produced,
            unit_cost,
            dimension_values: Vec::new(),
            production_date,
        }
    }

    /// Adds a production-side dimension value.
    #[must_use]
    pub fn with_dimension_value(mut self, value_id: DimensionValueId) -> Self {
        self.dimension_values.push(value_id);
        self
    }
}

/// A sales invoice line as supplied by invoicing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    /// Invoice line ID.
    pub id: InvoiceLineId,
    /// Invoice number.
    pub invoice_reference: String,
    /// Product sold.
    pub product_code: String,
    /// Units sold on the line.
    pub quantity_sold: Decimal,
    /// Price per unit.
    pub unit_price: Decimal,
    /// Date of sale.
    pub sale_date: NaiveDate,
    /// Posted revenue line for this invoice line.
    pub revenue_entry_id: Option<JournalEntryId>,
    /// Dimension values recorded at sale time.
    #[serde(default)]
    pub dimension_values: Vec<DimensionValueId>,
}

impl InvoiceLine {
    /// Creates an invoice line with no revenue link or dimensions.
    #[must_use]
    pub fn new(
        invoice_reference: impl Into<String>,
        product_code: impl Into<String>,
        quantity_sold: Decimal,
        unit_price: Decimal,
        sale_date: NaiveDate,
    ) -> Self {
        Self {
            id: InvoiceLineId::new(),
            invoice_reference: invoice_reference.into(),
            product_code: product_code.into(),
            quantity_sold,
            unit_price,
            sale_date,
            revenue_entry_id: None,
            dimension_values: Vec::new(),
        }
    }

    /// Links the posted revenue line.
    #[must_use]
    pub const fn with_revenue_entry(mut self, entry_id: JournalEntryId) -> Self {
        self.revenue_entry_id = Some(entry_id);
        self
    }

    /// Adds a sales-side dimension value.
    #[must_use]
    pub fn with_dimension_value(mut self, value_id: DimensionValueId) -> Self {
        self.dimension_values.push(value_id);
        self
    }
}

/// A dimension whose production and sales values differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionVariance {
    /// Dimension.
    pub dimension_id: DimensionId,
    /// Value recorded at production, if any.
    pub production_value: Option<DimensionValueId>,
    /// Value recorded at sale, if any.
    pub sales_value: Option<DimensionValueId>,
}

/// Cost of produced units attributed to a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CogsAllocation {
    /// Allocation ID.
    pub id: CogsAllocationId,
    /// Source production order.
    pub production_order_id: ProductionOrderId,
    /// Invoice line as it was when allocated.
    pub invoice_line: InvoiceLine,
    /// Units attributed.
    pub quantity: Decimal,
    /// Unit cost copied from the order.
    pub unit_cost: Decimal,
    /// `quantity * unit_cost`, rounded by the engine policy.
    pub total_cogs: Decimal,
    /// Dimension values the COGS posting was tagged with.
    pub production_dimensions: Vec<DimensionValueId>,
    /// Dimension values recorded on the sale.
    pub sales_dimensions: Vec<DimensionValueId>,
    /// Dimensions whose production and sales values differ.
    pub dimension_variances: Vec<DimensionVariance>,
    /// Posting that booked the cost.
    pub transaction_id: TransactionId,
    /// When the allocation was made.
    pub allocated_at: DateTime<Utc>,
}

impl CogsAllocation {
    /// True when any dimension differs between production and sale.
    #[must_use]
    pub fn has_dimension_variance(&self) -> bool {
        !self.dimension_variances.is_empty()
    }
}

/// A validated allocation awaiting its ledger posting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationPlan {
    /// ID the allocation will carry.
    pub id: CogsAllocationId,
    /// Source production order.
    pub production_order_id: ProductionOrderId,
    /// Product code of the order.
    pub product_code: String,
    /// Invoice line.
    pub invoice_line: InvoiceLine,
    /// Units attributed.
    pub quantity: Decimal,
    /// Unit cost.
    pub unit_cost: Decimal,
    /// Rounded total cost.
    pub total_cogs: Decimal,
    /// Production-side values paired with their dimension.
    pub production_dimensions: Vec<(DimensionId, DimensionValueId)>,
    /// Differences against the sale.
    pub dimension_variances: Vec<DimensionVariance>,
}

impl AllocationPlan {
    /// Idempotency key of the COGS posting.
    #[must_use]
    pub fn idempotency_key(&self) -> String {
        format!("cogs:{}:{}", self.production_order_id, self.invoice_line.id)
    }

    /// Finalises the allocation once the posting has committed.
    #[must_use]
    pub fn into_allocation(self, transaction_id: TransactionId, now: DateTime<Utc>) -> CogsAllocation {
        CogsAllocation {
            id: self.id,
            production_order_id: self.production_order_id,
            quantity: self.quantity,
            unit_cost: self.unit_cost,
            total_cogs: self.total_cogs,
            production_dimensions: self.production_dimensions.iter().map(|(_, v)| *v).collect(),
            sales_dimensions: self.invoice_line.dimension_values.clone(),
            dimension_variances: self.dimension_variances,
            invoice_line: self.invoice_line,
            transaction_id,
            allocated_at: now,
        }
    }
}
