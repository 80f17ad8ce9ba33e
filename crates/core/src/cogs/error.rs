//! Cost-attribution error types.

use rust_decimal::Decimal;
use tally_shared::types::{InvoiceLineId, ProductionOrderId};
use tally_shared::{AppError, ErrorKind};
use thiserror::Error;

use crate::dimension::DimensionError;
use crate::ledger::LedgerError;

/// Errors that can occur while attributing production cost to sales.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CogsError {
    /// Production order does not exist.
    #[error("Production order not found: {0}")]
    OrderNotFound(ProductionOrderId),

    /// Product code is empty.
    #[error("Product code is required")]
    EmptyProductCode,

    /// Quantity must be positive.
    #[error("Quantity must be positive: {0}")]
    InvalidQuantity(Decimal),

    /// Unit cost must be positive.
    #[error("Unit cost must be positive: {0}")]
    InvalidUnitCost(Decimal),

    /// Invoice line sells a different product.
    #[error("Invoice product {invoice_product} does not match production product {order_product}")]
    ProductMismatch {
        /// Product of the production order.
        order_product: String,
        /// Product on the invoice line.
        invoice_product: String,
    },

    /// The (order, invoice line) pair was already processed.
    #[error("Production order {production_order_id} already allocated to invoice line {invoice_line_id}")]
    AlreadyAllocated {
        /// Production order.
        production_order_id: ProductionOrderId,
        /// Invoice line.
        invoice_line_id: InvoiceLineId,
    },

    /// Not enough produced units remain.
    #[error("Requested {requested} units from order {order_id}, only {remaining} remain")]
    InsufficientProducedQuantity {
        /// Production order.
        order_id: ProductionOrderId,
        /// Units requested.
        requested: Decimal,
        /// Units still unallocated.
        remaining: Decimal,
    },

    /// The invoice line would receive cost for more units than it sold.
    #[error("Invoice line {invoice_line_id} has {remaining} unallocated units, requested {requested}")]
    InvoiceOverAllocated {
        /// Invoice line.
        invoice_line_id: InvoiceLineId,
        /// Units requested.
        requested: Decimal,
        /// Units sold but not yet costed.
        remaining: Decimal,
    },

    /// Configured COGS or inventory account code is not in the chart.
    #[error("Account not configured: {0}")]
    AccountNotConfigured(String),

    /// A dimension value could not be resolved.
    #[error(transparent)]
    Dimension(#[from] DimensionError),

    /// Posting through the ledger failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Aggregation was aborted.
    #[error("Aggregation aborted")]
    Aborted,

    /// Persistence layer failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl CogsError {
    /// Returns the error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::OrderNotFound(_) => "PRODUCTION_ORDER_NOT_FOUND",
            Self::EmptyProductCode => "EMPTY_PRODUCT_CODE",
            Self::InvalidQuantity(_) => "INVALID_QUANTITY",
            Self::InvalidUnitCost(_) => "INVALID_UNIT_COST",
            Self::ProductMismatch { .. } => "PRODUCT_MISMATCH",
            Self::AlreadyAllocated { .. } => "ALREADY_ALLOCATED",
            Self::InsufficientProducedQuantity { .. } => "INSUFFICIENT_PRODUCED_QUANTITY",
            Self::InvoiceOverAllocated { .. } => "INVOICE_OVER_ALLOCATED",
            Self::AccountNotConfigured(_) => "ACCOUNT_NOT_CONFIGURED",
            Self::Dimension(inner) => inner.error_code(),
            Self::Ledger(inner) => inner.error_code(),
            Self::Aborted => "ABORTED",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Classifies the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::OrderNotFound(_) | Self::AccountNotConfigured(_) => ErrorKind::NotFound,
            Self::AlreadyAllocated { .. } => ErrorKind::Conflict,
            Self::Dimension(inner) => inner.kind(),
            Self::Ledger(inner) => inner.kind(),
            Self::Storage(_) => ErrorKind::Storage,
            Self::EmptyProductCode
            | Self::InvalidQuantity(_)
            | Self::InvalidUnitCost(_)
            | Self::ProductMismatch { .. }
            | Self::InsufficientProducedQuantity { .. }
            | Self::InvoiceOverAllocated { .. }
            | Self::Aborted => ErrorKind::Validation,
        }
    }
}

impl From<CogsError> for AppError {
    fn from(err: CogsError) -> Self {
        Self::new(err.kind(), err.error_code(), err.to_string())
    }
}
