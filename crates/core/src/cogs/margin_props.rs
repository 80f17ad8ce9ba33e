//! Property-based tests for revenue splitting in the margin report.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use tally_shared::types::{
    AccountId, CogsAllocationId, DateRange, JournalEntryId, ProductionOrderId, RoundingPolicy, TransactionId,
};

use crate::cancel::AbortSignal;
use crate::cogs::{CogsAllocation, InvoiceLine, reconcile_period};
use crate::dimension::DimensionBook;
use crate::ledger::{JournalLine, Origin};

fn sale_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 9, 15).unwrap()
}

fn revenue_line(amount: Decimal) -> JournalLine {
    JournalLine {
        id: JournalEntryId::new(),
        transaction_id: TransactionId::new(),
        account_id: AccountId::new(),
        date: sale_date(),
        debit: Decimal::ZERO,
        credit: amount,
        description: None,
        origin: Origin::Sales,
        branch_id: None,
        reversal_of: None,
        reversed: false,
        sequence: 0,
    }
}

fn unit_allocation(line: &InvoiceLine, quantity: Decimal) -> CogsAllocation {
    CogsAllocation {
        id: CogsAllocationId::new(),
        production_order_id: ProductionOrderId::new(),
        sales_dimensions: Vec::new(),
        invoice_line: line.clone(),
        quantity,
        unit_cost: Decimal::ONE,
        total_cogs: quantity,
        production_dimensions: Vec::new(),
        dimension_variances: Vec::new(),
        transaction_id: TransactionId::new(),
        allocated_at: Utc::now(),
    }
}

/// Strategy to generate positive decimal amounts (0.01 to 1,000,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Allocations covering a whole invoice line reproduce its revenue.
    #[test]
    fn prop_fully_allocated_line_keeps_its_revenue(
        amount in positive_amount(),
        quantities in prop::collection::vec(1u32..20, 1..8),
    ) {
        let sale = revenue_line(amount);
        let sold: u32 = quantities.iter().sum();
        let line = InvoiceLine::new("INV-P", "WIDGET", Decimal::from(sold), Decimal::ONE, sale_date())
            .with_revenue_entry(sale.id);
        let allocations: Vec<CogsAllocation> = quantities
            .iter()
            .map(|q| unit_allocation(&line, Decimal::from(*q)))
            .collect();
        let refs: Vec<&CogsAllocation> = allocations.iter().collect();
        let lines: HashMap<JournalEntryId, JournalLine> = [(sale.id, sale)].into_iter().collect();
        let period = DateRange::new(
            NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 9, 30).unwrap(),
        )
        .unwrap();

        let report = reconcile_period(
            &refs,
            |id| lines.get(&id),
            &DimensionBook::new(),
            period,
            2,
            RoundingPolicy::Bankers,
            &AbortSignal::new(),
        )
        .unwrap();

        prop_assert_eq!(report.total_revenue, amount);
        prop_assert_eq!(report.untagged.revenue, amount);
        prop_assert_eq!(report.allocation_count, quantities.len());
    }
}
