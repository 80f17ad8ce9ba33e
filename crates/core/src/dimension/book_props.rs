//! Property-based tests for assignment percentage bounds.

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use tally_shared::types::{AccountId, DimensionValueId, JournalEntryId, TransactionId};

use super::{AllocationRules, AssignInput, CreateDimensionInput, CreateDimensionValueInput, DimensionBook};
use crate::ledger::{JournalLine, Origin};

fn expense_line(cents: i64) -> JournalLine {
    JournalLine {
        id: JournalEntryId::new(),
        transaction_id: TransactionId::new(),
        account_id: AccountId::new(),
        date: NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
        debit: Decimal::new(cents, 2),
        credit: Decimal::ZERO,
        description: None,
        origin: Origin::Manual,
        branch_id: None,
        reversal_of: None,
        reversed: false,
        sequence: 0,
    }
}

/// (value index, whole percentage, replace?)
fn operations() -> impl Strategy<Value = Vec<(usize, u32, bool)>> {
    prop::collection::vec((0usize..4, 0u32..=100, any::<bool>()), 1..20)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// No sequence of assign/replace calls pushes a pair above 100%.
    #[test]
    fn prop_pair_never_exceeds_hundred(
        multi in any::<bool>(),
        cents in 1i64..10_000_000,
        ops in operations(),
    ) {
        let mut book = DimensionBook::new();
        let mut input = CreateDimensionInput::new("CC", "Cost center");
        if multi {
            input = input.multi_value();
        }
        let dim = book.create_dimension(input, Utc::now()).unwrap();
        let values: Vec<DimensionValueId> = (0..4)
            .map(|i| {
                let code = format!("V{i}");
                book.create_value(CreateDimensionValueInput::new(dim.id, code.clone(), code))
                    .unwrap()
                    .id
            })
            .collect();
        let line = expense_line(cents);

        for (idx, pct, replace) in ops {
            let mut input = AssignInput::new(line.id, dim.id, values[idx], Decimal::from(pct));
            if replace {
                input = input.replacing();
            }
            if let Ok(plan) = book.prepare_assign(&line, &input, AllocationRules::default(), Utc::now()) {
                book.apply(plan);
            }
            let pair = book.assignments_for_pair(line.id, dim.id);
            let total: Decimal = pair.iter().map(|a| a.allocation_percentage).sum();
            prop_assert!(total <= Decimal::ONE_HUNDRED);
            if !multi {
                prop_assert!(pair.len() <= 1);
            }
            let allocated: Decimal = pair.iter().map(|a| a.allocation_amount).sum();
            prop_assert!(allocated <= line.amount());
        }
    }
}
