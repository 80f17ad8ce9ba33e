//! Property-based tests for posting validation rules.

use proptest::prelude::*;
use rust_decimal::Decimal;
use tally_shared::types::AccountId;

use super::error::LedgerError;
use super::types::{Direction, LegInput};
use super::validation::validate_amounts;

/// Strategy to generate a valid positive amount (0.01 to 1,000,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Splits `total` into `parts` positive legs on one side.
fn split(total: Decimal, parts: usize, direction: Direction) -> Vec<LegInput> {
    let cents = (total * Decimal::ONE_HUNDRED).trunc();
    let parts_dec = Decimal::from(parts as u64);
    let base = (cents / parts_dec).trunc();
    let mut legs: Vec<LegInput> = (0..parts)
        .map(|_| LegInput::new(AccountId::new(), base / Decimal::ONE_HUNDRED, direction))
        .collect();
    let remainder = (cents - base * parts_dec) / Decimal::ONE_HUNDRED;
    if let Some(first) = legs.first_mut() {
        first.amount += remainder;
    }
    legs
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Any split of equal debit and credit totals is accepted.
    #[test]
    fn prop_balanced_postings_accepted(
        total in (100i64..100_000_000i64).prop_map(|c| Decimal::new(c, 2)),
        debit_parts in 1usize..5,
        credit_parts in 1usize..5,
    ) {
        let mut legs = split(total, debit_parts, Direction::Debit);
        legs.extend(split(total, credit_parts, Direction::Credit));
        let totals = validate_amounts(&legs, 4).unwrap();
        prop_assert_eq!(totals.total_debit, totals.total_credit);
    }

    /// Any difference between the two sides is rejected, however small.
    #[test]
    fn prop_unbalanced_postings_rejected(
        debit in positive_amount(),
        credit in positive_amount(),
    ) {
        prop_assume!(debit != credit);
        let legs = vec![
            LegInput::debit(AccountId::new(), debit),
            LegInput::credit(AccountId::new(), credit),
        ];
        let is_unbalanced = matches!(
            validate_amounts(&legs, 4),
            Err(LedgerError::UnbalancedEntry { .. })
        );
        prop_assert!(is_unbalanced);
    }

    /// Zero or negative amounts never pass.
    #[test]
    fn prop_non_positive_amounts_rejected(
        amount in (-100_000_000i64..=0i64).prop_map(|c| Decimal::new(c, 2)),
        other in positive_amount(),
    ) {
        let legs = vec![
            LegInput::debit(AccountId::new(), amount),
            LegInput::credit(AccountId::new(), other),
        ];
        let is_rejected = matches!(
            validate_amounts(&legs, 4),
            Err(LedgerError::NonPositiveAmount { index: 0, .. })
        );
        prop_assert!(is_rejected);
    }
}
