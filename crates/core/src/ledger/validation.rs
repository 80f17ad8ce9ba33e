//! Business rule validation for postings.
//!
//! Account resolution happens between [`validate_leg_count`] and
//! [`validate_amounts`] (see `Journal::prepare_posting`), so a missing
//! account is reported before an unbalanced entry.

use rust_decimal::Decimal;

use super::error::LedgerError;
use super::types::{Direction, LegInput, PostingTotals};

/// A posting needs at least two legs.
pub fn validate_leg_count(legs: &[LegInput]) -> Result<(), LedgerError> {
    if legs.len() < 2 {
        return Err(LedgerError::InsufficientLegs { count: legs.len() });
    }
    Ok(())
}

/// Validates leg amounts and the balance of the posting.
///
/// Checks, in order: every amount is positive and fits the ledger scale,
/// both sides are present, and debits equal credits exactly.
pub fn validate_amounts(legs: &[LegInput], scale: u32) -> Result<PostingTotals, LedgerError> {
    let mut total_debit = Decimal::ZERO;
    let mut total_credit = Decimal::ZERO;
    let mut has_debit = false;
    let mut has_credit = false;

    for (index, leg) in legs.iter().enumerate() {
        if leg.amount <= Decimal::ZERO {
            return Err(LedgerError::NonPositiveAmount {
                index,
                amount: leg.amount,
            });
        }
        if leg.amount.normalize().scale() > scale {
            return Err(LedgerError::ExcessPrecision {
                index,
                amount: leg.amount,
                scale,
            });
        }

        match leg.direction {
            Direction::Debit => {
                total_debit += leg.amount;
                has_debit = true;
            }
            Direction::Credit => {
                total_credit += leg.amount;
                has_credit = true;
            }
        }
    }

    if !has_debit || !has_credit {
        return Err(LedgerError::SingleSided);
    }

    let totals = PostingTotals {
        total_debit,
        total_credit,
    };
    if !totals.is_balanced() {
        return Err(LedgerError::UnbalancedEntry {
            debit: total_debit,
            credit: total_credit,
        });
    }

    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tally_shared::types::AccountId;

    fn leg(direction: Direction, amount: Decimal) -> LegInput {
        LegInput::new(AccountId::new(), amount, direction)
    }

    #[test]
    fn test_balanced_legs() {
        let legs = vec![leg(Direction::Debit, dec!(100.00)), leg(Direction::Credit, dec!(100.00))];
        let totals = validate_amounts(&legs, 4).unwrap();
        assert_eq!(totals.total_debit, dec!(100));
        assert!(totals.is_balanced());
    }

    #[test]
    fn test_unbalanced_legs() {
        let legs = vec![leg(Direction::Debit, dec!(100)), leg(Direction::Credit, dec!(50))];
        assert_eq!(
            validate_amounts(&legs, 4),
            Err(LedgerError::UnbalancedEntry {
                debit: dec!(100),
                credit: dec!(50),
            })
        );
    }

    #[test]
    fn test_off_by_smallest_unit_is_unbalanced() {
        let legs = vec![leg(Direction::Debit, dec!(100.0001)), leg(Direction::Credit, dec!(100))];
        assert!(matches!(
            validate_amounts(&legs, 4),
            Err(LedgerError::UnbalancedEntry { .. })
        ));
    }

    #[test]
    fn test_single_leg_rejected() {
        let legs = vec![leg(Direction::Debit, dec!(100))];
        assert_eq!(validate_leg_count(&legs), Err(LedgerError::InsufficientLegs { count: 1 }));
    }

    #[test]
    fn test_single_sided() {
        let legs = vec![leg(Direction::Debit, dec!(100)), leg(Direction::Debit, dec!(50))];
        assert_eq!(validate_amounts(&legs, 4), Err(LedgerError::SingleSided));
    }

    #[test]
    fn test_negative_amount_rejected() {
        let legs = vec![leg(Direction::Debit, dec!(-100)), leg(Direction::Credit, dec!(-100))];
        assert!(matches!(
            validate_amounts(&legs, 4),
            Err(LedgerError::NonPositiveAmount { index: 0, .. })
        ));
    }

    #[test]
    fn test_excess_precision_rejected_not_rounded() {
        let legs = vec![leg(Direction::Debit, dec!(1.23456)), leg(Direction::Credit, dec!(1.23456))];
        assert!(matches!(
            validate_amounts(&legs, 4),
            Err(LedgerError::ExcessPrecision { scale: 4, .. })
        ));
        // Trailing zeros do not count as precision.
        let legs = vec![leg(Direction::Debit, dec!(1.230000)), leg(Direction::Credit, dec!(1.23))];
        assert!(validate_amounts(&legs, 2).is_ok());
    }
}
