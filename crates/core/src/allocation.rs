//! Percentage allocation with a single rounding policy.
//!
//! Every share is rounded with the engine's [`RoundingPolicy`]. Whatever the
//! rounded shares fail to cover is pushed onto the largest share, so the
//! sum of the shares always equals the rounded target exactly.
//!
//! The target is `total * sum(percentages) / 100`: a full 100% split
//! reproduces `total`, a partial split reproduces the covered part. The
//! same holds for quantity ratios through [`AllocationUtil::allocate_by_ratio`].

use rust_decimal::Decimal;
use tally_shared::types::RoundingPolicy;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Allocation utility for distributing amounts.
pub struct AllocationUtil;

impl AllocationUtil {
    /// Amount attributed to a single percentage of `total`.
    ///
    /// ```
    /// use rust_decimal_macros::dec;
    /// use tally_core::allocation::AllocationUtil;
    /// use tally_shared::types::RoundingPolicy;
    ///
    /// let share = AllocationUtil::amount_for_percentage(dec!(900), dec!(60), 2, RoundingPolicy::Bankers);
    /// assert_eq!(share, dec!(540));
    /// ```
    #[must_use]
    pub fn amount_for_percentage(
        total: Decimal,
        percentage: Decimal,
        scale: u32,
        policy: RoundingPolicy,
    ) -> Decimal {
        policy.round(total * percentage / HUNDRED, scale)
    }

    /// Allocate `total` by percentages.
    ///
    /// Returns one share per percentage, in input order. The rounding
    /// residue goes to the share with the largest percentage (first one on
    /// ties).
    ///
    /// ```
    /// use rust_decimal_macros::dec;
    /// use tally_core::allocation::AllocationUtil;
    /// use tally_shared::types::RoundingPolicy;
    ///
    /// let shares = AllocationUtil::allocate_by_percentages(
    ///     dec!(100),
    ///     &[dec!(33.3333), dec!(33.3333), dec!(33.3334)],
    ///     2,
    ///     RoundingPolicy::Bankers,
    /// );
    /// assert_eq!(shares.iter().copied().sum::<rust_decimal::Decimal>(), dec!(100));
    /// ```
    #[must_use]
    pub fn allocate_by_percentages(
        total: Decimal,
        percentages: &[Decimal],
        scale: u32,
        policy: RoundingPolicy,
    ) -> Vec<Decimal> {
        Self::allocate_by_ratio(total, percentages, HUNDRED, scale, policy)
    }

    /// Allocate `total` by `parts` of `whole`.
    ///
    /// Each share is `total * part / whole`; the target is
    /// `total * sum(parts) / whole`, and the residue goes to the largest
    /// part (first one on ties). Returns nothing when `whole` is zero.
    ///
    /// ```
    /// use rust_decimal_macros::dec;
    /// use tally_core::allocation::AllocationUtil;
    /// use tally_shared::types::RoundingPolicy;
    ///
    /// // Three single units of a three-unit line.
    /// let shares = AllocationUtil::allocate_by_ratio(
    ///     dec!(100),
    ///     &[dec!(1), dec!(1), dec!(1)],
    ///     dec!(3),
    ///     2,
    ///     RoundingPolicy::Bankers,
    /// );
    /// assert_eq!(shares, vec![dec!(33.34), dec!(33.33), dec!(33.33)]);
    /// ```
    #[must_use]
    pub fn allocate_by_ratio(
        total: Decimal,
        parts: &[Decimal],
        whole: Decimal,
        scale: u32,
        policy: RoundingPolicy,
    ) -> Vec<Decimal> {
        if parts.is_empty() || whole.is_zero() {
            return vec![];
        }

        let covered: Decimal = parts.iter().copied().sum();
        let target = policy.round(total * covered / whole, scale);

        let mut shares: Vec<Decimal> = parts
            .iter()
            .map(|p| policy.round(total * *p / whole, scale))
            .collect();

        let remainder = target - shares.iter().copied().sum::<Decimal>();
        if !remainder.is_zero() {
            let largest = Self::largest_index(parts);
            shares[largest] += remainder;
        }

        shares
    }

    /// Allocate `total` equally across `count` recipients.
    ///
    /// Used when an amount must be spread over a set of dimension values
    /// without explicit percentages.
    #[must_use]
    pub fn allocate_equal(
        total: Decimal,
        count: usize,
        scale: u32,
        policy: RoundingPolicy,
    ) -> Vec<Decimal> {
        if count == 0 {
            return vec![];
        }
        let count_dec = Decimal::from(count as u64);
        let percentages = vec![HUNDRED / count_dec; count];
        Self::allocate_by_percentages(total, &percentages, scale, policy)
    }

    fn largest_index(values: &[Decimal]) -> usize {
        values
            .iter()
            .enumerate()
            .fold((0, Decimal::MIN), |(best_idx, best), (idx, value)| {
                if *value > best {
                    (idx, *value)
                } else {
                    (best_idx, best)
                }
            })
            .0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const BANKERS: RoundingPolicy = RoundingPolicy::Bankers;

    #[test]
    fn test_sixty_forty_split() {
        let result = AllocationUtil::allocate_by_percentages(dec!(900), &[dec!(60), dec!(40)], 2, BANKERS);
        assert_eq!(result, vec![dec!(540), dec!(360)]);
    }

    #[test]
    fn test_thirds_residue_goes_to_largest_share() {
        // 100 / 3 at 2dp: shares 33.33 each, residue 0.01 onto the first
        // of the (equal) largest percentages.
        let result = AllocationUtil::allocate_equal(dec!(100), 3, 2, BANKERS);
        assert_eq!(result, vec![dec!(33.34), dec!(33.33), dec!(33.33)]);
        assert_eq!(result.iter().copied().sum::<Decimal>(), dec!(100));
    }

    #[test]
    fn test_residue_lands_on_largest_percentage() {
        let result = AllocationUtil::allocate_by_percentages(
            dec!(10),
            &[dec!(33.3333), dec!(33.3334), dec!(33.3333)],
            2,
            BANKERS,
        );
        assert_eq!(result.iter().copied().sum::<Decimal>(), dec!(10));
        assert_eq!(result[1], dec!(3.34));
    }

    #[test]
    fn test_partial_coverage_sums_to_covered_part() {
        let result = AllocationUtil::allocate_by_percentages(dec!(200), &[dec!(25), dec!(25)], 2, BANKERS);
        assert_eq!(result, vec![dec!(50), dec!(50)]);
    }

    #[test]
    fn test_ratio_of_quantities() {
        let result = AllocationUtil::allocate_by_ratio(dec!(1000), &[dec!(2), dec!(5)], dec!(10), 2, BANKERS);
        assert_eq!(result, vec![dec!(200), dec!(500)]);
        assert!(AllocationUtil::allocate_by_ratio(dec!(1000), &[dec!(2)], Decimal::ZERO, 2, BANKERS).is_empty());
    }

    #[test]
    fn test_empty_percentages() {
        assert!(AllocationUtil::allocate_by_percentages(dec!(100), &[], 2, BANKERS).is_empty());
        assert!(AllocationUtil::allocate_equal(dec!(100), 0, 2, BANKERS).is_empty());
    }

    #[test]
    fn test_policy_applies_to_each_share() {
        // 0.05 * 50% = 0.025 -> bankers 0.02, half-up 0.03
        assert_eq!(
            AllocationUtil::amount_for_percentage(dec!(0.05), dec!(50), 2, RoundingPolicy::Bankers),
            dec!(0.02)
        );
        assert_eq!(
            AllocationUtil::amount_for_percentage(dec!(0.05), dec!(50), 2, RoundingPolicy::HalfUp),
            dec!(0.03)
        );
    }
}
