//! Property-based tests for percentage allocation.

use proptest::prelude::*;
use rust_decimal::Decimal;
use tally_shared::types::RoundingPolicy;

use crate::allocation::AllocationUtil;

/// Strategy to generate positive decimal amounts (0.01 to 1,000,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate percentages that sum to 100.
fn percentages_summing_to_100() -> impl Strategy<Value = Vec<Decimal>> {
    prop::collection::vec(1u32..100, 2..10).prop_map(|values| {
        let sum: u32 = values.iter().sum();
        let hundred = Decimal::ONE_HUNDRED;
        let mut pcts: Vec<Decimal> = values
            .iter()
            .map(|v| (hundred * Decimal::from(*v) / Decimal::from(sum)).round_dp(4))
            .collect();
        // Fold the rounding drift into the last bucket so the sum is exact.
        let drift = hundred - pcts.iter().copied().sum::<Decimal>();
        if let Some(last) = pcts.last_mut() {
            *last += drift;
        }
        pcts
    })
}

fn policy() -> impl Strategy<Value = RoundingPolicy> {
    prop_oneof![Just(RoundingPolicy::Bankers), Just(RoundingPolicy::HalfUp)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// A full split always reproduces the total to the cent.
    #[test]
    fn prop_full_split_sums_to_total(
        total in positive_amount(),
        percentages in percentages_summing_to_100(),
        policy in policy(),
    ) {
        let shares = AllocationUtil::allocate_by_percentages(total, &percentages, 2, policy);
        prop_assert_eq!(shares.len(), percentages.len());
        prop_assert_eq!(shares.iter().copied().sum::<Decimal>(), total);
    }

    /// Every share carries at most the configured scale.
    #[test]
    fn prop_shares_respect_scale(
        total in positive_amount(),
        percentages in percentages_summing_to_100(),
        policy in policy(),
    ) {
        for share in AllocationUtil::allocate_by_percentages(total, &percentages, 2, policy) {
            prop_assert!(share.scale() <= 2);
        }
    }

    /// Equal splits differ by at most one minor unit.
    #[test]
    fn prop_equal_split_is_fair(total in positive_amount(), count in 1usize..50) {
        let shares = AllocationUtil::allocate_equal(total, count, 2, RoundingPolicy::Bankers);
        prop_assert_eq!(shares.iter().copied().sum::<Decimal>(), total);
        let max = shares.iter().copied().max().unwrap_or_default();
        let min = shares.iter().copied().min().unwrap_or_default();
        prop_assert!(max - min <= Decimal::new(1, 2) * Decimal::from(count as u64));
    }
}
