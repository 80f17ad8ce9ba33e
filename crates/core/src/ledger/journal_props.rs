//! Property-based tests for posting and reversal against a chart.

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use tally_shared::types::{AccountId, Currency};

use super::journal::Journal;
use super::types::{LegInput, Origin, PostingRules, TransactionHeader};
use crate::accounts::{AccountType, ChartOfAccounts, CreateAccountInput, HierarchyRules};

fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Two asset leaves under one group, plus a revenue account.
fn chart() -> (ChartOfAccounts, AccountId, [AccountId; 2], AccountId) {
    let mut chart = ChartOfAccounts::new();
    let rules = HierarchyRules::default();
    let now = Utc::now();
    let group = chart
        .create(CreateAccountInput::new("1000", "Assets", AccountType::Asset), rules, Currency::Usd, now)
        .unwrap();
    let a = chart
        .create(CreateAccountInput::new("1100", "Cash", AccountType::Asset).under(group.id), rules, Currency::Usd, now)
        .unwrap();
    let b = chart
        .create(CreateAccountInput::new("1200", "AR", AccountType::Asset).under(group.id), rules, Currency::Usd, now)
        .unwrap();
    let revenue = chart
        .create(CreateAccountInput::new("4000", "Sales", AccountType::Revenue), rules, Currency::Usd, now)
        .unwrap();
    (chart, group.id, [a.id, b.id], revenue.id)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// After any sequence of postings, every group equals the sum of its
    /// children and every cached total equals a replay of posted lines.
    #[test]
    fn prop_rollup_and_replay_agree(postings in prop::collection::vec((positive_amount(), any::<bool>()), 1..20)) {
        let (mut chart, group, leaves, revenue) = chart();
        let mut journal = Journal::new();
        let date = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();

        for (amount, first) in postings {
            let leaf = if first { leaves[0] } else { leaves[1] };
            let prepared = journal
                .prepare_posting(
                    &chart,
                    TransactionHeader::new(date, "sale", Origin::Sales),
                    vec![LegInput::debit(leaf, amount), LegInput::credit(revenue, amount)],
                    PostingRules::default(),
                    Utc::now(),
                )
                .unwrap();
            journal.commit(&mut chart, prepared, Utc::now());
        }

        let children_sum: Decimal = leaves
            .iter()
            .map(|id| chart.get(*id).unwrap().totals.balance)
            .sum();
        prop_assert_eq!(chart.get(group).unwrap().totals.balance, children_sum);
        prop_assert_eq!(chart.get(revenue).unwrap().totals.balance, children_sum);
        prop_assert!(chart.rollup_mismatches().is_empty());
        prop_assert!(journal.balance_drift(&chart).is_empty());
    }

    /// reverse(post(T)) restores every affected balance.
    #[test]
    fn prop_reverse_restores_balances(
        existing in positive_amount(),
        amount in positive_amount(),
    ) {
        let (mut chart, group, leaves, revenue) = chart();
        let mut journal = Journal::new();
        let date = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();

        let seed = journal
            .prepare_posting(
                &chart,
                TransactionHeader::new(date, "seed", Origin::Manual),
                vec![LegInput::debit(leaves[0], existing), LegInput::credit(revenue, existing)],
                PostingRules::default(),
                Utc::now(),
            )
            .unwrap();
        journal.commit(&mut chart, seed, Utc::now());
        let before: Vec<Decimal> = [group, leaves[0], leaves[1], revenue]
            .iter()
            .map(|id| chart.get(*id).unwrap().totals.balance)
            .collect();

        let posted = journal
            .prepare_posting(
                &chart,
                TransactionHeader::new(date, "sale", Origin::Sales),
                vec![LegInput::debit(leaves[1], amount), LegInput::credit(revenue, amount)],
                PostingRules::default(),
                Utc::now(),
            )
            .unwrap();
        let tx = journal.commit(&mut chart, posted, Utc::now());
        let reversal = journal.prepare_reversal(tx.id, "undo", Utc::now()).unwrap();
        journal.commit(&mut chart, reversal, Utc::now());

        let after: Vec<Decimal> = [group, leaves[0], leaves[1], revenue]
            .iter()
            .map(|id| chart.get(*id).unwrap().totals.balance)
            .collect();
        prop_assert_eq!(before, after);
    }
}
