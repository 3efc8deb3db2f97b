//! Property-based tests for deal invariants
//!
//! These tests use proptest to verify critical invariants:
//! - Balance conservation: Σ(utilisations) == amount − remaining_amount
//! - Bounds: 0 ≤ remaining_amount ≤ amount
//! - Audit ordering: monotonically growing, last entry matches status
//! - Durability: journal replay reproduces the in-memory state

use chrono::Utc;
use fx_core::Side;
use fx_deals::{DealStatus, DealsStore, NewDeal};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Strategy for generating deal sizes (whole units, 100k - 10M)
fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (100_000u64..10_000_000u64).prop_map(|units| Decimal::from(units))
}

/// Strategy for generating utilisation slices (1 - 100k)
fn utilisation_strategy() -> impl Strategy<Value = Vec<Decimal>> {
    prop::collection::vec((1u64..100_000u64).prop_map(Decimal::from), 1..20)
}

fn active_deal(store: &DealsStore, amount: Decimal) -> String {
    let deal = store
        .create(NewDeal {
            pair: "USDINR".to_string(),
            side: Side::Sell,
            buy_rate: Decimal::new(8440, 2),
            sell_rate: Decimal::new(8465, 2),
            amount,
            min_amount: Decimal::from(1_000u64),
            valid_from: Utc::now() - chrono::Duration::hours(1),
            valid_until: Utc::now() + chrono::Duration::hours(24),
            created_by: "trader-1".to_string(),
        })
        .unwrap();
    store.submit(&deal.deal_id, "trader-1").unwrap();
    store.approve(&deal.deal_id, "head-of-desk").unwrap();
    deal.deal_id
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: the utilisation log always reconciles with the balance
    #[test]
    fn prop_balance_conservation(amount in amount_strategy(), slices in utilisation_strategy()) {
        let dir = tempfile::tempdir().unwrap();
        let store = DealsStore::open(dir.path().join("deals.journal")).unwrap();
        let deal_id = active_deal(&store, amount);

        for slice in slices {
            // Overdraws fail without touching the balance
            let _ = store.utilize(&deal_id, slice, "ops");
        }

        let deal = store.get(&deal_id).unwrap();
        let utilised: Decimal = deal.utilisations.iter().map(|u| u.amount).sum();

        prop_assert_eq!(utilised, deal.amount - deal.remaining_amount);
        prop_assert!(deal.remaining_amount >= Decimal::ZERO);
        prop_assert!(deal.remaining_amount <= deal.amount);
    }

    /// Property: audit log is time-ordered and its tail matches the status
    #[test]
    fn prop_audit_ordering(amount in amount_strategy(), slices in utilisation_strategy()) {
        let dir = tempfile::tempdir().unwrap();
        let store = DealsStore::open(dir.path().join("deals.journal")).unwrap();
        let deal_id = active_deal(&store, amount);

        for slice in slices {
            let _ = store.utilize(&deal_id, slice, "ops");
        }

        let deal = store.get(&deal_id).unwrap();
        for window in deal.audit.windows(2) {
            prop_assert!(window[0].ts <= window[1].ts);
        }
        prop_assert_eq!(deal.audit.last().unwrap().to, deal.status);
    }

    /// Property: replaying the journal reproduces the live state exactly
    #[test]
    fn prop_replay_reproduces_state(amount in amount_strategy(), slices in utilisation_strategy()) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deals.journal");

        let (deal_id, live_remaining, live_status, live_utilisations) = {
            let store = DealsStore::open(&path).unwrap();
            let deal_id = active_deal(&store, amount);
            for slice in slices {
                let _ = store.utilize(&deal_id, slice, "ops");
            }
            let deal = store.get(&deal_id).unwrap();
            (deal_id, deal.remaining_amount, deal.status, deal.utilisations.len())
        };

        let reopened = DealsStore::open(&path).unwrap();
        let deal = reopened.get(&deal_id).unwrap();
        prop_assert_eq!(deal.remaining_amount, live_remaining);
        prop_assert_eq!(deal.status, live_status);
        prop_assert_eq!(deal.utilisations.len(), live_utilisations);
    }

    /// Property: a utilisation never succeeds past the remaining balance,
    /// and the deal flips to FULLY_UTILIZED only below its minimum
    #[test]
    fn prop_overdraw_never_succeeds(amount in amount_strategy()) {
        let dir = tempfile::tempdir().unwrap();
        let store = DealsStore::open(dir.path().join("deals.journal")).unwrap();
        let deal_id = active_deal(&store, amount);

        prop_assert!(store.utilize(&deal_id, amount + Decimal::ONE, "ops").is_err());

        // Exactly draining the balance is allowed and terminal
        store.utilize(&deal_id, amount, "ops").unwrap();
        let deal = store.get(&deal_id).unwrap();
        prop_assert_eq!(deal.remaining_amount, Decimal::ZERO);
        prop_assert_eq!(deal.status, DealStatus::FullyUtilized);
    }
}
