//! Deal-vs-treasury best-rate arbitration
//!
//! An active, in-range deal is only worth offering when its committed rate
//! strictly beats the live treasury rate as the customer would receive it
//! (position bias and tier spread reduction applied; no provider markup on
//! the direct desk side).

use chrono::{DateTime, Utc};
use fx_core::{apply_margin_bps, CustomerTier, Side, TreasuryRate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::store::DealsStore;
use crate::types::Deal;

/// Where the winning rate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BestRateSource {
    Deal,
    Treasury,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BestRateResult {
    pub source: BestRateSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deal_id: Option<String>,
    /// The rate the customer gets
    pub rate: Decimal,
    /// The adjusted treasury rate the deal was compared against
    pub treasury_rate: Decimal,
    /// Improvement over treasury; zero when treasury wins
    pub savings_bps: Decimal,
}

impl DealsStore {
    /// Arbitrate between the best active deal and the live treasury rate
    pub fn best_rate(
        &self,
        pair: &str,
        side: Side,
        amount: Decimal,
        tier: Option<&CustomerTier>,
        treasury: &TreasuryRate,
        now: DateTime<Utc>,
    ) -> BestRateResult {
        let comparable = adjusted_treasury_rate(treasury, side, tier);

        let mut candidates = self.active_candidates(pair, side, amount, now);
        rank_candidates(&mut candidates, side);

        let winner = candidates.into_iter().next().filter(|deal| {
            let rate = deal.committed_rate();
            match side {
                // A SELL customer wants the higher rate
                Side::Sell => rate > comparable,
                // A BUY customer wants the lower rate
                Side::Buy => rate < comparable,
            }
        });

        match winner {
            Some(deal) => {
                let rate = deal.committed_rate();
                let savings_bps = if comparable.is_zero() {
                    Decimal::ZERO
                } else {
                    ((rate - comparable) / comparable * dec!(10_000)).abs()
                };
                BestRateResult {
                    source: BestRateSource::Deal,
                    deal_id: Some(deal.deal_id),
                    rate,
                    treasury_rate: comparable,
                    savings_bps,
                }
            }
            None => BestRateResult {
                source: BestRateSource::Treasury,
                deal_id: None,
                rate: comparable,
                treasury_rate: comparable,
                savings_bps: Decimal::ZERO,
            },
        }
    }
}

/// Treasury anchor adjusted for position bias and tier spread reduction
fn adjusted_treasury_rate(treasury: &TreasuryRate, side: Side, tier: Option<&CustomerTier>) -> Decimal {
    let bias_bps = treasury.position_bias_bps(side);
    let spread_reduction_bps = tier.map(|t| t.spread_reduction_bps).unwrap_or(0);
    let total_bps = Decimal::from(bias_bps - spread_reduction_bps);
    apply_margin_bps(treasury.anchor(side), side, total_bps)
}

/// Best-for-customer first: SELL by rate descending, BUY ascending;
/// ties go to the deal expiring sooner
fn rank_candidates(candidates: &mut [Deal], side: Side) {
    candidates.sort_by(|a, b| {
        let by_rate = match side {
            Side::Sell => b.sell_rate.cmp(&a.sell_rate),
            Side::Buy => a.buy_rate.cmp(&b.buy_rate),
        };
        by_rate.then_with(|| a.valid_until.cmp(&b.valid_until))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NewDeal;
    use fx_core::TreasuryPosition;

    fn treasury() -> TreasuryRate {
        TreasuryRate {
            pair: "USDINR".to_string(),
            bid: dec!(84.42),
            ask: dec!(84.55),
            mid: dec!(84.48),
            min_margin_bps: 5,
            target_margin_bps: 20,
            max_exposure: dec!(100_000_000),
            current_exposure: Decimal::ZERO,
            position: TreasuryPosition::Neutral,
            valid_until: Utc::now() + chrono::Duration::minutes(5),
        }
    }

    fn sell_deal(store: &DealsStore, sell_rate: Decimal, amount: Decimal) -> Deal {
        let deal = store
            .create(NewDeal {
                pair: "USDINR".to_string(),
                side: Side::Sell,
                buy_rate: dec!(84.30),
                sell_rate,
                amount,
                min_amount: dec!(10_000),
                valid_from: Utc::now() - chrono::Duration::hours(1),
                valid_until: Utc::now() + chrono::Duration::hours(12),
                created_by: "trader-1".to_string(),
            })
            .unwrap();
        store.submit(&deal.deal_id, "trader-1").unwrap();
        store.approve(&deal.deal_id, "head-of-desk").unwrap()
    }

    fn open_store() -> (DealsStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = DealsStore::open(dir.path().join("deals.journal")).unwrap();
        (store, dir)
    }

    #[test]
    fn test_deal_preempts_worse_treasury_rate() {
        let (store, _dir) = open_store();
        let deal = sell_deal(&store, dec!(84.65), dec!(200_000));

        let result = store.best_rate(
            "USDINR",
            Side::Sell,
            dec!(100_000),
            None,
            &treasury(),
            Utc::now(),
        );

        assert_eq!(result.source, BestRateSource::Deal);
        assert_eq!(result.deal_id.as_deref(), Some(deal.deal_id.as_str()));
        assert_eq!(result.rate, dec!(84.65));
        assert!(result.savings_bps > Decimal::ZERO);

        // Consuming the winning deal appends a utilisation entry
        let after = store.utilize(&deal.deal_id, dec!(100_000), "router").unwrap();
        assert_eq!(after.remaining_amount, dec!(100_000));
        assert_eq!(after.utilisations.len(), 1);
    }

    #[test]
    fn test_treasury_wins_when_deal_rate_worse() {
        let (store, _dir) = open_store();
        sell_deal(&store, dec!(84.40), dec!(200_000));

        let result = store.best_rate(
            "USDINR",
            Side::Sell,
            dec!(100_000),
            None,
            &treasury(),
            Utc::now(),
        );

        assert_eq!(result.source, BestRateSource::Treasury);
        assert_eq!(result.savings_bps, Decimal::ZERO);
        assert!(result.deal_id.is_none());
    }

    #[test]
    fn test_amount_below_deal_minimum_skipped() {
        let (store, _dir) = open_store();
        sell_deal(&store, dec!(84.90), dec!(200_000));

        let result = store.best_rate(
            "USDINR",
            Side::Sell,
            dec!(5_000), // below the 10k deal minimum
            None,
            &treasury(),
            Utc::now(),
        );

        assert_eq!(result.source, BestRateSource::Treasury);
    }

    #[test]
    fn test_highest_sell_rate_wins_ranking() {
        let (store, _dir) = open_store();
        sell_deal(&store, dec!(84.60), dec!(200_000));
        let better = sell_deal(&store, dec!(84.70), dec!(200_000));

        let result = store.best_rate(
            "USDINR",
            Side::Sell,
            dec!(50_000),
            None,
            &treasury(),
            Utc::now(),
        );

        assert_eq!(result.deal_id.as_deref(), Some(better.deal_id.as_str()));
    }

    #[test]
    fn test_tier_spread_reduction_tightens_comparison() {
        let (store, _dir) = open_store();
        // Deal barely better than the raw ask
        sell_deal(&store, dec!(84.56), dec!(200_000));

        let platinum = CustomerTier {
            id: "PLATINUM".to_string(),
            min_annual_volume: dec!(50_000_000),
            markup_discount_pct: dec!(50),
            spread_reduction_bps: 10,
            priority_routing: true,
            max_transaction: dec!(10_000_000),
            stp_threshold: dec!(1_000_000),
            default_objective: fx_core::Objective::Optimum,
            providers_allowed: None,
        };

        // Spread reduction lifts the treasury SELL rate above the deal
        let result = store.best_rate(
            "USDINR",
            Side::Sell,
            dec!(50_000),
            Some(&platinum),
            &treasury(),
            Utc::now(),
        );
        assert_eq!(result.source, BestRateSource::Treasury);
    }
}
