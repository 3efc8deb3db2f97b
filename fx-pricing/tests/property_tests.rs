//! Property-based tests for pricing invariants
//!
//! These tests use proptest to verify critical invariants:
//! - The clamped margin always lands inside the segment band
//! - The customer rate differs from mid by exactly the composed margin
//! - Quote round-trip: amount x customer_rate reproduces target_amount

use std::sync::Arc;

use fx_core::{RateService, ReferenceRegistry, Side, StaticRateSource};
use fx_pricing::{PriceRequest, PricingEngine};
use fx_rules::RulesEngine;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn engine() -> PricingEngine {
    let registry = Arc::new(ReferenceRegistry::builtin());
    let rates = Arc::new(RateService::new(Arc::new(StaticRateSource::new()), 2_000, 30));
    PricingEngine::new(registry, rates, Arc::new(RulesEngine::new()), 60, 0)
}

fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (1u64..5_000_000_00u64).prop_map(|cents| Decimal::new(cents as i64, 2))
}

fn segment_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("RETAIL"),
        Just("SMALL_BUSINESS"),
        Just("MID_MARKET"),
        Just("CORPORATE"),
        Just("INSTITUTIONAL"),
    ]
}

fn side_strategy() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Sell), Just(Side::Buy)]
}

fn target_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("INR"), Just("AED"), Just("SGD"), Just("JPY"), Just("MXN")]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: the margin always respects the segment band
    #[test]
    fn prop_margin_within_segment_band(
        amount in amount_strategy(),
        segment in segment_strategy(),
        side in side_strategy(),
        target in target_strategy(),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let engine = engine();
            let quote = engine
                .quote(&PriceRequest {
                    source_currency: "USD".to_string(),
                    target_currency: target.to_string(),
                    amount,
                    customer_id: "CUST-1".to_string(),
                    segment: segment.to_string(),
                    direction: side,
                    as_of: None,
                    office: None,
                    customer_tier: None,
                })
                .await
                .unwrap();

            let snapshot = ReferenceRegistry::builtin().snapshot();
            let band = snapshot.segment(segment).unwrap();
            prop_assert!(quote.margin_bps >= Decimal::from(band.min_margin_bps));
            prop_assert!(quote.margin_bps <= Decimal::from(band.max_margin_bps));
            Ok(())
        })?;
    }

    /// Property: customer_rate is mid worsened by exactly margin_bps
    #[test]
    fn prop_rate_matches_margin(
        amount in amount_strategy(),
        segment in segment_strategy(),
        side in side_strategy(),
        target in target_strategy(),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let engine = engine();
            let quote = engine
                .quote(&PriceRequest {
                    source_currency: "USD".to_string(),
                    target_currency: target.to_string(),
                    amount,
                    customer_id: "CUST-1".to_string(),
                    segment: segment.to_string(),
                    direction: side,
                    as_of: None,
                    office: None,
                    customer_tier: None,
                })
                .await
                .unwrap();

            let factor = quote.margin_bps / dec!(10_000);
            let expected = match side {
                Side::Sell => quote.mid_rate * (Decimal::ONE - factor),
                Side::Buy => quote.mid_rate * (Decimal::ONE + factor),
            };
            prop_assert_eq!(quote.customer_rate, expected);
            Ok(())
        })?;
    }

    /// Property: recomputing target_amount from the quote stays within 1 bp
    #[test]
    fn prop_round_trip_within_one_bp(
        amount in amount_strategy(),
        segment in segment_strategy(),
        side in side_strategy(),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let engine = engine();
            let quote = engine
                .quote(&PriceRequest {
                    source_currency: "USD".to_string(),
                    target_currency: "INR".to_string(),
                    amount,
                    customer_id: "CUST-1".to_string(),
                    segment: segment.to_string(),
                    direction: side,
                    as_of: None,
                    office: None,
                    customer_tier: None,
                })
                .await
                .unwrap();

            let recomputed = match side {
                Side::Sell => quote.amount * quote.customer_rate,
                Side::Buy => quote.amount / quote.customer_rate,
            };
            let diff_bps = ((recomputed - quote.target_amount) / quote.target_amount).abs()
                * dec!(10_000);
            prop_assert!(diff_bps <= Decimal::ONE);
            Ok(())
        })?;
    }
}
