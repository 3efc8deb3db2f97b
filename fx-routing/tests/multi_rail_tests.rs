//! End-to-end multi-rail routing scenarios against the builtin registries

use std::sync::Arc;

use fx_core::{RailType, RateService, ReferenceRegistry, StaticRateSource, SwapStatus};
use fx_deals::{DealsStore, NewDeal};
use fx_routing::{MultiRailRequest, MultiRailRouter, SmartRouter};
use fx_rules::RulesEngine;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn router() -> MultiRailRouter {
    router_with_deals(None)
}

fn router_with_deals(deals: Option<Arc<DealsStore>>) -> MultiRailRouter {
    let registry = Arc::new(ReferenceRegistry::builtin());
    let rates = Arc::new(RateService::new(Arc::new(StaticRateSource::new()), 2_000, 30));
    let rules = Arc::new(RulesEngine::new());
    let smart = Arc::new(SmartRouter::new(registry.clone(), rules, 0));
    MultiRailRouter::new(registry, rates, smart, deals)
}

fn request(source: &str, target: &str, amount: Decimal) -> MultiRailRequest {
    MultiRailRequest {
        source_currency: source.to_string(),
        target_currency: target.to_string(),
        amount,
        customer_tier: None,
        objective: None,
        filter_regulated: false,
        as_of: None,
    }
}

#[tokio::test]
async fn test_mbridge_corridor_wins_cbdc_to_cbdc() {
    let response = router()
        .route(&request("e-CNY", "e-AED", dec!(500_000)))
        .await
        .unwrap();

    assert_eq!(response.source_rail, RailType::Cbdc);
    assert_eq!(response.best_route.rail, RailType::Cbdc);
    assert_eq!(response.best_route.template, "MBRIDGE_PVP");
    assert_eq!(response.best_route.total_cost_bps, 13);
    assert!(response.best_route.settlement_seconds <= 30);
    assert!(response.best_route.annotations.mbridge);

    let templates: Vec<&str> = response
        .all_routes
        .iter()
        .map(|r| r.template.as_str())
        .collect();
    assert!(templates.contains(&"PROJECT_NEXUS"));
    assert!(templates.contains(&"FIAT_BRIDGE"));
}

#[tokio::test]
async fn test_atomic_swap_surfaced_as_experimental() {
    let response = router()
        .route(&request("e-INR", "USDC", dec!(50_000)))
        .await
        .unwrap();

    let swap = response
        .all_routes
        .iter()
        .find(|r| r.template == "ATOMIC_SWAP")
        .expect("atomic swap route expected");

    assert!(swap.annotations.experimental);
    assert_eq!(swap.annotations.swap_status, Some(SwapStatus::Experimental));
    assert_eq!(swap.total_cost_bps, 5);
    assert_eq!(swap.settlement_seconds, 300);

    // e-INR is not an mBridge participant, so the hybrid cannot materialise
    assert!(response
        .inapplicable
        .iter()
        .any(|s| s.template == "MBRIDGE_HYBRID"));
}

#[tokio::test]
async fn test_pilot_swap_corridor_annotated_experimental() {
    // The e-HKD/USDC corridor is in PILOT; it is still not production-grade
    let response = router()
        .route(&request("e-HKD", "USDC", dec!(50_000)))
        .await
        .unwrap();

    let swap = response
        .all_routes
        .iter()
        .find(|r| r.template == "ATOMIC_SWAP")
        .expect("atomic swap route expected");

    assert_eq!(swap.annotations.swap_status, Some(SwapStatus::Pilot));
    assert!(swap.annotations.experimental);
}

#[tokio::test]
async fn test_filter_regulated_suppresses_atomic_swap() {
    let mut req = request("e-INR", "USDC", dec!(50_000));
    req.filter_regulated = true;

    let response = router().route(&req).await.unwrap();

    assert!(response
        .all_routes
        .iter()
        .all(|r| r.template != "ATOMIC_SWAP"));
    assert!(response.all_routes.iter().all(|r| r.regulated));
    assert_eq!(response.best_route.template, "FIAT_BRIDGE");
    assert!(response
        .inapplicable
        .iter()
        .any(|s| s.template == "ATOMIC_SWAP" && s.reason.contains("filter_regulated")));
}

#[tokio::test]
async fn test_best_route_dominates_all_routes() {
    for (source, target) in [
        ("USD", "INR"),
        ("USD", "e-INR"),
        ("e-CNY", "e-AED"),
        ("USD", "USDC"),
        ("USDC", "USD"),
        ("USDC", "USDT"),
        ("USDC", "e-HKD"),
        ("e-HKD", "USDC"),
        ("e-INR", "INR"),
    ] {
        let response = router()
            .route(&request(source, target, dec!(100_000)))
            .await
            .unwrap();

        for route in &response.all_routes {
            assert!(
                response.best_route.score >= route.score,
                "{}->{}: best {} < {}",
                source,
                target,
                response.best_route.score,
                route.score
            );
            assert!(route.total_cost_bps >= 0);
            assert!(route.settlement_seconds > 0);
        }
    }
}

#[tokio::test]
async fn test_direct_mint_requires_linked_fiat() {
    // USD -> e-INR: the linked fiat is INR, so DIRECT_MINT cannot apply
    // and FX_THEN_MINT carries the conversion
    let response = router()
        .route(&request("USD", "e-INR", dec!(100_000)))
        .await
        .unwrap();

    assert!(response
        .inapplicable
        .iter()
        .any(|s| s.template == "DIRECT_MINT"));
    assert!(response
        .all_routes
        .iter()
        .any(|r| r.template == "FX_THEN_MINT"));

    // INR -> e-INR mints directly at zero cost
    let direct = router()
        .route(&request("INR", "e-INR", dec!(100_000)))
        .await
        .unwrap();
    let mint = direct
        .all_routes
        .iter()
        .find(|r| r.template == "DIRECT_MINT")
        .expect("direct mint expected");
    assert_eq!(mint.total_cost_bps, 0);
}

#[tokio::test]
async fn test_circle_onramp_only_from_peg_currency() {
    let usd = router()
        .route(&request("USD", "USDC", dec!(100_000)))
        .await
        .unwrap();
    assert!(usd.all_routes.iter().any(|r| r.template == "CIRCLE_ONRAMP"));
    assert_eq!(usd.best_route.template, "CIRCLE_ONRAMP");

    // From SGD the issuer mint is inapplicable; the FX on-ramp covers it
    let sgd = router()
        .route(&request("SGD", "USDC", dec!(100_000)))
        .await
        .unwrap();
    assert!(sgd
        .inapplicable
        .iter()
        .any(|s| s.template == "CIRCLE_ONRAMP"));
    assert!(sgd.all_routes.iter().any(|r| r.template == "FX_ONRAMP"));
}

#[tokio::test]
async fn test_stablecoin_cross_uses_fiat_mid() {
    // USDC -> EURC settles against the USDEUR mid
    let response = router()
        .route(&request("USDC", "EURC", dec!(100_000)))
        .await
        .unwrap();

    // 1/1.0825 EUR per USD, cheapened by the route cost
    let eurusd_mid = dec!(1.0825);
    let implied = Decimal::ONE / eurusd_mid;
    assert!((response.best_route.rate - implied).abs() / implied < dec!(0.01));
}

#[tokio::test]
async fn test_active_deal_injected_as_fiat_route() {
    let dir = tempfile::tempdir().unwrap();
    let deals = Arc::new(DealsStore::open(dir.path().join("deals.journal")).unwrap());

    let deal = deals
        .create(NewDeal {
            pair: "USDINR".to_string(),
            side: fx_core::Side::Sell,
            buy_rate: dec!(84.30),
            sell_rate: dec!(84.95),
            amount: dec!(500_000),
            min_amount: dec!(10_000),
            valid_from: chrono::Utc::now() - chrono::Duration::hours(1),
            valid_until: chrono::Utc::now() + chrono::Duration::hours(12),
            created_by: "trader-1".to_string(),
        })
        .unwrap();
    deals.submit(&deal.deal_id, "trader-1").unwrap();
    deals.approve(&deal.deal_id, "head-of-desk").unwrap();

    let response = router_with_deals(Some(deals))
        .route(&request("USD", "INR", dec!(100_000)))
        .await
        .unwrap();

    let deal_route = response
        .all_routes
        .iter()
        .find(|r| r.template == "TREASURY_DEAL")
        .expect("deal route expected");
    assert_eq!(deal_route.rate, dec!(84.95));
    assert_eq!(deal_route.total_cost_bps, 0);
    assert_eq!(
        deal_route.annotations.deal_id.as_deref(),
        Some(deal.deal_id.as_str())
    );
    // Zero cost and full STP put the deal at the head
    assert_eq!(response.best_route.template, "TREASURY_DEAL");
}

#[tokio::test]
async fn test_unpriceable_pair_is_rate_unavailable() {
    let err = router()
        .route(&request("XAU", "XAG", dec!(100_000)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        fx_routing::Error::Core(fx_core::Error::RateUnavailable { .. })
    ));
}
