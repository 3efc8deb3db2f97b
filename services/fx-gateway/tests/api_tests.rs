//! HTTP surface tests against an in-process service

use std::sync::Arc;

use actix_web::{test, web, App};
use fx_core::Config;
use fx_gateway::{handlers, AppState};
use serde_json::{json, Value};

fn test_state() -> (Arc<AppState>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        data_dir: dir.path().to_path_buf(),
        ..Config::default()
    };
    (Arc::new(AppState::initialise(config).unwrap()), dir)
}

macro_rules! test_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.clone()))
                .configure(handlers::configure_routes),
        )
        .await
    };
}

#[actix_web::test]
async fn test_health() {
    let (state, _dir) = test_state();
    let app = test_app!(state);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert!(resp.status().is_success());
}

#[actix_web::test]
async fn test_recommend_endpoint() {
    let (state, _dir) = test_state();
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/v1/fx/routing/recommend")
        .set_json(json!({
            "source_currency": "USD",
            "target_currency": "INR",
            "side": "SELL",
            "amount": "100000",
            "customer_tier": "GOLD",
            "objective": "BEST_RATE"
        }))
        .to_request();

    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(
        body["recommendation"]["recommended"]["provider_id"],
        "TREASURY_INTERNAL"
    );
    assert_eq!(body["recommendation"]["objective"], "BEST_RATE");
}

#[actix_web::test]
async fn test_quote_endpoint_clamps_margin() {
    let (state, _dir) = test_state();
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/v1/fx/pricing/quote")
        .set_json(json!({
            "source_currency": "USD",
            "target_currency": "INR",
            "amount": "1000",
            "customer_id": "CUST-1",
            "segment": "MID_MARKET",
            "direction": "SELL"
        }))
        .to_request();

    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["margin_bps"], "150");
    assert_eq!(body["rate_type"], "FIRM");
}

#[actix_web::test]
async fn test_deal_lifecycle_over_http() {
    let (state, _dir) = test_state();
    let app = test_app!(state);

    let created: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/fx/deals")
            .set_json(json!({
                "pair": "USDINR",
                "side": "SELL",
                "buy_rate": "84.40",
                "sell_rate": "84.65",
                "amount": "200000",
                "min_amount": "10000",
                "valid_from": chrono::Utc::now() - chrono::Duration::hours(1),
                "valid_until": chrono::Utc::now() + chrono::Duration::hours(24),
                "created_by": "trader-1"
            }))
            .to_request(),
    )
    .await;
    let deal_id = created["deal_id"].as_str().unwrap().to_string();

    // Approving a DRAFT is a state conflict
    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&format!("/api/v1/fx/deals/{}/approve", deal_id))
            .set_json(json!({"approved_by": "head-of-desk"}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 409);

    for (path, body) in [
        ("submit", json!({"submitted_by": "trader-1"})),
        ("approve", json!({"approved_by": "head-of-desk"})),
    ] {
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri(&format!("/api/v1/fx/deals/{}/{}", deal_id, path))
                .set_json(body)
                .to_request(),
        )
        .await;
        assert!(resp.status().is_success(), "{} failed", path);
    }

    // The active deal beats the treasury ask in arbitration
    let best: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri("/api/v1/fx/deals/best-rate?source_currency=USD&target_currency=INR&side=SELL&amount=100000")
            .to_request(),
    )
    .await;
    assert_eq!(best["source"], "DEAL");
    assert_eq!(best["rate"], "84.65");

    let utilised: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri(&format!("/api/v1/fx/deals/{}/utilize", deal_id))
            .set_json(json!({"amount": "100000", "by": "router"}))
            .to_request(),
    )
    .await;
    assert_eq!(utilised["remaining_amount"], "100000");
}

#[actix_web::test]
async fn test_multi_rail_endpoint() {
    let (state, _dir) = test_state();
    let app = test_app!(state);

    let body: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/fx/multi-rail/route")
            .set_json(json!({
                "source_currency": "e-CNY",
                "target_currency": "e-AED",
                "amount": "500000"
            }))
            .to_request(),
    )
    .await;

    assert_eq!(body["best_route"]["template"], "MBRIDGE_PVP");
    assert_eq!(body["best_route"]["rail"], "CBDC");
}

#[actix_web::test]
async fn test_unknown_deal_is_404() {
    let (state, _dir) = test_state();
    let app = test_app!(state);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/v1/fx/deals/DEAL-missing")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn test_rule_management_endpoints() {
    let (state, _dir) = test_state();
    let app = test_app!(state);

    let rule = json!({
        "rule_id": "PREFER_WISE_SB",
        "rule_name": "Prefer Wise for small business",
        "rule_type": "PROVIDER_SELECTION",
        "priority": 90,
        "enabled": true,
        "valid_from": "2026-01-01T00:00:00Z",
        "conditions": {
            "operator": "AND",
            "criteria": [
                {"field": "customer_segment", "operator": "EQUALS", "value": "SMALL_BUSINESS"}
            ]
        },
        "actions": {
            "action_type": "PROVIDER_SELECTION",
            "preferred_providers": ["WISE"]
        },
        "metadata": {"tags": ["routing"], "description": "campaign"}
    });

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/fx/rules")
            .set_json(&rule)
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 201);

    // Duplicate id conflicts
    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/fx/rules")
            .set_json(&rule)
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 409);

    let toggled: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/fx/rules/PREFER_WISE_SB/toggle")
            .to_request(),
    )
    .await;
    assert_eq!(toggled["enabled"], false);

    let resp = test::call_service(
        &app,
        test::TestRequest::delete()
            .uri("/api/v1/fx/rules/PREFER_WISE_SB")
            .to_request(),
    )
    .await;
    assert!(resp.status().is_success());

    let listed: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/api/v1/fx/rules").to_request(),
    )
    .await;
    assert_eq!(listed.as_array().unwrap().len(), 0);
}

// Margin sanity for the boundary amount: 10k sits in TIER_2, not TIER_1
#[actix_web::test]
async fn test_amount_tier_boundary_over_http() {
    let (state, _dir) = test_state();
    let app = test_app!(state);

    let body: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/fx/pricing/quote")
            .set_json(json!({
                "source_currency": "USD",
                "target_currency": "INR",
                "amount": "10000",
                "customer_id": "CUST-1",
                "segment": "CORPORATE",
                "direction": "SELL"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(body["amount_tier"], "TIER_2");
}
