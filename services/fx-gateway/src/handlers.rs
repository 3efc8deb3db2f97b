//! HTTP handlers for the FX engine surface

use std::collections::BTreeSet;
use std::sync::Arc;

use actix_web::{web, HttpResponse};
use chrono::Utc;
use fx_core::{CurrencyPair, TreasuryRate};
use fx_deals::{BestRateSource, NewDeal};
use fx_pricing::PriceRequest;
use fx_routing::{MultiRailRequest, RecommendRequest};
use fx_rules::Rule;
use serde_json::json;
use tracing::warn;

use crate::errors::GatewayError;
use crate::models::*;
use crate::state::AppState;

type Result<T> = std::result::Result<T, GatewayError>;

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "fx-gateway",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// ==================== Routing ====================

pub async fn recommend(
    state: web::Data<Arc<AppState>>,
    body: web::Json<RecommendRequest>,
) -> Result<HttpResponse> {
    let request = body.into_inner();
    let pair = CurrencyPair::new(
        request.source_currency.clone(),
        request.target_currency.clone(),
    );
    let lookup = state.rates.get_rate(&pair).await?;

    let recommendation = state
        .smart
        .recommend(&request, &lookup.rate, lookup.indicative)?;

    // Pre-router short-circuit: an active deal beats live provider pricing
    let snapshot = state.registry.snapshot();
    let tier = request
        .customer_tier
        .as_deref()
        .and_then(|id| snapshot.tier(id));
    let arbitration = state.deals.best_rate(
        &request.pair_code(),
        request.side,
        request.amount,
        tier,
        &lookup.rate,
        Utc::now(),
    );
    let deal = (arbitration.source == BestRateSource::Deal).then_some(arbitration);

    Ok(HttpResponse::Ok().json(RecommendResponse {
        recommendation,
        deal,
    }))
}

pub async fn treasury_rates(
    state: web::Data<Arc<AppState>>,
    query: web::Query<RatesQuery>,
) -> Result<HttpResponse> {
    let codes: Vec<String> = match &query.pairs {
        Some(pairs) => pairs
            .split(',')
            .map(|p| p.trim().to_uppercase())
            .filter(|p| !p.is_empty())
            .collect(),
        None => {
            let snapshot = state.registry.snapshot();
            snapshot
                .providers
                .iter()
                .flat_map(|p| p.supported_pairs.iter().cloned())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        }
    };

    let mut rates: Vec<TreasuryRate> = Vec::with_capacity(codes.len());
    for code in codes {
        // Provider pair keys are six-letter fiat concatenations
        if code.len() != 6 {
            warn!("Skipping malformed pair key {}", code);
            continue;
        }
        let pair = CurrencyPair::new(&code[..3], &code[3..]);
        match state.rates.get_rate(&pair).await {
            Ok(lookup) => rates.push(lookup.rate),
            Err(e) => warn!("No rate for {}: {}", code, e),
        }
    }

    Ok(HttpResponse::Ok().json(json!({
        "rates": rates,
        "as_of": Utc::now(),
    })))
}

pub async fn list_providers(state: web::Data<Arc<AppState>>) -> HttpResponse {
    HttpResponse::Ok().json(&state.registry.snapshot().providers)
}

// ==================== Multi-rail ====================

pub async fn multi_rail_route(
    state: web::Data<Arc<AppState>>,
    body: web::Json<MultiRailRequest>,
) -> Result<HttpResponse> {
    let response = state.multi_rail.route(&body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn list_cbdcs(state: web::Data<Arc<AppState>>) -> HttpResponse {
    HttpResponse::Ok().json(&state.registry.snapshot().cbdcs)
}

pub async fn list_stablecoins(state: web::Data<Arc<AppState>>) -> HttpResponse {
    HttpResponse::Ok().json(&state.registry.snapshot().stablecoins)
}

// ==================== Pricing ====================

pub async fn quote(
    state: web::Data<Arc<AppState>>,
    body: web::Json<PriceRequest>,
) -> Result<HttpResponse> {
    let quote = state.pricing.quote(&body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(quote))
}

pub async fn list_segments(state: web::Data<Arc<AppState>>) -> HttpResponse {
    HttpResponse::Ok().json(&state.registry.snapshot().segments)
}

pub async fn list_tiers(state: web::Data<Arc<AppState>>) -> HttpResponse {
    HttpResponse::Ok().json(&state.registry.snapshot().tiers)
}

// ==================== Deals ====================

pub async fn list_deals(state: web::Data<Arc<AppState>>) -> HttpResponse {
    HttpResponse::Ok().json(state.deals.list())
}

pub async fn create_deal(
    state: web::Data<Arc<AppState>>,
    body: web::Json<NewDeal>,
) -> Result<HttpResponse> {
    let deal = state.deals.create(body.into_inner())?;
    Ok(HttpResponse::Created().json(deal))
}

pub async fn get_deal(
    state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let deal = state.deals.get(&path.into_inner())?;
    Ok(HttpResponse::Ok().json(deal))
}

pub async fn submit_deal(
    state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    body: web::Json<SubmitBody>,
) -> Result<HttpResponse> {
    let deal = state.deals.submit(&path.into_inner(), &body.submitted_by)?;
    Ok(HttpResponse::Ok().json(deal))
}

pub async fn approve_deal(
    state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    body: web::Json<ApproveBody>,
) -> Result<HttpResponse> {
    let deal = state.deals.approve(&path.into_inner(), &body.approved_by)?;
    Ok(HttpResponse::Ok().json(deal))
}

pub async fn reject_deal(
    state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    body: web::Json<RejectBody>,
) -> Result<HttpResponse> {
    let deal = state
        .deals
        .reject(&path.into_inner(), &body.rejected_by, &body.reason)?;
    Ok(HttpResponse::Ok().json(deal))
}

pub async fn cancel_deal(
    state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    body: web::Json<CancelBody>,
) -> Result<HttpResponse> {
    let deal = state
        .deals
        .cancel(&path.into_inner(), &body.cancelled_by, &body.reason)?;
    Ok(HttpResponse::Ok().json(deal))
}

pub async fn utilize_deal(
    state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    body: web::Json<UtilizeBody>,
) -> Result<HttpResponse> {
    let deal = state
        .deals
        .utilize(&path.into_inner(), body.amount, &body.by)?;
    Ok(HttpResponse::Ok().json(deal))
}

pub async fn best_rate(
    state: web::Data<Arc<AppState>>,
    query: web::Query<BestRateQuery>,
) -> Result<HttpResponse> {
    let pair = CurrencyPair::new(query.source_currency.clone(), query.target_currency.clone());
    let lookup = state.rates.get_rate(&pair).await?;

    let snapshot = state.registry.snapshot();
    let tier = query
        .customer_tier
        .as_deref()
        .and_then(|id| snapshot.tier(id));

    let result = state.deals.best_rate(
        &pair.code(),
        query.side,
        query.amount,
        tier,
        &lookup.rate,
        Utc::now(),
    );
    Ok(HttpResponse::Ok().json(result))
}

// ==================== Rules ====================

pub async fn list_rules(state: web::Data<Arc<AppState>>) -> HttpResponse {
    HttpResponse::Ok().json(state.rules.list_rules())
}

pub async fn add_rule(
    state: web::Data<Arc<AppState>>,
    body: web::Json<Rule>,
) -> Result<HttpResponse> {
    let rule = body.into_inner();
    state.rules.add_rule(rule.clone())?;
    Ok(HttpResponse::Created().json(rule))
}

pub async fn delete_rule(
    state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let rule_id = path.into_inner();
    state.rules.remove_rule(&rule_id)?;
    Ok(HttpResponse::Ok().json(json!({ "deleted": rule_id })))
}

pub async fn toggle_rule(
    state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let rule_id = path.into_inner();
    let enabled = state.rules.toggle_rule(&rule_id)?;
    Ok(HttpResponse::Ok().json(json!({ "rule_id": rule_id, "enabled": enabled })))
}

// ==================== Admin ====================

pub async fn reload_reference_data(state: web::Data<Arc<AppState>>) -> Result<HttpResponse> {
    state.registry.reload_from_dir(&state.config.data_dir)?;

    let mut rules_loaded = 0usize;
    for (rule_type, path) in [
        (
            fx_rules::RuleType::ProviderSelection,
            state.config.provider_rules_path(),
        ),
        (
            fx_rules::RuleType::MarginAdjustment,
            state.config.margin_rules_path(),
        ),
    ] {
        if path.exists() {
            rules_loaded += state.rules.load_from_file(rule_type, &path)?;
        }
    }

    Ok(HttpResponse::Ok().json(json!({
        "status": "reloaded",
        "rules_loaded": rules_loaded,
        "reloaded_at": Utc::now(),
    })))
}

// ==================== Route table ====================

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Root-level health endpoint for monitoring
        .route("/health", web::get().to(health_check))
        .service(
            web::scope("/api/v1/fx")
                .route("/routing/recommend", web::post().to(recommend))
                .route("/routing/treasury-rates", web::get().to(treasury_rates))
                .route("/routing/providers", web::get().to(list_providers))
                .route("/multi-rail/route", web::post().to(multi_rail_route))
                .route("/multi-rail/cbdc", web::get().to(list_cbdcs))
                .route("/multi-rail/stablecoins", web::get().to(list_stablecoins))
                .route("/pricing/quote", web::post().to(quote))
                .route("/pricing/segments", web::get().to(list_segments))
                .route("/pricing/tiers", web::get().to(list_tiers))
                // Literal path before the `{id}` matcher
                .route("/deals/best-rate", web::get().to(best_rate))
                .route("/deals", web::get().to(list_deals))
                .route("/deals", web::post().to(create_deal))
                .route("/deals/{id}", web::get().to(get_deal))
                .route("/deals/{id}/submit", web::post().to(submit_deal))
                .route("/deals/{id}/approve", web::post().to(approve_deal))
                .route("/deals/{id}/reject", web::post().to(reject_deal))
                .route("/deals/{id}/cancel", web::post().to(cancel_deal))
                .route("/deals/{id}/utilize", web::post().to(utilize_deal))
                .route("/rules", web::get().to(list_rules))
                .route("/rules", web::post().to(add_rule))
                .route("/rules/{id}", web::delete().to(delete_rule))
                .route("/rules/{id}/toggle", web::post().to(toggle_rule))
                .route("/admin/reload", web::post().to(reload_reference_data)),
        );
}
