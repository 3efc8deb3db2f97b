//! Multi-rail route synthesis
//!
//! Classifies the conversion into one of the nine rail pairs, materialises
//! every applicable catalogue template against the current registries, and
//! ranks the resulting routes with the same four sub-scores as the fiat
//! engine. Fiat legs delegate provider choice to the smart router; digital
//! legs use a closed-form cost model. An active treasury deal is injected
//! as a zero-cost fiat candidate before ranking.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use fx_core::{
    CurrencyPair, Objective, ProviderType, RailType, RateService, ReferenceRegistry, Side,
    Snapshot, SwapStatus, TreasuryRate,
};
use fx_deals::{BestRateSource, DealsStore};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;
use uuid::Uuid;

use crate::catalogue::{templates_for, RouteTemplate, TemplateKind};
use crate::error::{Error, Result};
use crate::smart::{resolve_objective, SmartRouter};
use crate::types::{
    MultiRailRequest, MultiRailResponse, RecommendRequest, Route, RouteAnnotations, RouteLeg,
    RouteRecommendation, RoutingResponse, TemplateInapplicable,
};

// Default leg reliabilities where no registry entry carries its own
const MBRIDGE_RELIABILITY: f64 = 0.95;
const ISSUER_RELIABILITY: f64 = 0.98;
const CBDC_OP_RELIABILITY: f64 = 0.97;
const NEXUS_RELIABILITY: f64 = 0.95;
const CEX_RELIABILITY: f64 = 0.94;
const OTC_RELIABILITY: f64 = 0.92;
const DEX_RELIABILITY: f64 = 0.90;
const SWAP_RELIABILITY: f64 = 0.93;
const DEAL_RELIABILITY: f64 = 0.995;

/// Two routes closer than this are tied; the regulated, then simpler one wins
const SCORE_TIE_WINDOW: f64 = 0.005;

/// Cross-rail router
pub struct MultiRailRouter {
    registry: Arc<ReferenceRegistry>,
    rates: Arc<RateService>,
    smart: Arc<SmartRouter>,
    deals: Option<Arc<DealsStore>>,
}

/// Resolved conversion economics shared by every template of a request
struct MidContext {
    /// Underlying fiat of the source currency
    fiat_source: String,
    /// Underlying fiat of the target currency
    fiat_target: String,
    /// Effective source->target mid with pegs folded in
    mid: Decimal,
    /// Fiat leg treasury rate when the underlying fiats differ
    fiat_rate: Option<TreasuryRate>,
    indicative: bool,
}

impl MultiRailRouter {
    pub fn new(
        registry: Arc<ReferenceRegistry>,
        rates: Arc<RateService>,
        smart: Arc<SmartRouter>,
        deals: Option<Arc<DealsStore>>,
    ) -> Self {
        Self {
            registry,
            rates,
            smart,
            deals,
        }
    }

    /// Synthesise and rank routes for a conversion
    pub async fn route(&self, request: &MultiRailRequest) -> Result<MultiRailResponse> {
        if request.amount <= Decimal::ZERO {
            return Err(Error::Validation(format!(
                "amount must be positive, got {}",
                request.amount
            )));
        }
        if request.source_currency == request.target_currency {
            return Err(Error::Validation(
                "source and target currency must differ".to_string(),
            ));
        }

        let snapshot = self.registry.snapshot();
        let now = request.as_of.unwrap_or_else(Utc::now);
        let source_rail = snapshot.rail_of(&request.source_currency);
        let target_rail = snapshot.rail_of(&request.target_currency);

        let tier = request
            .customer_tier
            .as_deref()
            .and_then(|id| snapshot.tier(id))
            .cloned();
        let objective = resolve_objective(request.objective, tier.as_ref());

        let mid_ctx = self.mid_context(&snapshot, request).await?;

        // Fiat templates delegate provider selection to the smart router
        let fiat_ranking = if source_rail == RailType::Fiat && target_rail == RailType::Fiat {
            match self.fiat_ranking(request, &mid_ctx, objective) {
                Ok(ranking) => Some(ranking),
                Err(Error::NoEligibleProvider { .. }) => None,
                Err(e) => return Err(e),
            }
        } else {
            None
        };

        let mut routes: Vec<Route> = Vec::new();
        let mut inapplicable: Vec<TemplateInapplicable> = Vec::new();

        for template in templates_for(source_rail, target_rail) {
            match materialise(template, request, &snapshot, &mid_ctx, fiat_ranking.as_ref()) {
                Ok(route) => routes.push(route),
                Err(skip) => inapplicable.push(skip),
            }
        }

        // An active treasury deal preempts live pricing on the fiat rail
        if let Some(route) = self.deal_route(request, &mid_ctx, &tier, source_rail, target_rail, now)
        {
            routes.push(route);
        }

        if request.filter_regulated {
            routes.retain(|route| {
                if route.regulated {
                    true
                } else {
                    inapplicable.push(TemplateInapplicable {
                        template: route.template.clone(),
                        reason: "suppressed by filter_regulated".to_string(),
                    });
                    false
                }
            });
        }

        if routes.is_empty() {
            return Err(Error::NoRoute {
                source_currency: request.source_currency.clone(),
                target: request.target_currency.clone(),
            });
        }

        score_routes(&mut routes, objective);
        rank_routes(&mut routes);

        let best_route = routes[0].clone();
        let fiat_route = routes.iter().find(|r| r.rail == RailType::Fiat).cloned();
        let cbdc_route = routes.iter().find(|r| r.rail == RailType::Cbdc).cloned();
        let stablecoin_route = routes
            .iter()
            .find(|r| r.rail == RailType::Stablecoin)
            .cloned();

        info!(
            "Best route {} -> {}: {} ({:?}, {:.4})",
            request.source_currency,
            request.target_currency,
            best_route.template,
            best_route.rail,
            best_route.score
        );

        Ok(MultiRailResponse {
            request_id: Uuid::new_v4(),
            source_currency: request.source_currency.clone(),
            target_currency: request.target_currency.clone(),
            source_rail,
            target_rail,
            amount: request.amount,
            objective,
            fiat_route,
            cbdc_route,
            stablecoin_route,
            best_route,
            all_routes: routes,
            inapplicable,
            indicative: mid_ctx.indicative,
        })
    }

    /// Resolve both currencies to their underlying fiats and compute the
    /// effective mid, folding stablecoin peg ratios in
    async fn mid_context(&self, snapshot: &Snapshot, request: &MultiRailRequest) -> Result<MidContext> {
        let resolve = |code: &str| -> (String, Decimal) {
            match snapshot.rail_of(code) {
                RailType::Fiat => (code.to_string(), Decimal::ONE),
                RailType::Cbdc => (
                    snapshot
                        .cbdc(code)
                        .map(|c| c.linked_fiat.clone())
                        .unwrap_or_else(|| code.to_string()),
                    Decimal::ONE,
                ),
                RailType::Stablecoin => snapshot
                    .stablecoin(code)
                    .map(|s| (s.peg_currency.clone(), s.peg_ratio))
                    .unwrap_or_else(|| (code.to_string(), Decimal::ONE)),
            }
        };

        let (fiat_source, peg_source) = resolve(&request.source_currency);
        let (fiat_target, peg_target) = resolve(&request.target_currency);

        let (fx_mid, fiat_rate, indicative) = if fiat_source == fiat_target {
            (Decimal::ONE, None, false)
        } else {
            let lookup = self
                .rates
                .get_rate(&CurrencyPair::new(fiat_source.clone(), fiat_target.clone()))
                .await
                .map_err(Error::Core)?;
            (lookup.rate.mid, Some(lookup.rate), lookup.indicative)
        };

        // peg_target units of target stablecoin per unit of its fiat
        let mid = if peg_target.is_zero() {
            return Err(Error::Validation(format!(
                "stablecoin {} has a zero peg ratio",
                request.target_currency
            )));
        } else {
            peg_source * fx_mid / peg_target
        };

        Ok(MidContext {
            fiat_source,
            fiat_target,
            mid,
            fiat_rate,
            indicative,
        })
    }

    fn fiat_ranking(
        &self,
        request: &MultiRailRequest,
        mid_ctx: &MidContext,
        objective: Objective,
    ) -> Result<RoutingResponse> {
        let rate = mid_ctx.fiat_rate.as_ref().ok_or_else(|| Error::Validation(
            "fiat routing requires a fiat rate".to_string(),
        ))?;

        let recommend = RecommendRequest {
            source_currency: request.source_currency.clone(),
            target_currency: request.target_currency.clone(),
            side: Side::Sell,
            amount: request.amount,
            customer_tier: request.customer_tier.clone(),
            customer_segment: None,
            objective: Some(objective),
            as_of: request.as_of,
            office: None,
        };
        self.smart.recommend(&recommend, rate, mid_ctx.indicative)
    }

    fn deal_route(
        &self,
        request: &MultiRailRequest,
        mid_ctx: &MidContext,
        tier: &Option<fx_core::CustomerTier>,
        source_rail: RailType,
        target_rail: RailType,
        now: DateTime<Utc>,
    ) -> Option<Route> {
        if source_rail != RailType::Fiat || target_rail != RailType::Fiat {
            return None;
        }
        let deals = self.deals.as_ref()?;
        let rate = mid_ctx.fiat_rate.as_ref()?;
        let pair_code = format!("{}{}", request.source_currency, request.target_currency);

        let best = deals.best_rate(
            &pair_code,
            Side::Sell,
            request.amount,
            tier.as_ref(),
            rate,
            now,
        );
        if best.source != BestRateSource::Deal {
            return None;
        }

        let deal_id = best.deal_id?;
        Some(Route {
            route_id: Uuid::new_v4(),
            template: "TREASURY_DEAL".to_string(),
            rail: RailType::Fiat,
            legs: vec![RouteLeg {
                from: request.source_currency.clone(),
                to: request.target_currency.clone(),
                mechanism: "TREASURY_DEAL".to_string(),
                reference: deal_id.clone(),
                fee_bps: 0,
                settlement_seconds: 3_600,
                stp: true,
            }],
            rate: best.rate,
            effective_amount: request.amount * best.rate,
            total_cost_bps: 0,
            settlement_seconds: 3_600,
            regulated: true,
            reliability: DEAL_RELIABILITY,
            score: 0.0,
            annotations: RouteAnnotations {
                stp_eligible: true,
                deal_id: Some(deal_id),
                ..Default::default()
            },
        })
    }
}

// ==================== Template materialisation ====================

/// Materialise one template into a concrete route, or say why not.
///
/// Pure over its inputs: the same template, request and snapshot always
/// produce the same route.
fn materialise(
    template: &RouteTemplate,
    request: &MultiRailRequest,
    snapshot: &Snapshot,
    mid_ctx: &MidContext,
    fiat_ranking: Option<&RoutingResponse>,
) -> std::result::Result<Route, TemplateInapplicable> {
    let skip = |reason: String| TemplateInapplicable {
        template: template.name.to_string(),
        reason,
    };
    let source = request.source_currency.as_str();
    let target = request.target_currency.as_str();

    let mut annotations = RouteAnnotations::default();
    let mut reliability = 1.0f64;
    let mut legs: Vec<RouteLeg> = Vec::new();

    let push_leg =
        |legs: &mut Vec<RouteLeg>, rel: &mut f64, from: &str, to: &str, mechanism: &str, reference: &str, fee: i64, secs: u64, stp: bool, leg_rel: f64| {
            legs.push(RouteLeg {
                from: from.to_string(),
                to: to.to_string(),
                mechanism: mechanism.to_string(),
                reference: reference.to_string(),
                fee_bps: fee,
                settlement_seconds: secs,
                stp,
            });
            *rel *= leg_rel;
        };

    match template.kind {
        TemplateKind::FiatProvider(provider_type) => {
            let ranking = fiat_ranking.ok_or_else(|| skip("no eligible fiat providers".to_string()))?;
            let rec = best_of_type(ranking, provider_type)
                .ok_or_else(|| skip(format!("no eligible {:?} provider", provider_type)))?;
            let markup = rec.adjusted_markup_bps.round().to_i64().unwrap_or(0);
            push_leg(
                &mut legs, &mut reliability,
                source, target, template.name, &rec.provider_id,
                template.fee_bps + markup,
                rec.settlement_hours as u64 * 3_600,
                rec.stp_eligible, rec.reliability_score,
            );
            annotations.stp_eligible = rec.stp_eligible;
        }
        TemplateKind::FiatTriangulated => {
            if source == "USD" || target == "USD" {
                return Err(skip("triangulation needs a non-USD pair".to_string()));
            }
            let ranking = fiat_ranking.ok_or_else(|| skip("no eligible fiat providers".to_string()))?;
            let rec = &ranking.recommended;
            let half = template.fee_bps / 2;
            push_leg(&mut legs, &mut reliability, source, "USD", "FX", &rec.provider_id, half, 86_400, rec.stp_eligible, rec.reliability_score);
            push_leg(&mut legs, &mut reliability, "USD", target, "FX", &rec.provider_id, template.fee_bps - half, 86_400, rec.stp_eligible, rec.reliability_score);
        }
        TemplateKind::DirectMint => {
            let cbdc = snapshot
                .cbdc(target)
                .ok_or_else(|| skip(format!("{} is not a registered CBDC", target)))?;
            if cbdc.linked_fiat != source {
                return Err(skip(format!(
                    "direct mint needs the linked fiat {}",
                    cbdc.linked_fiat
                )));
            }
            push_leg(
                &mut legs, &mut reliability,
                source, target, "MINT", &cbdc.issuer,
                template.fee_bps + cbdc.fees.issuance_bps,
                cbdc.settlement_seconds.max(template.settlement_seconds),
                true, ISSUER_RELIABILITY,
            );
        }
        TemplateKind::FxThenMint => {
            let cbdc = snapshot
                .cbdc(target)
                .ok_or_else(|| skip(format!("{} is not a registered CBDC", target)))?;
            if cbdc.linked_fiat == source {
                return Err(skip("direct mint applies; no FX leg needed".to_string()));
            }
            push_leg(&mut legs, &mut reliability, source, &cbdc.linked_fiat, "FX", "TREASURY", template.fee_bps, 14_400, true, CBDC_OP_RELIABILITY);
            push_leg(&mut legs, &mut reliability, &cbdc.linked_fiat.clone(), target, "MINT", &cbdc.issuer, cbdc.fees.issuance_bps, cbdc.settlement_seconds, true, ISSUER_RELIABILITY);
        }
        TemplateKind::MbridgeRoute => {
            let cbdc = snapshot
                .cbdc(target)
                .ok_or_else(|| skip(format!("{} is not a registered CBDC", target)))?;
            if !cbdc.mbridge_participant {
                return Err(skip(format!("{} is not an mBridge participant", target)));
            }
            annotations.mbridge = true;
            push_leg(&mut legs, &mut reliability, source, "mBridge", "CORRIDOR_FUNDING", "mBridge", 0, 60, true, ISSUER_RELIABILITY);
            push_leg(&mut legs, &mut reliability, "mBridge", target, "MBRIDGE_TRANSFER", "mBridge", template.fee_bps, cbdc.settlement_seconds, true, MBRIDGE_RELIABILITY);
        }
        TemplateKind::DirectRedeem => {
            let cbdc = snapshot
                .cbdc(source)
                .ok_or_else(|| skip(format!("{} is not a registered CBDC", source)))?;
            if cbdc.linked_fiat != target {
                return Err(skip(format!(
                    "direct redeem pays out in {}",
                    cbdc.linked_fiat
                )));
            }
            push_leg(
                &mut legs, &mut reliability,
                source, target, "REDEEM", &cbdc.issuer,
                template.fee_bps + cbdc.fees.redemption_bps,
                cbdc.settlement_seconds.max(template.settlement_seconds),
                true, ISSUER_RELIABILITY,
            );
        }
        TemplateKind::RedeemThenFx => {
            let cbdc = snapshot
                .cbdc(source)
                .ok_or_else(|| skip(format!("{} is not a registered CBDC", source)))?;
            if cbdc.linked_fiat == target {
                return Err(skip("direct redeem applies; no FX leg needed".to_string()));
            }
            push_leg(&mut legs, &mut reliability, source, &cbdc.linked_fiat.clone(), "REDEEM", &cbdc.issuer, cbdc.fees.redemption_bps, cbdc.settlement_seconds, true, ISSUER_RELIABILITY);
            push_leg(&mut legs, &mut reliability, &cbdc.linked_fiat.clone(), target, "FX", "TREASURY", template.fee_bps, 14_400, true, CBDC_OP_RELIABILITY);
        }
        TemplateKind::MbridgePvp => {
            if !snapshot.is_mbridge_pair(source, target) {
                return Err(skip("both CBDCs must be mBridge participants".to_string()));
            }
            let settle = snapshot
                .cbdc(source)
                .map(|c| c.settlement_seconds)
                .unwrap_or(template.settlement_seconds)
                .max(
                    snapshot
                        .cbdc(target)
                        .map(|c| c.settlement_seconds)
                        .unwrap_or(template.settlement_seconds),
                );
            annotations.mbridge = true;
            push_leg(&mut legs, &mut reliability, source, target, "MBRIDGE_PVP", "mBridge", template.fee_bps, settle, true, MBRIDGE_RELIABILITY);
        }
        TemplateKind::ProjectNexus => {
            let src_cbdc = snapshot
                .cbdc(source)
                .ok_or_else(|| skip(format!("{} is not a registered CBDC", source)))?;
            let tgt_cbdc = snapshot
                .cbdc(target)
                .ok_or_else(|| skip(format!("{} is not a registered CBDC", target)))?;
            if !snapshot.in_nexus(&src_cbdc.linked_fiat) || !snapshot.in_nexus(&tgt_cbdc.linked_fiat) {
                return Err(skip("both linked fiats must sit on a Nexus fast-payment link".to_string()));
            }
            push_leg(&mut legs, &mut reliability, source, &src_cbdc.linked_fiat.clone(), "REDEEM", &src_cbdc.issuer, src_cbdc.fees.redemption_bps, src_cbdc.settlement_seconds, true, CBDC_OP_RELIABILITY);
            push_leg(&mut legs, &mut reliability, &src_cbdc.linked_fiat.clone(), &tgt_cbdc.linked_fiat.clone(), "NEXUS_TRANSFER", "Project Nexus", template.fee_bps, template.settlement_seconds, true, NEXUS_RELIABILITY);
            push_leg(&mut legs, &mut reliability, &tgt_cbdc.linked_fiat.clone(), target, "MINT", &tgt_cbdc.issuer, tgt_cbdc.fees.issuance_bps, tgt_cbdc.settlement_seconds, true, CBDC_OP_RELIABILITY);
        }
        TemplateKind::FiatBridge => {
            materialise_fiat_bridge(template, snapshot, source, target, &mut legs, &mut reliability, &skip)?;
        }
        TemplateKind::IssuerOnRamp => {
            let stable = snapshot
                .stablecoin(target)
                .ok_or_else(|| skip(format!("{} is not a registered stablecoin", target)))?;
            if !stable.regulated {
                return Err(skip(format!("{} has no issuer mint programme", target)));
            }
            if stable.peg_currency != source {
                return Err(skip(format!("issuer mints only from {}", stable.peg_currency)));
            }
            let ramp = snapshot
                .on_ramps_for(target, source)
                .into_iter()
                .filter(|r| r.fee_bps <= template.fee_bps)
                .min_by_key(|r| r.fee_bps)
                .ok_or_else(|| skip("no issuer on-ramp registered".to_string()))?;
            push_leg(&mut legs, &mut reliability, source, target, "ISSUER_MINT", &ramp.id, template.fee_bps + stable.fees.mint_bps, ramp.settlement_seconds, ramp.stp_enabled, ramp.reliability);
        }
        TemplateKind::CexOnRamp => {
            let stable = snapshot
                .stablecoin(target)
                .ok_or_else(|| skip(format!("{} is not a registered stablecoin", target)))?;
            let ramp = lowest_fee_ramp(snapshot.on_ramps_for(target, source))
                .ok_or_else(|| skip(format!("no exchange on-ramp for {} from {}", target, source)))?;
            push_leg(&mut legs, &mut reliability, source, target, "CEX_ONRAMP", &ramp.id, template.fee_bps + stable.fees.mint_bps, ramp.settlement_seconds, ramp.stp_enabled, ramp.reliability);
        }
        TemplateKind::FxOnRamp => {
            let stable = snapshot
                .stablecoin(target)
                .ok_or_else(|| skip(format!("{} is not a registered stablecoin", target)))?;
            if stable.peg_currency == source {
                return Err(skip("already in the peg currency; a direct on-ramp applies".to_string()));
            }
            let ramp = lowest_fee_ramp(snapshot.on_ramps_for(target, &stable.peg_currency))
                .ok_or_else(|| skip(format!("no on-ramp for {} from {}", target, stable.peg_currency)))?;
            let half = template.fee_bps / 2;
            push_leg(&mut legs, &mut reliability, source, &stable.peg_currency.clone(), "FX", "TREASURY", half, 14_400, true, CBDC_OP_RELIABILITY);
            push_leg(&mut legs, &mut reliability, &stable.peg_currency.clone(), target, "ONRAMP", &ramp.id, template.fee_bps - half + stable.fees.mint_bps, ramp.settlement_seconds, ramp.stp_enabled, ramp.reliability);
        }
        TemplateKind::IssuerOffRamp => {
            let stable = snapshot
                .stablecoin(source)
                .ok_or_else(|| skip(format!("{} is not a registered stablecoin", source)))?;
            if !stable.regulated {
                return Err(skip(format!("{} has no issuer redemption programme", source)));
            }
            if stable.peg_currency != target {
                return Err(skip(format!("issuer redeems only into {}", stable.peg_currency)));
            }
            let ramp = snapshot
                .off_ramps_for(source, target)
                .into_iter()
                .filter(|r| r.fee_bps <= template.fee_bps)
                .min_by_key(|r| r.fee_bps)
                .ok_or_else(|| skip("no issuer off-ramp registered".to_string()))?;
            push_leg(&mut legs, &mut reliability, source, target, "ISSUER_REDEEM", &ramp.id, template.fee_bps + stable.fees.redeem_bps, ramp.settlement_seconds, ramp.stp_enabled, ramp.reliability);
        }
        TemplateKind::CexOffRamp => {
            let stable = snapshot
                .stablecoin(source)
                .ok_or_else(|| skip(format!("{} is not a registered stablecoin", source)))?;
            let ramp = lowest_fee_ramp(snapshot.off_ramps_for(source, target))
                .ok_or_else(|| skip(format!("no exchange off-ramp for {} into {}", source, target)))?;
            push_leg(&mut legs, &mut reliability, source, target, "CEX_OFFRAMP", &ramp.id, template.fee_bps + stable.fees.redeem_bps, ramp.settlement_seconds, ramp.stp_enabled, ramp.reliability);
        }
        TemplateKind::OffRampFx => {
            let stable = snapshot
                .stablecoin(source)
                .ok_or_else(|| skip(format!("{} is not a registered stablecoin", source)))?;
            if stable.peg_currency == target {
                return Err(skip("already pays out in the peg currency".to_string()));
            }
            let ramp = lowest_fee_ramp(snapshot.off_ramps_for(source, &stable.peg_currency))
                .ok_or_else(|| skip(format!("no off-ramp for {} into {}", source, stable.peg_currency)))?;
            let half = template.fee_bps / 2;
            push_leg(&mut legs, &mut reliability, source, &stable.peg_currency.clone(), "OFFRAMP", &ramp.id, half + stable.fees.redeem_bps, ramp.settlement_seconds, ramp.stp_enabled, ramp.reliability);
            push_leg(&mut legs, &mut reliability, &stable.peg_currency.clone(), target, "FX", "TREASURY", template.fee_bps - half, 14_400, true, CBDC_OP_RELIABILITY);
        }
        TemplateKind::CurvePool | TemplateKind::UniswapPool => {
            let src = snapshot
                .stablecoin(source)
                .ok_or_else(|| skip(format!("{} is not a registered stablecoin", source)))?;
            let tgt = snapshot
                .stablecoin(target)
                .ok_or_else(|| skip(format!("{} is not a registered stablecoin", target)))?;
            let venue = if template.kind == TemplateKind::CurvePool { "Curve" } else { "Uniswap" };
            let secs = src
                .best_network()
                .map(|n| n.settlement_seconds)
                .unwrap_or(template.settlement_seconds)
                .max(template.settlement_seconds);
            push_leg(&mut legs, &mut reliability, source, target, "DEX_SWAP", venue, template.fee_bps + src.fees.transfer_bps + tgt.fees.transfer_bps, secs, true, DEX_RELIABILITY);
        }
        TemplateKind::CexCross => {
            snapshot
                .stablecoin(source)
                .ok_or_else(|| skip(format!("{} is not a registered stablecoin", source)))?;
            snapshot
                .stablecoin(target)
                .ok_or_else(|| skip(format!("{} is not a registered stablecoin", target)))?;
            let half = template.fee_bps / 2;
            push_leg(&mut legs, &mut reliability, source, "CEX", "DEPOSIT", "Exchange", half, 300, true, CEX_RELIABILITY);
            push_leg(&mut legs, &mut reliability, "CEX", target, "TRADE_WITHDRAW", "Exchange", template.fee_bps - half, template.settlement_seconds, true, CEX_RELIABILITY);
        }
        TemplateKind::CexBridge => {
            let half = template.fee_bps / 2;
            push_leg(&mut legs, &mut reliability, source, "CEX", "CUSTODY_IN", "Exchange", half, 3_600, false, CEX_RELIABILITY);
            push_leg(&mut legs, &mut reliability, "CEX", target, "TRADE_WITHDRAW", "Exchange", template.fee_bps - half, template.settlement_seconds, false, CEX_RELIABILITY);
        }
        TemplateKind::MbridgeHybrid => {
            let cbdc = snapshot
                .cbdc(source)
                .ok_or_else(|| skip(format!("{} is not a registered CBDC", source)))?;
            if !cbdc.mbridge_participant {
                return Err(skip(format!("{} is not an mBridge participant", source)));
            }
            // The corridor leg picks the cheapest mBridge partner
            let partner = snapshot
                .cbdcs
                .iter()
                .filter(|c| c.mbridge_participant && c.code != cbdc.code)
                .min_by_key(|c| c.fees.transfer_bps)
                .ok_or_else(|| skip("no mBridge partner CBDC".to_string()))?;
            let stable = snapshot
                .stablecoin(target)
                .ok_or_else(|| skip(format!("{} is not a registered stablecoin", target)))?;
            // The ramp leg picks the lowest-fee ramp holding the stablecoin
            let ramp = lowest_fee_ramp(snapshot.on_ramps_for(target, &partner.linked_fiat))
                .ok_or_else(|| skip(format!("no on-ramp for {} from {}", target, partner.linked_fiat)))?;
            annotations.mbridge = true;
            let half = template.fee_bps / 2;
            push_leg(&mut legs, &mut reliability, source, &partner.code.clone(), "MBRIDGE_TRANSFER", "mBridge", half + partner.fees.transfer_bps, partner.settlement_seconds, true, MBRIDGE_RELIABILITY);
            push_leg(&mut legs, &mut reliability, &partner.code.clone(), target, "OFFRAMP_ONRAMP", &ramp.id, template.fee_bps - half + stable.fees.mint_bps, ramp.settlement_seconds, ramp.stp_enabled, ramp.reliability);
        }
        TemplateKind::DexLiquidity => {
            snapshot
                .cbdc(source)
                .ok_or_else(|| skip(format!("{} is not a registered CBDC", source)))?;
            snapshot
                .stablecoin(target)
                .ok_or_else(|| skip(format!("{} is not a registered stablecoin", target)))?;
            push_leg(&mut legs, &mut reliability, source, target, "DEX_POOL", "Tokenised CBDC pool", template.fee_bps, template.settlement_seconds, true, DEX_RELIABILITY);
        }
        TemplateKind::AtomicSwap => {
            let (cbdc_code, stable_code) = match snapshot.rail_of(source) {
                RailType::Cbdc => (source, target),
                _ => (target, source),
            };
            let swap = snapshot
                .atomic_swap(cbdc_code, stable_code)
                .ok_or_else(|| skip("no atomic-swap corridor for this pair".to_string()))?;
            annotations.swap_status = Some(swap.status);
            // Every swap corridor status is pre-production
            annotations.experimental = matches!(
                swap.status,
                SwapStatus::Pilot | SwapStatus::Experimental | SwapStatus::Planned
            );
            push_leg(&mut legs, &mut reliability, source, target, "HTLC_SWAP", "Atomic swap", swap.fee_bps, swap.settlement_seconds, true, SWAP_RELIABILITY);
        }
        TemplateKind::OtcDesk => {
            snapshot
                .stablecoin(source)
                .ok_or_else(|| skip(format!("{} is not a registered stablecoin", source)))?;
            snapshot
                .cbdc(target)
                .ok_or_else(|| skip(format!("{} is not a registered CBDC", target)))?;
            push_leg(&mut legs, &mut reliability, source, target, "OTC_CROSS", "OTC desk", template.fee_bps, template.settlement_seconds, false, OTC_RELIABILITY);
        }
        TemplateKind::LiquidityPool => {
            snapshot
                .stablecoin(source)
                .ok_or_else(|| skip(format!("{} is not a registered stablecoin", source)))?;
            snapshot
                .cbdc(target)
                .ok_or_else(|| skip(format!("{} is not a registered CBDC", target)))?;
            push_leg(&mut legs, &mut reliability, source, target, "POOL_SWAP", "On-chain pool", template.fee_bps, template.settlement_seconds, true, DEX_RELIABILITY);
        }
    }

    let total_cost_bps: i64 = legs.iter().map(|l| l.fee_bps).sum();
    // Sequential legs: the slowest leg bounds the route
    let settlement_seconds = legs
        .iter()
        .map(|l| l.settlement_seconds)
        .max()
        .unwrap_or(template.settlement_seconds);
    let all_stp = legs.iter().all(|l| l.stp);
    annotations.stp_eligible = all_stp;

    let regulated = template.regulated && route_entities_regulated(snapshot, source, target);
    let rate = mid_ctx.mid * (Decimal::ONE - Decimal::from(total_cost_bps) / dec!(10_000));

    Ok(Route {
        route_id: Uuid::new_v4(),
        template: template.name.to_string(),
        rail: template.rail,
        legs,
        rate,
        effective_amount: request.amount * rate,
        total_cost_bps,
        settlement_seconds,
        regulated,
        reliability,
        score: 0.0,
        annotations,
    })
}

#[allow(clippy::too_many_arguments)]
fn materialise_fiat_bridge(
    template: &RouteTemplate,
    snapshot: &Snapshot,
    source: &str,
    target: &str,
    legs: &mut Vec<RouteLeg>,
    reliability: &mut f64,
    skip: &dyn Fn(String) -> TemplateInapplicable,
) -> std::result::Result<(), TemplateInapplicable> {
    let mut push = |from: &str, to: &str, mechanism: &str, reference: &str, fee: i64, secs: u64, stp: bool, rel: f64| {
        legs.push(RouteLeg {
            from: from.to_string(),
            to: to.to_string(),
            mechanism: mechanism.to_string(),
            reference: reference.to_string(),
            fee_bps: fee,
            settlement_seconds: secs,
            stp,
        });
        *reliability *= rel;
    };

    match (snapshot.rail_of(source), snapshot.rail_of(target)) {
        // CBDC -> CBDC over the fiat correspondents
        (RailType::Cbdc, RailType::Cbdc) => {
            let src = snapshot.cbdc(source).ok_or_else(|| skip(format!("{} is not a registered CBDC", source)))?;
            let tgt = snapshot.cbdc(target).ok_or_else(|| skip(format!("{} is not a registered CBDC", target)))?;
            push(source, &src.linked_fiat, "REDEEM", &src.issuer, src.fees.redemption_bps, src.settlement_seconds, true, CBDC_OP_RELIABILITY);
            push(&src.linked_fiat, &tgt.linked_fiat, "FX", "TREASURY", template.fee_bps, template.settlement_seconds, true, CBDC_OP_RELIABILITY);
            push(&tgt.linked_fiat, target, "MINT", &tgt.issuer, tgt.fees.issuance_bps, tgt.settlement_seconds, true, CBDC_OP_RELIABILITY);
        }
        // CBDC -> stablecoin: redeem, then on-ramp
        (RailType::Cbdc, RailType::Stablecoin) => {
            let src = snapshot.cbdc(source).ok_or_else(|| skip(format!("{} is not a registered CBDC", source)))?;
            let stable = snapshot.stablecoin(target).ok_or_else(|| skip(format!("{} is not a registered stablecoin", target)))?;
            let ramp = lowest_fee_ramp(snapshot.on_ramps_for(target, &src.linked_fiat))
                .ok_or_else(|| skip(format!("no on-ramp for {} from {}", target, src.linked_fiat)))?;
            push(source, &src.linked_fiat, "REDEEM", &src.issuer, src.fees.redemption_bps, src.settlement_seconds, true, CBDC_OP_RELIABILITY);
            push(&src.linked_fiat, target, "ONRAMP", &ramp.id, template.fee_bps + stable.fees.mint_bps, ramp.settlement_seconds, ramp.stp_enabled, ramp.reliability);
        }
        // Stablecoin -> CBDC: off-ramp, then mint
        (RailType::Stablecoin, RailType::Cbdc) => {
            let stable = snapshot.stablecoin(source).ok_or_else(|| skip(format!("{} is not a registered stablecoin", source)))?;
            let tgt = snapshot.cbdc(target).ok_or_else(|| skip(format!("{} is not a registered CBDC", target)))?;
            let ramp = lowest_fee_ramp(snapshot.off_ramps_for(source, &tgt.linked_fiat))
                .ok_or_else(|| skip(format!("no off-ramp for {} into {}", source, tgt.linked_fiat)))?;
            push(source, &tgt.linked_fiat, "OFFRAMP", &ramp.id, template.fee_bps + stable.fees.redeem_bps, ramp.settlement_seconds, ramp.stp_enabled, ramp.reliability);
            push(&tgt.linked_fiat, target, "MINT", &tgt.issuer, tgt.fees.issuance_bps, tgt.settlement_seconds, true, CBDC_OP_RELIABILITY);
        }
        _ => return Err(skip("fiat bridge crosses digital rails only".to_string())),
    }

    Ok(())
}

fn best_of_type(ranking: &RoutingResponse, provider_type: ProviderType) -> Option<&RouteRecommendation> {
    std::iter::once(&ranking.recommended)
        .chain(ranking.alternatives.iter())
        .find(|rec| rec.provider_type == provider_type)
}

fn lowest_fee_ramp<'a>(ramps: Vec<&'a fx_core::RampEntry>) -> Option<&'a fx_core::RampEntry> {
    ramps.into_iter().min_by(|a, b| {
        a.fee_bps
            .cmp(&b.fee_bps)
            .then_with(|| b.reliability.total_cmp(&a.reliability))
    })
}

/// Every stablecoin touched must itself be regulated for the route to count
/// as regulated
fn route_entities_regulated(snapshot: &Snapshot, source: &str, target: &str) -> bool {
    [source, target].iter().all(|code| {
        snapshot
            .stablecoin(code)
            .map(|s| s.regulated)
            .unwrap_or(true)
    })
}

// ==================== Scoring and ranking ====================

fn score_routes(routes: &mut [Route], objective: Objective) {
    let weights = objective.weights();
    for route in routes.iter_mut() {
        let rate_score = 1.0 - (route.total_cost_bps as f64 / 100.0).min(1.0);
        let speed_score = 1.0 - (route.settlement_seconds as f64 / 86_400.0).min(1.0);
        let stp_score = if route.annotations.stp_eligible { 1.0 } else { 0.3 };

        route.score = rate_score * weights.w_rate
            + route.reliability * weights.w_reliability
            + speed_score * weights.w_speed
            + stp_score * weights.w_stp;
    }
}

/// Score descending; within the tie window the regulated route wins, then
/// the simpler one. Clusters are anchored on their top score so ties
/// cannot chain past the window.
fn rank_routes(routes: &mut [Route]) {
    routes.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut start = 0;
    while start < routes.len() {
        let mut end = start + 1;
        while end < routes.len() && (routes[start].score - routes[end].score).abs() <= SCORE_TIE_WINDOW
        {
            end += 1;
        }
        if end - start > 1 {
            routes[start..end].sort_by(|a, b| {
                b.regulated
                    .cmp(&a.regulated)
                    .then_with(|| a.legs.len().cmp(&b.legs.len()))
                    .then_with(|| b.score.total_cmp(&a.score))
            });
        }
        start = end;
    }
}
