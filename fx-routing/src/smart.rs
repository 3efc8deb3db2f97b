//! Smart routing engine for fiat providers
//!
//! Filters the provider table down to the eligible set, computes the
//! effective customer rate per provider, scores each candidate on four
//! sub-scores and ranks by the objective's weight vector. PROVIDER_SELECTION
//! rules inject preferred/excluded providers, may override the objective,
//! or force a single provider.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use fx_core::{
    apply_margin_bps, CustomerTier, Objective, Provider, ProviderType, ReferenceRegistry, Side,
    Snapshot, TreasuryRate,
};
use fx_rules::{ProviderRuleDecision, RuleContext, RulesEngine};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::types::{
    Exclusion, ExclusionReason, RecommendRequest, RouteRecommendation, RoutingResponse,
};

/// Additive score bonus per preferred-provider rule listing
const PREFERRED_BONUS: f64 = 0.05;

/// Smart routing engine
pub struct SmartRouter {
    registry: Arc<ReferenceRegistry>,
    rules: Arc<RulesEngine>,
    rule_tz: FixedOffset,
}

impl SmartRouter {
    pub fn new(
        registry: Arc<ReferenceRegistry>,
        rules: Arc<RulesEngine>,
        rule_tz_offset_minutes: i32,
    ) -> Self {
        Self {
            registry,
            rules,
            rule_tz: FixedOffset::east_opt(rule_tz_offset_minutes * 60)
                .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap()),
        }
    }

    /// Rank the eligible providers for a fiat pair under the resolved objective
    pub fn recommend(
        &self,
        request: &RecommendRequest,
        rate: &TreasuryRate,
        indicative: bool,
    ) -> Result<RoutingResponse> {
        if request.amount <= Decimal::ZERO {
            return Err(Error::Validation(format!(
                "amount must be positive, got {}",
                request.amount
            )));
        }

        let snapshot = self.registry.snapshot();
        let now = request.as_of.unwrap_or_else(Utc::now);
        let tier = request
            .customer_tier
            .as_deref()
            .and_then(|id| snapshot.tier(id))
            .cloned();

        if let Some(tier) = &tier {
            if request.amount > tier.max_transaction {
                return Err(Error::Validation(format!(
                    "amount {} exceeds tier {} limit {}",
                    request.amount, tier.id, tier.max_transaction
                )));
            }
        }

        let base_objective = resolve_objective(request.objective, tier.as_ref());
        let ctx = self.rule_context(&snapshot, request, base_objective, now);
        let decision = self.rules.provider_decision(&ctx, now);
        // A rule override replaces the objective for the rest of the computation
        let objective = decision.objective_override.unwrap_or(base_objective);

        let (mut eligible, exclusions) =
            self.eligible_providers(&snapshot, request, tier.as_ref(), &decision, now);

        // force_provider short-circuits the ranking when it survived the filter
        if let Some(forced) = &decision.force_provider {
            if let Some(provider) = eligible.iter().find(|p| p.id == *forced) {
                info!("Rule forced provider {} for {}", forced, request.pair_code());
                eligible = vec![provider.clone()];
            }
        }

        if eligible.is_empty() {
            return Err(Error::NoEligibleProvider {
                pair: request.pair_code(),
                exclusions,
            });
        }

        // Priority tiers see internal liquidity first
        if tier.as_ref().map(|t| t.priority_routing).unwrap_or(false) {
            eligible.sort_by(|a, b| {
                let a_internal = a.provider_type == ProviderType::Internal;
                let b_internal = b.provider_type == ProviderType::Internal;
                b_internal
                    .cmp(&a_internal)
                    .then_with(|| b.reliability.total_cmp(&a.reliability))
            });
        }

        let weights = objective.weights();
        let mut ranked: Vec<RouteRecommendation> = Vec::with_capacity(eligible.len());
        let mut dropped: Vec<Exclusion> = Vec::new();

        for provider in &eligible {
            let candidate = score_provider(provider, request.side, rate, tier.as_ref(), &decision);
            let composite = candidate.rate_score * weights.w_rate
                + candidate.reliability_score * weights.w_reliability
                + candidate.speed_score * weights.w_speed
                + candidate.stp_score * weights.w_stp
                + candidate.rule_bonus;

            if !composite.is_finite() {
                warn!(
                    "Dropping provider {} with non-finite score for {}",
                    provider.id,
                    request.pair_code()
                );
                dropped.push(Exclusion {
                    provider_id: provider.id.clone(),
                    reason: ExclusionReason::ScoreNotFinite,
                });
                continue;
            }

            ranked.push(RouteRecommendation {
                composite_score: composite,
                ..candidate
            });
        }

        if ranked.is_empty() {
            let mut exclusions = exclusions;
            exclusions.extend(dropped);
            return Err(Error::NoEligibleProvider {
                pair: request.pair_code(),
                exclusions,
            });
        }

        // Deterministic ranking: ties break on reliability, markup,
        // latency, then id
        ranked.sort_by(|a, b| {
            b.composite_score
                .total_cmp(&a.composite_score)
                .then_with(|| b.reliability_score.total_cmp(&a.reliability_score))
                .then_with(|| a.adjusted_markup_bps.cmp(&b.adjusted_markup_bps))
                .then_with(|| a.speed_score.total_cmp(&b.speed_score).reverse())
                .then_with(|| a.provider_id.cmp(&b.provider_id))
        });
        for (idx, rec) in ranked.iter_mut().enumerate() {
            rec.rank = idx + 1;
        }

        let recommended = ranked.remove(0);
        info!(
            "Recommended {} for {} {:?} {} (score {:.4})",
            recommended.provider_id,
            request.pair_code(),
            request.side,
            request.amount,
            recommended.composite_score
        );

        Ok(RoutingResponse {
            pair: request.pair_code(),
            side: request.side,
            amount: request.amount,
            objective,
            recommended,
            alternatives: ranked,
            exclusions,
            matched_rules: decision.matched_rules,
            indicative,
        })
    }

    fn eligible_providers(
        &self,
        snapshot: &Snapshot,
        request: &RecommendRequest,
        tier: Option<&CustomerTier>,
        decision: &ProviderRuleDecision,
        now: DateTime<Utc>,
    ) -> (Vec<Provider>, Vec<Exclusion>) {
        let pair_code = request.pair_code();
        let local_time = now.with_timezone(&self.rule_tz).time();
        let mut eligible = Vec::new();
        let mut exclusions = Vec::new();

        for provider in &snapshot.providers {
            let reason = if !provider.is_active {
                Some(ExclusionReason::Inactive)
            } else if !provider.supports_pair(&pair_code) {
                Some(ExclusionReason::PairNotSupported)
            } else if !provider.operating_hours.contains(local_time) {
                Some(ExclusionReason::OutsideOperatingHours)
            } else if request.amount < provider.min_amount {
                Some(ExclusionReason::BelowMinimumAmount {
                    min_amount: provider.min_amount,
                })
            } else if request.amount > provider.daily_limit {
                Some(ExclusionReason::AboveDailyLimit {
                    daily_limit: provider.daily_limit,
                })
            } else if decision.excluded.contains(&provider.id) {
                Some(ExclusionReason::ExcludedByRule {
                    rule_id: decision.matched_rules.join(","),
                })
            } else if tier
                .and_then(|t| t.providers_allowed.as_ref())
                .map(|allowed| !allowed.contains(&provider.id))
                .unwrap_or(false)
            {
                Some(ExclusionReason::NotInTierAllowlist)
            } else {
                None
            };

            match reason {
                Some(reason) => exclusions.push(Exclusion {
                    provider_id: provider.id.clone(),
                    reason,
                }),
                None => eligible.push(provider.clone()),
            }
        }

        (eligible, exclusions)
    }

    fn rule_context(
        &self,
        snapshot: &Snapshot,
        request: &RecommendRequest,
        objective: Objective,
        now: DateTime<Utc>,
    ) -> RuleContext {
        let local = now.with_timezone(&self.rule_tz);
        let mut ctx = RuleContext::new()
            .with("currency_pair", request.pair_code())
            .with_amount("amount", request.amount)
            .with("objective", serde_json::to_value(objective).unwrap_or_default())
            .with("time_of_day", local.format("%H:%M").to_string());

        if let Some(tier) = snapshot.amount_tier_for(request.amount) {
            ctx = ctx.with("amount_tier", tier.id.clone());
        }
        if let Some(segment) = &request.customer_segment {
            ctx = ctx.with("customer_segment", segment.clone());
        }
        if let Some(tier) = &request.customer_tier {
            ctx = ctx.with("customer_tier", tier.clone());
        }
        if let Some(office) = &request.office {
            ctx = ctx.with("office", office.clone());
        }
        ctx
    }
}

/// Request objective wins; otherwise the tier default; OPTIMUM as last resort
pub fn resolve_objective(requested: Option<Objective>, tier: Option<&CustomerTier>) -> Objective {
    requested
        .or_else(|| tier.map(|t| t.default_objective))
        .unwrap_or(Objective::Optimum)
}

fn score_provider(
    provider: &Provider,
    side: Side,
    rate: &TreasuryRate,
    tier: Option<&CustomerTier>,
    decision: &ProviderRuleDecision,
) -> RouteRecommendation {
    // Effective rate: position bias, then markup discounted by the tier,
    // then tier spread reduction, all as bps worsening the customer
    let markup_discount_pct = tier.map(|t| t.markup_discount_pct).unwrap_or(Decimal::ZERO);
    let spread_reduction_bps = tier.map(|t| t.spread_reduction_bps).unwrap_or(0);

    let adjusted_markup_bps =
        Decimal::from(provider.markup_bps) * (Decimal::ONE - markup_discount_pct / dec!(100));
    let total_bps = Decimal::from(rate.position_bias_bps(side)) + adjusted_markup_bps
        - Decimal::from(spread_reduction_bps);
    let effective_rate = apply_margin_bps(rate.anchor(side), side, total_bps);

    let markup_fraction = (adjusted_markup_bps / dec!(100)).to_f64().unwrap_or(1.0);
    let rate_score = 1.0 - markup_fraction.min(1.0);
    let reliability_score = provider.reliability;
    let speed_score = 1.0 - (provider.avg_latency_ms as f64 / 500.0).min(1.0);
    let stp_score = if provider.stp_enabled { 1.0 } else { 0.3 };

    let rule_bonus =
        PREFERRED_BONUS * decision.preferred.iter().filter(|p| **p == provider.id).count() as f64;

    RouteRecommendation {
        rank: 0,
        provider_id: provider.id.clone(),
        provider_name: provider.name.clone(),
        provider_type: provider.provider_type,
        effective_rate,
        adjusted_markup_bps,
        rate_score,
        reliability_score,
        speed_score,
        stp_score,
        rule_bonus,
        composite_score: 0.0,
        settlement_hours: provider.settlement_hours,
        stp_eligible: provider.stp_enabled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fx_core::TreasuryPosition;
    use fx_rules::{
        BoolOp, ConditionSet, Criterion, CriterionOp, Rule, RuleAction, RuleMetadata, RuleType,
    };
    use serde_json::Value;

    fn usdinr_rate() -> TreasuryRate {
        TreasuryRate {
            pair: "USDINR".to_string(),
            bid: dec!(84.42),
            ask: dec!(84.58),
            mid: dec!(84.50),
            min_margin_bps: 5,
            target_margin_bps: 20,
            max_exposure: dec!(100_000_000),
            current_exposure: Decimal::ZERO,
            position: TreasuryPosition::Long,
            valid_until: Utc::now() + chrono::Duration::minutes(5),
        }
    }

    fn request(amount: Decimal, tier: Option<&str>, objective: Option<Objective>) -> RecommendRequest {
        RecommendRequest {
            source_currency: "USD".to_string(),
            target_currency: "INR".to_string(),
            side: Side::Sell,
            amount,
            customer_tier: tier.map(|t| t.to_string()),
            customer_segment: None,
            objective,
            as_of: None,
            office: None,
        }
    }

    fn router() -> SmartRouter {
        SmartRouter::new(
            Arc::new(ReferenceRegistry::builtin()),
            Arc::new(RulesEngine::new()),
            0,
        )
    }

    fn router_with_rules(rules: Arc<RulesEngine>) -> SmartRouter {
        SmartRouter::new(Arc::new(ReferenceRegistry::builtin()), rules, 0)
    }

    #[test]
    fn test_best_rate_ranks_internal_desk_first() {
        // USD->INR SELL 100k GOLD under BEST_RATE with a LONG position
        let response = router()
            .recommend(
                &request(dec!(100_000), Some("GOLD"), Some(Objective::BestRate)),
                &usdinr_rate(),
                false,
            )
            .unwrap();

        assert_eq!(response.recommended.provider_id, "TREASURY_INTERNAL");

        // Markup 15 discounted 30% -> 10.5 bps; rate_score = 1 - 10.5/100
        let rec = &response.recommended;
        assert_eq!(rec.adjusted_markup_bps, dec!(10.5));
        assert!((rec.rate_score - 0.895).abs() < 1e-9);

        // Effective: ask worsened by (-3 bias + 10.5 markup - 5 spread) = 2.5 bps
        let expected = dec!(84.58) * (Decimal::ONE - dec!(2.5) / dec!(10_000));
        assert_eq!(rec.effective_rate, expected);
    }

    #[test]
    fn test_ranking_is_deterministic() {
        let req = request(dec!(100_000), Some("GOLD"), Some(Objective::BestRate));
        let rate = usdinr_rate();
        let first = router().recommend(&req, &rate, false).unwrap();
        let second = router().recommend(&req, &rate, false).unwrap();

        let order = |r: &RoutingResponse| {
            std::iter::once(r.recommended.provider_id.clone())
                .chain(r.alternatives.iter().map(|a| a.provider_id.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(order(&first), order(&second));
    }

    #[test]
    fn test_fastest_execution_prefers_low_latency() {
        let response = router()
            .recommend(
                &request(dec!(100_000), None, Some(Objective::FastestExecution)),
                &usdinr_rate(),
                false,
            )
            .unwrap();

        // The internal desk is both fast and reliable; whoever wins must
        // have a better speed score than the slowest alternative
        let slowest = response
            .alternatives
            .iter()
            .map(|a| a.speed_score)
            .fold(f64::INFINITY, f64::min);
        assert!(response.recommended.speed_score >= slowest);
    }

    #[test]
    fn test_exclusion_diagnostics_cover_all_candidates() {
        // 5 USD amount is below every wholesale minimum except WISE's
        let response = router()
            .recommend(&request(dec!(5_000), None, None), &usdinr_rate(), false)
            .unwrap();

        let excluded: Vec<&str> = response
            .exclusions
            .iter()
            .map(|e| e.provider_id.as_str())
            .collect();
        assert!(excluded.contains(&"XTX_DEALER"));
        assert!(excluded.contains(&"CITI_CORRESPONDENT"));
        assert!(response
            .exclusions
            .iter()
            .any(|e| matches!(e.reason, ExclusionReason::BelowMinimumAmount { .. })));
    }

    #[test]
    fn test_no_eligible_provider_diagnoses_each() {
        let mut req = request(dec!(100_000), None, None);
        req.source_currency = "USD".to_string();
        req.target_currency = "XXX".to_string();
        let err = router().recommend(&req, &usdinr_rate(), false).unwrap_err();

        match err {
            Error::NoEligibleProvider { exclusions, .. } => {
                let snapshot = ReferenceRegistry::builtin().snapshot();
                assert_eq!(exclusions.len(), snapshot.providers.len());
            }
            other => panic!("expected NoEligibleProvider, got {other:?}"),
        }
    }

    #[test]
    fn test_tier_limit_enforced() {
        let err = router()
            .recommend(
                &request(dec!(200_000), Some("RETAIL"), None),
                &usdinr_rate(),
                false,
            )
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    fn wise_preference_rule() -> Rule {
        Rule {
            rule_id: "PREFER_WISE_SB".to_string(),
            rule_name: "Prefer Wise for small business best-rate flow".to_string(),
            rule_type: RuleType::ProviderSelection,
            priority: 90,
            enabled: true,
            valid_from: Utc::now() - chrono::Duration::hours(1),
            valid_until: None,
            conditions: ConditionSet {
                operator: BoolOp::And,
                criteria: vec![
                    Criterion {
                        field: "customer_segment".to_string(),
                        operator: CriterionOp::Equals,
                        value: Some(Value::String("SMALL_BUSINESS".to_string())),
                        values: None,
                    },
                    Criterion {
                        field: "objective".to_string(),
                        operator: CriterionOp::Equals,
                        value: Some(Value::String("BEST_RATE".to_string())),
                        values: None,
                    },
                ],
            },
            actions: RuleAction::ProviderSelection {
                preferred_providers: vec!["WISE".to_string()],
                excluded_providers: vec![],
                routing_objective_override: None,
                force_provider: None,
            },
            metadata: RuleMetadata::default(),
        }
    }

    #[test]
    fn test_preferred_provider_bonus_closes_the_gap() {
        let rules = Arc::new(RulesEngine::new());
        rules.add_rule(wise_preference_rule()).unwrap();
        let router = router_with_rules(rules);

        let mut req = request(dec!(100_000), None, Some(Objective::BestRate));
        req.customer_segment = Some("SMALL_BUSINESS".to_string());

        let response = router.recommend(&req, &usdinr_rate(), false).unwrap();
        assert_eq!(response.recommended.provider_id, "WISE");
        assert!((response.recommended.rule_bonus - PREFERRED_BONUS).abs() < 1e-12);
        assert!(response.matched_rules.contains(&"PREFER_WISE_SB".to_string()));

        // Without the matching segment the rule stays silent
        let plain = router
            .recommend(
                &request(dec!(100_000), None, Some(Objective::BestRate)),
                &usdinr_rate(),
                false,
            )
            .unwrap();
        assert_eq!(plain.recommended.rule_bonus, 0.0);
    }

    #[test]
    fn test_rule_exclusion_removes_provider() {
        let rules = Arc::new(RulesEngine::new());
        let mut rule = wise_preference_rule();
        rule.rule_id = "BLOCK_DEALER".to_string();
        rule.conditions.criteria.clear();
        rule.actions = RuleAction::ProviderSelection {
            preferred_providers: vec![],
            excluded_providers: vec!["XTX_DEALER".to_string()],
            routing_objective_override: None,
            force_provider: None,
        };
        rules.add_rule(rule).unwrap();

        let response = router_with_rules(rules)
            .recommend(&request(dec!(100_000), None, None), &usdinr_rate(), false)
            .unwrap();

        assert!(response
            .alternatives
            .iter()
            .all(|a| a.provider_id != "XTX_DEALER"));
        assert!(response
            .exclusions
            .iter()
            .any(|e| e.provider_id == "XTX_DEALER"
                && matches!(e.reason, ExclusionReason::ExcludedByRule { .. })));
    }

    #[test]
    fn test_force_provider_short_circuits() {
        let rules = Arc::new(RulesEngine::new());
        let mut rule = wise_preference_rule();
        rule.rule_id = "FORCE_CITI".to_string();
        rule.conditions.criteria.clear();
        rule.actions = RuleAction::ProviderSelection {
            preferred_providers: vec![],
            excluded_providers: vec![],
            routing_objective_override: None,
            force_provider: Some("CITI_CORRESPONDENT".to_string()),
        };
        rules.add_rule(rule).unwrap();

        let response = router_with_rules(rules)
            .recommend(&request(dec!(100_000), None, None), &usdinr_rate(), false)
            .unwrap();

        assert_eq!(response.recommended.provider_id, "CITI_CORRESPONDENT");
        assert!(response.alternatives.is_empty());
    }

    #[test]
    fn test_objective_override_rule() {
        let rules = Arc::new(RulesEngine::new());
        let mut rule = wise_preference_rule();
        rule.rule_id = "STP_HOURS".to_string();
        rule.conditions.criteria.clear();
        rule.actions = RuleAction::ProviderSelection {
            preferred_providers: vec![],
            excluded_providers: vec![],
            routing_objective_override: Some(Objective::MaxStp),
            force_provider: None,
        };
        rules.add_rule(rule).unwrap();

        let response = router_with_rules(rules)
            .recommend(
                &request(dec!(100_000), None, Some(Objective::BestRate)),
                &usdinr_rate(),
                false,
            )
            .unwrap();

        assert_eq!(response.objective, Objective::MaxStp);
        assert!(response.recommended.stp_eligible);
    }
}
