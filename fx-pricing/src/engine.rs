//! Customer rate composition and quote issuance
//!
//! The customer rate is the treasury mid worsened by a composed margin:
//! segment base, amount-tier adjustment, currency-category factor, minus
//! any negotiated discount, folded with MARGIN_ADJUSTMENT rules and
//! clamped to the segment band. Pricing is independent of provider
//! selection and never fails on missing optional inputs; substitutions
//! mark the quote INDICATIVE.

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use fx_core::{
    apply_margin_bps, CategoryClass, CurrencyPair, RateService, ReferenceRegistry, Side, Snapshot,
};
use fx_rules::{RuleContext, RulesEngine};
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{MarginBreakdown, PriceRequest, Quote, RateType};

/// Pricing engine
pub struct PricingEngine {
    registry: Arc<ReferenceRegistry>,
    rates: Arc<RateService>,
    rules: Arc<RulesEngine>,
    quote_ttl: Duration,
    rule_tz: FixedOffset,
}

impl PricingEngine {
    pub fn new(
        registry: Arc<ReferenceRegistry>,
        rates: Arc<RateService>,
        rules: Arc<RulesEngine>,
        quote_ttl_seconds: u64,
        rule_tz_offset_minutes: i32,
    ) -> Self {
        Self {
            registry,
            rates,
            rules,
            quote_ttl: Duration::seconds(quote_ttl_seconds as i64),
            rule_tz: FixedOffset::east_opt(rule_tz_offset_minutes * 60)
                .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap()),
        }
    }

    /// Issue a firm quote
    pub async fn quote(&self, request: &PriceRequest) -> Result<Quote> {
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
        let mut indicative = false;

        // Unknown segments price on the most conservative table
        let segment = match snapshot.segment(&request.segment) {
            Some(segment) => segment.clone(),
            None => {
                warn!(
                    "Unknown segment {}, substituting RETAIL",
                    request.segment
                );
                indicative = true;
                snapshot
                    .segment("RETAIL")
                    .cloned()
                    .ok_or_else(|| Error::Validation("no RETAIL segment configured".to_string()))?
            }
        };

        let pair = CurrencyPair::new(
            request.source_currency.clone(),
            request.target_currency.clone(),
        );
        let lookup = self.rates.get_rate(&pair).await.map_err(Error::Core)?;
        indicative |= lookup.indicative;
        let mid = lookup.rate.mid;

        let amount_tier = snapshot.amount_tier_for(request.amount);
        let tier_bps = match amount_tier {
            Some(tier) => Decimal::from(tier.adjustment_bps),
            None => {
                indicative = true;
                Decimal::ZERO
            }
        };

        let priced_currency = exotic_side(&snapshot, &request.source_currency, &request.target_currency);
        let category = snapshot.category_of(priced_currency);
        let currency_bps =
            Decimal::from(snapshot.category_markup(priced_currency, segment.markup_class));

        let discount_bps = if segment.negotiated_rates_allowed {
            Decimal::from(snapshot.negotiated_discount(&request.customer_id, now))
        } else {
            Decimal::ZERO
        };

        // MARGIN_ADJUSTMENT rules fold in before the clamp
        let decision = self.rules.margin_decision(&self.rule_context(request, &snapshot, category, now), now);

        let base_bps = Decimal::from(
            decision
                .base_override
                .unwrap_or(segment.base_margin_bps),
        );
        let effective_tier_bps = match decision.tier_multiplier {
            Some(multiplier) => tier_bps * multiplier,
            None => tier_bps,
        };
        let additional_bps = Decimal::from(decision.additional_bps);

        let min_bps = Decimal::from(decision.min_override.unwrap_or(segment.min_margin_bps));
        let max_bps = Decimal::from(decision.max_override.unwrap_or(segment.max_margin_bps));

        let raw_bps = base_bps + effective_tier_bps + currency_bps - discount_bps + additional_bps;
        // max() then min() so an inverted override band cannot panic
        let margin_bps = raw_bps.max(min_bps).min(max_bps);

        let customer_rate = apply_margin_bps(mid, request.direction, margin_bps);
        let target_amount = match request.direction {
            Side::Sell => request.amount * customer_rate,
            Side::Buy => request.amount / customer_rate,
        };

        let quote = Quote {
            quote_id: Uuid::now_v7(),
            source_currency: request.source_currency.clone(),
            target_currency: request.target_currency.clone(),
            amount: request.amount,
            direction: request.direction,
            mid_rate: mid,
            customer_rate,
            target_amount,
            margin_bps,
            margin_breakdown: MarginBreakdown {
                segment_base_bps: base_bps,
                tier_adjustment_bps: effective_tier_bps,
                currency_factor_bps: currency_bps,
                negotiated_discount_bps: discount_bps,
                rule_adjustment_bps: additional_bps,
            },
            segment: segment.id.clone(),
            amount_tier: amount_tier.map(|t| t.id.clone()).unwrap_or_default(),
            currency_category: category,
            issued_at: now,
            valid_until: now + self.quote_ttl,
            rate_type: if indicative {
                RateType::Indicative
            } else {
                RateType::Firm
            },
        };

        info!(
            "Quote {} {}{} {} margin {}bps rate {}",
            quote.quote_id,
            quote.source_currency,
            quote.target_currency,
            quote.amount,
            quote.margin_bps,
            quote.customer_rate
        );

        Ok(quote)
    }

    fn rule_context(
        &self,
        request: &PriceRequest,
        snapshot: &Snapshot,
        category: CategoryClass,
        now: DateTime<Utc>,
    ) -> RuleContext {
        let local = now.with_timezone(&self.rule_tz);
        let mut ctx = RuleContext::new()
            .with("customer_segment", request.segment.clone())
            .with("customer_id", request.customer_id.clone())
            .with(
                "currency_pair",
                format!("{}{}", request.source_currency, request.target_currency),
            )
            .with("currency_category", format!("{:?}", category).to_uppercase())
            .with_amount("amount", request.amount)
            .with("time_of_day", local.format("%H:%M").to_string());

        if let Some(tier) = snapshot.amount_tier_for(request.amount) {
            ctx = ctx.with("amount_tier", tier.id.clone());
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

/// The side priced for the currency factor: whichever currency carries the
/// worse category, target winning ties
fn exotic_side<'a>(snapshot: &Snapshot, source: &'a str, target: &'a str) -> &'a str {
    fn rank(category: CategoryClass) -> u8 {
        match category {
            CategoryClass::G10 => 0,
            CategoryClass::Minor => 1,
            CategoryClass::Exotic => 2,
            CategoryClass::Restricted => 3,
        }
    }

    if rank(snapshot.category_of(source)) > rank(snapshot.category_of(target)) {
        source
    } else {
        target
    }
}
