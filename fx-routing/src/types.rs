//! Routing request/response types

use chrono::{DateTime, Utc};
use fx_core::{Objective, ProviderType, RailType, Side, SwapStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==================== Fiat provider routing ====================

/// Fiat recommendation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendRequest {
    pub source_currency: String,
    pub target_currency: String,
    pub side: Side,
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_tier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_segment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective: Option<Objective>,
    /// Timestamp operating hours and rules evaluate against; defaults to now
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_of: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub office: Option<String>,
}

impl RecommendRequest {
    pub fn pair_code(&self) -> String {
        format!("{}{}", self.source_currency, self.target_currency)
    }
}

/// Why a candidate provider was excluded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExclusionReason {
    Inactive,
    PairNotSupported,
    OutsideOperatingHours,
    BelowMinimumAmount { min_amount: Decimal },
    AboveDailyLimit { daily_limit: Decimal },
    ExcludedByRule { rule_id: String },
    NotInTierAllowlist,
    ScoreNotFinite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exclusion {
    pub provider_id: String,
    #[serde(flatten)]
    pub reason: ExclusionReason,
}

/// One scored provider candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRecommendation {
    pub rank: usize,
    pub provider_id: String,
    pub provider_name: String,
    pub provider_type: ProviderType,
    /// Customer rate after position bias, discounted markup and spread reduction
    pub effective_rate: Decimal,
    /// Provider markup after the tier markup discount
    pub adjusted_markup_bps: Decimal,
    pub rate_score: f64,
    pub reliability_score: f64,
    pub speed_score: f64,
    pub stp_score: f64,
    /// Additive preferred-provider rule bonus already included in the score
    pub rule_bonus: f64,
    pub composite_score: f64,
    pub settlement_hours: u32,
    pub stp_eligible: bool,
}

/// Ranked recommendation set; the head is the recommendation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingResponse {
    pub pair: String,
    pub side: Side,
    pub amount: Decimal,
    pub objective: Objective,
    pub recommended: RouteRecommendation,
    pub alternatives: Vec<RouteRecommendation>,
    pub exclusions: Vec<Exclusion>,
    pub matched_rules: Vec<String>,
    /// True when the underlying rate was stale or substituted
    pub indicative: bool,
}

// ==================== Multi-rail routing ====================

/// Cross-rail routing request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiRailRequest {
    pub source_currency: String,
    pub target_currency: String,
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_tier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective: Option<Objective>,
    /// Suppress routes over unregulated venues
    #[serde(default)]
    pub filter_regulated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_of: Option<DateTime<Utc>>,
}

/// One conversion step inside a route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteLeg {
    pub from: String,
    pub to: String,
    pub mechanism: String,
    /// Provider, ramp, venue or corridor the leg runs over
    pub reference: String,
    pub fee_bps: i64,
    pub settlement_seconds: u64,
    pub stp: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteAnnotations {
    pub stp_eligible: bool,
    pub mbridge: bool,
    pub experimental: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swap_status: Option<SwapStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deal_id: Option<String>,
}

/// Concrete route materialised from a catalogue template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub route_id: Uuid,
    pub template: String,
    pub rail: RailType,
    pub legs: Vec<RouteLeg>,
    /// Effective source->target rate with all fees folded in
    pub rate: Decimal,
    /// Target amount after conversion at the effective rate
    pub effective_amount: Decimal,
    pub total_cost_bps: i64,
    /// Sequential legs: the slowest leg bounds the route
    pub settlement_seconds: u64,
    pub regulated: bool,
    pub reliability: f64,
    pub score: f64,
    pub annotations: RouteAnnotations,
}

/// A template that could not be materialised, with the reason
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateInapplicable {
    pub template: String,
    pub reason: String,
}

/// Cross-rail routing response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiRailResponse {
    pub request_id: Uuid,
    pub source_currency: String,
    pub target_currency: String,
    pub source_rail: RailType,
    pub target_rail: RailType,
    pub amount: Decimal,
    pub objective: Objective,
    pub best_route: Route,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiat_route: Option<Route>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cbdc_route: Option<Route>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stablecoin_route: Option<Route>,
    /// Every materialised route, best score first
    pub all_routes: Vec<Route>,
    /// Templates for this rail pair that did not materialise
    pub inapplicable: Vec<TemplateInapplicable>,
    pub indicative: bool,
}
