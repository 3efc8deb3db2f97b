//! Quote types

use chrono::{DateTime, Utc};
use fx_core::{CategoryClass, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Firm quotes commit the engine to the rate until expiry; indicative
/// quotes carry substituted or stale inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RateType {
    Firm,
    Indicative,
}

/// Pricing request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceRequest {
    pub source_currency: String,
    pub target_currency: String,
    pub amount: Decimal,
    pub customer_id: String,
    pub segment: String,
    pub direction: Side,
    /// Timestamp rules evaluate against; defaults to now
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_of: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub office: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_tier: Option<String>,
}

/// Composed margin components, all in bps over mid
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MarginBreakdown {
    pub segment_base_bps: Decimal,
    pub tier_adjustment_bps: Decimal,
    pub currency_factor_bps: Decimal,
    pub negotiated_discount_bps: Decimal,
    /// Additional bps contributed by MARGIN_ADJUSTMENT rules
    pub rule_adjustment_bps: Decimal,
}

/// Firm customer-facing quote; immutable after issuance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub quote_id: Uuid,
    pub source_currency: String,
    pub target_currency: String,
    pub amount: Decimal,
    pub direction: Side,
    pub mid_rate: Decimal,
    pub customer_rate: Decimal,
    pub target_amount: Decimal,
    pub margin_bps: Decimal,
    pub margin_breakdown: MarginBreakdown,
    pub segment: String,
    pub amount_tier: String,
    pub currency_category: CategoryClass,
    pub issued_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub rate_type: RateType,
}
