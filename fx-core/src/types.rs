//! Core types shared across the routing, pricing, deals and rules crates

use chrono::{DateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Settlement rail classification for a currency code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RailType {
    /// Fiat correspondent banking
    Fiat,
    /// Central-bank digital currency network
    Cbdc,
    /// Fiat-pegged stablecoin chain
    Stablecoin,
}

impl std::fmt::Display for RailType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RailType::Fiat => write!(f, "FIAT"),
            RailType::Cbdc => write!(f, "CBDC"),
            RailType::Stablecoin => write!(f, "STABLECOIN"),
        }
    }
}

/// Side of a conversion from the customer's perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Buy,
    Sell,
}

/// Routing objective: a named weight vector over (rate, reliability, speed, stp)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Objective {
    BestRate,
    Optimum,
    FastestExecution,
    MaxStp,
}

/// Weights applied to the four provider sub-scores
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub w_rate: f64,
    pub w_reliability: f64,
    pub w_speed: f64,
    pub w_stp: f64,
}

impl Objective {
    /// Contract weight vectors (rate, reliability, speed, stp)
    pub fn weights(&self) -> ScoreWeights {
        match self {
            Objective::BestRate => ScoreWeights {
                w_rate: 0.70,
                w_reliability: 0.15,
                w_speed: 0.10,
                w_stp: 0.05,
            },
            Objective::Optimum => ScoreWeights {
                w_rate: 0.40,
                w_reliability: 0.25,
                w_speed: 0.20,
                w_stp: 0.15,
            },
            Objective::FastestExecution => ScoreWeights {
                w_rate: 0.20,
                w_reliability: 0.25,
                w_speed: 0.45,
                w_stp: 0.10,
            },
            Objective::MaxStp => ScoreWeights {
                w_rate: 0.25,
                w_reliability: 0.20,
                w_speed: 0.15,
                w_stp: 0.40,
            },
        }
    }
}

/// Ordered currency pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub base: String,
    pub quote: String,
}

impl CurrencyPair {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }

    /// Rate-table key: concatenation of both codes (`USDINR`)
    pub fn code(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }

    pub fn inverse(&self) -> CurrencyPair {
        CurrencyPair::new(self.quote.clone(), self.base.clone())
    }
}

impl std::fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// Treasury desk position in the base currency of a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TreasuryPosition {
    Long,
    Short,
    Neutral,
}

/// Treasury mid/bid/ask snapshot for one pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreasuryRate {
    /// Pair key (`USDINR`)
    pub pair: String,
    pub bid: Decimal,
    pub ask: Decimal,
    pub mid: Decimal,
    pub min_margin_bps: i64,
    pub target_margin_bps: i64,
    pub max_exposure: Decimal,
    pub current_exposure: Decimal,
    pub position: TreasuryPosition,
    pub valid_until: DateTime<Utc>,
}

impl TreasuryRate {
    /// `bid <= mid <= ask` must hold for every published rate
    pub fn is_coherent(&self) -> bool {
        self.bid <= self.mid && self.mid <= self.ask
    }

    /// Position bias in bps, signed so that positive bps worsen the
    /// customer rate. LONG base inventory makes the desk keener to sell.
    pub fn position_bias_bps(&self, side: Side) -> i64 {
        match (self.position, side) {
            (TreasuryPosition::Long, Side::Sell) => -3,
            (TreasuryPosition::Long, Side::Buy) => 3,
            (TreasuryPosition::Short, Side::Sell) => 3,
            (TreasuryPosition::Short, Side::Buy) => -3,
            (TreasuryPosition::Neutral, _) => 0,
        }
    }

    /// Customer-facing anchor rate before adjustments: ask for SELL, bid for BUY
    pub fn anchor(&self, side: Side) -> Decimal {
        match side {
            Side::Sell => self.ask,
            Side::Buy => self.bid,
        }
    }
}

/// Applies a signed worsening margin to a rate.
///
/// Positive bps always disadvantage the customer: a SELL customer receives
/// less target currency per unit, a BUY customer pays more.
pub fn apply_margin_bps(rate: Decimal, side: Side, total_bps: Decimal) -> Decimal {
    let factor = total_bps / Decimal::new(10_000, 0);
    match side {
        Side::Sell => rate * (Decimal::ONE - factor),
        Side::Buy => rate * (Decimal::ONE + factor),
    }
}

// ==================== Providers ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderType {
    MarketData,
    Internal,
    Correspondent,
    Local,
    Fintech,
    Dealer,
}

/// Daily operating window, half-open `[open, close)`.
///
/// `close < open` wraps past midnight; `close == open` means 24h.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl OperatingHours {
    pub fn always() -> Self {
        let midnight = NaiveTime::from_hms_opt(0, 0, 0).unwrap();
        Self {
            open: midnight,
            close: midnight,
        }
    }

    pub fn contains(&self, t: NaiveTime) -> bool {
        if self.open == self.close {
            true
        } else if self.open < self.close {
            t >= self.open && t < self.close
        } else {
            t >= self.open || t < self.close
        }
    }
}

/// Liquidity/settlement provider on the fiat rail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    /// Observed fill reliability in [0, 1]
    pub reliability: f64,
    pub avg_latency_ms: u64,
    pub settlement_hours: u32,
    pub min_amount: Decimal,
    pub daily_limit: Decimal,
    pub markup_bps: i64,
    pub supported_pairs: Vec<String>,
    pub operating_hours: OperatingHours,
    pub stp_enabled: bool,
    pub is_active: bool,
}

impl Provider {
    pub fn supports_pair(&self, pair_code: &str) -> bool {
        self.supported_pairs.iter().any(|p| p == pair_code)
    }
}

// ==================== Customer tiers and pricing segments ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerTier {
    pub id: String,
    pub min_annual_volume: Decimal,
    /// Percentage knocked off provider markup bps (0-100)
    pub markup_discount_pct: Decimal,
    pub spread_reduction_bps: i64,
    pub priority_routing: bool,
    pub max_transaction: Decimal,
    /// Amounts at or below this settle straight-through
    pub stp_threshold: Decimal,
    pub default_objective: Objective,
    /// When present, routing is restricted to these provider ids
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub providers_allowed: Option<Vec<String>>,
}

/// Which currency-category markup column a segment draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarkupClass {
    Retail,
    Corporate,
    Institutional,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingSegment {
    pub id: String,
    pub base_margin_bps: i64,
    pub min_margin_bps: i64,
    pub max_margin_bps: i64,
    pub volume_discount_eligible: bool,
    pub negotiated_rates_allowed: bool,
    pub markup_class: MarkupClass,
}

/// Half-open amount interval `[min_amount, max_amount)`; `None` max is unbounded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmountTier {
    pub id: String,
    pub min_amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<Decimal>,
    pub adjustment_bps: i64,
    pub description: String,
}

impl AmountTier {
    pub fn contains(&self, amount: Decimal) -> bool {
        amount >= self.min_amount && self.max_amount.map_or(true, |max| amount < max)
    }
}

// ==================== Currency categories ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CategoryClass {
    G10,
    Minor,
    Exotic,
    Restricted,
}

/// Per-segment-class markup columns for one category
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CategoryMarkup {
    pub retail_bps: i64,
    pub corporate_bps: i64,
    pub institutional_bps: i64,
}

impl CategoryMarkup {
    pub fn for_class(&self, class: MarkupClass) -> i64 {
        match class {
            MarkupClass::Retail => self.retail_bps,
            MarkupClass::Corporate => self.corporate_bps,
            MarkupClass::Institutional => self.institutional_bps,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyCategory {
    pub category: CategoryClass,
    pub currencies: Vec<String>,
    pub markup: CategoryMarkup,
}

// ==================== CBDC registry ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CbdcStatus {
    Live,
    Pilot,
    Development,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CbdcFees {
    pub issuance_bps: i64,
    pub redemption_bps: i64,
    pub transfer_bps: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CbdcEntry {
    pub code: String,
    pub issuer: String,
    pub linked_fiat: String,
    pub status: CbdcStatus,
    pub settlement_seconds: u64,
    pub mbridge_participant: bool,
    pub cross_border_enabled: bool,
    pub fees: CbdcFees,
}

// ==================== Stablecoin registry ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StablecoinNetwork {
    pub chain: String,
    pub settlement_seconds: u64,
    pub fee_usd: Decimal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StablecoinFees {
    pub mint_bps: i64,
    pub redeem_bps: i64,
    pub transfer_bps: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StablecoinEntry {
    pub code: String,
    pub issuer: String,
    pub peg_currency: String,
    pub peg_ratio: Decimal,
    pub regulated: bool,
    pub networks: Vec<StablecoinNetwork>,
    /// Depth score in [0, 1]
    pub liquidity_score: f64,
    pub fees: StablecoinFees,
}

impl StablecoinEntry {
    /// Cheapest chain for transfer legs
    pub fn best_network(&self) -> Option<&StablecoinNetwork> {
        self.networks
            .iter()
            .min_by(|a, b| a.fee_usd.cmp(&b.fee_usd))
    }
}

// ==================== On/off ramps ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RampDirection {
    OnRamp,
    OffRamp,
    Both,
}

impl RampDirection {
    pub fn can_on_ramp(&self) -> bool {
        matches!(self, RampDirection::OnRamp | RampDirection::Both)
    }

    pub fn can_off_ramp(&self) -> bool {
        matches!(self, RampDirection::OffRamp | RampDirection::Both)
    }
}

/// Fiat <-> stablecoin conversion venue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RampEntry {
    pub id: String,
    pub name: String,
    pub direction: RampDirection,
    pub stablecoins: Vec<String>,
    pub fiat_currencies: Vec<String>,
    pub fee_bps: i64,
    pub settlement_seconds: u64,
    pub stp_enabled: bool,
    pub reliability: f64,
}

// ==================== Atomic swap pairs ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwapStatus {
    Pilot,
    Experimental,
    Planned,
}

/// HTLC corridor between a CBDC and a stablecoin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtomicSwapPair {
    pub cbdc: String,
    pub stablecoin: String,
    pub status: SwapStatus,
    pub fee_bps: i64,
    pub settlement_seconds: u64,
}

// ==================== Negotiated discounts ====================

/// Customer-level negotiated margin discount
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiatedDiscount {
    pub customer_id: String,
    pub discount_bps: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
}

impl NegotiatedDiscount {
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.valid_until.map_or(true, |until| now <= until)
    }
}
