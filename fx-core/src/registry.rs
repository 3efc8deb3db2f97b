//! Reference data registry
//!
//! All reference tables (providers, tiers, segments, amount tiers, currency
//! categories, CBDC/stablecoin/ramp registries) live in one immutable
//! [`Snapshot`]. Readers take the current `Arc<Snapshot>` once per request
//! and hold it for the duration; a reload builds a whole new snapshot and
//! swaps the pointer under the registry write lock. Tables are never
//! mutated in place.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::types::*;

/// Point-in-time view of every reference table
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub providers: Vec<Provider>,
    pub tiers: Vec<CustomerTier>,
    pub segments: Vec<PricingSegment>,
    pub amount_tiers: Vec<AmountTier>,
    pub categories: Vec<CurrencyCategory>,
    pub cbdcs: Vec<CbdcEntry>,
    pub stablecoins: Vec<StablecoinEntry>,
    pub ramps: Vec<RampEntry>,
    pub atomic_swaps: Vec<AtomicSwapPair>,
    pub negotiated_discounts: Vec<NegotiatedDiscount>,
    /// Linked fiats reachable over Project Nexus fast-payment links
    pub nexus_currencies: Vec<String>,
    /// When the snapshot was built
    pub loaded_at: DateTime<Utc>,
}

impl Snapshot {
    /// Total, deterministic rail classification: CBDC and stablecoin
    /// registries are authoritative, everything else is fiat.
    pub fn rail_of(&self, code: &str) -> RailType {
        if self.cbdcs.iter().any(|c| c.code == code) {
            RailType::Cbdc
        } else if self.stablecoins.iter().any(|s| s.code == code) {
            RailType::Stablecoin
        } else {
            RailType::Fiat
        }
    }

    pub fn provider(&self, id: &str) -> Option<&Provider> {
        self.providers.iter().find(|p| p.id == id)
    }

    pub fn tier(&self, id: &str) -> Option<&CustomerTier> {
        self.tiers.iter().find(|t| t.id == id)
    }

    pub fn segment(&self, id: &str) -> Option<&PricingSegment> {
        self.segments.iter().find(|s| s.id == id)
    }

    pub fn cbdc(&self, code: &str) -> Option<&CbdcEntry> {
        self.cbdcs.iter().find(|c| c.code == code)
    }

    pub fn stablecoin(&self, code: &str) -> Option<&StablecoinEntry> {
        self.stablecoins.iter().find(|s| s.code == code)
    }

    pub fn atomic_swap(&self, cbdc: &str, stablecoin: &str) -> Option<&AtomicSwapPair> {
        self.atomic_swaps
            .iter()
            .find(|p| p.cbdc == cbdc && p.stablecoin == stablecoin)
    }

    /// Amount tiers partition the positive reals into half-open intervals,
    /// so at most one tier matches.
    pub fn amount_tier_for(&self, amount: Decimal) -> Option<&AmountTier> {
        self.amount_tiers.iter().find(|t| t.contains(amount))
    }

    /// Currency category; unknown codes price as EXOTIC
    pub fn category_of(&self, currency: &str) -> CategoryClass {
        self.categories
            .iter()
            .find(|c| c.currencies.iter().any(|cur| cur == currency))
            .map(|c| c.category)
            .unwrap_or(CategoryClass::Exotic)
    }

    pub fn category_markup(&self, currency: &str, class: MarkupClass) -> i64 {
        let category = self.category_of(currency);
        self.categories
            .iter()
            .find(|c| c.category == category)
            .map(|c| c.markup.for_class(class))
            .unwrap_or(0)
    }

    /// Active negotiated discount for a customer, if any
    pub fn negotiated_discount(&self, customer_id: &str, now: DateTime<Utc>) -> i64 {
        self.negotiated_discounts
            .iter()
            .find(|d| d.customer_id == customer_id && d.is_valid(now))
            .map(|d| d.discount_bps)
            .unwrap_or(0)
    }

    /// Both CBDCs participate in the mBridge corridor
    pub fn is_mbridge_pair(&self, cbdc_a: &str, cbdc_b: &str) -> bool {
        let participant = |code: &str| {
            self.cbdc(code)
                .map(|c| c.mbridge_participant)
                .unwrap_or(false)
        };
        participant(cbdc_a) && participant(cbdc_b)
    }

    pub fn in_nexus(&self, fiat: &str) -> bool {
        self.nexus_currencies.iter().any(|c| c == fiat)
    }

    /// On-ramps able to mint the given stablecoin from the given fiat
    pub fn on_ramps_for(&self, stablecoin: &str, fiat: &str) -> Vec<&RampEntry> {
        self.ramps
            .iter()
            .filter(|r| {
                r.direction.can_on_ramp()
                    && r.stablecoins.iter().any(|s| s == stablecoin)
                    && r.fiat_currencies.iter().any(|f| f == fiat)
            })
            .collect()
    }

    /// Off-ramps able to redeem the given stablecoin into the given fiat
    pub fn off_ramps_for(&self, stablecoin: &str, fiat: &str) -> Vec<&RampEntry> {
        self.ramps
            .iter()
            .filter(|r| {
                r.direction.can_off_ramp()
                    && r.stablecoins.iter().any(|s| s == stablecoin)
                    && r.fiat_currencies.iter().any(|f| f == fiat)
            })
            .collect()
    }

    /// Reject duplicate primary keys before the snapshot is installed
    pub fn validate(&self) -> Result<()> {
        fn check_unique<'a>(
            kind: &str,
            keys: impl Iterator<Item = &'a str>,
        ) -> Result<()> {
            let mut seen = HashSet::new();
            for key in keys {
                if !seen.insert(key) {
                    return Err(Error::ReferenceDataConflict(format!(
                        "duplicate {} id: {}",
                        kind, key
                    )));
                }
            }
            Ok(())
        }

        check_unique("provider", self.providers.iter().map(|p| p.id.as_str()))?;
        check_unique("tier", self.tiers.iter().map(|t| t.id.as_str()))?;
        check_unique("segment", self.segments.iter().map(|s| s.id.as_str()))?;
        check_unique("amount tier", self.amount_tiers.iter().map(|t| t.id.as_str()))?;
        check_unique("cbdc", self.cbdcs.iter().map(|c| c.code.as_str()))?;
        check_unique("stablecoin", self.stablecoins.iter().map(|s| s.code.as_str()))?;
        check_unique("ramp", self.ramps.iter().map(|r| r.id.as_str()))?;

        for provider in &self.providers {
            if !(0.0..=1.0).contains(&provider.reliability) {
                return Err(Error::Validation(format!(
                    "provider {} reliability out of range: {}",
                    provider.id, provider.reliability
                )));
            }
        }

        Ok(())
    }
}

/// Owns the current snapshot; single writer, many snapshot readers
pub struct ReferenceRegistry {
    current: RwLock<Arc<Snapshot>>,
}

impl ReferenceRegistry {
    /// Registry seeded with the built-in contract tables
    pub fn builtin() -> Self {
        Self {
            current: RwLock::new(Arc::new(Snapshot::builtin())),
        }
    }

    /// Current snapshot pointer; hold it for the whole request
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.read().clone()
    }

    /// Validate and atomically install a new snapshot
    pub fn install(&self, snapshot: Snapshot) -> Result<()> {
        snapshot.validate()?;
        let mut guard = self.current.write();
        *guard = Arc::new(snapshot);
        info!("Reference snapshot installed");
        Ok(())
    }

    /// Rebuild the snapshot from JSON documents in `dir`, falling back to
    /// the built-in table for any missing document.
    pub fn reload_from_dir(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        let builtin = Snapshot::builtin();

        let snapshot = Snapshot {
            providers: load_or(dir.join("providers.json"), builtin.providers)?,
            tiers: load_or(dir.join("tiers.json"), builtin.tiers)?,
            segments: load_or(dir.join("segments.json"), builtin.segments)?,
            amount_tiers: load_or(dir.join("amount_tiers.json"), builtin.amount_tiers)?,
            categories: load_or(dir.join("currency_categories.json"), builtin.categories)?,
            cbdcs: load_or(dir.join("cbdc.json"), builtin.cbdcs)?,
            stablecoins: load_or(dir.join("stablecoins.json"), builtin.stablecoins)?,
            ramps: load_or(dir.join("ramps.json"), builtin.ramps)?,
            atomic_swaps: load_or(dir.join("atomic_swaps.json"), builtin.atomic_swaps)?,
            negotiated_discounts: load_or(dir.join("discounts.json"), builtin.negotiated_discounts)?,
            nexus_currencies: builtin.nexus_currencies,
            loaded_at: Utc::now(),
        };

        self.install(snapshot)
    }
}

fn load_or<T: DeserializeOwned>(path: std::path::PathBuf, fallback: Vec<T>) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(fallback);
    }
    let content = std::fs::read_to_string(&path)?;
    match serde_json::from_str(&content) {
        Ok(parsed) => Ok(parsed),
        Err(e) => {
            warn!("Failed to parse {}: {}", path.display(), e);
            Err(Error::Serialization(e))
        }
    }
}

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

impl Snapshot {
    /// Built-in contract tables. Tier discounts, amount tiers, currency
    /// categories and the digital-rail registries ship with the engine;
    /// deployments override them via the data-directory documents.
    pub fn builtin() -> Self {
        Snapshot {
            providers: builtin_providers(),
            tiers: builtin_tiers(),
            segments: builtin_segments(),
            amount_tiers: builtin_amount_tiers(),
            categories: builtin_categories(),
            cbdcs: builtin_cbdcs(),
            stablecoins: builtin_stablecoins(),
            ramps: builtin_ramps(),
            atomic_swaps: builtin_atomic_swaps(),
            negotiated_discounts: vec![NegotiatedDiscount {
                customer_id: "ACME_CORP".to_string(),
                discount_bps: 10,
                valid_until: None,
            }],
            nexus_currencies: [
                "SGD", "THB", "MYR", "PHP", "INR", "CNY", "HKD", "AED",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            loaded_at: Utc::now(),
        }
    }
}

fn builtin_providers() -> Vec<Provider> {
    let majors = |extra: &[&str]| -> Vec<String> {
        let mut pairs: Vec<String> = [
            "USDINR", "USDAED", "USDSGD", "USDCNY", "USDHKD", "USDTHB", "EURUSD", "GBPUSD",
            "USDJPY", "USDCHF", "AUDUSD", "USDCAD",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        pairs.extend(extra.iter().map(|s| s.to_string()));
        pairs
    };

    vec![
        Provider {
            id: "TREASURY_INTERNAL".to_string(),
            name: "Internal Treasury Desk".to_string(),
            provider_type: ProviderType::Internal,
            reliability: 0.99,
            avg_latency_ms: 40,
            settlement_hours: 1,
            min_amount: dec!(1_000),
            daily_limit: dec!(50_000_000),
            markup_bps: 15,
            supported_pairs: majors(&["EURINR", "AEDINR", "USDPHP", "USDMXN"]),
            operating_hours: OperatingHours::always(),
            stp_enabled: true,
            is_active: true,
        },
        Provider {
            id: "CITI_CORRESPONDENT".to_string(),
            name: "Citi Correspondent Network".to_string(),
            provider_type: ProviderType::Correspondent,
            reliability: 0.97,
            avg_latency_ms: 260,
            settlement_hours: 48,
            min_amount: dec!(10_000),
            daily_limit: dec!(100_000_000),
            markup_bps: 25,
            supported_pairs: majors(&["USDTRY", "USDZAR", "USDBRL", "USDKRW"]),
            operating_hours: OperatingHours::always(),
            stp_enabled: false,
            is_active: true,
        },
        Provider {
            id: "HSBC_CORRESPONDENT".to_string(),
            name: "HSBC Correspondent Network".to_string(),
            provider_type: ProviderType::Correspondent,
            reliability: 0.96,
            avg_latency_ms: 310,
            settlement_hours: 48,
            min_amount: dec!(10_000),
            daily_limit: dec!(80_000_000),
            markup_bps: 28,
            supported_pairs: majors(&[]),
            operating_hours: OperatingHours::always(),
            stp_enabled: false,
            is_active: true,
        },
        Provider {
            id: "NIUM_LOCAL".to_string(),
            name: "Nium Local Clearing".to_string(),
            provider_type: ProviderType::Local,
            reliability: 0.93,
            avg_latency_ms: 180,
            settlement_hours: 4,
            min_amount: dec!(100),
            daily_limit: dec!(2_000_000),
            markup_bps: 15,
            supported_pairs: vec![
                "USDINR".to_string(),
                "USDSGD".to_string(),
                "USDPHP".to_string(),
                "AEDINR".to_string(),
            ],
            operating_hours: OperatingHours {
                open: hm(1, 0),
                close: hm(17, 0),
            },
            stp_enabled: true,
            is_active: true,
        },
        Provider {
            id: "WISE".to_string(),
            name: "Wise Platform".to_string(),
            provider_type: ProviderType::Fintech,
            reliability: 0.95,
            avg_latency_ms: 120,
            settlement_hours: 2,
            min_amount: dec!(10),
            daily_limit: dec!(1_000_000),
            markup_bps: 18,
            supported_pairs: majors(&["EURINR"]),
            operating_hours: OperatingHours::always(),
            stp_enabled: true,
            is_active: true,
        },
        Provider {
            id: "XTX_DEALER".to_string(),
            name: "XTX Markets".to_string(),
            provider_type: ProviderType::Dealer,
            reliability: 0.90,
            avg_latency_ms: 480,
            settlement_hours: 24,
            min_amount: dec!(50_000),
            daily_limit: dec!(20_000_000),
            markup_bps: 20,
            supported_pairs: majors(&[]),
            operating_hours: OperatingHours::always(),
            stp_enabled: false,
            is_active: true,
        },
        // Data-only feed, never routable
        Provider {
            id: "REFINITIV_FEED".to_string(),
            name: "Refinitiv Market Data".to_string(),
            provider_type: ProviderType::MarketData,
            reliability: 1.0,
            avg_latency_ms: 20,
            settlement_hours: 0,
            min_amount: dec!(0),
            daily_limit: dec!(0),
            markup_bps: 0,
            supported_pairs: vec![],
            operating_hours: OperatingHours::always(),
            stp_enabled: false,
            is_active: false,
        },
    ]
}

fn builtin_tiers() -> Vec<CustomerTier> {
    vec![
        CustomerTier {
            id: "PLATINUM".to_string(),
            min_annual_volume: dec!(50_000_000),
            markup_discount_pct: dec!(50),
            spread_reduction_bps: 10,
            priority_routing: true,
            max_transaction: dec!(10_000_000),
            stp_threshold: dec!(1_000_000),
            default_objective: Objective::Optimum,
            providers_allowed: None,
        },
        CustomerTier {
            id: "GOLD".to_string(),
            min_annual_volume: dec!(10_000_000),
            markup_discount_pct: dec!(30),
            spread_reduction_bps: 5,
            priority_routing: true,
            max_transaction: dec!(5_000_000),
            stp_threshold: dec!(500_000),
            default_objective: Objective::BestRate,
            providers_allowed: None,
        },
        CustomerTier {
            id: "SILVER".to_string(),
            min_annual_volume: dec!(1_000_000),
            markup_discount_pct: dec!(15),
            spread_reduction_bps: 2,
            priority_routing: false,
            max_transaction: dec!(1_000_000),
            stp_threshold: dec!(100_000),
            default_objective: Objective::BestRate,
            providers_allowed: None,
        },
        CustomerTier {
            id: "BRONZE".to_string(),
            min_annual_volume: dec!(100_000),
            markup_discount_pct: dec!(5),
            spread_reduction_bps: 0,
            priority_routing: false,
            max_transaction: dec!(500_000),
            stp_threshold: dec!(50_000),
            default_objective: Objective::BestRate,
            providers_allowed: None,
        },
        CustomerTier {
            id: "RETAIL".to_string(),
            min_annual_volume: dec!(0),
            markup_discount_pct: dec!(0),
            spread_reduction_bps: 0,
            priority_routing: false,
            max_transaction: dec!(100_000),
            stp_threshold: dec!(10_000),
            default_objective: Objective::BestRate,
            providers_allowed: None,
        },
    ]
}

fn builtin_segments() -> Vec<PricingSegment> {
    vec![
        PricingSegment {
            id: "RETAIL".to_string(),
            base_margin_bps: 150,
            min_margin_bps: 50,
            max_margin_bps: 300,
            volume_discount_eligible: false,
            negotiated_rates_allowed: false,
            markup_class: MarkupClass::Retail,
        },
        PricingSegment {
            id: "SMALL_BUSINESS".to_string(),
            base_margin_bps: 100,
            min_margin_bps: 40,
            max_margin_bps: 200,
            volume_discount_eligible: true,
            negotiated_rates_allowed: false,
            markup_class: MarkupClass::Corporate,
        },
        PricingSegment {
            id: "MID_MARKET".to_string(),
            base_margin_bps: 75,
            min_margin_bps: 30,
            max_margin_bps: 150,
            volume_discount_eligible: true,
            negotiated_rates_allowed: true,
            markup_class: MarkupClass::Corporate,
        },
        PricingSegment {
            id: "CORPORATE".to_string(),
            base_margin_bps: 50,
            min_margin_bps: 20,
            max_margin_bps: 100,
            volume_discount_eligible: true,
            negotiated_rates_allowed: true,
            markup_class: MarkupClass::Corporate,
        },
        PricingSegment {
            id: "INSTITUTIONAL".to_string(),
            base_margin_bps: 25,
            min_margin_bps: 10,
            max_margin_bps: 60,
            volume_discount_eligible: true,
            negotiated_rates_allowed: true,
            markup_class: MarkupClass::Institutional,
        },
    ]
}

fn builtin_amount_tiers() -> Vec<AmountTier> {
    let tier = |id: &str, min: Decimal, max: Option<Decimal>, bps: i64, desc: &str| AmountTier {
        id: id.to_string(),
        min_amount: min,
        max_amount: max,
        adjustment_bps: bps,
        description: desc.to_string(),
    };

    vec![
        tier("TIER_1", dec!(0), Some(dec!(10_000)), 50, "Up to 10k"),
        tier("TIER_2", dec!(10_000), Some(dec!(50_000)), 25, "10k to 50k"),
        tier("TIER_3", dec!(50_000), Some(dec!(100_000)), 0, "50k to 100k"),
        tier("TIER_4", dec!(100_000), Some(dec!(500_000)), -15, "100k to 500k"),
        tier("TIER_5", dec!(500_000), Some(dec!(1_000_000)), -25, "500k to 1M"),
        tier("TIER_6", dec!(1_000_000), None, -40, "Above 1M"),
    ]
}

fn builtin_categories() -> Vec<CurrencyCategory> {
    let list = |codes: &[&str]| codes.iter().map(|c| c.to_string()).collect();

    vec![
        CurrencyCategory {
            category: CategoryClass::G10,
            currencies: list(&["USD", "EUR", "JPY", "GBP", "CHF", "AUD", "NZD", "CAD"]),
            markup: CategoryMarkup {
                retail_bps: 50,
                corporate_bps: 15,
                institutional_bps: 2,
            },
        },
        CurrencyCategory {
            category: CategoryClass::Minor,
            currencies: list(&["SGD", "HKD", "DKK", "PLN", "CZK"]),
            markup: CategoryMarkup {
                retail_bps: 100,
                corporate_bps: 30,
                institutional_bps: 5,
            },
        },
        CurrencyCategory {
            category: CategoryClass::Exotic,
            currencies: list(&["TRY", "ZAR", "MXN", "BRL"]),
            markup: CategoryMarkup {
                retail_bps: 200,
                corporate_bps: 75,
                institutional_bps: 15,
            },
        },
        CurrencyCategory {
            category: CategoryClass::Restricted,
            currencies: list(&["INR", "CNY", "KRW", "TWD", "PHP"]),
            markup: CategoryMarkup {
                retail_bps: 300,
                corporate_bps: 100,
                institutional_bps: 25,
            },
        },
    ]
}

fn builtin_cbdcs() -> Vec<CbdcEntry> {
    let entry = |code: &str,
                 issuer: &str,
                 fiat: &str,
                 status: CbdcStatus,
                 secs: u64,
                 mbridge: bool| CbdcEntry {
        code: code.to_string(),
        issuer: issuer.to_string(),
        linked_fiat: fiat.to_string(),
        status,
        settlement_seconds: secs,
        mbridge_participant: mbridge,
        cross_border_enabled: true,
        fees: CbdcFees {
            issuance_bps: 0,
            redemption_bps: 0,
            transfer_bps: 1,
        },
    };

    vec![
        entry("e-CNY", "People's Bank of China", "CNY", CbdcStatus::Live, 10, true),
        entry("e-HKD", "Hong Kong Monetary Authority", "HKD", CbdcStatus::Pilot, 8, true),
        entry("e-THB", "Bank of Thailand", "THB", CbdcStatus::Pilot, 12, true),
        entry("e-AED", "Central Bank of the UAE", "AED", CbdcStatus::Pilot, 10, true),
        entry("e-INR", "Reserve Bank of India", "INR", CbdcStatus::Pilot, 15, false),
        entry("e-SGD", "Monetary Authority of Singapore", "SGD", CbdcStatus::Development, 10, false),
    ]
}

fn builtin_stablecoins() -> Vec<StablecoinEntry> {
    vec![
        StablecoinEntry {
            code: "USDC".to_string(),
            issuer: "Circle".to_string(),
            peg_currency: "USD".to_string(),
            peg_ratio: dec!(1),
            regulated: true,
            networks: vec![
                StablecoinNetwork {
                    chain: "Ethereum".to_string(),
                    settlement_seconds: 60,
                    fee_usd: dec!(5),
                },
                StablecoinNetwork {
                    chain: "Solana".to_string(),
                    settlement_seconds: 2,
                    fee_usd: dec!(0.10),
                },
                StablecoinNetwork {
                    chain: "Base".to_string(),
                    settlement_seconds: 5,
                    fee_usd: dec!(0.05),
                },
            ],
            liquidity_score: 0.98,
            fees: StablecoinFees {
                mint_bps: 0,
                redeem_bps: 0,
                transfer_bps: 1,
            },
        },
        StablecoinEntry {
            code: "USDT".to_string(),
            issuer: "Tether".to_string(),
            peg_currency: "USD".to_string(),
            peg_ratio: dec!(1),
            regulated: false,
            networks: vec![
                StablecoinNetwork {
                    chain: "Ethereum".to_string(),
                    settlement_seconds: 60,
                    fee_usd: dec!(5),
                },
                StablecoinNetwork {
                    chain: "Tron".to_string(),
                    settlement_seconds: 10,
                    fee_usd: dec!(1),
                },
            ],
            liquidity_score: 0.95,
            fees: StablecoinFees {
                mint_bps: 2,
                redeem_bps: 2,
                transfer_bps: 1,
            },
        },
        StablecoinEntry {
            code: "EURC".to_string(),
            issuer: "Circle".to_string(),
            peg_currency: "EUR".to_string(),
            peg_ratio: dec!(1),
            regulated: true,
            networks: vec![StablecoinNetwork {
                chain: "Ethereum".to_string(),
                settlement_seconds: 60,
                fee_usd: dec!(5),
            }],
            liquidity_score: 0.85,
            fees: StablecoinFees {
                mint_bps: 0,
                redeem_bps: 0,
                transfer_bps: 1,
            },
        },
        StablecoinEntry {
            code: "XSGD".to_string(),
            issuer: "StraitsX".to_string(),
            peg_currency: "SGD".to_string(),
            peg_ratio: dec!(1),
            regulated: true,
            networks: vec![StablecoinNetwork {
                chain: "Ethereum".to_string(),
                settlement_seconds: 60,
                fee_usd: dec!(3),
            }],
            liquidity_score: 0.70,
            fees: StablecoinFees {
                mint_bps: 5,
                redeem_bps: 5,
                transfer_bps: 2,
            },
        },
    ]
}

fn builtin_ramps() -> Vec<RampEntry> {
    let list = |codes: &[&str]| codes.iter().map(|c| c.to_string()).collect::<Vec<_>>();

    vec![
        RampEntry {
            id: "CIRCLE_MINT".to_string(),
            name: "Circle Mint".to_string(),
            direction: RampDirection::Both,
            stablecoins: list(&["USDC", "EURC"]),
            fiat_currencies: list(&["USD", "EUR"]),
            fee_bps: 0,
            settlement_seconds: 1_800,
            stp_enabled: true,
            reliability: 0.98,
        },
        RampEntry {
            id: "COINBASE_EXCHANGE".to_string(),
            name: "Coinbase Exchange".to_string(),
            direction: RampDirection::Both,
            stablecoins: list(&["USDC", "USDT"]),
            fiat_currencies: list(&["USD", "EUR", "GBP", "SGD"]),
            fee_bps: 25,
            settlement_seconds: 3_600,
            stp_enabled: true,
            reliability: 0.96,
        },
        RampEntry {
            id: "KRAKEN_OTC".to_string(),
            name: "Kraken OTC Desk".to_string(),
            direction: RampDirection::Both,
            stablecoins: list(&["USDC", "USDT"]),
            fiat_currencies: list(&["USD", "EUR", "CHF"]),
            fee_bps: 20,
            settlement_seconds: 3_600,
            stp_enabled: true,
            reliability: 0.95,
        },
        RampEntry {
            id: "LOCAL_OTC_DESK".to_string(),
            name: "Regional OTC Desk".to_string(),
            direction: RampDirection::Both,
            stablecoins: list(&["USDT", "USDC"]),
            fiat_currencies: list(&["INR", "AED", "THB", "PHP", "CNY", "HKD"]),
            fee_bps: 50,
            settlement_seconds: 7_200,
            stp_enabled: false,
            reliability: 0.90,
        },
    ]
}

fn builtin_atomic_swaps() -> Vec<AtomicSwapPair> {
    vec![
        AtomicSwapPair {
            cbdc: "e-INR".to_string(),
            stablecoin: "USDC".to_string(),
            status: SwapStatus::Experimental,
            fee_bps: 5,
            settlement_seconds: 300,
        },
        AtomicSwapPair {
            cbdc: "e-HKD".to_string(),
            stablecoin: "USDC".to_string(),
            status: SwapStatus::Pilot,
            fee_bps: 5,
            settlement_seconds: 300,
        },
        AtomicSwapPair {
            cbdc: "e-CNY".to_string(),
            stablecoin: "USDT".to_string(),
            status: SwapStatus::Planned,
            fee_bps: 5,
            settlement_seconds: 300,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_snapshot_validates() {
        Snapshot::builtin().validate().unwrap();
    }

    #[test]
    fn test_rail_classification_total() {
        let snapshot = Snapshot::builtin();
        assert_eq!(snapshot.rail_of("USD"), RailType::Fiat);
        assert_eq!(snapshot.rail_of("e-INR"), RailType::Cbdc);
        assert_eq!(snapshot.rail_of("USDC"), RailType::Stablecoin);
        // Unknown codes are fiat
        assert_eq!(snapshot.rail_of("XYZ"), RailType::Fiat);
    }

    #[test]
    fn test_amount_tier_boundaries() {
        let snapshot = Snapshot::builtin();
        // amount == tier max belongs to the next tier
        assert_eq!(snapshot.amount_tier_for(dec!(10_000)).unwrap().id, "TIER_2");
        assert_eq!(snapshot.amount_tier_for(dec!(9_999.99)).unwrap().id, "TIER_1");
        assert_eq!(snapshot.amount_tier_for(dec!(5_000_000)).unwrap().id, "TIER_6");
    }

    #[test]
    fn test_category_markup_columns() {
        let snapshot = Snapshot::builtin();
        assert_eq!(snapshot.category_of("INR"), CategoryClass::Restricted);
        assert_eq!(snapshot.category_markup("INR", MarkupClass::Corporate), 100);
        assert_eq!(snapshot.category_markup("EUR", MarkupClass::Institutional), 2);
        // Unknown currencies price as exotic
        assert_eq!(snapshot.category_of("XAU"), CategoryClass::Exotic);
    }

    #[test]
    fn test_mbridge_membership() {
        let snapshot = Snapshot::builtin();
        assert!(snapshot.is_mbridge_pair("e-CNY", "e-AED"));
        assert!(!snapshot.is_mbridge_pair("e-INR", "e-AED"));
    }

    #[test]
    fn test_duplicate_provider_rejected() {
        let mut snapshot = Snapshot::builtin();
        let dup = snapshot.providers[0].clone();
        snapshot.providers.push(dup);
        assert!(matches!(
            snapshot.validate(),
            Err(Error::ReferenceDataConflict(_))
        ));
    }

    #[test]
    fn test_reload_swaps_snapshot() {
        let registry = ReferenceRegistry::builtin();
        let before = registry.snapshot();

        let dir = tempfile::tempdir().unwrap();
        let providers = vec![before.providers[0].clone()];
        std::fs::write(
            dir.path().join("providers.json"),
            serde_json::to_string(&providers).unwrap(),
        )
        .unwrap();

        registry.reload_from_dir(dir.path()).unwrap();
        let after = registry.snapshot();

        assert_eq!(after.providers.len(), 1);
        // The old snapshot is untouched
        assert!(before.providers.len() > 1);
    }
}
