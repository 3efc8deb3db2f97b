//! Treasury rate source and cache
//!
//! Rates arrive through the [`RateSource`] capability. The [`RateService`]
//! fronts a source with a concurrent cache: direct pairs are served from
//! cache while fresh, refetched under a bounded timeout when expired, and
//! served stale (marked INDICATIVE) when the source is slow or down.
//! Inverses are computed as `1/rate`; missing pairs are derived on demand
//! as a USD cross and never cached.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::time::timeout;
use tracing::warn;

use crate::error::{Error, Result};
use crate::types::{CurrencyPair, TreasuryPosition, TreasuryRate};

/// Supplies treasury mid/bid/ask for a currency pair
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Fetch the current rate for a direct pair key (`USDINR`)
    async fn fetch_rate(&self, pair: &CurrencyPair) -> Result<TreasuryRate>;
}

/// Rate lookup result with provenance
#[derive(Debug, Clone)]
pub struct RateLookup {
    pub rate: TreasuryRate,
    /// True when served stale or assembled from substituted data
    pub indicative: bool,
    /// True when derived as a USD cross
    pub derived_cross: bool,
}

#[derive(Debug, Clone)]
struct CachedRate {
    rate: TreasuryRate,
    fetched_at: DateTime<Utc>,
}

/// Caching front for a [`RateSource`]
pub struct RateService {
    source: Arc<dyn RateSource>,
    cache: DashMap<String, CachedRate>,
    fetch_timeout: Duration,
    stale_window: chrono::Duration,
}

impl RateService {
    pub fn new(source: Arc<dyn RateSource>, fetch_timeout_ms: u64, stale_seconds: u64) -> Self {
        Self {
            source,
            cache: DashMap::new(),
            fetch_timeout: Duration::from_millis(fetch_timeout_ms),
            stale_window: chrono::Duration::seconds(stale_seconds as i64),
        }
    }

    /// Resolve a rate for the ordered pair: direct, then inverse, then USD cross
    pub async fn get_rate(&self, pair: &CurrencyPair) -> Result<RateLookup> {
        if pair.base == pair.quote {
            return Err(Error::Validation(format!(
                "degenerate pair {}",
                pair.code()
            )));
        }

        if let Some(lookup) = self.direct_or_inverse(pair).await? {
            return Ok(lookup);
        }

        // Cross via USD, worst spread of the two legs propagated.
        // Cross-rates are derived on demand and never cached.
        if pair.base != "USD" && pair.quote != "USD" {
            let leg_a = self
                .direct_or_inverse(&CurrencyPair::new(pair.base.clone(), "USD"))
                .await?;
            let leg_b = self
                .direct_or_inverse(&CurrencyPair::new("USD", pair.quote.clone()))
                .await?;
            if let (Some(a), Some(b)) = (leg_a, leg_b) {
                let crossed = cross_rate(pair, &a.rate, &b.rate);
                return Ok(RateLookup {
                    rate: crossed,
                    indicative: a.indicative || b.indicative,
                    derived_cross: true,
                });
            }
        }

        Err(Error::RateUnavailable {
            pair: pair.code(),
            reason: "no direct, inverse or USD-cross rate".to_string(),
        })
    }

    async fn direct_or_inverse(&self, pair: &CurrencyPair) -> Result<Option<RateLookup>> {
        match self.fetch_cached(pair).await? {
            Some(lookup) => Ok(Some(lookup)),
            None => {
                let inverse = pair.inverse();
                Ok(self.fetch_cached(&inverse).await?.map(|lookup| RateLookup {
                    rate: invert_rate(&lookup.rate, pair),
                    ..lookup
                }))
            }
        }
    }

    /// Serve from cache while fresh; refetch under the timeout when expired;
    /// fall back to a stale entry (marked indicative) when the source fails.
    async fn fetch_cached(&self, pair: &CurrencyPair) -> Result<Option<RateLookup>> {
        let code = pair.code();
        let now = Utc::now();

        if let Some(entry) = self.cache.get(&code) {
            if now <= entry.rate.valid_until {
                return Ok(Some(RateLookup {
                    rate: entry.rate.clone(),
                    indicative: false,
                    derived_cross: false,
                }));
            }
        }

        match timeout(self.fetch_timeout, self.source.fetch_rate(pair)).await {
            Ok(Ok(rate)) => {
                if !rate.is_coherent() {
                    return Err(Error::Validation(format!(
                        "incoherent rate for {}: bid {} mid {} ask {}",
                        code, rate.bid, rate.mid, rate.ask
                    )));
                }
                self.cache.insert(
                    code,
                    CachedRate {
                        rate: rate.clone(),
                        fetched_at: now,
                    },
                );
                Ok(Some(RateLookup {
                    rate,
                    indicative: false,
                    derived_cross: false,
                }))
            }
            Ok(Err(Error::RateUnavailable { .. })) => Ok(None),
            Ok(Err(e)) => Err(e),
            Err(_elapsed) => {
                warn!("Rate fetch for {} timed out", code);
                if let Some(entry) = self.cache.get(&code) {
                    if now <= entry.rate.valid_until + self.stale_window {
                        return Ok(Some(RateLookup {
                            rate: entry.rate.clone(),
                            indicative: true,
                            derived_cross: false,
                        }));
                    }
                    let age = now - entry.fetched_at;
                    warn!("Cached {} too stale to serve ({}s old)", entry.rate.pair, age.num_seconds());
                }
                Err(Error::RateUnavailable {
                    pair: pair.code(),
                    reason: "source timed out and no usable cache entry".to_string(),
                })
            }
        }
    }
}

fn spread_bps(rate: &TreasuryRate) -> Decimal {
    if rate.mid.is_zero() {
        return Decimal::ZERO;
    }
    (rate.ask - rate.bid) / rate.mid * dec!(10_000)
}

/// `1/rate` with bid/ask swapped and the position flipped
fn invert_rate(rate: &TreasuryRate, pair: &CurrencyPair) -> TreasuryRate {
    TreasuryRate {
        pair: pair.code(),
        bid: Decimal::ONE / rate.ask,
        ask: Decimal::ONE / rate.bid,
        mid: Decimal::ONE / rate.mid,
        min_margin_bps: rate.min_margin_bps,
        target_margin_bps: rate.target_margin_bps,
        max_exposure: rate.max_exposure,
        current_exposure: rate.current_exposure,
        position: match rate.position {
            TreasuryPosition::Long => TreasuryPosition::Short,
            TreasuryPosition::Short => TreasuryPosition::Long,
            TreasuryPosition::Neutral => TreasuryPosition::Neutral,
        },
        valid_until: rate.valid_until,
    }
}

/// `AB = AUSD x USDB` on mids, widened by the worst leg spread
fn cross_rate(pair: &CurrencyPair, leg_a: &TreasuryRate, leg_b: &TreasuryRate) -> TreasuryRate {
    let mid = leg_a.mid * leg_b.mid;
    let worst_spread = spread_bps(leg_a).max(spread_bps(leg_b));
    let half = worst_spread / dec!(2) / dec!(10_000);

    TreasuryRate {
        pair: pair.code(),
        bid: mid * (Decimal::ONE - half),
        ask: mid * (Decimal::ONE + half),
        mid,
        min_margin_bps: leg_a.min_margin_bps.max(leg_b.min_margin_bps),
        target_margin_bps: leg_a.target_margin_bps.max(leg_b.target_margin_bps),
        max_exposure: leg_a.max_exposure.min(leg_b.max_exposure),
        current_exposure: Decimal::ZERO,
        position: TreasuryPosition::Neutral,
        valid_until: leg_a.valid_until.min(leg_b.valid_until),
    }
}

// ==================== Static MVP source ====================

/// Deterministic in-memory rate table the engine boots with.
///
/// Production deployments swap in a live feed behind the same trait.
pub struct StaticRateSource {
    rates: HashMap<String, StaticQuote>,
    ttl: chrono::Duration,
}

#[derive(Debug, Clone, Copy)]
struct StaticQuote {
    bid: Decimal,
    mid: Decimal,
    ask: Decimal,
    position: TreasuryPosition,
}

impl StaticRateSource {
    pub fn new() -> Self {
        use TreasuryPosition::*;

        let mut rates = HashMap::new();
        let mut add = |pair: &str, bid: Decimal, mid: Decimal, ask: Decimal, position| {
            rates.insert(pair.to_string(), StaticQuote { bid, mid, ask, position });
        };

        add("USDINR", dec!(84.42), dec!(84.50), dec!(84.58), Long);
        add("USDAED", dec!(3.6710), dec!(3.6725), dec!(3.6740), Neutral);
        add("USDSGD", dec!(1.3440), dec!(1.3450), dec!(1.3460), Neutral);
        add("USDCNY", dec!(7.1900), dec!(7.2000), dec!(7.2100), Short);
        add("USDHKD", dec!(7.8200), dec!(7.8300), dec!(7.8400), Neutral);
        add("USDTHB", dec!(36.20), dec!(36.30), dec!(36.40), Neutral);
        add("USDJPY", dec!(149.20), dec!(149.30), dec!(149.40), Neutral);
        add("USDCHF", dec!(0.8830), dec!(0.8840), dec!(0.8850), Neutral);
        add("USDCAD", dec!(1.3600), dec!(1.3610), dec!(1.3620), Neutral);
        add("USDMXN", dec!(17.10), dec!(17.15), dec!(17.20), Neutral);
        add("USDTRY", dec!(32.50), dec!(32.60), dec!(32.70), Neutral);
        add("USDZAR", dec!(18.40), dec!(18.45), dec!(18.50), Neutral);
        add("USDBRL", dec!(4.95), dec!(4.97), dec!(4.99), Neutral);
        add("USDKRW", dec!(1330), dec!(1332), dec!(1334), Neutral);
        add("USDTWD", dec!(31.40), dec!(31.45), dec!(31.50), Neutral);
        add("USDPHP", dec!(55.90), dec!(56.00), dec!(56.10), Neutral);
        add("USDDKK", dec!(6.90), dec!(6.91), dec!(6.92), Neutral);
        add("USDPLN", dec!(4.02), dec!(4.03), dec!(4.04), Neutral);
        add("USDCZK", dec!(23.10), dec!(23.15), dec!(23.20), Neutral);
        add("EURUSD", dec!(1.0820), dec!(1.0825), dec!(1.0830), Neutral);
        add("GBPUSD", dec!(1.2645), dec!(1.2650), dec!(1.2655), Neutral);
        add("AUDUSD", dec!(0.6540), dec!(0.6545), dec!(0.6550), Neutral);
        add("NZDUSD", dec!(0.6090), dec!(0.6095), dec!(0.6100), Neutral);

        Self {
            rates,
            ttl: chrono::Duration::seconds(300),
        }
    }
}

impl Default for StaticRateSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateSource for StaticRateSource {
    async fn fetch_rate(&self, pair: &CurrencyPair) -> Result<TreasuryRate> {
        let code = pair.code();
        let quote = self.rates.get(&code).ok_or_else(|| Error::RateUnavailable {
            pair: code.clone(),
            reason: "pair not in static table".to_string(),
        })?;

        Ok(TreasuryRate {
            pair: code,
            bid: quote.bid,
            ask: quote.ask,
            mid: quote.mid,
            min_margin_bps: 5,
            target_margin_bps: 20,
            max_exposure: dec!(100_000_000),
            current_exposure: Decimal::ZERO,
            position: quote.position,
            valid_until: Utc::now() + self.ttl,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> RateService {
        RateService::new(Arc::new(StaticRateSource::new()), 2_000, 30)
    }

    #[tokio::test]
    async fn test_direct_rate_is_coherent() {
        let lookup = service()
            .get_rate(&CurrencyPair::new("USD", "INR"))
            .await
            .unwrap();
        assert!(lookup.rate.is_coherent());
        assert!(!lookup.indicative);
        assert!(!lookup.derived_cross);
        assert_eq!(lookup.rate.mid, dec!(84.50));
    }

    #[tokio::test]
    async fn test_inverse_rate() {
        let lookup = service()
            .get_rate(&CurrencyPair::new("INR", "USD"))
            .await
            .unwrap();
        assert!(lookup.rate.is_coherent());
        // 1 / 84.50
        assert!((lookup.rate.mid - dec!(0.0118343)).abs() < dec!(0.000001));
        // LONG USD position flips when quoting INR as base
        assert_eq!(lookup.rate.position, TreasuryPosition::Short);
    }

    #[tokio::test]
    async fn test_usd_cross_rate() {
        let lookup = service()
            .get_rate(&CurrencyPair::new("GBP", "SGD"))
            .await
            .unwrap();
        assert!(lookup.derived_cross);
        // GBPUSD 1.2650 x USDSGD 1.3450
        assert_eq!(lookup.rate.mid, dec!(1.2650) * dec!(1.3450));
        assert!(lookup.rate.is_coherent());
    }

    #[tokio::test]
    async fn test_unknown_pair_unavailable() {
        let err = service()
            .get_rate(&CurrencyPair::new("XAU", "XAG"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RateUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_degenerate_pair_rejected() {
        let err = service()
            .get_rate(&CurrencyPair::new("USD", "USD"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_cross_spread_is_worst_leg() {
        let svc = service();
        let cross = svc
            .get_rate(&CurrencyPair::new("GBP", "INR"))
            .await
            .unwrap();
        let gbp = svc
            .get_rate(&CurrencyPair::new("GBP", "USD"))
            .await
            .unwrap();
        let inr = svc
            .get_rate(&CurrencyPair::new("USD", "INR"))
            .await
            .unwrap();

        let worst = spread_bps(&gbp.rate).max(spread_bps(&inr.rate));
        let got = spread_bps(&cross.rate);
        assert!((got - worst).abs() < dec!(0.01), "spread {} vs worst {}", got, worst);
    }
}
