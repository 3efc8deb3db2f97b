//! Engine wiring

use std::sync::Arc;

use anyhow::Context;
use fx_core::{Config, RateService, ReferenceRegistry, StaticRateSource};
use fx_deals::DealsStore;
use fx_pricing::PricingEngine;
use fx_routing::{MultiRailRouter, SmartRouter};
use fx_rules::{RuleType, RulesEngine};
use tracing::info;

/// Shared engine state behind the HTTP handlers
pub struct AppState {
    pub config: Config,
    pub registry: Arc<ReferenceRegistry>,
    pub rates: Arc<RateService>,
    pub rules: Arc<RulesEngine>,
    pub pricing: Arc<PricingEngine>,
    pub smart: Arc<SmartRouter>,
    pub multi_rail: Arc<MultiRailRouter>,
    pub deals: Arc<DealsStore>,
}

impl AppState {
    /// Wire every engine against the configured data directory
    pub fn initialise(config: Config) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("creating data dir {}", config.data_dir.display()))?;

        let registry = Arc::new(ReferenceRegistry::builtin());
        registry
            .reload_from_dir(&config.data_dir)
            .context("loading reference documents")?;

        let rates = Arc::new(RateService::new(
            Arc::new(StaticRateSource::new()),
            config.rate_timeout_ms,
            config.rate_stale_seconds,
        ));

        let rules = Arc::new(RulesEngine::new());
        for (rule_type, path) in [
            (RuleType::ProviderSelection, config.provider_rules_path()),
            (RuleType::MarginAdjustment, config.margin_rules_path()),
        ] {
            if path.exists() {
                let count = rules
                    .load_from_file(rule_type, &path)
                    .with_context(|| format!("loading {}", path.display()))?;
                info!("Loaded {} rules from {}", count, path.display());
            }
        }

        let deals = Arc::new(
            DealsStore::open(config.data_dir.join("deals.journal"))
                .context("opening deals store")?,
        );

        let pricing = Arc::new(PricingEngine::new(
            registry.clone(),
            rates.clone(),
            rules.clone(),
            config.quote_ttl_seconds,
            config.rule_tz_offset_minutes,
        ));
        let smart = Arc::new(SmartRouter::new(
            registry.clone(),
            rules.clone(),
            config.rule_tz_offset_minutes,
        ));
        let multi_rail = Arc::new(MultiRailRouter::new(
            registry.clone(),
            rates.clone(),
            smart.clone(),
            Some(deals.clone()),
        ));

        Ok(Self {
            config,
            registry,
            rates,
            rules,
            pricing,
            smart,
            multi_rail,
            deals,
        })
    }
}
