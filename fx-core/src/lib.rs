//! FX Engine Core
//!
//! Shared foundation for the cross-rail FX routing and pricing engine:
//!
//! 1. **Types**: currencies, rails, providers, tiers, segments and the
//!    digital-asset registries
//! 2. **Reference registry**: immutable snapshots with single-writer reload
//! 3. **Rate source**: treasury mid/bid/ask with caching, inverse and
//!    USD-cross derivation
//!
//! # Example
//!
//! ```no_run
//! use fx_core::{CurrencyPair, RateService, ReferenceRegistry, StaticRateSource};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> fx_core::Result<()> {
//!     let registry = ReferenceRegistry::builtin();
//!     let rates = RateService::new(Arc::new(StaticRateSource::new()), 2_000, 30);
//!
//!     let lookup = rates.get_rate(&CurrencyPair::new("USD", "INR")).await?;
//!     println!("USDINR mid {}", lookup.rate.mid);
//!     println!("{} providers", registry.snapshot().providers.len());
//!
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications, clippy::all)]

pub mod config;
pub mod error;
pub mod rates;
pub mod registry;
pub mod types;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use rates::{RateLookup, RateService, RateSource, StaticRateSource};
pub use registry::{ReferenceRegistry, Snapshot};
pub use types::*;
