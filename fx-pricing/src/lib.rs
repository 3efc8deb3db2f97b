//! Pricing Engine
//!
//! Composes the customer rate from treasury mid, segment base margin,
//! amount-tier adjustment, currency-category factor and negotiated
//! discount, then issues firm quotes with an expiry. Pricing runs
//! independently of provider selection.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications, clippy::all)]

pub mod engine;
pub mod error;
pub mod types;

// Re-exports
pub use engine::PricingEngine;
pub use error::{Error, Result};
pub use types::{MarginBreakdown, PriceRequest, Quote, RateType};
