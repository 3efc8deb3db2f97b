//! Deals Service
//!
//! Treasury deals are pre-negotiated rate commitments with a validity
//! window and a utilisation balance. This crate owns their state machine,
//! the write-ahead durable journal, and the best-rate arbitration between
//! an active deal and the live treasury rate.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications, clippy::all)]

pub mod best_rate;
pub mod error;
pub mod store;
pub mod types;

// Re-exports
pub use best_rate::{BestRateResult, BestRateSource};
pub use error::{Error, Result};
pub use store::DealsStore;
pub use types::{AuditEntry, Deal, DealStatus, NewDeal, UtilisationEntry};
