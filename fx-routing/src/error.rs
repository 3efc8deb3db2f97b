//! Error types for the routing engines

use crate::types::Exclusion;
use thiserror::Error;

/// Result type for routing operations
pub type Result<T> = std::result::Result<T, Error>;

/// Routing errors
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or out-of-range input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Every candidate was excluded; the diagnostics say why
    #[error("No eligible provider for {pair} ({} candidates excluded)", exclusions.len())]
    NoEligibleProvider {
        pair: String,
        exclusions: Vec<Exclusion>,
    },

    /// No route template materialised for the rail pair
    #[error("No route from {source_currency} to {target}")]
    NoRoute { source_currency: String, target: String },

    /// Core registry or rate error
    #[error(transparent)]
    Core(#[from] fx_core::Error),
}
