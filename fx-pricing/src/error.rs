//! Error types for the pricing engine

use thiserror::Error;

/// Result type for pricing operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pricing errors
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or out-of-range input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Core registry or rate error
    #[error(transparent)]
    Core(#[from] fx_core::Error),
}
