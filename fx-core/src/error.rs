//! Error types for the core registry and rate source

use thiserror::Error;

/// Result type for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core errors
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or out-of-range input
    #[error("Validation error: {0}")]
    Validation(String),

    /// No rate available in snapshot or cache for the pair
    #[error("Rate unavailable for {pair}: {reason}")]
    RateUnavailable { pair: String, reason: String },

    /// Duplicate primary key or deletion of an in-use entry
    #[error("Reference data conflict: {0}")]
    ReferenceDataConflict(String),

    /// Unknown reference entry
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
