//! Error types for the deals service

use crate::types::DealStatus;
use rust_decimal::Decimal;
use thiserror::Error;

/// Result type for deal operations
pub type Result<T> = std::result::Result<T, Error>;

/// Deal errors
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or out-of-range input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown deal id
    #[error("Deal not found: {0}")]
    NotFound(String),

    /// Illegal state transition
    #[error("Deal {deal_id} is {current:?}, cannot {attempted}")]
    StateConflict {
        deal_id: String,
        current: DealStatus,
        attempted: String,
    },

    /// Utilisation exceeds the remaining balance
    #[error("Deal {deal_id}: requested {requested} exceeds remaining {remaining}")]
    InsufficientBalance {
        deal_id: String,
        requested: Decimal,
        remaining: Decimal,
    },

    /// Durable write failed; the in-memory state was not changed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
