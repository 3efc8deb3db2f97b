//! Error types for the rules engine

use thiserror::Error;

/// Result type for rules operations
pub type Result<T> = std::result::Result<T, Error>;

/// Rules errors
#[derive(Error, Debug)]
pub enum Error {
    /// Rule document failed to parse; unknown action tags land here
    #[error("Rule load error: {0}")]
    Load(String),

    /// Duplicate rule id
    #[error("Rule conflict: {0}")]
    Conflict(String),

    /// Unknown rule id
    #[error("Rule not found: {0}")]
    NotFound(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
