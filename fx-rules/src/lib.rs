//! Rules Engine
//!
//! JSON-declared condition/action rules that inject provider preferences
//! into routing and margin overrides into pricing. Rule sets reload under a
//! single-writer atomic swap; evaluation is deterministic per snapshot and
//! malformed rules are isolated per request.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications, clippy::all)]

pub mod engine;
pub mod error;
pub mod types;

// Re-exports
pub use engine::{RuleSet, RulesEngine};
pub use error::{Error, Result};
pub use types::*;
