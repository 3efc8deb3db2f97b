//! Routing Engines
//!
//! Two layers share one scoring model:
//!
//! 1. **Smart router** (fiat): filters and ranks providers for a fiat pair
//!    under an objective weight vector, with rule-injected preferences
//! 2. **Multi-rail router**: materialises the conversion catalogue across
//!    fiat, CBDC and stablecoin rails and ranks the concrete routes
//!
//! Both are advisory: no settlement is executed.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications, clippy::all)]

pub mod catalogue;
pub mod error;
pub mod multi_rail;
pub mod smart;
pub mod types;

// Re-exports
pub use catalogue::{templates_for, RouteTemplate, CATALOGUE};
pub use error::{Error, Result};
pub use multi_rail::MultiRailRouter;
pub use smart::SmartRouter;
pub use types::*;
