//! FX Gateway
//!
//! Actix-web surface for the cross-rail FX engine: routing, multi-rail
//! synthesis, pricing, deals and rules under `/api/v1/fx/`.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications, clippy::all)]

pub mod errors;
pub mod handlers;
pub mod models;
pub mod state;

pub use state::AppState;
