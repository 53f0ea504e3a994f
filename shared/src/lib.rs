//! Shared types and models for ProfitBox
//!
//! This crate contains the domain records, stock rules and input validation
//! shared between the backend and the browser (via WASM).

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
