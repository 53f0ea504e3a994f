//! Domain models for ProfitBox

mod product;
mod sale;
mod stock_batch;

pub use product::*;
pub use sale::*;
pub use stock_batch::*;

use thiserror::Error;

/// Returned when a stored or submitted string names no known variant
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
