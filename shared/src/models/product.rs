//! Product catalog models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::UnknownVariant;

/// A catalog product owned by a single business owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub owner_id: Uuid,
    /// Trimmed, upper-cased; unique per owner
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub unit_type: UnitType,
    /// Lower-cased unit the product is measured in
    pub base_unit: String,
    pub default_supplier: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// How a product's quantity is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitType {
    Weight,
    Count,
}

/// Units accepted for weight-measured products
pub const WEIGHT_UNITS: &[&str] = &["kg", "g", "lb", "oz", "liter"];

/// Units accepted for count-measured products
pub const COUNT_UNITS: &[&str] = &[
    "box", "packet", "piece", "bottle", "can", "carton", "dozen", "bag",
];

impl UnitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitType::Weight => "weight",
            UnitType::Count => "count",
        }
    }

    /// Base units that may be paired with this unit type
    pub fn allowed_units(&self) -> &'static [&'static str] {
        match self {
            UnitType::Weight => WEIGHT_UNITS,
            UnitType::Count => COUNT_UNITS,
        }
    }

    pub fn accepts(&self, base_unit: &str) -> bool {
        self.allowed_units().contains(&base_unit)
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "weight" => Ok(UnitType::Weight),
            "count" => Ok(UnitType::Count),
            _ => Err(UnknownVariant::new("unit type", s)),
        }
    }
}
