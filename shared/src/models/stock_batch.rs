//! Stock batch models and the stock-level rules every batch obeys
//!
//! A batch is a purchased lot of boxes. Its remaining count only ever goes
//! down (through sales); `status` and `alert_status` are derived from it and
//! never set independently.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::UnknownVariant;

/// A purchased lot of a product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockBatch {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub product_id: Uuid,
    pub batch_number: Option<String>,
    pub boxes_purchased: i32,
    pub boxes_remaining: i32,
    pub quantity_per_box: Decimal,
    pub unit_per_box: String,
    pub cost_per_box: Decimal,
    pub supplier_name: Option<String>,
    pub reorder_level: i32,
    pub critical_level: i32,
    pub alert_status: AlertStatus,
    pub status: BatchStatus,
    pub created_at: DateTime<Utc>,
}

/// Health of a batch's remaining stock against its thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Healthy,
    Warning,
    Critical,
}

/// Lifecycle of a batch: active until every box is sold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Active,
    Depleted,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Healthy => "healthy",
            AlertStatus::Warning => "warning",
            AlertStatus::Critical => "critical",
        }
    }
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Active => "active",
            BatchStatus::Depleted => "depleted",
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "healthy" => Ok(AlertStatus::Healthy),
            "warning" => Ok(AlertStatus::Warning),
            "critical" => Ok(AlertStatus::Critical),
            _ => Err(UnknownVariant::new("alert status", s)),
        }
    }
}

impl FromStr for BatchStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(BatchStatus::Active),
            "depleted" => Ok(BatchStatus::Depleted),
            _ => Err(UnknownVariant::new("batch status", s)),
        }
    }
}

/// Derive the alert status from remaining boxes and the batch thresholds.
///
/// Critical wins over warning, so a batch at or below `critical_level` is
/// critical even though it is also at or below `reorder_level`.
pub fn derive_alert_status(remaining: i32, reorder_level: i32, critical_level: i32) -> AlertStatus {
    if remaining <= critical_level {
        AlertStatus::Critical
    } else if remaining <= reorder_level {
        AlertStatus::Warning
    } else {
        AlertStatus::Healthy
    }
}

/// A batch is depleted exactly when nothing remains
pub fn derive_batch_status(remaining: i32) -> BatchStatus {
    if remaining == 0 {
        BatchStatus::Depleted
    } else {
        BatchStatus::Active
    }
}

/// Remaining boxes together with the statuses derived from them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockLevel {
    pub boxes_remaining: i32,
    pub alert_status: AlertStatus,
    pub status: BatchStatus,
}

impl StockLevel {
    pub fn derive(remaining: i32, reorder_level: i32, critical_level: i32) -> Self {
        Self {
            boxes_remaining: remaining,
            alert_status: derive_alert_status(remaining, reorder_level, critical_level),
            status: derive_batch_status(remaining),
        }
    }
}

impl StockBatch {
    /// Current remaining count and derived statuses
    pub fn level(&self) -> StockLevel {
        StockLevel {
            boxes_remaining: self.boxes_remaining,
            alert_status: self.alert_status,
            status: self.status,
        }
    }

    /// Stock level after selling `boxes_sold`, or `None` if the batch cannot
    /// cover the sale.
    pub fn level_after_sale(&self, boxes_sold: i32) -> Option<StockLevel> {
        if boxes_sold <= 0 || boxes_sold > self.boxes_remaining {
            return None;
        }
        let remaining = self.boxes_remaining - boxes_sold;
        Some(StockLevel::derive(
            remaining,
            self.reorder_level,
            self.critical_level,
        ))
    }

    /// Value of the stock still on hand
    pub fn remaining_value(&self) -> Decimal {
        Decimal::from(self.boxes_remaining).saturating_mul(self.cost_per_box)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn batch(remaining: i32, reorder: i32, critical: i32) -> StockBatch {
        StockBatch {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            batch_number: None,
            boxes_purchased: remaining.max(1),
            boxes_remaining: remaining,
            quantity_per_box: Decimal::ONE,
            unit_per_box: "kg".to_string(),
            cost_per_box: Decimal::from(100),
            supplier_name: None,
            reorder_level: reorder,
            critical_level: critical,
            alert_status: derive_alert_status(remaining, reorder, critical),
            status: derive_batch_status(remaining),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_alert_status_boundaries() {
        assert_eq!(derive_alert_status(7, 5, 2), AlertStatus::Healthy);
        assert_eq!(derive_alert_status(5, 5, 2), AlertStatus::Warning);
        assert_eq!(derive_alert_status(3, 5, 2), AlertStatus::Warning);
        assert_eq!(derive_alert_status(2, 5, 2), AlertStatus::Critical);
        assert_eq!(derive_alert_status(0, 5, 2), AlertStatus::Critical);
    }

    #[test]
    fn test_zero_thresholds() {
        assert_eq!(derive_alert_status(1, 0, 0), AlertStatus::Healthy);
        assert_eq!(derive_alert_status(0, 0, 0), AlertStatus::Critical);
    }

    #[test]
    fn test_batch_status() {
        assert_eq!(derive_batch_status(0), BatchStatus::Depleted);
        assert_eq!(derive_batch_status(1), BatchStatus::Active);
    }

    #[test]
    fn test_level_after_sale() {
        let b = batch(10, 5, 2);
        let level = b.level_after_sale(3).unwrap();
        assert_eq!(level.boxes_remaining, 7);
        assert_eq!(level.alert_status, AlertStatus::Healthy);
        assert_eq!(level.status, BatchStatus::Active);

        let level = b.level_after_sale(10).unwrap();
        assert_eq!(level.boxes_remaining, 0);
        assert_eq!(level.status, BatchStatus::Depleted);
        assert_eq!(level.alert_status, AlertStatus::Critical);

        assert!(b.level_after_sale(11).is_none());
        assert!(b.level_after_sale(0).is_none());
    }

    #[test]
    fn test_status_round_trip_strings() {
        for s in [AlertStatus::Healthy, AlertStatus::Warning, AlertStatus::Critical] {
            assert_eq!(s.as_str().parse::<AlertStatus>(), Ok(s));
        }
        assert!("low".parse::<AlertStatus>().is_err());
        assert!("archived".parse::<BatchStatus>().is_err());
    }

    proptest! {
        #[test]
        fn prop_alert_status_matches_thresholds(
            critical in 0i32..50,
            gap in 0i32..50,
            remaining in 0i32..200,
        ) {
            let reorder = critical + gap;
            let status = derive_alert_status(remaining, reorder, critical);
            prop_assert_eq!(status == AlertStatus::Critical, remaining <= critical);
            prop_assert_eq!(
                status == AlertStatus::Warning,
                critical < remaining && remaining <= reorder
            );
            prop_assert_eq!(status == AlertStatus::Healthy, remaining > reorder);
        }

        #[test]
        fn prop_sale_never_goes_negative(remaining in 0i32..100, sold in 1i32..150) {
            let b = batch(remaining, 5, 2);
            match b.level_after_sale(sold) {
                Some(level) => {
                    prop_assert!(sold <= remaining);
                    prop_assert_eq!(level.boxes_remaining, remaining - sold);
                    prop_assert_eq!(level.status == BatchStatus::Depleted, level.boxes_remaining == 0);
                }
                None => prop_assert!(sold > remaining),
            }
        }
    }
}
