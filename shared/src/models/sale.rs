//! Sale records

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A sale of boxes from exactly one batch
///
/// Revenue is derived from the sale itself. Cost is derived from the batch's
/// `cost_per_box`, which is read from the batch rather than copied here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub product_id: Uuid,
    pub batch_id: Uuid,
    pub boxes_sold: i32,
    pub selling_price_per_box: Decimal,
    pub customer_name: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Sale {
    /// `None` when the product overflows
    pub fn revenue(&self) -> Option<Decimal> {
        Decimal::from(self.boxes_sold).checked_mul(self.selling_price_per_box)
    }

    pub fn cost(&self, cost_per_box: Decimal) -> Option<Decimal> {
        Decimal::from(self.boxes_sold).checked_mul(cost_per_box)
    }

    pub fn profit(&self, cost_per_box: Decimal) -> Option<Decimal> {
        self.revenue()?.checked_sub(self.cost(cost_per_box)?)
    }
}

/// Margin as a percentage of revenue, rounded to two places; zero when there
/// is no revenue.
pub fn margin_percent(profit: Decimal, revenue: Decimal) -> Decimal {
    if revenue.is_zero() {
        return Decimal::ZERO;
    }
    profit
        .checked_div(revenue)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map_or(Decimal::MIN, |pct| pct.round_dp(2))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sale(boxes: i32, price: i64) -> Sale {
        Sale {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            batch_id: Uuid::new_v4(),
            boxes_sold: boxes,
            selling_price_per_box: Decimal::from(price),
            customer_name: None,
            notes: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_sale_money() {
        let s = sale(3, 150);
        assert_eq!(s.revenue(), Some(Decimal::from(450)));
        assert_eq!(s.cost(Decimal::from(100)), Some(Decimal::from(300)));
        assert_eq!(s.profit(Decimal::from(100)), Some(Decimal::from(150)));
    }

    #[test]
    fn test_sale_money_overflow() {
        let mut s = sale(2, 1);
        s.selling_price_per_box = Decimal::MAX;
        assert_eq!(s.revenue(), None);
        assert_eq!(s.profit(Decimal::ONE), None);
        assert_eq!(sale(2, 10).cost(Decimal::MAX), None);
    }

    #[test]
    fn test_margin_percent() {
        assert_eq!(
            margin_percent(Decimal::from(150), Decimal::from(450)),
            Decimal::new(3333, 2)
        );
        assert_eq!(margin_percent(Decimal::from(10), Decimal::ZERO), Decimal::ZERO);
    }
}
