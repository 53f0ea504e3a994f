//! WebAssembly module for ProfitBox
//!
//! Lets the browser forms preview what the server will compute:
//! - Alert status of a batch for given thresholds
//! - Revenue, cost, profit and margin of a sale
//! - SKU normalisation and product unit rules
//! - Stock level after a sale

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    web_sys::console::debug_1(&JsValue::from_str("ProfitBox preview module loaded"));
}

/// Money figures for one prospective sale
#[derive(Debug, Serialize, PartialEq)]
pub struct SalePreview {
    pub revenue: Decimal,
    pub cost: Decimal,
    pub profit: Decimal,
    pub margin_percent: Decimal,
}

fn parse_money(field: &str, value: &str) -> Result<Decimal, String> {
    let amount = Decimal::from_str(value.trim())
        .map_err(|_| format!("{} must be a number", field))?;
    validate_positive_amount(amount).map_err(|msg| format!("{}: {}", field, msg))?;
    Ok(amount)
}

fn sale_preview(
    boxes_sold: i32,
    selling_price_per_box: &str,
    cost_per_box: &str,
) -> Result<SalePreview, String> {
    validate_positive_boxes(boxes_sold).map_err(|msg| format!("boxes_sold: {}", msg))?;
    let price = parse_money("selling_price_per_box", selling_price_per_box)?;
    let cost_per_box = parse_money("cost_per_box", cost_per_box)?;

    let boxes = Decimal::from(boxes_sold);
    let revenue = boxes * price;
    let cost = boxes * cost_per_box;
    let profit = revenue - cost;

    Ok(SalePreview {
        revenue,
        cost,
        profit,
        margin_percent: margin_percent(profit, revenue),
    })
}

fn stock_after_sale(
    boxes_remaining: i32,
    reorder_level: i32,
    critical_level: i32,
    boxes_sold: i32,
) -> Result<StockLevel, String> {
    validate_positive_boxes(boxes_sold).map_err(|msg| format!("boxes_sold: {}", msg))?;
    if boxes_sold > boxes_remaining {
        return Err(format!(
            "Insufficient stock. Available: {}, Requested: {}",
            boxes_remaining, boxes_sold
        ));
    }
    Ok(StockLevel::derive(
        boxes_remaining - boxes_sold,
        reorder_level,
        critical_level,
    ))
}

fn unit_error(unit_type: &str, base_unit: &str) -> Option<String> {
    let unit_type = match UnitType::from_str(unit_type.trim()) {
        Ok(unit_type) => unit_type,
        Err(_) => return Some("Unit type must be 'weight' or 'count'".to_string()),
    };
    let base_unit = match normalize_unit(base_unit) {
        Ok(unit) => unit,
        Err(msg) => return Some(msg.to_string()),
    };
    validate_unit_combination(unit_type, &base_unit)
        .err()
        .map(str::to_string)
}

fn to_js<T: Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Alert status (`healthy`, `warning` or `critical`) for a remaining count
#[wasm_bindgen]
pub fn preview_alert_status(boxes_remaining: i32, reorder_level: i32, critical_level: i32) -> String {
    derive_alert_status(boxes_remaining, reorder_level, critical_level)
        .as_str()
        .to_string()
}

/// Sale figures as JSON; prices are decimal strings to avoid float rounding
#[wasm_bindgen]
pub fn preview_sale_profit(
    boxes_sold: i32,
    selling_price_per_box: &str,
    cost_per_box: &str,
) -> Result<String, JsValue> {
    let preview = sale_preview(boxes_sold, selling_price_per_box, cost_per_box)
        .map_err(|msg| JsValue::from_str(&msg))?;
    to_js(&preview)
}

/// Batch stock level after selling `boxes_sold`, as JSON
#[wasm_bindgen]
pub fn preview_stock_after_sale(
    boxes_remaining: i32,
    reorder_level: i32,
    critical_level: i32,
    boxes_sold: i32,
) -> Result<String, JsValue> {
    let level = stock_after_sale(boxes_remaining, reorder_level, critical_level, boxes_sold)
        .map_err(|msg| JsValue::from_str(&msg))?;
    to_js(&level)
}

/// SKU as the server will store it, or `None` when blank
#[wasm_bindgen]
pub fn preview_sku(sku: &str) -> Option<String> {
    normalize_sku(sku).ok()
}

/// Why a unit type and base unit cannot be combined, if they cannot
#[wasm_bindgen]
pub fn check_unit_combination(unit_type: &str, base_unit: &str) -> Option<String> {
    unit_error(unit_type, base_unit)
}

/// Whether reorder and critical thresholds are acceptable together
#[wasm_bindgen]
pub fn validate_stock_levels(reorder_level: i32, critical_level: i32) -> bool {
    validate_thresholds(reorder_level, critical_level).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_alert_status() {
        assert_eq!(preview_alert_status(10, 5, 2), "healthy");
        assert_eq!(preview_alert_status(5, 5, 2), "warning");
        assert_eq!(preview_alert_status(2, 5, 2), "critical");
        assert_eq!(preview_alert_status(0, 0, 0), "critical");
    }

    #[test]
    fn test_sale_preview() {
        let preview = sale_preview(3, "150", "100").unwrap();
        assert_eq!(preview.revenue, Decimal::from(450));
        assert_eq!(preview.cost, Decimal::from(300));
        assert_eq!(preview.profit, Decimal::from(150));
        assert_eq!(preview.margin_percent, Decimal::new(3333, 2));
    }

    #[test]
    fn test_sale_preview_rejects_bad_input() {
        assert!(sale_preview(0, "150", "100").is_err());
        assert!(sale_preview(1, "abc", "100").is_err());
        assert!(sale_preview(1, "150", "-1").is_err());
    }

    #[test]
    fn test_stock_after_sale() {
        let level = stock_after_sale(4, 5, 2, 4).unwrap();
        assert_eq!(level.boxes_remaining, 0);
        assert_eq!(level.status, BatchStatus::Depleted);
        assert_eq!(level.alert_status, AlertStatus::Critical);

        assert!(stock_after_sale(4, 5, 2, 5).is_err());
    }

    #[test]
    fn test_preview_sku() {
        assert_eq!(preview_sku(" ab-1 "), Some("AB-1".to_string()));
        assert_eq!(preview_sku("  "), None);
    }

    #[test]
    fn test_unit_combination() {
        assert_eq!(check_unit_combination("weight", " KG "), None);
        assert!(check_unit_combination("count", "kg").is_some());
        assert!(check_unit_combination("volume", "liter").is_some());
    }

    #[test]
    fn test_stock_levels() {
        assert!(validate_stock_levels(5, 2));
        assert!(!validate_stock_levels(2, 5));
    }
}
