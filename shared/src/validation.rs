//! Validation and normalisation of catalog and ledger input
//!
//! Each function returns the normalised value (or `()`) on success and a short
//! message on failure. The backend attaches the field name.

use rust_decimal::Decimal;

use crate::models::UnitType;

// ============================================================================
// Catalog
// ============================================================================

/// Trim and upper-case a SKU
pub fn normalize_sku(sku: &str) -> Result<String, &'static str> {
    let sku = sku.trim();
    if sku.is_empty() {
        return Err("SKU is required");
    }
    Ok(sku.to_uppercase())
}

/// Trim a required display name
pub fn normalize_name(name: &str) -> Result<String, &'static str> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Name is required");
    }
    Ok(name.to_string())
}

/// Trim and lower-case a unit such as a product's base unit
pub fn normalize_unit(unit: &str) -> Result<String, &'static str> {
    let unit = unit.trim();
    if unit.is_empty() {
        return Err("Unit is required");
    }
    Ok(unit.to_lowercase())
}

/// Check that a normalised base unit belongs to the unit type
pub fn validate_unit_combination(unit_type: UnitType, base_unit: &str) -> Result<(), &'static str> {
    if unit_type.accepts(base_unit) {
        Ok(())
    } else {
        match unit_type {
            UnitType::Weight => Err("Weight products must use one of: kg, g, lb, oz, liter"),
            UnitType::Count => Err(
                "Count products must use one of: box, packet, piece, bottle, can, carton, dozen, bag",
            ),
        }
    }
}

/// Empty or whitespace-only optional text becomes `None`
pub fn normalize_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// ============================================================================
// Ledger
// ============================================================================

pub fn validate_positive_boxes(boxes: i32) -> Result<(), &'static str> {
    if boxes <= 0 {
        return Err("Must be a positive whole number of boxes");
    }
    Ok(())
}

/// Largest accepted price, cost or quantity per box
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

pub fn validate_positive_amount(amount: Decimal) -> Result<(), &'static str> {
    if amount <= Decimal::ZERO {
        return Err("Must be greater than zero");
    }
    if amount > MAX_AMOUNT {
        return Err("Must not exceed 1000000000");
    }
    Ok(())
}

/// Both thresholds are non-negative and critical never exceeds reorder
pub fn validate_thresholds(reorder_level: i32, critical_level: i32) -> Result<(), &'static str> {
    if reorder_level < 0 || critical_level < 0 {
        return Err("Stock levels cannot be negative");
    }
    if critical_level > reorder_level {
        return Err("Critical level cannot exceed reorder level");
    }
    Ok(())
}

/// Imported remaining count must lie within `0..=boxes_purchased`
pub fn validate_remaining(boxes_remaining: i32, boxes_purchased: i32) -> Result<(), &'static str> {
    if boxes_remaining < 0 {
        return Err("Boxes remaining cannot be negative");
    }
    if boxes_remaining > boxes_purchased {
        return Err("Boxes remaining cannot exceed boxes purchased");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_sku() {
        assert_eq!(normalize_sku("  abc-01 ").unwrap(), "ABC-01");
        assert!(normalize_sku("   ").is_err());
    }

    #[test]
    fn test_normalize_unit() {
        assert_eq!(normalize_unit(" KG ").unwrap(), "kg");
        assert!(normalize_unit("").is_err());
    }

    #[test]
    fn test_unit_combination() {
        assert!(validate_unit_combination(UnitType::Weight, "kg").is_ok());
        assert!(validate_unit_combination(UnitType::Count, "carton").is_ok());
        assert!(validate_unit_combination(UnitType::Weight, "box").is_err());
        assert!(validate_unit_combination(UnitType::Count, "oz").is_err());
    }

    #[test]
    fn test_normalize_optional() {
        assert_eq!(normalize_optional(Some("  Acme ")), Some("Acme".to_string()));
        assert_eq!(normalize_optional(Some("   ")), None);
        assert_eq!(normalize_optional(None), None);
    }

    #[test]
    fn test_thresholds() {
        assert!(validate_thresholds(5, 2).is_ok());
        assert!(validate_thresholds(0, 0).is_ok());
        assert!(validate_thresholds(2, 5).is_err());
        assert!(validate_thresholds(-1, 0).is_err());
    }

    #[test]
    fn test_positive_values() {
        assert!(validate_positive_boxes(1).is_ok());
        assert!(validate_positive_boxes(0).is_err());
        assert!(validate_positive_amount(Decimal::new(1, 2)).is_ok());
        assert!(validate_positive_amount(Decimal::ZERO).is_err());
        assert!(validate_positive_amount(MAX_AMOUNT).is_ok());
        assert!(validate_positive_amount(MAX_AMOUNT + Decimal::ONE).is_err());
        assert!(validate_positive_amount(Decimal::MAX).is_err());
    }

    #[test]
    fn test_remaining() {
        assert!(validate_remaining(0, 10).is_ok());
        assert!(validate_remaining(10, 10).is_ok());
        assert!(validate_remaining(11, 10).is_err());
        assert!(validate_remaining(-1, 10).is_err());
    }
}
