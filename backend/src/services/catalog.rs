//! Product catalog management

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{
    normalize_name, normalize_optional, normalize_sku, normalize_unit, validate_unit_combination,
    PageRequest, Paginated, Product, UnitType,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::store::{LedgerStore, ProductFilter, StoreError};

/// Most products accepted by one JSON bulk request
pub const MAX_BULK_PRODUCTS: usize = 50;

/// Catalog service for managing products
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn LedgerStore>,
}

/// Input for creating a product
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProductInput {
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub unit_type: String,
    pub base_unit: String,
    pub default_supplier: Option<String>,
}

/// Input for updating a product; absent fields keep their value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProductInput {
    pub sku: Option<String>,
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub unit_type: Option<String>,
    pub base_unit: Option<String>,
    pub default_supplier: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetActiveInput {
    pub is_active: bool,
}

/// Query parameters for listing products
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub category: Option<String>,
}

/// Product counts for the analytics dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductSummary {
    pub total_products: u64,
    pub active_products: u64,
    pub inactive_products: u64,
}

/// Which of the requested SKUs the owner has
#[derive(Debug, Clone, Serialize)]
pub struct SkuCheck {
    pub searched_skus: Vec<String>,
    pub found: Vec<SkuMatch>,
    pub missing_skus: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkuMatch {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
}

/// Rows removed by a product deletion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletedProduct {
    pub id: Uuid,
    pub sales_deleted: u64,
    pub batches_deleted: u64,
}

fn parse_unit_type(value: &str) -> AppResult<UnitType> {
    value
        .parse()
        .map_err(|_| AppError::validation("unit_type", "Unit type must be 'weight' or 'count'"))
}

fn duplicate_sku(err: StoreError) -> AppError {
    match err {
        StoreError::UniqueViolation(_) => {
            AppError::conflict("sku", "A product with this SKU already exists")
        }
        other => other.into(),
    }
}

/// Validate and normalise a new product
pub(crate) fn build_product(owner: Uuid, input: &CreateProductInput) -> AppResult<Product> {
    let sku = normalize_sku(&input.sku).map_err(|msg| AppError::validation("sku", msg))?;
    let name = normalize_name(&input.name).map_err(|msg| AppError::validation("name", msg))?;
    let unit_type = parse_unit_type(&input.unit_type)?;
    let base_unit =
        normalize_unit(&input.base_unit).map_err(|msg| AppError::validation("base_unit", msg))?;
    validate_unit_combination(unit_type, &base_unit)
        .map_err(|msg| AppError::validation("base_unit", msg))?;

    Ok(Product {
        id: Uuid::new_v4(),
        owner_id: owner,
        sku,
        name,
        category: normalize_optional(input.category.as_deref()),
        description: normalize_optional(input.description.as_deref()),
        unit_type,
        base_unit,
        default_supplier: normalize_optional(input.default_supplier.as_deref()),
        is_active: true,
        created_at: Utc::now(),
    })
}

impl CatalogService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Create a product
    pub async fn create(&self, owner: Uuid, input: CreateProductInput) -> AppResult<Product> {
        let product = build_product(owner, &input)?;
        self.store
            .insert_product(&product)
            .await
            .map_err(duplicate_sku)?;

        tracing::info!(product_id = %product.id, sku = %product.sku, "Product created");
        Ok(product)
    }

    /// Create up to [`MAX_BULK_PRODUCTS`] products; all or none are stored
    pub async fn create_many(
        &self,
        owner: Uuid,
        inputs: Vec<CreateProductInput>,
    ) -> AppResult<Vec<Product>> {
        if inputs.is_empty() {
            return Err(AppError::ValidationError("No products supplied".into()));
        }
        if inputs.len() > MAX_BULK_PRODUCTS {
            return Err(AppError::ValidationError(format!(
                "At most {} products can be created at once",
                MAX_BULK_PRODUCTS
            )));
        }

        let products = inputs
            .iter()
            .enumerate()
            .map(|(i, input)| {
                build_product(owner, input).map_err(|err| match err {
                    AppError::Validation { field, message } => AppError::Validation {
                        field,
                        message: format!("Product {}: {}", i + 1, message),
                    },
                    other => other,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        self.insert_all(products).await
    }

    /// Insert already validated products in one atomic write
    pub(crate) async fn insert_all(&self, products: Vec<Product>) -> AppResult<Vec<Product>> {
        self.store.insert_products(&products).await.map_err(|err| match err {
            StoreError::UniqueViolation(_) => {
                AppError::conflict("sku", "One or more SKUs already exist")
            }
            other => other.into(),
        })?;

        tracing::info!(count = products.len(), "Products created in bulk");
        Ok(products)
    }

    pub async fn get(&self, owner: Uuid, id: Uuid) -> AppResult<Product> {
        self.store
            .get_product(owner, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Product".into()))
    }

    /// Apply the supplied fields and re-validate the whole product
    pub async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: UpdateProductInput,
    ) -> AppResult<Product> {
        let mut product = self.get(owner, id).await?;

        if let Some(sku) = &patch.sku {
            product.sku = normalize_sku(sku).map_err(|msg| AppError::validation("sku", msg))?;
        }
        if let Some(name) = &patch.name {
            product.name = normalize_name(name).map_err(|msg| AppError::validation("name", msg))?;
        }
        if let Some(unit_type) = &patch.unit_type {
            product.unit_type = parse_unit_type(unit_type)?;
        }
        if let Some(base_unit) = &patch.base_unit {
            product.base_unit =
                normalize_unit(base_unit).map_err(|msg| AppError::validation("base_unit", msg))?;
        }
        validate_unit_combination(product.unit_type, &product.base_unit)
            .map_err(|msg| AppError::validation("base_unit", msg))?;

        if patch.category.is_some() {
            product.category = normalize_optional(patch.category.as_deref());
        }
        if patch.description.is_some() {
            product.description = normalize_optional(patch.description.as_deref());
        }
        if patch.default_supplier.is_some() {
            product.default_supplier = normalize_optional(patch.default_supplier.as_deref());
        }
        if let Some(is_active) = patch.is_active {
            product.is_active = is_active;
        }

        let updated = self
            .store
            .update_product(&product)
            .await
            .map_err(duplicate_sku)?;
        if !updated {
            return Err(AppError::NotFound("Product".into()));
        }

        tracing::info!(product_id = %product.id, "Product updated");
        Ok(product)
    }

    pub async fn set_active(&self, owner: Uuid, id: Uuid, is_active: bool) -> AppResult<Product> {
        self.update(
            owner,
            id,
            UpdateProductInput {
                is_active: Some(is_active),
                ..Default::default()
            },
        )
        .await
    }

    /// Delete a product with its sales and batches, in that order
    pub async fn delete(&self, owner: Uuid, id: Uuid) -> AppResult<DeletedProduct> {
        self.get(owner, id).await?;

        let sales_deleted = self.store.delete_sales_for_product(owner, id).await?;
        let batches_deleted = self.store.delete_batches_for_product(owner, id).await?;
        let deleted = self.store.delete_product(owner, id).await?;

        if deleted == 0 {
            return Err(AppError::NotFound("Product".into()));
        }

        tracing::info!(
            product_id = %id,
            sales_deleted,
            batches_deleted,
            "Product deleted"
        );
        Ok(DeletedProduct {
            id,
            sales_deleted,
            batches_deleted,
        })
    }

    /// List products, newest first
    pub async fn list(&self, owner: Uuid, query: ProductQuery) -> AppResult<Paginated<Product>> {
        let page = PageRequest {
            page: query.page,
            limit: query.limit,
        };
        let filter = ProductFilter {
            search: normalize_optional(query.search.as_deref()),
            category: normalize_optional(query.category.as_deref()),
        };

        let (rows, total) = self.store.list_products(owner, &filter, &page).await?;
        Ok(Paginated::new(rows, &page, total))
    }

    /// Counts of products created within the range
    pub async fn summary(
        &self,
        owner: Uuid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> AppResult<ProductSummary> {
        let range = super::ledger::date_range(from, to)?;
        let counts = self.store.count_products(owner, &range).await?;
        Ok(ProductSummary {
            total_products: counts.total,
            active_products: counts.active,
            inactive_products: counts.total - counts.active,
        })
    }

    /// Report which SKUs match the owner's products
    pub async fn check_skus(&self, owner: Uuid, skus: &[String]) -> AppResult<SkuCheck> {
        let searched: Vec<String> = skus
            .iter()
            .filter_map(|s| normalize_sku(s).ok())
            .collect();
        let found = self.store.find_products_by_sku(owner, &searched).await?;

        let missing = searched
            .iter()
            .filter(|sku| !found.iter().any(|p| &p.sku == *sku))
            .cloned()
            .collect();

        Ok(SkuCheck {
            searched_skus: searched,
            found: found
                .into_iter()
                .map(|p| SkuMatch {
                    id: p.id,
                    sku: p.sku,
                    name: p.name,
                })
                .collect(),
            missing_skus: missing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(sku: &str, unit_type: &str, base_unit: &str) -> CreateProductInput {
        CreateProductInput {
            sku: sku.into(),
            name: "  Green Tea ".into(),
            category: Some("".into()),
            description: None,
            unit_type: unit_type.into(),
            base_unit: base_unit.into(),
            default_supplier: Some(" Acme ".into()),
        }
    }

    #[test]
    fn test_build_product_normalises() {
        let product = build_product(Uuid::new_v4(), &input(" gt-01 ", "weight", " KG ")).unwrap();
        assert_eq!(product.sku, "GT-01");
        assert_eq!(product.name, "Green Tea");
        assert_eq!(product.base_unit, "kg");
        assert_eq!(product.category, None);
        assert_eq!(product.default_supplier.as_deref(), Some("Acme"));
        assert!(product.is_active);
    }

    #[test]
    fn test_build_product_rejects_bad_unit_type() {
        let err = build_product(Uuid::new_v4(), &input("A", "volume", "kg")).unwrap_err();
        assert!(matches!(err, AppError::Validation { field, .. } if field == "unit_type"));
    }

    #[test]
    fn test_build_product_rejects_unit_mismatch() {
        let err = build_product(Uuid::new_v4(), &input("A", "count", "kg")).unwrap_err();
        assert!(matches!(err, AppError::Validation { field, .. } if field == "base_unit"));
    }

    #[test]
    fn test_build_product_requires_sku() {
        assert!(build_product(Uuid::new_v4(), &input("  ", "count", "box")).is_err());
    }
}
