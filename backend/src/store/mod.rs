//! Ledger storage
//!
//! Every read and write the services make goes through [`LedgerStore`]. The
//! store offers per-row atomic writes but no multi-row transaction across
//! calls, so the ledger compensates manually where two writes must agree.

mod memory;
mod postgres;

pub use memory::{Fault, MemoryStore};
pub use postgres::PgLedgerStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{BatchStatus, DateRange, PageRequest, Product, Sale, StockBatch, StockLevel};
use thiserror::Error;
use uuid::Uuid;

/// Storage failures, classified for the services
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("malformed row: {0}")]
    MalformedRow(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            let constraint = db.constraint().unwrap_or_default().to_string();
            match db.code().as_deref() {
                Some("23505") => return StoreError::UniqueViolation(constraint),
                Some("23503") => return StoreError::ForeignKeyViolation(constraint),
                _ => {}
            }
        }
        StoreError::Database(err)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Product list filters
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Case-insensitive substring over name, SKU and category
    pub search: Option<String>,
    pub category: Option<String>,
}

/// Batch list filters; `status: None` lists every status
#[derive(Debug, Clone, Default)]
pub struct BatchFilter {
    pub product_id: Option<Uuid>,
    pub status: Option<BatchStatus>,
    pub range: DateRange,
}

#[derive(Debug, Clone, Default)]
pub struct SaleFilter {
    pub product_id: Option<Uuid>,
    pub range: DateRange,
}

/// A sale joined with its product's labels and its batch's cost
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct SaleLine {
    pub sale_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub sku: String,
    pub category: Option<String>,
    pub boxes_sold: i32,
    pub selling_price_per_box: Decimal,
    pub cost_per_box: Decimal,
    pub created_at: DateTime<Utc>,
}

/// An active batch with its product's labels
#[derive(Debug, Clone, PartialEq)]
pub struct BatchLine {
    pub batch: StockBatch,
    pub product_name: String,
    pub sku: String,
    pub category: Option<String>,
}

/// Product counts by lifecycle state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProductCounts {
    pub total: u64,
    pub active: u64,
}

/// Owner-scoped persistence for products, batches and sales.
///
/// Every method that takes an `owner` filters by it; rows of other owners are
/// reported as absent.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Round-trip to the backing store
    async fn ping(&self) -> StoreResult<()>;

    // Products
    async fn insert_product(&self, product: &Product) -> StoreResult<()>;
    /// All rows or none
    async fn insert_products(&self, products: &[Product]) -> StoreResult<()>;
    async fn get_product(&self, owner: Uuid, id: Uuid) -> StoreResult<Option<Product>>;
    /// Overwrites the editable columns; returns false when no row matched
    async fn update_product(&self, product: &Product) -> StoreResult<bool>;
    async fn delete_product(&self, owner: Uuid, id: Uuid) -> StoreResult<u64>;
    async fn list_products(
        &self,
        owner: Uuid,
        filter: &ProductFilter,
        page: &PageRequest,
    ) -> StoreResult<(Vec<Product>, u64)>;
    async fn find_products_by_sku(&self, owner: Uuid, skus: &[String]) -> StoreResult<Vec<Product>>;
    async fn count_products(&self, owner: Uuid, range: &DateRange) -> StoreResult<ProductCounts>;

    // Stock batches
    async fn insert_batch(&self, batch: &StockBatch) -> StoreResult<()>;
    /// All rows or none
    async fn insert_batches(&self, batches: &[StockBatch]) -> StoreResult<()>;
    async fn get_batch(&self, owner: Uuid, id: Uuid) -> StoreResult<Option<StockBatch>>;
    /// Writes `level` only if the row still holds `expected_remaining` boxes.
    /// Returns the number of rows changed (0 or 1).
    async fn update_batch_stock(
        &self,
        owner: Uuid,
        id: Uuid,
        expected_remaining: i32,
        level: &StockLevel,
    ) -> StoreResult<u64>;
    async fn list_batches(
        &self,
        owner: Uuid,
        filter: &BatchFilter,
        page: &PageRequest,
    ) -> StoreResult<(Vec<StockBatch>, u64)>;
    /// Active batches with stock left, newest first
    async fn active_batches(&self, owner: Uuid) -> StoreResult<Vec<BatchLine>>;
    async fn delete_batches_for_product(&self, owner: Uuid, product_id: Uuid) -> StoreResult<u64>;

    // Sales
    async fn insert_sale(&self, sale: &Sale) -> StoreResult<()>;
    async fn delete_sale(&self, owner: Uuid, id: Uuid) -> StoreResult<u64>;
    async fn list_sales(
        &self,
        owner: Uuid,
        filter: &SaleFilter,
        page: &PageRequest,
    ) -> StoreResult<(Vec<Sale>, u64)>;
    /// Sales in the range joined with product labels and batch cost
    async fn sale_lines(&self, owner: Uuid, range: &DateRange) -> StoreResult<Vec<SaleLine>>;
    async fn delete_sales_for_product(&self, owner: Uuid, product_id: Uuid) -> StoreResult<u64>;
}
