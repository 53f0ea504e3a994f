//! PostgreSQL-backed ledger store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::{
    BatchStatus, DateRange, PageRequest, Product, Sale, StockBatch, StockLevel, UnknownVariant,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{
    BatchFilter, BatchLine, LedgerStore, ProductCounts, ProductFilter, SaleFilter, SaleLine,
    StoreError, StoreResult,
};

/// Ledger store over a PostgreSQL pool
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ============================================================================
// Row decoding
// ============================================================================

#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    owner_id: Uuid,
    sku: String,
    name: String,
    category: Option<String>,
    description: Option<String>,
    unit_type: String,
    base_unit: String,
    default_supplier: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct BatchRow {
    id: Uuid,
    owner_id: Uuid,
    product_id: Uuid,
    batch_number: Option<String>,
    boxes_purchased: i32,
    boxes_remaining: i32,
    quantity_per_box: Decimal,
    unit_per_box: String,
    cost_per_box: Decimal,
    supplier_name: Option<String>,
    reorder_level: i32,
    critical_level: i32,
    alert_status: String,
    status: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct BatchLineRow {
    #[sqlx(flatten)]
    batch: BatchRow,
    product_name: String,
    sku: String,
    category: Option<String>,
}

#[derive(Debug, FromRow)]
struct SaleRow {
    id: Uuid,
    owner_id: Uuid,
    product_id: Uuid,
    batch_id: Uuid,
    boxes_sold: i32,
    selling_price_per_box: Decimal,
    customer_name: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<UnknownVariant> for StoreError {
    fn from(err: UnknownVariant) -> Self {
        StoreError::MalformedRow(err.to_string())
    }
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Product {
            id: row.id,
            owner_id: row.owner_id,
            sku: row.sku,
            name: row.name,
            category: row.category,
            description: row.description,
            unit_type: row.unit_type.parse()?,
            base_unit: row.base_unit,
            default_supplier: row.default_supplier,
            is_active: row.is_active,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<BatchRow> for StockBatch {
    type Error = StoreError;

    fn try_from(row: BatchRow) -> Result<Self, Self::Error> {
        if row.boxes_remaining < 0 || row.boxes_remaining > row.boxes_purchased {
            return Err(StoreError::MalformedRow(format!(
                "batch {} has {} of {} boxes remaining",
                row.id, row.boxes_remaining, row.boxes_purchased
            )));
        }
        Ok(StockBatch {
            id: row.id,
            owner_id: row.owner_id,
            product_id: row.product_id,
            batch_number: row.batch_number,
            boxes_purchased: row.boxes_purchased,
            boxes_remaining: row.boxes_remaining,
            quantity_per_box: row.quantity_per_box,
            unit_per_box: row.unit_per_box,
            cost_per_box: row.cost_per_box,
            supplier_name: row.supplier_name,
            reorder_level: row.reorder_level,
            critical_level: row.critical_level,
            alert_status: row.alert_status.parse()?,
            status: row.status.parse()?,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<BatchLineRow> for BatchLine {
    type Error = StoreError;

    fn try_from(row: BatchLineRow) -> Result<Self, Self::Error> {
        Ok(BatchLine {
            batch: row.batch.try_into()?,
            product_name: row.product_name,
            sku: row.sku,
            category: row.category,
        })
    }
}

impl From<SaleRow> for Sale {
    fn from(row: SaleRow) -> Self {
        Sale {
            id: row.id,
            owner_id: row.owner_id,
            product_id: row.product_id,
            batch_id: row.batch_id,
            boxes_sold: row.boxes_sold,
            selling_price_per_box: row.selling_price_per_box,
            customer_name: row.customer_name,
            notes: row.notes,
            created_at: row.created_at,
        }
    }
}

fn decode_all<R, T>(rows: Vec<R>) -> StoreResult<Vec<T>>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// `%term%` with LIKE wildcards in the term escaped
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

// ============================================================================
// Queries
// ============================================================================

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_product(&self, product: &Product) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (
                id, owner_id, sku, name, category, description,
                unit_type, base_unit, default_supplier, is_active, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(product.id)
        .bind(product.owner_id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.category)
        .bind(&product.description)
        .bind(product.unit_type.as_str())
        .bind(&product.base_unit)
        .bind(&product.default_supplier)
        .bind(product.is_active)
        .bind(product.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_products(&self, products: &[Product]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        for product in products {
            sqlx::query(
                r#"
                INSERT INTO products (
                    id, owner_id, sku, name, category, description,
                    unit_type, base_unit, default_supplier, is_active, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(product.id)
            .bind(product.owner_id)
            .bind(&product.sku)
            .bind(&product.name)
            .bind(&product.category)
            .bind(&product.description)
            .bind(product.unit_type.as_str())
            .bind(&product.base_unit)
            .bind(&product.default_supplier)
            .bind(product.is_active)
            .bind(product.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_product(&self, owner: Uuid, id: Uuid) -> StoreResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, owner_id, sku, name, category, description,
                   unit_type, base_unit, default_supplier, is_active, created_at
            FROM products
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    async fn update_product(&self, product: &Product) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET sku = $3,
                name = $4,
                category = $5,
                description = $6,
                unit_type = $7,
                base_unit = $8,
                default_supplier = $9,
                is_active = $10
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(product.id)
        .bind(product.owner_id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.category)
        .bind(&product.description)
        .bind(product.unit_type.as_str())
        .bind(&product.base_unit)
        .bind(&product.default_supplier)
        .bind(product.is_active)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_product(&self, owner: Uuid, id: Uuid) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn list_products(
        &self,
        owner: Uuid,
        filter: &ProductFilter,
        page: &PageRequest,
    ) -> StoreResult<(Vec<Product>, u64)> {
        let search = filter.search.as_deref().map(like_pattern);

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM products
            WHERE owner_id = $1
              AND ($2::text IS NULL OR name ILIKE $2 OR sku ILIKE $2 OR category ILIKE $2)
              AND ($3::text IS NULL OR category = $3)
            "#,
        )
        .bind(owner)
        .bind(&search)
        .bind(&filter.category)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, owner_id, sku, name, category, description,
                   unit_type, base_unit, default_supplier, is_active, created_at
            FROM products
            WHERE owner_id = $1
              AND ($2::text IS NULL OR name ILIKE $2 OR sku ILIKE $2 OR category ILIKE $2)
              AND ($3::text IS NULL OR category = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(owner)
        .bind(&search)
        .bind(&filter.category)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok((decode_all(rows)?, total as u64))
    }

    async fn find_products_by_sku(&self, owner: Uuid, skus: &[String]) -> StoreResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, owner_id, sku, name, category, description,
                   unit_type, base_unit, default_supplier, is_active, created_at
            FROM products
            WHERE owner_id = $1 AND sku = ANY($2)
            "#,
        )
        .bind(owner)
        .bind(skus)
        .fetch_all(&self.pool)
        .await?;

        decode_all(rows)
    }

    async fn count_products(&self, owner: Uuid, range: &DateRange) -> StoreResult<ProductCounts> {
        let (total, active): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COUNT(*) FILTER (WHERE is_active)
            FROM products
            WHERE owner_id = $1
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at <= $3)
            "#,
        )
        .bind(owner)
        .bind(range.from)
        .bind(range.to)
        .fetch_one(&self.pool)
        .await?;

        Ok(ProductCounts {
            total: total as u64,
            active: active as u64,
        })
    }

    async fn insert_batch(&self, batch: &StockBatch) -> StoreResult<()> {
        insert_batch_row(&self.pool, batch).await
    }

    async fn insert_batches(&self, batches: &[StockBatch]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        for batch in batches {
            insert_batch_row(&mut *tx, batch).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_batch(&self, owner: Uuid, id: Uuid) -> StoreResult<Option<StockBatch>> {
        let row = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT id, owner_id, product_id, batch_number, boxes_purchased, boxes_remaining,
                   quantity_per_box, unit_per_box, cost_per_box, supplier_name,
                   reorder_level, critical_level, alert_status, status, created_at
            FROM stock_batches
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;

        row.map(StockBatch::try_from).transpose()
    }

    async fn update_batch_stock(
        &self,
        owner: Uuid,
        id: Uuid,
        expected_remaining: i32,
        level: &StockLevel,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE stock_batches
            SET boxes_remaining = $4,
                alert_status = $5,
                status = $6
            WHERE id = $1 AND owner_id = $2 AND boxes_remaining = $3
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(expected_remaining)
        .bind(level.boxes_remaining)
        .bind(level.alert_status.as_str())
        .bind(level.status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn list_batches(
        &self,
        owner: Uuid,
        filter: &BatchFilter,
        page: &PageRequest,
    ) -> StoreResult<(Vec<StockBatch>, u64)> {
        let status = filter.status.map(|s| s.as_str());

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM stock_batches
            WHERE owner_id = $1
              AND ($2::uuid IS NULL OR product_id = $2)
              AND ($3::text IS NULL OR status = $3)
              AND ($4::timestamptz IS NULL OR created_at >= $4)
              AND ($5::timestamptz IS NULL OR created_at <= $5)
            "#,
        )
        .bind(owner)
        .bind(filter.product_id)
        .bind(status)
        .bind(filter.range.from)
        .bind(filter.range.to)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT id, owner_id, product_id, batch_number, boxes_purchased, boxes_remaining,
                   quantity_per_box, unit_per_box, cost_per_box, supplier_name,
                   reorder_level, critical_level, alert_status, status, created_at
            FROM stock_batches
            WHERE owner_id = $1
              AND ($2::uuid IS NULL OR product_id = $2)
              AND ($3::text IS NULL OR status = $3)
              AND ($4::timestamptz IS NULL OR created_at >= $4)
              AND ($5::timestamptz IS NULL OR created_at <= $5)
            ORDER BY created_at DESC
            LIMIT $6 OFFSET $7
            "#,
        )
        .bind(owner)
        .bind(filter.product_id)
        .bind(status)
        .bind(filter.range.from)
        .bind(filter.range.to)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok((decode_all(rows)?, total as u64))
    }

    async fn active_batches(&self, owner: Uuid) -> StoreResult<Vec<BatchLine>> {
        let rows = sqlx::query_as::<_, BatchLineRow>(
            r#"
            SELECT b.id, b.owner_id, b.product_id, b.batch_number, b.boxes_purchased,
                   b.boxes_remaining, b.quantity_per_box, b.unit_per_box, b.cost_per_box,
                   b.supplier_name, b.reorder_level, b.critical_level, b.alert_status,
                   b.status, b.created_at,
                   p.name AS product_name, p.sku, p.category
            FROM stock_batches b
            JOIN products p ON p.id = b.product_id
            WHERE b.owner_id = $1
              AND b.status = $2
              AND b.boxes_remaining > 0
            ORDER BY b.created_at DESC
            "#,
        )
        .bind(owner)
        .bind(BatchStatus::Active.as_str())
        .fetch_all(&self.pool)
        .await?;

        decode_all(rows)
    }

    async fn delete_batches_for_product(&self, owner: Uuid, product_id: Uuid) -> StoreResult<u64> {
        let result =
            sqlx::query("DELETE FROM stock_batches WHERE product_id = $1 AND owner_id = $2")
                .bind(product_id)
                .bind(owner)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }

    async fn insert_sale(&self, sale: &Sale) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sales (
                id, owner_id, product_id, batch_id, boxes_sold,
                selling_price_per_box, customer_name, notes, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(sale.id)
        .bind(sale.owner_id)
        .bind(sale.product_id)
        .bind(sale.batch_id)
        .bind(sale.boxes_sold)
        .bind(sale.selling_price_per_box)
        .bind(&sale.customer_name)
        .bind(&sale.notes)
        .bind(sale.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_sale(&self, owner: Uuid, id: Uuid) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM sales WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn list_sales(
        &self,
        owner: Uuid,
        filter: &SaleFilter,
        page: &PageRequest,
    ) -> StoreResult<(Vec<Sale>, u64)> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM sales
            WHERE owner_id = $1
              AND ($2::uuid IS NULL OR product_id = $2)
              AND ($3::timestamptz IS NULL OR created_at >= $3)
              AND ($4::timestamptz IS NULL OR created_at <= $4)
            "#,
        )
        .bind(owner)
        .bind(filter.product_id)
        .bind(filter.range.from)
        .bind(filter.range.to)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, SaleRow>(
            r#"
            SELECT id, owner_id, product_id, batch_id, boxes_sold,
                   selling_price_per_box, customer_name, notes, created_at
            FROM sales
            WHERE owner_id = $1
              AND ($2::uuid IS NULL OR product_id = $2)
              AND ($3::timestamptz IS NULL OR created_at >= $3)
              AND ($4::timestamptz IS NULL OR created_at <= $4)
            ORDER BY created_at DESC
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(owner)
        .bind(filter.product_id)
        .bind(filter.range.from)
        .bind(filter.range.to)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok((rows.into_iter().map(Sale::from).collect(), total as u64))
    }

    async fn sale_lines(&self, owner: Uuid, range: &DateRange) -> StoreResult<Vec<SaleLine>> {
        let rows = sqlx::query_as::<_, SaleLine>(
            r#"
            SELECT s.id AS sale_id, s.product_id, p.name AS product_name, p.sku, p.category,
                   s.boxes_sold, s.selling_price_per_box, b.cost_per_box, s.created_at
            FROM sales s
            JOIN products p ON p.id = s.product_id
            JOIN stock_batches b ON b.id = s.batch_id
            WHERE s.owner_id = $1
              AND ($2::timestamptz IS NULL OR s.created_at >= $2)
              AND ($3::timestamptz IS NULL OR s.created_at <= $3)
            ORDER BY s.created_at DESC
            "#,
        )
        .bind(owner)
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn delete_sales_for_product(&self, owner: Uuid, product_id: Uuid) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM sales WHERE product_id = $1 AND owner_id = $2")
            .bind(product_id)
            .bind(owner)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

async fn insert_batch_row<'e, E>(executor: E, batch: &StockBatch) -> StoreResult<()>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO stock_batches (
            id, owner_id, product_id, batch_number, boxes_purchased, boxes_remaining,
            quantity_per_box, unit_per_box, cost_per_box, supplier_name,
            reorder_level, critical_level, alert_status, status, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        "#,
    )
    .bind(batch.id)
    .bind(batch.owner_id)
    .bind(batch.product_id)
    .bind(&batch.batch_number)
    .bind(batch.boxes_purchased)
    .bind(batch.boxes_remaining)
    .bind(batch.quantity_per_box)
    .bind(&batch.unit_per_box)
    .bind(batch.cost_per_box)
    .bind(&batch.supplier_name)
    .bind(batch.reorder_level)
    .bind(batch.critical_level)
    .bind(batch.alert_status.as_str())
    .bind(batch.status.as_str())
    .bind(batch.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("tea"), "%tea%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_batch_row_rejects_unknown_status() {
        let row = BatchRow {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            batch_number: None,
            boxes_purchased: 10,
            boxes_remaining: 4,
            quantity_per_box: Decimal::ONE,
            unit_per_box: "kg".to_string(),
            cost_per_box: Decimal::from(100),
            supplier_name: None,
            reorder_level: 5,
            critical_level: 2,
            alert_status: "amber".to_string(),
            status: "active".to_string(),
            created_at: Utc::now(),
        };
        assert!(matches!(
            StockBatch::try_from(row),
            Err(StoreError::MalformedRow(_))
        ));
    }

    #[test]
    fn test_batch_row_rejects_overfull_batch() {
        let row = BatchRow {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            batch_number: None,
            boxes_purchased: 3,
            boxes_remaining: 4,
            quantity_per_box: Decimal::ONE,
            unit_per_box: "kg".to_string(),
            cost_per_box: Decimal::from(100),
            supplier_name: None,
            reorder_level: 0,
            critical_level: 0,
            alert_status: "healthy".to_string(),
            status: "active".to_string(),
            created_at: Utc::now(),
        };
        assert!(StockBatch::try_from(row).is_err());
    }
}
