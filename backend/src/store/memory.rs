//! In-process ledger store
//!
//! Mirrors the PostgreSQL constraints (unique SKU per owner, foreign keys
//! without cascade) so services behave the same against either backend.
//! Faults can be injected to exercise the compensation paths.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{BatchStatus, DateRange, PageRequest, Product, Sale, StockBatch, StockLevel};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    BatchFilter, BatchLine, LedgerStore, ProductCounts, ProductFilter, SaleFilter, SaleLine,
    StoreError, StoreResult,
};

/// One-shot failure armed with [`MemoryStore::inject`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// The next conditional batch update errors out
    BatchUpdateFails,
    /// The next sale deletion errors out
    SaleDeleteFails,
    /// Another writer sells `boxes` from the batch right before the next
    /// conditional batch update lands
    ConcurrentSale { boxes: i32 },
}

#[derive(Default)]
struct Tables {
    products: Vec<Product>,
    batches: Vec<StockBatch>,
    sales: Vec<Sale>,
    faults: Vec<Fault>,
}

impl Tables {
    fn take_fault(&mut self, pred: impl Fn(&Fault) -> bool) -> Option<Fault> {
        let pos = self.faults.iter().position(pred)?;
        Some(self.faults.remove(pos))
    }

    fn sku_taken(&self, owner: Uuid, sku: &str, except: Option<Uuid>) -> bool {
        self.products
            .iter()
            .any(|p| p.owner_id == owner && p.sku == sku && Some(p.id) != except)
    }

    fn check_batch_refs(&self, batch: &StockBatch) -> StoreResult<()> {
        if !self.products.iter().any(|p| p.id == batch.product_id) {
            return Err(StoreError::ForeignKeyViolation(
                "stock_batches_product_id_fkey".to_string(),
            ));
        }
        Ok(())
    }
}

/// Ledger store held in memory behind an async lock
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a one-shot fault
    pub async fn inject(&self, fault: Fault) {
        self.tables.write().await.faults.push(fault);
    }

    /// Number of sale rows across all owners
    pub async fn sale_count(&self) -> usize {
        self.tables.read().await.sales.len()
    }
}

/// Newest first; rows inserted later win ties
fn newest_first<T>(
    rows: impl DoubleEndedIterator<Item = T>,
    key: impl Fn(&T) -> DateTime<Utc>,
) -> Vec<T> {
    let mut rows: Vec<T> = rows.rev().collect();
    rows.sort_by(|a, b| key(b).cmp(&key(a)));
    rows
}

fn paginate<T>(rows: Vec<T>, page: &PageRequest) -> (Vec<T>, u64) {
    let total = rows.len() as u64;
    let rows = rows
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .collect();
    (rows, total)
}

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn insert_product(&self, product: &Product) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        if t.sku_taken(product.owner_id, &product.sku, None) {
            return Err(StoreError::UniqueViolation(
                "products_owner_id_sku_key".to_string(),
            ));
        }
        t.products.push(product.clone());
        Ok(())
    }

    async fn insert_products(&self, products: &[Product]) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        for (i, product) in products.iter().enumerate() {
            let repeated = products[..i]
                .iter()
                .any(|p| p.owner_id == product.owner_id && p.sku == product.sku);
            if repeated || t.sku_taken(product.owner_id, &product.sku, None) {
                return Err(StoreError::UniqueViolation(
                    "products_owner_id_sku_key".to_string(),
                ));
            }
        }
        t.products.extend(products.iter().cloned());
        Ok(())
    }

    async fn get_product(&self, owner: Uuid, id: Uuid) -> StoreResult<Option<Product>> {
        let t = self.tables.read().await;
        Ok(t.products
            .iter()
            .find(|p| p.id == id && p.owner_id == owner)
            .cloned())
    }

    async fn update_product(&self, product: &Product) -> StoreResult<bool> {
        let mut t = self.tables.write().await;
        if t.sku_taken(product.owner_id, &product.sku, Some(product.id)) {
            return Err(StoreError::UniqueViolation(
                "products_owner_id_sku_key".to_string(),
            ));
        }
        match t
            .products
            .iter_mut()
            .find(|p| p.id == product.id && p.owner_id == product.owner_id)
        {
            Some(existing) => {
                let created_at = existing.created_at;
                *existing = Product {
                    created_at,
                    ..product.clone()
                };
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_product(&self, owner: Uuid, id: Uuid) -> StoreResult<u64> {
        let mut t = self.tables.write().await;
        if t.batches.iter().any(|b| b.product_id == id) {
            return Err(StoreError::ForeignKeyViolation(
                "stock_batches_product_id_fkey".to_string(),
            ));
        }
        if t.sales.iter().any(|s| s.product_id == id) {
            return Err(StoreError::ForeignKeyViolation(
                "sales_product_id_fkey".to_string(),
            ));
        }
        let before = t.products.len();
        t.products.retain(|p| !(p.id == id && p.owner_id == owner));
        Ok((before - t.products.len()) as u64)
    }

    async fn list_products(
        &self,
        owner: Uuid,
        filter: &ProductFilter,
        page: &PageRequest,
    ) -> StoreResult<(Vec<Product>, u64)> {
        let t = self.tables.read().await;
        let search = filter.search.as_deref().map(str::to_lowercase);
        let matching = t.products.iter().filter(|p| {
            p.owner_id == owner
                && search.as_deref().map_or(true, |q| {
                    contains_ci(&p.name, q)
                        || contains_ci(&p.sku, q)
                        || p.category.as_deref().is_some_and(|c| contains_ci(c, q))
                })
                && filter
                    .category
                    .as_deref()
                    .map_or(true, |c| p.category.as_deref() == Some(c))
        });
        let rows = newest_first(matching.cloned().collect::<Vec<_>>().into_iter(), |p| {
            p.created_at
        });
        Ok(paginate(rows, page))
    }

    async fn find_products_by_sku(&self, owner: Uuid, skus: &[String]) -> StoreResult<Vec<Product>> {
        let t = self.tables.read().await;
        Ok(t.products
            .iter()
            .filter(|p| p.owner_id == owner && skus.contains(&p.sku))
            .cloned()
            .collect())
    }

    async fn count_products(&self, owner: Uuid, range: &DateRange) -> StoreResult<ProductCounts> {
        let t = self.tables.read().await;
        let in_range: Vec<&Product> = t
            .products
            .iter()
            .filter(|p| p.owner_id == owner && range.contains(p.created_at))
            .collect();
        Ok(ProductCounts {
            total: in_range.len() as u64,
            active: in_range.iter().filter(|p| p.is_active).count() as u64,
        })
    }

    async fn insert_batch(&self, batch: &StockBatch) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        t.check_batch_refs(batch)?;
        t.batches.push(batch.clone());
        Ok(())
    }

    async fn insert_batches(&self, batches: &[StockBatch]) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        for batch in batches {
            t.check_batch_refs(batch)?;
        }
        t.batches.extend(batches.iter().cloned());
        Ok(())
    }

    async fn get_batch(&self, owner: Uuid, id: Uuid) -> StoreResult<Option<StockBatch>> {
        let t = self.tables.read().await;
        Ok(t.batches
            .iter()
            .find(|b| b.id == id && b.owner_id == owner)
            .cloned())
    }

    async fn update_batch_stock(
        &self,
        owner: Uuid,
        id: Uuid,
        expected_remaining: i32,
        level: &StockLevel,
    ) -> StoreResult<u64> {
        let mut t = self.tables.write().await;

        if t.take_fault(|f| *f == Fault::BatchUpdateFails).is_some() {
            return Err(StoreError::Unavailable(
                "injected batch update failure".to_string(),
            ));
        }
        if let Some(Fault::ConcurrentSale { boxes }) =
            t.take_fault(|f| matches!(f, Fault::ConcurrentSale { .. }))
        {
            if let Some(batch) = t.batches.iter_mut().find(|b| b.id == id) {
                let remaining = (batch.boxes_remaining - boxes).max(0);
                let raced = StockLevel::derive(remaining, batch.reorder_level, batch.critical_level);
                batch.boxes_remaining = raced.boxes_remaining;
                batch.alert_status = raced.alert_status;
                batch.status = raced.status;
            }
        }

        match t.batches.iter_mut().find(|b| {
            b.id == id && b.owner_id == owner && b.boxes_remaining == expected_remaining
        }) {
            Some(batch) => {
                batch.boxes_remaining = level.boxes_remaining;
                batch.alert_status = level.alert_status;
                batch.status = level.status;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn list_batches(
        &self,
        owner: Uuid,
        filter: &BatchFilter,
        page: &PageRequest,
    ) -> StoreResult<(Vec<StockBatch>, u64)> {
        let t = self.tables.read().await;
        let matching: Vec<StockBatch> = t
            .batches
            .iter()
            .filter(|b| {
                b.owner_id == owner
                    && filter.product_id.map_or(true, |id| b.product_id == id)
                    && filter.status.map_or(true, |s| b.status == s)
                    && filter.range.contains(b.created_at)
            })
            .cloned()
            .collect();
        let rows = newest_first(matching.into_iter(), |b| b.created_at);
        Ok(paginate(rows, page))
    }

    async fn active_batches(&self, owner: Uuid) -> StoreResult<Vec<BatchLine>> {
        let t = self.tables.read().await;
        let lines: Vec<BatchLine> = t
            .batches
            .iter()
            .filter(|b| {
                b.owner_id == owner && b.status == BatchStatus::Active && b.boxes_remaining > 0
            })
            .filter_map(|b| {
                let product = t.products.iter().find(|p| p.id == b.product_id)?;
                Some(BatchLine {
                    batch: b.clone(),
                    product_name: product.name.clone(),
                    sku: product.sku.clone(),
                    category: product.category.clone(),
                })
            })
            .collect();
        Ok(newest_first(lines.into_iter(), |l| l.batch.created_at))
    }

    async fn delete_batches_for_product(&self, owner: Uuid, product_id: Uuid) -> StoreResult<u64> {
        let mut t = self.tables.write().await;
        let doomed: Vec<Uuid> = t
            .batches
            .iter()
            .filter(|b| b.product_id == product_id && b.owner_id == owner)
            .map(|b| b.id)
            .collect();
        if t.sales.iter().any(|s| doomed.contains(&s.batch_id)) {
            return Err(StoreError::ForeignKeyViolation(
                "sales_batch_id_fkey".to_string(),
            ));
        }
        t.batches.retain(|b| !doomed.contains(&b.id));
        Ok(doomed.len() as u64)
    }

    async fn insert_sale(&self, sale: &Sale) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        if !t.products.iter().any(|p| p.id == sale.product_id) {
            return Err(StoreError::ForeignKeyViolation(
                "sales_product_id_fkey".to_string(),
            ));
        }
        if !t.batches.iter().any(|b| b.id == sale.batch_id) {
            return Err(StoreError::ForeignKeyViolation(
                "sales_batch_id_fkey".to_string(),
            ));
        }
        t.sales.push(sale.clone());
        Ok(())
    }

    async fn delete_sale(&self, owner: Uuid, id: Uuid) -> StoreResult<u64> {
        let mut t = self.tables.write().await;
        if t.take_fault(|f| *f == Fault::SaleDeleteFails).is_some() {
            return Err(StoreError::Unavailable(
                "injected sale delete failure".to_string(),
            ));
        }
        let before = t.sales.len();
        t.sales.retain(|s| !(s.id == id && s.owner_id == owner));
        Ok((before - t.sales.len()) as u64)
    }

    async fn list_sales(
        &self,
        owner: Uuid,
        filter: &SaleFilter,
        page: &PageRequest,
    ) -> StoreResult<(Vec<Sale>, u64)> {
        let t = self.tables.read().await;
        let matching: Vec<Sale> = t
            .sales
            .iter()
            .filter(|s| {
                s.owner_id == owner
                    && filter.product_id.map_or(true, |id| s.product_id == id)
                    && filter.range.contains(s.created_at)
            })
            .cloned()
            .collect();
        let rows = newest_first(matching.into_iter(), |s| s.created_at);
        Ok(paginate(rows, page))
    }

    async fn sale_lines(&self, owner: Uuid, range: &DateRange) -> StoreResult<Vec<SaleLine>> {
        let t = self.tables.read().await;
        let lines: Vec<SaleLine> = t
            .sales
            .iter()
            .filter(|s| s.owner_id == owner && range.contains(s.created_at))
            .filter_map(|s| {
                let product = t.products.iter().find(|p| p.id == s.product_id)?;
                let batch = t.batches.iter().find(|b| b.id == s.batch_id)?;
                Some(SaleLine {
                    sale_id: s.id,
                    product_id: s.product_id,
                    product_name: product.name.clone(),
                    sku: product.sku.clone(),
                    category: product.category.clone(),
                    boxes_sold: s.boxes_sold,
                    selling_price_per_box: s.selling_price_per_box,
                    cost_per_box: batch.cost_per_box,
                    created_at: s.created_at,
                })
            })
            .collect();
        Ok(newest_first(lines.into_iter(), |l| l.created_at))
    }

    async fn delete_sales_for_product(&self, owner: Uuid, product_id: Uuid) -> StoreResult<u64> {
        let mut t = self.tables.write().await;
        let before = t.sales.len();
        t.sales
            .retain(|s| !(s.product_id == product_id && s.owner_id == owner));
        Ok((before - t.sales.len()) as u64)
    }
}
