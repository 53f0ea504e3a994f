//! Batch ledger: stock batches and the sales that consume them

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    normalize_optional, normalize_unit, validate_positive_amount, validate_positive_boxes,
    validate_remaining, validate_thresholds, BatchStatus, DateRange, PageRequest, Paginated, Sale,
    StockBatch, StockLevel,
};
use uuid::Uuid;

use super::saga::{self, DecrementBatch, RecordSale};
use crate::error::{AppError, AppResult};
use crate::store::{BatchFilter, LedgerStore, SaleFilter, StoreError};

/// Ledger service for stock batches and sales
#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
}

/// Input for creating a stock batch
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBatchInput {
    pub product_id: Uuid,
    pub batch_number: Option<String>,
    pub boxes_purchased: i32,
    pub quantity_per_box: Decimal,
    pub unit_per_box: String,
    pub cost_per_box: Decimal,
    pub supplier_name: Option<String>,
    pub reorder_level: Option<i32>,
    pub critical_level: Option<i32>,
}

/// Input for recording a sale
#[derive(Debug, Clone, Deserialize)]
pub struct RecordSaleInput {
    pub product_id: Uuid,
    pub batch_id: Uuid,
    pub boxes_sold: i32,
    pub selling_price_per_box: Decimal,
    pub customer_name: Option<String>,
    pub notes: Option<String>,
}

/// A recorded sale with its money figures and the batch's new stock level
#[derive(Debug, Clone, Serialize)]
pub struct SaleReceipt {
    #[serde(flatten)]
    pub sale: Sale,
    pub revenue: Decimal,
    pub cost: Decimal,
    pub profit: Decimal,
    pub batch: StockLevel,
}

/// Query parameters for listing batches
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub product_id: Option<Uuid>,
    /// `active` (default), `depleted` or `all`
    pub status: Option<String>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
}

/// Query parameters for listing sales
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaleQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub product_id: Option<Uuid>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
}

/// Value of stock on hand across active batches
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventorySummary {
    pub total_value: Decimal,
    pub total_boxes: i64,
    pub total_batches: u64,
}

pub(crate) fn date_range(
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> AppResult<DateRange> {
    let range = DateRange::new(from, to);
    if range.is_inverted() {
        return Err(AppError::validation(
            "from_date",
            "from_date must not be after to_date",
        ));
    }
    Ok(range)
}

fn parse_status_filter(status: Option<&str>) -> AppResult<Option<BatchStatus>> {
    match status.map(str::trim) {
        None | Some("") => Ok(Some(BatchStatus::Active)),
        Some("all") => Ok(None),
        Some(other) => other.parse().map(Some).map_err(|_| {
            AppError::validation("status", "Status must be one of: active, depleted, all")
        }),
    }
}

/// Validate batch input and build the row to insert.
///
/// `boxes_remaining` defaults to `boxes_purchased`; imports may supply a
/// smaller value for stock that was partly sold before it was recorded here.
pub(crate) fn build_batch(
    owner: Uuid,
    input: &CreateBatchInput,
    boxes_remaining: Option<i32>,
) -> AppResult<StockBatch> {
    validate_positive_boxes(input.boxes_purchased)
        .map_err(|msg| AppError::validation("boxes_purchased", msg))?;
    validate_positive_amount(input.quantity_per_box)
        .map_err(|msg| AppError::validation("quantity_per_box", msg))?;
    validate_positive_amount(input.cost_per_box)
        .map_err(|msg| AppError::validation("cost_per_box", msg))?;
    let unit_per_box =
        normalize_unit(&input.unit_per_box).map_err(|msg| AppError::validation("unit_per_box", msg))?;

    let reorder_level = input.reorder_level.unwrap_or(0);
    let critical_level = input.critical_level.unwrap_or(0);
    validate_thresholds(reorder_level, critical_level)
        .map_err(|msg| AppError::validation("critical_level", msg))?;

    let remaining = boxes_remaining.unwrap_or(input.boxes_purchased);
    validate_remaining(remaining, input.boxes_purchased)
        .map_err(|msg| AppError::validation("boxes_remaining", msg))?;

    let level = StockLevel::derive(remaining, reorder_level, critical_level);

    Ok(StockBatch {
        id: Uuid::new_v4(),
        owner_id: owner,
        product_id: input.product_id,
        batch_number: normalize_optional(input.batch_number.as_deref()),
        boxes_purchased: input.boxes_purchased,
        boxes_remaining: level.boxes_remaining,
        quantity_per_box: input.quantity_per_box,
        unit_per_box,
        cost_per_box: input.cost_per_box,
        supplier_name: normalize_optional(input.supplier_name.as_deref()),
        reorder_level,
        critical_level,
        alert_status: level.alert_status,
        status: level.status,
        created_at: Utc::now(),
    })
}

impl LedgerService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Create a stock batch for one of the owner's products
    pub async fn create_batch(&self, owner: Uuid, input: CreateBatchInput) -> AppResult<StockBatch> {
        let batch = build_batch(owner, &input, None)?;

        // The foreign key alone would accept another owner's product.
        if self.store.get_product(owner, input.product_id).await?.is_none() {
            return Err(AppError::NotFound("Product".into()));
        }

        self.store.insert_batch(&batch).await.map_err(|err| match err {
            StoreError::ForeignKeyViolation(_) => AppError::NotFound("Product".into()),
            other => other.into(),
        })?;

        tracing::info!(
            batch_id = %batch.id,
            product_id = %batch.product_id,
            boxes = batch.boxes_purchased,
            "Stock batch created"
        );
        Ok(batch)
    }

    /// Record a sale against a batch and decrement the batch.
    ///
    /// Nothing is written unless the batch belongs to the owner, matches the
    /// product and holds enough boxes. The sale insert and the conditional
    /// decrement run as a saga: a failed decrement deletes the sale again.
    pub async fn apply_sale(&self, owner: Uuid, input: RecordSaleInput) -> AppResult<SaleReceipt> {
        validate_positive_boxes(input.boxes_sold)
            .map_err(|msg| AppError::validation("boxes_sold", msg))?;
        validate_positive_amount(input.selling_price_per_box)
            .map_err(|msg| AppError::validation("selling_price_per_box", msg))?;

        let batch = self
            .store
            .get_batch(owner, input.batch_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Batch".into()))?;

        if batch.product_id != input.product_id {
            return Err(AppError::validation(
                "product_id",
                "Batch does not belong to this product",
            ));
        }

        let level = batch
            .level_after_sale(input.boxes_sold)
            .ok_or(AppError::InsufficientStock {
                requested: input.boxes_sold,
                available: batch.boxes_remaining,
            })?;

        let sale = Sale {
            id: Uuid::new_v4(),
            owner_id: owner,
            product_id: input.product_id,
            batch_id: batch.id,
            boxes_sold: input.boxes_sold,
            selling_price_per_box: input.selling_price_per_box,
            customer_name: normalize_optional(input.customer_name.as_deref()),
            notes: normalize_optional(input.notes.as_deref()),
            created_at: Utc::now(),
        };

        let (revenue, cost, profit) = match (
            sale.revenue(),
            sale.cost(batch.cost_per_box),
            sale.profit(batch.cost_per_box),
        ) {
            (Some(revenue), Some(cost), Some(profit)) => (revenue, cost, profit),
            _ => {
                return Err(AppError::validation(
                    "selling_price_per_box",
                    "Sale total is too large",
                ))
            }
        };

        let store = self.store.as_ref();
        let record = RecordSale::new(store, sale);
        let decrement = DecrementBatch::new(store, owner, batch.id, batch.boxes_remaining, level);
        let (sale, level) = saga::run_pair(&record, &decrement).await?;

        tracing::info!(
            sale_id = %sale.id,
            batch_id = %batch.id,
            boxes_sold = sale.boxes_sold,
            remaining = level.boxes_remaining,
            alert_status = %level.alert_status,
            "Sale recorded"
        );

        Ok(SaleReceipt {
            revenue,
            cost,
            profit,
            sale,
            batch: level,
        })
    }

    pub async fn get_batch(&self, owner: Uuid, batch_id: Uuid) -> AppResult<StockBatch> {
        self.store
            .get_batch(owner, batch_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Batch".into()))
    }

    /// List batches, newest first; active only unless a status is given
    pub async fn list_batches(
        &self,
        owner: Uuid,
        query: BatchQuery,
    ) -> AppResult<Paginated<StockBatch>> {
        let page = PageRequest {
            page: query.page,
            limit: query.limit,
        };
        let filter = BatchFilter {
            product_id: query.product_id,
            status: parse_status_filter(query.status.as_deref())?,
            range: date_range(query.from_date, query.to_date)?,
        };

        let (rows, total) = self.store.list_batches(owner, &filter, &page).await?;
        Ok(Paginated::new(rows, &page, total))
    }

    /// List sales, newest first
    pub async fn list_sales(&self, owner: Uuid, query: SaleQuery) -> AppResult<Paginated<Sale>> {
        let page = PageRequest {
            page: query.page,
            limit: query.limit,
        };
        let filter = SaleFilter {
            product_id: query.product_id,
            range: date_range(query.from_date, query.to_date)?,
        };

        let (rows, total) = self.store.list_sales(owner, &filter, &page).await?;
        Ok(Paginated::new(rows, &page, total))
    }

    /// Stock on hand in active batches created within `range`
    pub async fn inventory_summary(
        &self,
        owner: Uuid,
        range: DateRange,
    ) -> AppResult<InventorySummary> {
        let batches = self.store.active_batches(owner).await?;
        let in_range: Vec<_> = batches
            .iter()
            .filter(|line| range.contains(line.batch.created_at))
            .collect();

        Ok(InventorySummary {
            total_value: in_range
                .iter()
                .fold(Decimal::ZERO, |sum, l| sum.saturating_add(l.batch.remaining_value())),
            total_boxes: in_range
                .iter()
                .map(|l| l.batch.boxes_remaining as i64)
                .sum(),
            total_batches: in_range.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::AlertStatus;

    fn input() -> CreateBatchInput {
        CreateBatchInput {
            product_id: Uuid::new_v4(),
            batch_number: Some("  B-1 ".into()),
            boxes_purchased: 10,
            quantity_per_box: Decimal::from(12),
            unit_per_box: " Piece ".into(),
            cost_per_box: Decimal::from(100),
            supplier_name: Some("   ".into()),
            reorder_level: Some(5),
            critical_level: Some(2),
        }
    }

    #[test]
    fn test_build_batch_normalises() {
        let batch = build_batch(Uuid::new_v4(), &input(), None).unwrap();
        assert_eq!(batch.boxes_remaining, 10);
        assert_eq!(batch.unit_per_box, "piece");
        assert_eq!(batch.batch_number.as_deref(), Some("B-1"));
        assert_eq!(batch.supplier_name, None);
        assert_eq!(batch.alert_status, AlertStatus::Healthy);
        assert_eq!(batch.status, BatchStatus::Active);
    }

    #[test]
    fn test_build_batch_initial_alert_from_purchased() {
        let mut i = input();
        i.boxes_purchased = 4;
        let batch = build_batch(Uuid::new_v4(), &i, None).unwrap();
        assert_eq!(batch.alert_status, AlertStatus::Warning);
    }

    #[test]
    fn test_build_batch_rejects_bad_thresholds() {
        let mut i = input();
        i.critical_level = Some(6);
        let err = build_batch(Uuid::new_v4(), &i, None).unwrap_err();
        assert!(matches!(err, AppError::Validation { field, .. } if field == "critical_level"));
    }

    #[test]
    fn test_build_batch_rejects_non_positive_values() {
        let mut i = input();
        i.boxes_purchased = 0;
        assert!(build_batch(Uuid::new_v4(), &i, None).is_err());

        let mut i = input();
        i.cost_per_box = Decimal::ZERO;
        assert!(build_batch(Uuid::new_v4(), &i, None).is_err());

        let mut i = input();
        i.unit_per_box = "  ".into();
        assert!(build_batch(Uuid::new_v4(), &i, None).is_err());
    }

    #[test]
    fn test_build_batch_imported_remaining() {
        let batch = build_batch(Uuid::new_v4(), &input(), Some(0)).unwrap();
        assert_eq!(batch.status, BatchStatus::Depleted);
        assert_eq!(batch.alert_status, AlertStatus::Critical);
        assert!(build_batch(Uuid::new_v4(), &input(), Some(11)).is_err());
    }

    #[test]
    fn test_status_filter() {
        assert_eq!(parse_status_filter(None).unwrap(), Some(BatchStatus::Active));
        assert_eq!(parse_status_filter(Some("all")).unwrap(), None);
        assert_eq!(
            parse_status_filter(Some("depleted")).unwrap(),
            Some(BatchStatus::Depleted)
        );
        assert!(parse_status_filter(Some("archived")).is_err());
    }
}
