//! HTTP handlers for stock batches

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use shared::StockBatch;

use super::{csv_attachment, export_to_csv, ApiJson, ApiQuery, ExportQuery, RangeQuery};
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::ledger::{BatchQuery, CreateBatchInput, InventorySummary, LedgerService};
use crate::AppState;

/// Record a purchased batch
pub async fn create_batch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    ApiJson(input): ApiJson<CreateBatchInput>,
) -> AppResult<(StatusCode, Json<StockBatch>)> {
    let service = LedgerService::new(state.store);
    let batch = service.create_batch(current_user.owner_id(), input).await?;
    Ok((StatusCode::CREATED, Json(batch)))
}

/// List batches as JSON, or the current page as CSV with `?format=csv`
pub async fn list_batches(
    State(state): State<AppState>,
    current_user: CurrentUser,
    ApiQuery(query): ApiQuery<BatchQuery>,
    ApiQuery(export): ApiQuery<ExportQuery>,
) -> AppResult<Response> {
    let service = LedgerService::new(state.store);
    let batches = service.list_batches(current_user.owner_id(), query).await?;

    if export.wants_csv() {
        let body = export_to_csv(&batches.data)?;
        Ok(csv_attachment("stock_batches.csv", body))
    } else {
        Ok(Json(batches).into_response())
    }
}

pub async fn inventory_analytics(
    State(state): State<AppState>,
    current_user: CurrentUser,
    ApiQuery(range): ApiQuery<RangeQuery>,
) -> AppResult<Json<InventorySummary>> {
    let range = crate::services::ledger::date_range(range.from_date, range.to_date)?;
    let service = LedgerService::new(state.store);
    let summary = service
        .inventory_summary(current_user.owner_id(), range)
        .await?;
    Ok(Json(summary))
}
