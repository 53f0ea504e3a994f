//! HTTP handlers for sales

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use super::{csv_attachment, export_to_csv, ApiJson, ApiQuery, ExportQuery, RangeQuery};
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::analytics::{AnalyticsService, SalesAnalytics};
use crate::services::ledger::{LedgerService, RecordSaleInput, SaleQuery, SaleReceipt};
use crate::AppState;

/// Record a sale against a batch
pub async fn record_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    ApiJson(input): ApiJson<RecordSaleInput>,
) -> AppResult<(StatusCode, Json<SaleReceipt>)> {
    let service = LedgerService::new(state.store);
    let receipt = service.apply_sale(current_user.owner_id(), input).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// List sales as JSON, or the current page as CSV with `?format=csv`
pub async fn list_sales(
    State(state): State<AppState>,
    current_user: CurrentUser,
    ApiQuery(query): ApiQuery<SaleQuery>,
    ApiQuery(export): ApiQuery<ExportQuery>,
) -> AppResult<Response> {
    let service = LedgerService::new(state.store);
    let sales = service.list_sales(current_user.owner_id(), query).await?;

    if export.wants_csv() {
        let body = export_to_csv(&sales.data)?;
        Ok(csv_attachment("sales.csv", body))
    } else {
        Ok(Json(sales).into_response())
    }
}

pub async fn sales_analytics(
    State(state): State<AppState>,
    current_user: CurrentUser,
    ApiQuery(range): ApiQuery<RangeQuery>,
) -> AppResult<Json<SalesAnalytics>> {
    let service = AnalyticsService::new(state.store);
    let analytics = service
        .sales(current_user.owner_id(), range.from_date, range.to_date)
        .await?;
    Ok(Json(analytics))
}
