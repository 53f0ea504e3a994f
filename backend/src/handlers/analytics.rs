//! HTTP handlers for the analytics read-models

use axum::{extract::State, Json};

use super::ApiQuery;
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::analytics::{
    AnalyticsService, Performer, PerformersReport, ProfitReport, SearchQuery, StockAlertReport,
    WeeklyReport, WindowQuery,
};
use crate::AppState;

pub async fn profit_analysis(
    State(state): State<AppState>,
    current_user: CurrentUser,
    ApiQuery(query): ApiQuery<WindowQuery>,
) -> AppResult<Json<ProfitReport>> {
    let service = AnalyticsService::new(state.store);
    let report = service.profit(current_user.owner_id(), query).await?;
    Ok(Json(report))
}

pub async fn top_performers(
    State(state): State<AppState>,
    current_user: CurrentUser,
    ApiQuery(query): ApiQuery<WindowQuery>,
) -> AppResult<Json<PerformersReport>> {
    let service = AnalyticsService::new(state.store);
    let report = service.performers(current_user.owner_id(), query).await?;
    Ok(Json(report))
}

/// Performer metrics filtered by a free-text query
pub async fn search_performers(
    State(state): State<AppState>,
    current_user: CurrentUser,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> AppResult<Json<Vec<Performer>>> {
    let service = AnalyticsService::new(state.store);
    let rows = service.search(current_user.owner_id(), query).await?;
    Ok(Json(rows))
}

pub async fn stock_alerts(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<StockAlertReport>> {
    let service = AnalyticsService::new(state.store);
    let report = service.stock_alerts(current_user.owner_id()).await?;
    Ok(Json(report))
}

pub async fn weekly_report(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<WeeklyReport>> {
    let service = AnalyticsService::new(state.store);
    let report = service.weekly_report(current_user.owner_id()).await?;
    Ok(Json(report))
}
