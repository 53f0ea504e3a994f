//! HTTP handlers for the product catalog

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use shared::{Paginated, Product};
use uuid::Uuid;

use super::{ApiJson, ApiPath, ApiQuery, RangeQuery};
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::catalog::{
    CatalogService, CreateProductInput, DeletedProduct, ProductQuery, ProductSummary,
    SetActiveInput, SkuCheck, UpdateProductInput,
};
use crate::AppState;

/// `?skus=A-1,B-2`
#[derive(Debug, Deserialize)]
pub struct SkuQuery {
    #[serde(default)]
    pub skus: String,
}

/// Create a product
pub async fn create_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    ApiJson(input): ApiJson<CreateProductInput>,
) -> AppResult<(StatusCode, Json<Product>)> {
    let service = CatalogService::new(state.store);
    let product = service.create(current_user.owner_id(), input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// Create several products atomically from a JSON array
pub async fn create_products_bulk(
    State(state): State<AppState>,
    current_user: CurrentUser,
    ApiJson(inputs): ApiJson<Vec<CreateProductInput>>,
) -> AppResult<(StatusCode, Json<Vec<Product>>)> {
    let service = CatalogService::new(state.store);
    let products = service.create_many(current_user.owner_id(), inputs).await?;
    Ok((StatusCode::CREATED, Json(products)))
}

pub async fn list_products(
    State(state): State<AppState>,
    current_user: CurrentUser,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> AppResult<Json<Paginated<Product>>> {
    let service = CatalogService::new(state.store);
    let products = service.list(current_user.owner_id(), query).await?;
    Ok(Json(products))
}

pub async fn get_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    ApiPath(product_id): ApiPath<Uuid>,
) -> AppResult<Json<Product>> {
    let service = CatalogService::new(state.store);
    let product = service.get(current_user.owner_id(), product_id).await?;
    Ok(Json(product))
}

pub async fn update_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    ApiPath(product_id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<UpdateProductInput>,
) -> AppResult<Json<Product>> {
    let service = CatalogService::new(state.store);
    let product = service
        .update(current_user.owner_id(), product_id, input)
        .await?;
    Ok(Json(product))
}

/// Activate or deactivate a product
pub async fn set_product_active(
    State(state): State<AppState>,
    current_user: CurrentUser,
    ApiPath(product_id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<SetActiveInput>,
) -> AppResult<Json<Product>> {
    let service = CatalogService::new(state.store);
    let product = service
        .set_active(current_user.owner_id(), product_id, input.is_active)
        .await?;
    Ok(Json(product))
}

/// Delete a product together with its sales and batches
pub async fn delete_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    ApiPath(product_id): ApiPath<Uuid>,
) -> AppResult<Json<DeletedProduct>> {
    let service = CatalogService::new(state.store);
    let deleted = service.delete(current_user.owner_id(), product_id).await?;
    Ok(Json(deleted))
}

pub async fn product_analytics(
    State(state): State<AppState>,
    current_user: CurrentUser,
    ApiQuery(range): ApiQuery<RangeQuery>,
) -> AppResult<Json<ProductSummary>> {
    let service = CatalogService::new(state.store);
    let summary = service
        .summary(current_user.owner_id(), range.from_date, range.to_date)
        .await?;
    Ok(Json(summary))
}

/// Report which of a comma-separated list of SKUs exist
pub async fn check_products(
    State(state): State<AppState>,
    current_user: CurrentUser,
    ApiQuery(query): ApiQuery<SkuQuery>,
) -> AppResult<Json<SkuCheck>> {
    let skus: Vec<String> = query.skus.split(',').map(str::to_string).collect();
    let service = CatalogService::new(state.store);
    let check = service.check_skus(current_user.owner_id(), &skus).await?;
    Ok(Json(check))
}
