//! HTTP handlers for CSV bulk uploads and their templates

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::Response,
    Json,
};

use super::csv_attachment;
use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::services::bulk_upload::{
    BulkUploadService, ProductUploadResult, SalesUploadResult, StockUploadResult,
    MAX_UPLOAD_BYTES, PRODUCT_TEMPLATE, SALES_TEMPLATE, STOCK_TEMPLATE,
};
use crate::AppState;

/// Read the `file` field of a multipart upload, which must be a CSV of at
/// most [`MAX_UPLOAD_BYTES`]
pub async fn read_csv_upload(mut multipart: Multipart) -> AppResult<Vec<u8>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::ValidationError(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let is_csv = field
            .file_name()
            .map(|name| name.to_lowercase().ends_with(".csv"))
            .unwrap_or(false);
        if !is_csv {
            return Err(AppError::validation("file", "Only CSV files are allowed"));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::ValidationError(e.body_text()))?;
        if data.is_empty() {
            return Err(AppError::validation("file", "The uploaded file is empty"));
        }
        if data.len() > MAX_UPLOAD_BYTES {
            return Err(AppError::validation(
                "file",
                format!("File must be at most {} MB", MAX_UPLOAD_BYTES / (1024 * 1024)),
            ));
        }
        return Ok(data.to_vec());
    }

    Err(AppError::validation("file", "No file uploaded"))
}

/// Create stock batches from a CSV upload
pub async fn upload_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<StockUploadResult>)> {
    let data = read_csv_upload(multipart).await?;
    let service = BulkUploadService::new(state.store);
    let result = service.upload_stock(current_user.owner_id(), &data).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

pub async fn stock_template() -> Response {
    csv_attachment("stock_upload_template.csv", STOCK_TEMPLATE.to_string())
}

/// Create products from a CSV upload
pub async fn upload_products(
    State(state): State<AppState>,
    current_user: CurrentUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ProductUploadResult>)> {
    let data = read_csv_upload(multipart).await?;
    let service = BulkUploadService::new(state.store);
    let result = service
        .upload_products(current_user.owner_id(), &data)
        .await?;
    Ok((StatusCode::CREATED, Json(result)))
}

pub async fn product_template() -> Response {
    csv_attachment("product_upload_template.csv", PRODUCT_TEMPLATE.to_string())
}

/// Record sales from a CSV upload; each row succeeds or fails on its own
pub async fn upload_sales(
    State(state): State<AppState>,
    current_user: CurrentUser,
    multipart: Multipart,
) -> AppResult<Json<SalesUploadResult>> {
    let data = read_csv_upload(multipart).await?;
    let service = BulkUploadService::new(state.store);
    let result = service.upload_sales(current_user.owner_id(), &data).await?;
    Ok(Json(result))
}

pub async fn sales_template() -> Response {
    csv_attachment("sales_upload_template.csv", SALES_TEMPLATE.to_string())
}
