//! Error handling for ProfitBox
//!
//! Every failure a handler can return maps to one status code and a JSON body
//! of the form `{ "error": { "code", "message", "field"?, "details"? } }`.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // Validation errors
    #[error("Validation error on {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unknown SKUs: {}", .0.join(", "))]
    MissingSkus(Vec<String>),

    #[error("{} invalid row(s) in upload", .0.len())]
    InvalidRows(Vec<RowIssue>),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {message}")]
    Conflict { resource: String, message: String },

    // Ledger errors
    #[error("Insufficient stock. Available: {available}, Requested: {requested}")]
    InsufficientStock { requested: i32, available: i32 },

    #[error("Batch {0} was modified by another sale")]
    ConcurrentModification(Uuid),

    #[error("Sale {sale_id} could not be rolled back: {cause}")]
    CompensationFailure { sale_id: Uuid, cause: String },

    // Storage errors
    #[error("Storage error: {0}")]
    Persistence(#[from] StoreError),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn conflict(resource: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Conflict {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Machine-readable error kind
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Validation { .. } | AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::MissingSkus(_) => "MISSING_SKUS",
            AppError::InvalidRows(_) => "INVALID_ROWS",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict { .. } => "CONFLICT",
            AppError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            AppError::ConcurrentModification(_) => "CONCURRENT_MODIFICATION",
            AppError::CompensationFailure { .. } => "COMPENSATION_FAILED",
            AppError::Persistence(StoreError::UniqueViolation(_)) => "CONFLICT",
            AppError::Persistence(StoreError::ForeignKeyViolation(_)) => "NOT_FOUND",
            AppError::Persistence(_) => "PERSISTENCE_ERROR",
            AppError::Internal(_) | AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Validation { .. }
            | AppError::ValidationError(_)
            | AppError::MissingSkus(_)
            | AppError::InvalidRows(_)
            | AppError::InsufficientStock { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } | AppError::ConcurrentModification(_) => {
                StatusCode::CONFLICT
            }
            AppError::Persistence(StoreError::UniqueViolation(_)) => StatusCode::CONFLICT,
            AppError::Persistence(StoreError::ForeignKeyViolation(_)) => StatusCode::NOT_FOUND,
            AppError::CompensationFailure { .. }
            | AppError::Persistence(_)
            | AppError::Internal(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}

/// A problem with one field of one uploaded row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowIssue {
    /// Line number in the uploaded file, counting the header as line 1
    pub row: usize,
    pub field: String,
    pub message: String,
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorDetail {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            field: None,
            details: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut detail = ErrorDetail::new(self.code(), self.to_string());

        match &self {
            AppError::Validation { field, message } => {
                detail.field = Some(field.clone());
                detail.message = message.clone();
            }
            AppError::ValidationError(msg) => detail.message = msg.clone(),
            AppError::MissingSkus(skus) => {
                detail.message = "Some SKUs do not match any of your products".to_string();
                detail.details = Some(json!({ "missing_skus": skus }));
            }
            AppError::InvalidRows(issues) => {
                detail.details = Some(json!({ "rows": issues }));
            }
            AppError::NotFound(resource) => detail.message = format!("{} not found", resource),
            AppError::Conflict { resource, message } => {
                detail.field = Some(resource.clone());
                detail.message = message.clone();
            }
            AppError::InsufficientStock {
                requested,
                available,
            } => {
                detail.details = Some(json!({ "requested": requested, "available": available }));
            }
            AppError::ConcurrentModification(batch_id) => {
                detail.message =
                    "Stock changed while the sale was being recorded; please retry".to_string();
                detail.details = Some(json!({ "batch_id": batch_id }));
            }
            AppError::CompensationFailure { sale_id, .. } => {
                detail.message =
                    "Sale could not be rolled back and needs manual repair".to_string();
                detail.details = Some(json!({ "sale_id": sale_id }));
            }
            AppError::Persistence(StoreError::UniqueViolation(_)) => {
                detail.message = "A record with these values already exists".to_string();
            }
            AppError::Persistence(StoreError::ForeignKeyViolation(_)) => {
                detail.message = "Referenced record not found".to_string();
            }
            AppError::Persistence(_) => {
                detail.message = "A database error occurred".to_string();
            }
            AppError::Internal(msg) => detail.message = msg.clone(),
            AppError::InternalError(_) => {
                detail.message = "An internal server error occurred".to_string();
            }
            AppError::Unauthorized(_) => {}
        }

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
