//! Batch API Handlers
//!
//! HTTP endpoints for batch submission, status and the advisory
//! retry/compensation operations.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use conveyor_core::dto::batch::{BatchReceipt, BatchStatusReport, CompensationEntry, SubmitBatch};
use sqlx::PgPool;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::service::batch_service::{self, BatchError};

impl From<BatchError> for ApiError {
    fn from(err: BatchError) -> Self {
        match err {
            BatchError::NotFound(id) => ApiError::NotFound(format!("Batch {} not found", id)),
            BatchError::TemplateNotFound(id) => {
                ApiError::NotFound(format!("Template {} not found", id))
            }
            BatchError::ValidationError(msg) => ApiError::BadRequest(msg),
            BatchError::NothingToRetry(id) => {
                ApiError::BadRequest(format!("Batch {} has no retriable elements", id))
            }
            BatchError::DatabaseError(err) => ApiError::DatabaseError(err),
        }
    }
}

/// POST /batch/submit
pub async fn submit_batch(
    State(pool): State<PgPool>,
    Json(req): Json<SubmitBatch>,
) -> ApiResult<(StatusCode, Json<BatchReceipt>)> {
    tracing::info!(
        "Submitting batch: {}/{} with {} element(s) for template {}",
        req.processing_method,
        req.data_source_type,
        req.items.len(),
        req.template_ref
    );

    let receipt = batch_service::submit_batch(&pool, req).await?;

    Ok((StatusCode::CREATED, Json(receipt)))
}

/// GET /batch/{id}
pub async fn get_batch_status(
    State(pool): State<PgPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<BatchStatusReport>> {
    tracing::debug!("Getting batch status: {}", id);

    let report = batch_service::get_batch_status(&pool, id).await?;

    Ok(Json(report))
}

/// POST /batch/{id}/retry
/// Resubmit retriable error elements as a new batch
pub async fn retry_batch(
    State(pool): State<PgPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<BatchReceipt>)> {
    tracing::info!("Retrying batch: {}", id);

    let receipt = batch_service::retry_batch(&pool, id).await?;

    Ok((StatusCode::CREATED, Json(receipt)))
}

/// GET /batch/{id}/compensation
pub async fn get_compensation(
    State(pool): State<PgPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<CompensationEntry>>> {
    tracing::debug!("Getting compensation plans for batch: {}", id);

    let entries = batch_service::get_compensation(&pool, id).await?;

    Ok(Json(entries))
}
