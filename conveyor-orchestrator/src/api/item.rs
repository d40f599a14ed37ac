//! Work Item API Handlers
//!
//! Read access for operators and the compare-and-set used by workers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use conveyor_core::domain::item::WorkItem;
use conveyor_core::dto::item::{ListItemsQuery, TransitionRequest, TransitionResponse};
use sqlx::PgPool;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::service::item_service::{self, ItemError};

impl From<ItemError> for ApiError {
    fn from(err: ItemError) -> Self {
        match err {
            ItemError::NotFound(id) => ApiError::NotFound(format!("Work item {} not found", id)),
            ItemError::DatabaseError(err) => ApiError::DatabaseError(err),
        }
    }
}

/// GET /item/list
///
/// Query parameters:
/// - `status` (optional): one of pending, processing, completed, failed
/// - `capability` (optional): only items requiring this worker type
/// - `limit` (optional): defaults to 100, capped at 1000
pub async fn list_items(
    State(pool): State<PgPool>,
    Query(query): Query<ListItemsQuery>,
) -> ApiResult<Json<Vec<WorkItem>>> {
    tracing::debug!(
        "Listing items (status={:?}, capability={:?}, limit={:?})",
        query.status,
        query.capability,
        query.limit
    );

    let items = item_service::list_items(&pool, query).await?;

    Ok(Json(items))
}

/// GET /item/{id}
pub async fn get_item(State(pool): State<PgPool>, Path(id): Path<Uuid>) -> ApiResult<Json<WorkItem>> {
    tracing::debug!("Getting item: {}", id);

    let item = item_service::get_item(&pool, id).await?;

    Ok(Json(item))
}

/// POST /item/{id}/transition
/// Compare-and-set; `applied: false` when the item was not in the expected status
pub async fn transition_item(
    State(pool): State<PgPool>,
    Path(id): Path<Uuid>,
    Json(req): Json<TransitionRequest>,
) -> ApiResult<Json<TransitionResponse>> {
    tracing::debug!(
        "Transition for item {}: {} -> {}",
        id,
        req.expected_status,
        req.update.status
    );

    let applied = item_service::transition_item(&pool, id, req).await?;

    Ok(Json(TransitionResponse { applied }))
}
