//! Item Service
//!
//! Read access and compare-and-set transitions for work items.

use conveyor_core::domain::item::WorkItem;
use conveyor_core::dto::item::{ListItemsQuery, TransitionRequest};
use sqlx::PgPool;
use uuid::Uuid;

use crate::repository::item_repository;

pub const DEFAULT_LIST_LIMIT: i64 = 100;
pub const MAX_LIST_LIMIT: i64 = 1000;

/// Service error type
#[derive(Debug)]
pub enum ItemError {
    NotFound(Uuid),
    DatabaseError(sqlx::Error),
}

impl From<sqlx::Error> for ItemError {
    fn from(err: sqlx::Error) -> Self {
        ItemError::DatabaseError(err)
    }
}

pub type Result<T> = std::result::Result<T, ItemError>;

pub async fn get_item(pool: &PgPool, id: Uuid) -> Result<WorkItem> {
    let item = item_repository::find_by_id(pool, id)
        .await?
        .ok_or(ItemError::NotFound(id))?;

    Ok(item)
}

pub async fn list_items(pool: &PgPool, query: ListItemsQuery) -> Result<Vec<WorkItem>> {
    let items = item_repository::list(
        pool,
        query.status,
        query.capability.as_deref(),
        clamp_limit(query.limit),
    )
    .await?;

    Ok(items)
}

/// Compare-and-set; `Ok(false)` means the item was not in the expected status
pub async fn transition_item(pool: &PgPool, id: Uuid, req: TransitionRequest) -> Result<bool> {
    let applied =
        item_repository::compare_and_set(pool, id, req.expected_status, &req.update).await?;

    if applied {
        tracing::info!(
            "Item {} transitioned {} -> {}",
            id,
            req.expected_status,
            req.update.status
        );
        return Ok(true);
    }

    // Distinguish a lost race from an unknown id
    let current = get_item(pool, id).await?;
    tracing::debug!(
        "Transition of item {} rejected: expected {}, found {}",
        id,
        req.expected_status,
        current.status
    );

    Ok(false)
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}
