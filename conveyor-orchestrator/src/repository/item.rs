//! Work Item Repository
//!
//! Handles all database operations related to work items. Status changes go
//! through `compare_and_set`, a single conditional UPDATE.

use chrono::{DateTime, Utc};
use conveyor_core::domain::batch::BatchType;
use conveyor_core::domain::item::{ItemStatus, WorkItem};
use conveyor_core::domain::result::ItemResult;
use conveyor_core::dto::item::ItemUpdate;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

const SELECT_COLUMNS: &str = r#"
    SELECT id, batch_id, sequence, status, owner, claimed_at, completed_at,
           capability, template_ref, processing_method, data_source_type,
           payload, result, created_at
    FROM work_items
"#;

/// Insert a work item (inside the submitting transaction)
pub async fn insert(conn: &mut PgConnection, item: &WorkItem) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO work_items (
            id, batch_id, sequence, status, owner, claimed_at, completed_at,
            capability, template_ref, processing_method, data_source_type,
            payload, result, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        "#,
    )
    .bind(item.id)
    .bind(item.batch_id)
    .bind(item.sequence)
    .bind(item.status.as_str())
    .bind(item.owner.as_deref())
    .bind(item.claimed_at)
    .bind(item.completed_at)
    .bind(&item.capability)
    .bind(item.template_ref)
    .bind(item.batch_type.processing_method.as_str())
    .bind(item.batch_type.data_source_type.as_str())
    .bind(&item.payload)
    .bind(item.result.as_ref().map(Json))
    .bind(item.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Find a work item by ID
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<WorkItem>, sqlx::Error> {
    let row = sqlx::query_as::<_, WorkItemRow>(&format!("{} WHERE id = $1", SELECT_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.map(WorkItem::try_from).transpose()
}

/// List items, optionally filtered by status and capability, oldest first
pub async fn list(
    pool: &PgPool,
    status: Option<ItemStatus>,
    capability: Option<&str>,
    limit: i64,
) -> Result<Vec<WorkItem>, sqlx::Error> {
    let rows = sqlx::query_as::<_, WorkItemRow>(&format!(
        r#"{}
        WHERE ($1::TEXT IS NULL OR status = $1)
          AND ($2::TEXT IS NULL OR capability = $2)
        ORDER BY created_at ASC, sequence ASC
        LIMIT $3
        "#,
        SELECT_COLUMNS
    ))
    .bind(status.map(|s| s.as_str()))
    .bind(capability)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(WorkItem::try_from).collect()
}

/// All items of a batch in submission order
pub async fn find_by_batch(pool: &PgPool, batch_id: Uuid) -> Result<Vec<WorkItem>, sqlx::Error> {
    let rows = sqlx::query_as::<_, WorkItemRow>(&format!(
        "{} WHERE batch_id = $1 ORDER BY sequence ASC",
        SELECT_COLUMNS
    ))
    .bind(batch_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(WorkItem::try_from).collect()
}

/// Items still `processing` that were claimed before `claimed_before`
pub async fn find_stale_processing(
    pool: &PgPool,
    claimed_before: DateTime<Utc>,
) -> Result<Vec<WorkItem>, sqlx::Error> {
    let rows = sqlx::query_as::<_, WorkItemRow>(&format!(
        "{} WHERE status = $1 AND claimed_at < $2 ORDER BY claimed_at ASC",
        SELECT_COLUMNS
    ))
    .bind(ItemStatus::Processing.as_str())
    .bind(claimed_before)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(WorkItem::try_from).collect()
}

/// Apply `update` only if the item is currently in `expected`
///
/// `None` fields keep their stored value and `clear_owner` empties the
/// owner. Returns whether a row changed.
pub async fn compare_and_set(
    pool: &PgPool,
    id: Uuid,
    expected: ItemStatus,
    update: &ItemUpdate,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE work_items
        SET status = $1,
            owner = CASE WHEN $8 THEN NULL ELSE COALESCE($2, owner) END,
            claimed_at = COALESCE($3, claimed_at),
            completed_at = COALESCE($4, completed_at),
            result = COALESCE($5, result)
        WHERE id = $6 AND status = $7
        "#,
    )
    .bind(update.status.as_str())
    .bind(update.owner.as_deref())
    .bind(update.claimed_at)
    .bind(update.completed_at)
    .bind(update.result.as_ref().map(Json))
    .bind(id)
    .bind(expected.as_str())
    .bind(update.clear_owner)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct WorkItemRow {
    id: Uuid,
    batch_id: Uuid,
    sequence: i32,
    status: String,
    owner: Option<String>,
    claimed_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    capability: String,
    template_ref: Uuid,
    processing_method: String,
    data_source_type: String,
    payload: serde_json::Value,
    result: Option<Json<ItemResult>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<WorkItemRow> for WorkItem {
    type Error = sqlx::Error;

    fn try_from(row: WorkItemRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<ItemStatus>()
            .map_err(|e| sqlx::Error::Decode(e.into()))?;
        let batch_type = BatchType::parse(&row.processing_method, &row.data_source_type)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        Ok(WorkItem {
            id: row.id,
            batch_id: row.batch_id,
            sequence: row.sequence,
            status,
            owner: row.owner,
            claimed_at: row.claimed_at,
            completed_at: row.completed_at,
            capability: row.capability,
            template_ref: row.template_ref,
            batch_type,
            payload: row.payload,
            result: row.result.map(|Json(result)| result),
            created_at: row.created_at,
        })
    }
}
