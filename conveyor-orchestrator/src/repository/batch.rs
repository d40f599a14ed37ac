//! Batch Repository
//!
//! A batch and its work items are written in one transaction, so workers
//! never observe a partially submitted batch.

use conveyor_core::domain::batch::{Batch, BatchType};
use conveyor_core::domain::item::WorkItem;
use sqlx::PgPool;
use uuid::Uuid;

use crate::repository::item_repository;

/// Insert a batch together with its initial work items
pub async fn create(pool: &PgPool, batch: &Batch, items: &[WorkItem]) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO batches (
            id, processing_method, data_source_type, template_ref,
            capability, element_count, retry_of, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(batch.id)
    .bind(batch.batch_type.processing_method.as_str())
    .bind(batch.batch_type.data_source_type.as_str())
    .bind(batch.template_ref)
    .bind(&batch.capability)
    .bind(batch.element_count)
    .bind(batch.retry_of)
    .bind(batch.created_at)
    .execute(&mut *tx)
    .await?;

    for item in items {
        item_repository::insert(&mut *tx, item).await?;
    }

    tx.commit().await?;

    Ok(())
}

/// Find a batch by ID
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Batch>, sqlx::Error> {
    let row = sqlx::query_as::<_, BatchRow>(
        r#"
        SELECT id, processing_method, data_source_type, template_ref,
               capability, element_count, retry_of, created_at
        FROM batches
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(Batch::try_from).transpose()
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct BatchRow {
    id: Uuid,
    processing_method: String,
    data_source_type: String,
    template_ref: Uuid,
    capability: String,
    element_count: i32,
    retry_of: Option<Uuid>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<BatchRow> for Batch {
    type Error = sqlx::Error;

    fn try_from(row: BatchRow) -> Result<Self, Self::Error> {
        let batch_type = BatchType::parse(&row.processing_method, &row.data_source_type)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        Ok(Batch {
            id: row.id,
            batch_type,
            template_ref: row.template_ref,
            capability: row.capability,
            element_count: row.element_count,
            retry_of: row.retry_of,
            created_at: row.created_at,
        })
    }
}
