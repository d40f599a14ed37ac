use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Templates are append-only; a name accumulates versions
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS templates (
            id UUID PRIMARY KEY,
            name VARCHAR(255) NOT NULL,
            version INTEGER NOT NULL,
            steps JSONB NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            UNIQUE (name, version)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS batches (
            id UUID PRIMARY KEY,
            processing_method VARCHAR(32) NOT NULL,
            data_source_type VARCHAR(32) NOT NULL,
            template_ref UUID NOT NULL REFERENCES templates(id),
            capability VARCHAR(255) NOT NULL,
            element_count INTEGER NOT NULL,
            retry_of UUID REFERENCES batches(id),
            created_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS work_items (
            id UUID PRIMARY KEY,
            batch_id UUID NOT NULL REFERENCES batches(id) ON DELETE CASCADE,
            sequence INTEGER NOT NULL,
            status VARCHAR(20) NOT NULL,
            owner VARCHAR(255),
            claimed_at TIMESTAMPTZ,
            completed_at TIMESTAMPTZ,
            capability VARCHAR(255) NOT NULL,
            template_ref UUID NOT NULL,
            processing_method VARCHAR(32) NOT NULL,
            data_source_type VARCHAR(32) NOT NULL,
            payload JSONB NOT NULL,
            result JSONB,
            created_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Worker polling: pending items of one capability, oldest first
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_work_items_status_capability ON work_items(status, capability, created_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_work_items_batch_id ON work_items(batch_id, sequence)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_batches_retry_of ON batches(retry_of)")
        .execute(pool)
        .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
