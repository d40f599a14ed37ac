//! Template Repository
//!
//! Templates are immutable rows. Publishing under an existing name inserts
//! the next version instead of updating in place.

use conveyor_core::domain::template::{PipelineTemplate, ProcessingStep};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

/// Insert a new template version
pub async fn create(
    pool: &PgPool,
    name: &str,
    steps: Vec<ProcessingStep>,
) -> Result<PipelineTemplate, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let version: i32 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(version), 0) + 1 FROM templates WHERE name = $1",
    )
    .bind(name)
    .fetch_one(&mut *tx)
    .await?;

    let template = PipelineTemplate {
        id: Uuid::new_v4(),
        name: name.to_string(),
        version,
        steps,
        created_at: chrono::Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO templates (id, name, version, steps, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(template.id)
    .bind(&template.name)
    .bind(template.version)
    .bind(Json(&template.steps))
    .bind(template.created_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(template)
}

/// Find a template by ID
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<PipelineTemplate>, sqlx::Error> {
    let row = sqlx::query_as::<_, TemplateRow>(
        r#"
        SELECT id, name, version, steps, created_at
        FROM templates
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// List all templates, newest version of each name first
pub async fn list_all(pool: &PgPool) -> Result<Vec<PipelineTemplate>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TemplateRow>(
        r#"
        SELECT id, name, version, steps, created_at
        FROM templates
        ORDER BY name ASC, version DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct TemplateRow {
    id: Uuid,
    name: String,
    version: i32,
    steps: Json<Vec<ProcessingStep>>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<TemplateRow> for PipelineTemplate {
    fn from(row: TemplateRow) -> Self {
        PipelineTemplate {
            id: row.id,
            name: row.name,
            version: row.version,
            steps: row.steps.0,
            created_at: row.created_at,
        }
    }
}
