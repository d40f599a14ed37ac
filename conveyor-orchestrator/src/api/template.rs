//! Template API Handlers
//!
//! HTTP endpoints for publishing and reading pipeline templates.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use conveyor_core::domain::template::PipelineTemplate;
use conveyor_core::dto::template::CreateTemplate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::service::template_service::{self, TemplateError};

impl From<TemplateError> for ApiError {
    fn from(err: TemplateError) -> Self {
        match err {
            TemplateError::NotFound(id) => ApiError::NotFound(format!("Template {} not found", id)),
            TemplateError::ValidationError(msg) => ApiError::BadRequest(msg),
            TemplateError::DatabaseError(err) => ApiError::DatabaseError(err),
        }
    }
}

/// POST /template/create
/// Publish a template; an existing name gets a new version
pub async fn create_template(
    State(pool): State<PgPool>,
    Json(req): Json<CreateTemplate>,
) -> ApiResult<(StatusCode, Json<PipelineTemplate>)> {
    tracing::info!("Creating template: {}", req.name);

    let template = template_service::create_template(&pool, req).await?;

    Ok((StatusCode::CREATED, Json(template)))
}

/// GET /template/list
pub async fn list_templates(State(pool): State<PgPool>) -> ApiResult<Json<Vec<PipelineTemplate>>> {
    tracing::debug!("Listing templates");

    let templates = template_service::list_templates(&pool).await?;

    Ok(Json(templates))
}

/// GET /template/{id}
pub async fn get_template(
    State(pool): State<PgPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PipelineTemplate>> {
    tracing::debug!("Getting template: {}", id);

    let template = template_service::get_template(&pool, id).await?;

    Ok(Json(template))
}
