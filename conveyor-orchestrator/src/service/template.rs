//! Template Service
//!
//! Publishing and lookup of pipeline templates.

use conveyor_core::domain::template::PipelineTemplate;
use conveyor_core::dto::template::CreateTemplate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::repository::template_repository;

/// Service error type
#[derive(Debug)]
pub enum TemplateError {
    NotFound(Uuid),
    ValidationError(String),
    DatabaseError(sqlx::Error),
}

impl From<sqlx::Error> for TemplateError {
    fn from(err: sqlx::Error) -> Self {
        TemplateError::DatabaseError(err)
    }
}

pub type Result<T> = std::result::Result<T, TemplateError>;

/// Publish a template, as a new version if the name already exists
pub async fn create_template(pool: &PgPool, req: CreateTemplate) -> Result<PipelineTemplate> {
    validate_template_request(&req)?;

    let template = template_repository::create(pool, req.name.trim(), req.steps).await?;

    tracing::info!(
        "Template created: {} v{} ({}, {} step(s))",
        template.name,
        template.version,
        template.id,
        template.steps.len()
    );

    Ok(template)
}

pub async fn get_template(pool: &PgPool, id: Uuid) -> Result<PipelineTemplate> {
    let template = template_repository::find_by_id(pool, id)
        .await?
        .ok_or(TemplateError::NotFound(id))?;

    Ok(template)
}

pub async fn list_templates(pool: &PgPool) -> Result<Vec<PipelineTemplate>> {
    let templates = template_repository::list_all(pool).await?;
    Ok(templates)
}

// =============================================================================
// Validation
// =============================================================================

fn validate_template_request(req: &CreateTemplate) -> Result<()> {
    if req.name.len() > 255 {
        return Err(TemplateError::ValidationError(
            "Template name is too long (max 255 characters)".to_string(),
        ));
    }

    PipelineTemplate::validate(&req.name, &req.steps).map_err(TemplateError::ValidationError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use conveyor_core::domain::template::ProcessingStep;

    fn request(name: &str, steps: Vec<ProcessingStep>) -> CreateTemplate {
        CreateTemplate {
            name: name.to_string(),
            steps,
        }
    }

    #[test]
    fn test_validation_accepts_well_formed_template() {
        let req = request("outreach", vec![ProcessingStep::new("analysis", "score")]);
        assert!(validate_template_request(&req).is_ok());
    }

    #[test]
    fn test_validation_rejects_long_names_and_empty_steps() {
        let long = request(&"x".repeat(256), vec![ProcessingStep::new("a", "b")]);
        assert!(matches!(
            validate_template_request(&long),
            Err(TemplateError::ValidationError(_))
        ));

        let empty = request("outreach", vec![]);
        assert!(matches!(
            validate_template_request(&empty),
            Err(TemplateError::ValidationError(msg)) if msg.contains("at least one step")
        ));
    }
}
