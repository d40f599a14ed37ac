//! Template repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use conveyor_client::OrchestratorClient;
use conveyor_core::domain::template::PipelineTemplate;
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait TemplateRepository: Send + Sync {
    async fn get_template(&self, id: Uuid) -> Result<PipelineTemplate>;
}

/// Template store backed by the orchestrator API
pub struct HttpTemplateRepository {
    client: Arc<OrchestratorClient>,
}

impl HttpTemplateRepository {
    pub fn new(client: Arc<OrchestratorClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TemplateRepository for HttpTemplateRepository {
    async fn get_template(&self, id: Uuid) -> Result<PipelineTemplate> {
        self.client
            .get_template(id)
            .await
            .with_context(|| format!("Failed to fetch template {}", id))
    }
}
