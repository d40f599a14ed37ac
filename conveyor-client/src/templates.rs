//! Template endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use conveyor_core::domain::template::PipelineTemplate;
use conveyor_core::dto::template::CreateTemplate;
use uuid::Uuid;

impl OrchestratorClient {
    /// Publish a template; an existing name gets a new version
    pub async fn create_template(&self, req: CreateTemplate) -> Result<PipelineTemplate> {
        let url = format!("{}/template/create", self.base_url);
        let response = self.client.post(&url).json(&req).send().await?;

        self.handle_response(response).await
    }

    pub async fn list_templates(&self) -> Result<Vec<PipelineTemplate>> {
        let url = format!("{}/template/list", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    pub async fn get_template(&self, id: Uuid) -> Result<PipelineTemplate> {
        let url = format!("{}/template/{}", self.base_url, id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }
}
