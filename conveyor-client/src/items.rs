//! Work item endpoints
//!
//! Used by workers to discover, claim and finish items.

use crate::OrchestratorClient;
use crate::error::Result;
use conveyor_core::domain::item::{ItemStatus, WorkItem};
use conveyor_core::dto::item::{ItemUpdate, ListItemsQuery, TransitionRequest, TransitionResponse};
use uuid::Uuid;

impl OrchestratorClient {
    /// List items matching the query, oldest first
    pub async fn list_items(&self, query: &ListItemsQuery) -> Result<Vec<WorkItem>> {
        let url = format!("{}/item/list", self.base_url);
        let response = self.client.get(&url).query(query).send().await?;

        self.handle_response(response).await
    }

    pub async fn get_item(&self, id: Uuid) -> Result<WorkItem> {
        let url = format!("{}/item/{}", self.base_url, id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Apply `update` only if the item is currently `expected_status`
    ///
    /// # Returns
    /// `true` if this call performed the transition
    pub async fn transition_item(
        &self,
        id: Uuid,
        expected_status: ItemStatus,
        update: ItemUpdate,
    ) -> Result<bool> {
        let url = format!("{}/item/{}/transition", self.base_url, id);
        let response = self
            .client
            .post(&url)
            .json(&TransitionRequest {
                expected_status,
                update,
            })
            .send()
            .await?;

        let outcome: TransitionResponse = self.handle_response(response).await?;
        tracing::debug!("Transition of item {} applied: {}", id, outcome.applied);
        Ok(outcome.applied)
    }
}
