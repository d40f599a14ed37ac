//! Work item repository
//!
//! - Listing pending items for a capability
//! - Point reads
//! - Compare-and-set status transitions

use anyhow::{Context, Result};
use async_trait::async_trait;
use conveyor_client::OrchestratorClient;
use conveyor_core::domain::item::{ItemStatus, WorkItem};
use conveyor_core::dto::item::{ItemUpdate, ListItemsQuery};
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait WorkItemRepository: Send + Sync {
    /// Lists up to `limit` items in `status` requiring `capability`
    async fn list_by_status(
        &self,
        status: ItemStatus,
        capability: &str,
        limit: usize,
    ) -> Result<Vec<WorkItem>>;

    async fn get(&self, id: Uuid) -> Result<WorkItem>;

    /// Applies `update` only if the item is still in `expected`
    ///
    /// Must be atomic in the store. Returns whether this call won.
    async fn compare_and_set(&self, id: Uuid, expected: ItemStatus, update: ItemUpdate)
    -> Result<bool>;
}

/// Work item store backed by the orchestrator API
pub struct HttpWorkItemRepository {
    client: Arc<OrchestratorClient>,
}

impl HttpWorkItemRepository {
    pub fn new(client: Arc<OrchestratorClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WorkItemRepository for HttpWorkItemRepository {
    async fn list_by_status(
        &self,
        status: ItemStatus,
        capability: &str,
        limit: usize,
    ) -> Result<Vec<WorkItem>> {
        let query = ListItemsQuery {
            status: Some(status),
            capability: Some(capability.to_string()),
            limit: Some(i64::try_from(limit).unwrap_or(i64::MAX)),
        };

        self.client
            .list_items(&query)
            .await
            .with_context(|| format!("Failed to list {} items for '{}'", status, capability))
    }

    async fn get(&self, id: Uuid) -> Result<WorkItem> {
        self.client
            .get_item(id)
            .await
            .with_context(|| format!("Failed to fetch item {}", id))
    }

    async fn compare_and_set(
        &self,
        id: Uuid,
        expected: ItemStatus,
        update: ItemUpdate,
    ) -> Result<bool> {
        let target = update.status;
        self.client
            .transition_item(id, expected, update)
            .await
            .with_context(|| format!("Failed to transition item {} {} -> {}", id, expected, target))
    }
}
