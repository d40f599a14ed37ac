//! In-memory stores for scheduler tests
//!
//! The item store takes a single lock around read-check-write, so
//! `compare_and_set` is atomic like the Postgres conditional update.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use conveyor_core::domain::item::{ItemStatus, WorkItem};
use conveyor_core::domain::template::PipelineTemplate;
use conveyor_core::dto::item::ItemUpdate;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use super::{TemplateRepository, WorkItemRepository};

#[derive(Default)]
pub struct InMemoryItemRepository {
    items: Mutex<HashMap<Uuid, WorkItem>>,
}

impl InMemoryItemRepository {
    pub fn with_items(items: impl IntoIterator<Item = WorkItem>) -> Self {
        Self {
            items: Mutex::new(items.into_iter().map(|item| (item.id, item)).collect()),
        }
    }

    pub fn snapshot(&self, id: Uuid) -> WorkItem {
        self.items.lock().unwrap()[&id].clone()
    }

    pub fn all(&self) -> Vec<WorkItem> {
        self.items.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl WorkItemRepository for InMemoryItemRepository {
    async fn list_by_status(
        &self,
        status: ItemStatus,
        capability: &str,
        limit: usize,
    ) -> Result<Vec<WorkItem>> {
        let mut found: Vec<WorkItem> = self
            .items
            .lock()
            .unwrap()
            .values()
            .filter(|item| item.status == status && item.capability == capability)
            .cloned()
            .collect();
        found.sort_by_key(|item| (item.created_at, item.sequence));
        found.truncate(limit);
        Ok(found)
    }

    async fn get(&self, id: Uuid) -> Result<WorkItem> {
        self.items
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| anyhow!("item {} not found", id))
    }

    async fn compare_and_set(
        &self,
        id: Uuid,
        expected: ItemStatus,
        update: ItemUpdate,
    ) -> Result<bool> {
        let mut items = self.items.lock().unwrap();
        let item = items
            .get_mut(&id)
            .ok_or_else(|| anyhow!("item {} not found", id))?;

        if item.status != expected {
            return Ok(false);
        }

        update.apply(item);
        Ok(true)
    }
}

#[derive(Default)]
pub struct InMemoryTemplateRepository {
    templates: Mutex<HashMap<Uuid, PipelineTemplate>>,
    fetches: Mutex<usize>,
}

impl InMemoryTemplateRepository {
    pub fn with_template(template: PipelineTemplate) -> Self {
        let repo = Self::default();
        repo.templates.lock().unwrap().insert(template.id, template);
        repo
    }

    pub fn fetches(&self) -> usize {
        *self.fetches.lock().unwrap()
    }
}

#[async_trait]
impl TemplateRepository for InMemoryTemplateRepository {
    async fn get_template(&self, id: Uuid) -> Result<PipelineTemplate> {
        *self.fetches.lock().unwrap() += 1;
        self.templates
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| anyhow!("template {} not found", id))
    }
}
