//! Capability-tagged processors

use anyhow::{Context, Result};
use async_trait::async_trait;
use conveyor_core::domain::item::WorkItem;
use conveyor_core::domain::result::ItemResult;
use conveyor_core::domain::template::PipelineTemplate;
use conveyor_engine::PipelineEngine;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::repository::TemplateRepository;

/// Processes one claimed work item
///
/// Element-level failures belong in the returned `ItemResult`. An `Err`
/// means the item could not be processed at all and fails as a whole.
#[async_trait]
pub trait Processor: Send + Sync {
    async fn process(&self, item: &WorkItem) -> Result<ItemResult>;
}

/// Runs the item's pipeline template through the execution engine
pub struct PipelineProcessor {
    templates: Arc<dyn TemplateRepository>,
    engine: Arc<PipelineEngine>,
    /// Templates are immutable per id
    cache: RwLock<HashMap<Uuid, Arc<PipelineTemplate>>>,
}

impl PipelineProcessor {
    pub fn new(templates: Arc<dyn TemplateRepository>, engine: Arc<PipelineEngine>) -> Self {
        Self {
            templates,
            engine,
            cache: RwLock::new(HashMap::new()),
        }
    }

    async fn template(&self, id: Uuid) -> Result<Arc<PipelineTemplate>> {
        if let Some(template) = self.cache.read().await.get(&id) {
            return Ok(Arc::clone(template));
        }

        let template = Arc::new(
            self.templates
                .get_template(id)
                .await
                .context("Failed to load pipeline template")?,
        );
        debug!("Cached template '{}' v{} ({})", template.name, template.version, id);

        self.cache.write().await.insert(id, Arc::clone(&template));
        Ok(template)
    }
}

#[async_trait]
impl Processor for PipelineProcessor {
    async fn process(&self, item: &WorkItem) -> Result<ItemResult> {
        let template = self.template(item.template_ref).await?;
        let elements = item.elements();

        info!(
            "Processing item {} ({}, {} element(s)) with template '{}'",
            item.id,
            item.batch_type,
            elements.len(),
            template.name
        );

        let results = self.engine.execute_batch(&template, elements).await;
        Ok(ItemResult::from_results(results))
    }
}

/// Maps capabilities to processors
#[derive(Default, Clone)]
pub struct ProcessorRegistry {
    processors: HashMap<String, Arc<dyn Processor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, capability: impl Into<String>, processor: Arc<dyn Processor>) {
        self.processors.insert(capability.into(), processor);
    }

    pub fn with_processor(
        mut self,
        capability: impl Into<String>,
        processor: Arc<dyn Processor>,
    ) -> Self {
        self.register(capability, processor);
        self
    }

    pub fn resolve(&self, capability: &str) -> Option<Arc<dyn Processor>> {
        self.processors.get(capability).cloned()
    }

    pub fn capabilities(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.processors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
