//! Pipeline execution engine
//!
//! Runs a template's steps over every element of a batch:
//! - Elements are partitioned into chunks of `chunk_size`
//! - Chunks and the elements inside them run concurrently, with at most
//!   `max_workers` element pipelines (and therefore remote calls) in flight
//! - Each step resolves its service, projects the context, and calls the
//!   remote operation under a timeout, re-issuing the call on timeout
//! - A failing element is recorded as an error result; siblings keep going
//!
//! The returned results always match the submitted elements one-to-one, in
//! submission order.

use anyhow::Result;
use conveyor_core::domain::item::ItemElement;
use conveyor_core::domain::result::ExecutionResult;
use conveyor_core::domain::template::{MAX_RETRY_COUNT, PipelineTemplate, ProcessingStep};
use futures::future::join_all;
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::chunk::{chunk, chunk_count};
use crate::client::ServiceClient;
use crate::error::ExecutionError;
use crate::projection::{merge_output, project_input};
use crate::registry::ServiceRegistry;

/// Engine tuning
///
/// Step-level `timeout_ms` / `retry_count` override the defaults here.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Elements per chunk
    pub chunk_size: usize,
    /// Maximum element pipelines in flight
    pub max_workers: usize,
    pub default_timeout: Duration,
    pub default_retry_count: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 10,
            max_workers: 4,
            default_timeout: Duration::from_secs(30),
            default_retry_count: 0,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            anyhow::bail!("chunk_size must be greater than 0");
        }

        if self.max_workers == 0 {
            anyhow::bail!("max_workers must be greater than 0");
        }

        if self.default_timeout.is_zero() {
            anyhow::bail!("default_timeout must be greater than 0");
        }

        if self.default_retry_count > MAX_RETRY_COUNT {
            anyhow::bail!("default_retry_count must be at most {}", MAX_RETRY_COUNT);
        }

        Ok(())
    }
}

pub struct PipelineEngine {
    registry: Arc<ServiceRegistry>,
    client: Arc<dyn ServiceClient>,
    config: EngineConfig,
}

impl PipelineEngine {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        client: Arc<dyn ServiceClient>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            client,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Executes `template` over `items`, one result per item in input order
    pub async fn execute_batch(
        &self,
        template: &PipelineTemplate,
        items: Vec<ItemElement>,
    ) -> Vec<ExecutionResult> {
        let total = items.len();
        let chunks = chunk_count(total, self.config.chunk_size);

        info!(
            "Executing template '{}' v{} over {} item(s) in {} chunk(s)",
            template.name, template.version, total, chunks
        );

        let semaphore = Semaphore::new(self.config.max_workers);
        let indexed: Vec<(usize, ItemElement)> = items.into_iter().enumerate().collect();

        let chunk_runs = chunk(indexed, self.config.chunk_size)
            .into_iter()
            .enumerate()
            .map(|(chunk_idx, members)| {
                self.execute_chunk(template, chunk_idx, chunks, members, &semaphore)
            });

        let mut results: Vec<(usize, ExecutionResult)> =
            join_all(chunk_runs).await.into_iter().flatten().collect();

        // Completion order is arbitrary; restore submission order
        results.sort_by_key(|(index, _)| *index);

        let failed = results.iter().filter(|(_, r)| r.is_error()).count();
        info!(
            "Template '{}' finished: {} succeeded, {} failed",
            template.name,
            total - failed,
            failed
        );

        results.into_iter().map(|(_, result)| result).collect()
    }

    async fn execute_chunk(
        &self,
        template: &PipelineTemplate,
        chunk_idx: usize,
        chunks: usize,
        members: Vec<(usize, ItemElement)>,
        semaphore: &Semaphore,
    ) -> Vec<(usize, ExecutionResult)> {
        let size = members.len();

        let runs = members.into_iter().map(|(index, item)| async move {
            // The semaphore is owned by execute_batch and never closed
            let _permit = semaphore.acquire().await.ok();
            (index, self.process_item(template, item).await)
        });

        let results = join_all(runs).await;
        debug!(
            "Chunk {}/{} done ({} item(s))",
            chunk_idx + 1,
            chunks,
            size
        );
        results
    }

    /// Folds one item through every step of the template
    pub async fn process_item(
        &self,
        template: &PipelineTemplate,
        item: ItemElement,
    ) -> ExecutionResult {
        let mut context = item.payload.clone();

        for (idx, step) in template.steps.iter().enumerate() {
            context = match self.execute_step(idx, step, context).await {
                Ok(next) => next,
                Err(error) => return self.handle_error(item, error),
            };
        }

        ExecutionResult::success(item.id, context)
    }

    /// Runs a single step against the running context
    pub async fn execute_step(
        &self,
        index: usize,
        step: &ProcessingStep,
        mut context: Map<String, JsonValue>,
    ) -> Result<Map<String, JsonValue>, ExecutionError> {
        let base_address =
            self.registry
                .resolve(&step.service)
                .ok_or_else(|| ExecutionError::ServiceNotFound {
                    step: index,
                    label: step.label(),
                    service: step.service.clone(),
                })?;

        let request = project_input(&context, &step.input_map);
        let timeout = step.timeout().unwrap_or(self.config.default_timeout);
        let attempts = step
            .retry_count
            .unwrap_or(self.config.default_retry_count)
            .saturating_add(1);

        for attempt in 1..=attempts {
            debug!(
                "Calling {}/{} (attempt {}/{})",
                step.service, step.operation, attempt, attempts
            );

            let call = self.client.invoke(base_address, &step.operation, &request);
            let response = match tokio::time::timeout(timeout, call).await {
                Ok(response) => response,
                Err(_) => {
                    warn!(
                        "Step '{}' timed out after {:?} (attempt {}/{})",
                        step.label(),
                        timeout,
                        attempt,
                        attempts
                    );
                    continue;
                }
            };

            let response = response.map_err(|e| ExecutionError::ProcessingError {
                step: index,
                label: step.label(),
                status: None,
                body: e.to_string(),
            })?;

            if !response.is_success() {
                let body = match response.body {
                    JsonValue::String(text) => text,
                    other => other.to_string(),
                };
                return Err(ExecutionError::ProcessingError {
                    step: index,
                    label: step.label(),
                    status: Some(response.status),
                    body,
                });
            }

            merge_output(&mut context, &response.body, &step.output_map);
            return Ok(context);
        }

        Err(ExecutionError::Timeout {
            step: index,
            label: step.label(),
            attempts,
        })
    }

    /// Records a failed item, keeping its original payload
    pub fn handle_error(&self, item: ItemElement, error: ExecutionError) -> ExecutionResult {
        warn!("Item {} failed: {}", item.id, error);
        ExecutionResult::error(item.id, item.payload, error.to_record())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert_eq!(config.chunk_size, 10);
        assert_eq!(config.max_workers, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();

        config.chunk_size = 0;
        assert!(config.validate().is_err());
        config.chunk_size = 5;

        config.max_workers = 0;
        assert!(config.validate().is_err());
        config.max_workers = 1;

        config.default_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
        config.default_timeout = Duration::from_secs(1);

        config.default_retry_count = u32::MAX;
        assert!(config.validate().is_err());
    }
}
