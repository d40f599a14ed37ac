//! Pipeline template domain types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

/// Upper bound on per-step retries
pub const MAX_RETRY_COUNT: u32 = 100;

/// Named, ordered list of remote-service steps
///
/// Templates are immutable once stored. Publishing a template under an
/// existing name creates a new version with a new id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineTemplate {
    pub id: Uuid,
    pub name: String,
    pub version: i32,
    pub steps: Vec<ProcessingStep>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A single remote call in a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStep {
    #[serde(default)]
    pub name: Option<String>,
    /// Logical service name, resolved through the service registry
    pub service: String,
    /// Endpoint on the service, called as `POST <base>/<operation>`
    pub operation: String,
    /// Request field -> context path
    #[serde(default)]
    pub input_map: BTreeMap<String, String>,
    /// Context field -> response path
    #[serde(default)]
    pub output_map: BTreeMap<String, String>,
    #[serde(default)]
    pub retry_count: Option<u32>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Rollback operation on the same service, for steps with side effects
    #[serde(default)]
    pub compensation: Option<String>,
}

impl ProcessingStep {
    pub fn new(service: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            name: None,
            service: service.into(),
            operation: operation.into(),
            input_map: BTreeMap::new(),
            output_map: BTreeMap::new(),
            retry_count: None,
            timeout_ms: None,
            compensation: None,
        }
    }

    /// Human-readable label used in logs and error messages
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{}.{}", self.service, self.operation),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

impl PipelineTemplate {
    /// Validates the structural invariants of a template
    pub fn validate(name: &str, steps: &[ProcessingStep]) -> Result<(), String> {
        if name.trim().is_empty() {
            return Err("Template name cannot be empty".to_string());
        }

        if steps.is_empty() {
            return Err("Template must contain at least one step".to_string());
        }

        for (idx, step) in steps.iter().enumerate() {
            if step.service.trim().is_empty() {
                return Err(format!("Step {} has an empty service name", idx));
            }
            if step.operation.trim().is_empty() {
                return Err(format!("Step {} has an empty operation", idx));
            }
            if step.timeout_ms == Some(0) {
                return Err(format!("Step {} has a zero timeout", idx));
            }
            if step.retry_count.is_some_and(|count| count > MAX_RETRY_COUNT) {
                return Err(format!(
                    "Step {} retry_count exceeds the maximum of {}",
                    idx, MAX_RETRY_COUNT
                ));
            }
        }

        Ok(())
    }
}
