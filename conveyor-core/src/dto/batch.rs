//! Batch DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::compensation::CompensationPlan;
use crate::domain::result::{BatchStatus, ExecutionResult};

/// Request to submit a batch of elements for processing
///
/// The method and source are free-form strings validated by the batch
/// classifier, so unknown values come back as a descriptive 400.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitBatch {
    pub processing_method: String,
    pub data_source_type: String,
    pub template_ref: Uuid,
    pub capability: String,
    pub items: Vec<serde_json::Value>,
}

/// Returned once a batch is accepted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReceipt {
    pub batch_id: Uuid,
    pub item_count: usize,
}

/// Current state of a batch
///
/// `per_item_results` is only present once every work item is terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchStatusReport {
    pub batch_id: Uuid,
    pub status: BatchStatus,
    pub total_items: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_item_results: Option<Vec<ExecutionResult>>,
}

/// Compensation advice for one failed element
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompensationEntry {
    pub item_id: String,
    pub failed_step: usize,
    pub plan: CompensationPlan,
}
