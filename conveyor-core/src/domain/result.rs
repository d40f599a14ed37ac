//! Execution result types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::domain::item::{ItemStatus, WorkItem};

/// Classification of a failed element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Step names a service missing from the registry
    ServiceNotFound,
    /// Step call timed out on every attempt
    Timeout,
    /// Remote service rejected the call or could not be reached
    ProcessingError,
    /// Item failed without producing results
    WorkerCrash,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ServiceNotFound => "SERVICE_NOT_FOUND",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::ProcessingError => "PROCESSING_ERROR",
            ErrorKind::WorkerCrash => "WORKER_CRASH",
        }
    }

    /// Whether a resubmission can reasonably succeed without changing anything
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorKind::Timeout | ErrorKind::WorkerCrash)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error attached to a failed element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub message: String,
    /// Index of the failing step in the template, if a step failed
    pub step: Option<usize>,
    /// Whether the batch-level retry layer may resubmit this element
    pub retriable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Error,
}

/// Outcome of running a pipeline over one element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub item_id: String,
    pub status: ExecutionStatus,
    /// Final context on success, the original payload on error
    pub output: Map<String, JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorRecord>,
}

impl ExecutionResult {
    pub fn success(item_id: impl Into<String>, output: Map<String, JsonValue>) -> Self {
        Self {
            item_id: item_id.into(),
            status: ExecutionStatus::Success,
            output,
            error: None,
        }
    }

    pub fn error(
        item_id: impl Into<String>,
        original_payload: Map<String, JsonValue>,
        error: ErrorRecord,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            status: ExecutionStatus::Error,
            output: original_payload,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == ExecutionStatus::Error
    }
}

/// Error record written when an item fails outside the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub kind: ErrorKind,
    pub message: String,
    pub owner: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl FailureRecord {
    pub fn worker_crash(message: impl Into<String>, owner: Option<String>) -> Self {
        Self {
            kind: ErrorKind::WorkerCrash,
            message: message.into(),
            owner,
            timestamp: Utc::now(),
        }
    }
}

/// Result stored on a work item once it reaches a terminal status
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemResult {
    #[serde(default)]
    pub results: Vec<ExecutionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureRecord>,
}

impl ItemResult {
    pub fn from_results(results: Vec<ExecutionResult>) -> Self {
        Self {
            results,
            failure: None,
        }
    }

    pub fn from_failure(failure: FailureRecord) -> Self {
        Self {
            results: Vec::new(),
            failure: Some(failure),
        }
    }

    /// Terminal status for the owning item
    ///
    /// An item fails only when nothing in it succeeded; mixed outcomes complete
    /// and stay visible in `results`.
    pub fn terminal_status(&self) -> ItemStatus {
        if self.failure.is_some() || self.results.iter().all(ExecutionResult::is_error) {
            ItemStatus::Failed
        } else {
            ItemStatus::Completed
        }
    }
}

/// Aggregate status of a submitted batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    Processing,
    Completed,
    PartiallyFailed,
    Failed,
}

impl BatchStatus {
    /// Derives the batch status from its work items
    pub fn derive(items: &[WorkItem]) -> Self {
        if items.iter().all(|item| item.status == ItemStatus::Pending) {
            return BatchStatus::Pending;
        }

        if items.iter().any(|item| !item.status.is_terminal()) {
            return BatchStatus::Processing;
        }

        let results: Vec<ExecutionResult> =
            items.iter().flat_map(WorkItem::element_results).collect();
        let succeeded = results.iter().filter(|r| r.is_success()).count();

        if succeeded == results.len() && !results.is_empty() {
            BatchStatus::Completed
        } else if succeeded == 0 {
            BatchStatus::Failed
        } else {
            BatchStatus::PartiallyFailed
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            BatchStatus::Completed | BatchStatus::PartiallyFailed | BatchStatus::Failed
        )
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Processing => "processing",
            BatchStatus::Completed => "completed",
            BatchStatus::PartiallyFailed => "partially_failed",
            BatchStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Flattens the element results of a batch in submission order
pub fn collect_results(items: &[WorkItem]) -> Vec<ExecutionResult> {
    let mut ordered: Vec<&WorkItem> = items.iter().collect();
    ordered.sort_by_key(|item| item.sequence);
    ordered
        .into_iter()
        .flat_map(WorkItem::element_results)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::batch::BatchType;
    use serde_json::json;
    use uuid::Uuid;

    fn finished(sequence: i32, results: Vec<ExecutionResult>) -> WorkItem {
        let mut item = WorkItem::pending(
            Uuid::nil(),
            sequence,
            BatchType::INDIVIDUAL_USERS,
            Uuid::nil(),
            "analysis",
            json!({"id": sequence}),
        );
        let result = ItemResult::from_results(results);
        item.status = result.terminal_status();
        item.result = Some(result);
        item
    }

    fn err(id: &str) -> ExecutionResult {
        ExecutionResult::error(
            id,
            Map::new(),
            ErrorRecord {
                kind: ErrorKind::ProcessingError,
                message: "rejected".to_string(),
                step: Some(1),
                retriable: false,
            },
        )
    }

    #[test]
    fn test_error_kind_serializes_screaming_snake() {
        assert_eq!(
            serde_json::to_value(ErrorKind::ServiceNotFound).unwrap(),
            json!("SERVICE_NOT_FOUND")
        );
        assert_eq!(ErrorKind::ProcessingError.to_string(), "PROCESSING_ERROR");
    }

    #[test]
    fn test_mixed_results_complete_the_item() {
        let result = ItemResult::from_results(vec![
            ExecutionResult::success("a", Map::new()),
            err("b"),
        ]);
        assert_eq!(result.terminal_status(), ItemStatus::Completed);

        let all_failed = ItemResult::from_results(vec![err("a")]);
        assert_eq!(all_failed.terminal_status(), ItemStatus::Failed);
    }

    #[test]
    fn test_batch_status_derivation() {
        let pending = WorkItem::pending(
            Uuid::nil(),
            0,
            BatchType::INDIVIDUAL_USERS,
            Uuid::nil(),
            "analysis",
            json!({}),
        );
        assert_eq!(
            BatchStatus::derive(std::slice::from_ref(&pending)),
            BatchStatus::Pending
        );

        let done = finished(1, vec![ExecutionResult::success("1", Map::new())]);
        assert_eq!(
            BatchStatus::derive(&[pending.clone(), done.clone()]),
            BatchStatus::Processing
        );

        let failed = finished(2, vec![err("2")]);
        assert_eq!(
            BatchStatus::derive(&[done.clone(), failed.clone()]),
            BatchStatus::PartiallyFailed
        );
        assert_eq!(BatchStatus::derive(&[done]), BatchStatus::Completed);
        assert_eq!(BatchStatus::derive(&[failed]), BatchStatus::Failed);
    }

    #[test]
    fn test_collect_results_follows_sequence() {
        let items = vec![
            finished(2, vec![ExecutionResult::success("c", Map::new())]),
            finished(0, vec![ExecutionResult::success("a", Map::new())]),
            finished(1, vec![err("b")]),
        ];

        let ids: Vec<String> = collect_results(&items)
            .into_iter()
            .map(|r| r.item_id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
