//! Work item domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use crate::domain::batch::{BatchType, ProcessingMethod};
use crate::domain::result::{ErrorRecord, ExecutionResult, ItemResult};

/// A unit of work tracked through `pending -> processing -> completed | failed`
///
/// Created by batch submission, mutated only by a claim (status transition)
/// and by the worker writing back its result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: Uuid,
    pub batch_id: Uuid,
    /// Position of this item within its batch
    pub sequence: i32,
    pub status: ItemStatus,
    /// Worker currently holding the claim
    pub owner: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Worker type required to process this item
    pub capability: String,
    pub template_ref: Uuid,
    pub batch_type: BatchType,
    pub payload: JsonValue,
    pub result: Option<ItemResult>,
    pub created_at: DateTime<Utc>,
}

/// Work item lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Processing => "processing",
            ItemStatus::Completed => "completed",
            ItemStatus::Failed => "failed",
        }
    }

    /// Completed and failed items never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Failed)
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ItemStatus::Pending),
            "processing" => Ok(ItemStatus::Processing),
            "completed" => Ok(ItemStatus::Completed),
            "failed" => Ok(ItemStatus::Failed),
            other => Err(format!(
                "unknown item status '{}', expected one of: pending, processing, completed, failed",
                other
            )),
        }
    }
}

/// One element of a work item's payload, ready for pipeline execution
#[derive(Debug, Clone, PartialEq)]
pub struct ItemElement {
    pub id: String,
    pub payload: Map<String, JsonValue>,
}

impl WorkItem {
    /// Creates a new pending work item
    pub fn pending(
        batch_id: Uuid,
        sequence: i32,
        batch_type: BatchType,
        template_ref: Uuid,
        capability: impl Into<String>,
        payload: JsonValue,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            batch_id,
            sequence,
            status: ItemStatus::Pending,
            owner: None,
            claimed_at: None,
            completed_at: None,
            capability: capability.into(),
            template_ref,
            batch_type,
            payload,
            result: None,
            created_at: Utc::now(),
        }
    }

    /// Expands the payload into the elements a pipeline runs over
    ///
    /// BATCH items carry an array of elements; INDIVIDUAL items carry a single one.
    /// A BATCH payload that is not an array is treated as a single element.
    pub fn elements(&self) -> Vec<ItemElement> {
        let raw: Vec<&JsonValue> = match (&self.batch_type.processing_method, &self.payload) {
            (ProcessingMethod::Batch, JsonValue::Array(values)) => values.iter().collect(),
            _ => vec![&self.payload],
        };

        raw.into_iter()
            .enumerate()
            .map(|(index, value)| ItemElement {
                id: element_id(self.id, index, value),
                payload: as_context(value),
            })
            .collect()
    }

    /// Per-element results for status reporting
    ///
    /// Items that failed without producing results (crashed processing step,
    /// reclaimed lease) get one synthesized `WORKER_CRASH` error per element.
    pub fn element_results(&self) -> Vec<ExecutionResult> {
        match &self.result {
            Some(result) if !result.results.is_empty() => result.results.clone(),
            Some(ItemResult {
                failure: Some(failure),
                ..
            }) => self
                .elements()
                .into_iter()
                .map(|element| {
                    ExecutionResult::error(
                        element.id,
                        element.payload,
                        ErrorRecord {
                            kind: failure.kind,
                            message: failure.message.clone(),
                            step: None,
                            retriable: failure.kind.is_transient(),
                        },
                    )
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Identity of an element: its `id` field when present, otherwise `<item>:<index>`
pub fn element_id(work_item_id: Uuid, index: usize, element: &JsonValue) -> String {
    match element.get("id") {
        Some(JsonValue::String(id)) => id.clone(),
        Some(JsonValue::Number(id)) => id.to_string(),
        _ => format!("{}:{}", work_item_id, index),
    }
}

/// Non-object elements are wrapped as `{"value": element}`
fn as_context(value: &JsonValue) -> Map<String, JsonValue> {
    match value {
        JsonValue::Object(map) => map.clone(),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other.clone());
            map
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::result::{ErrorKind, FailureRecord};
    use serde_json::json;

    fn item(batch_type: BatchType, payload: JsonValue) -> WorkItem {
        WorkItem::pending(
            Uuid::new_v4(),
            0,
            batch_type,
            Uuid::new_v4(),
            "analysis",
            payload,
        )
    }

    #[test]
    fn test_status_parsing_is_case_insensitive() {
        assert_eq!("PENDING".parse::<ItemStatus>(), Ok(ItemStatus::Pending));
        assert_eq!(" failed ".parse::<ItemStatus>(), Ok(ItemStatus::Failed));
        assert!("stuck".parse::<ItemStatus>().is_err());
    }

    #[test]
    fn test_batch_payload_expands_to_elements() {
        let work = item(
            BatchType::BATCH_USERS,
            json!([{"id": "u1", "name": "a"}, {"id": 7}, "raw"]),
        );

        let elements = work.elements();
        assert_eq!(elements.len(), 3);
        assert_eq!(elements[0].id, "u1");
        assert_eq!(elements[1].id, "7");
        assert_eq!(elements[2].id, format!("{}:2", work.id));
        assert_eq!(elements[2].payload.get("value"), Some(&json!("raw")));
    }

    #[test]
    fn test_individual_payload_is_single_element() {
        let work = item(BatchType::INDIVIDUAL_USERS, json!([1, 2, 3]));
        let elements = work.elements();
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].payload.get("value"), Some(&json!([1, 2, 3])));
    }

    #[test]
    fn test_failed_item_synthesizes_element_errors() {
        let mut work = item(BatchType::BATCH_CATEGORIES, json!([{"id": "a"}, {"id": "b"}]));
        work.status = ItemStatus::Failed;
        work.result = Some(ItemResult::from_failure(FailureRecord::worker_crash(
            "processing step panicked",
            Some("worker-1".to_string()),
        )));

        let results = work.element_results();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.is_error()));
        assert_eq!(
            results[1].error.as_ref().map(|e| e.kind),
            Some(ErrorKind::WorkerCrash)
        );
    }
}
