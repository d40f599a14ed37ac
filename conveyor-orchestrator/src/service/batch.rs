//! Batch Service
//!
//! Submission, status reporting, and the advisory retry/compensation views
//! of a finished batch.

use chrono::Utc;
use conveyor_core::domain::batch::{Batch, BatchType, ProcessingMethod, build_work_items};
use conveyor_core::domain::compensation::CompensationAction;
use conveyor_core::domain::item::WorkItem;
use conveyor_core::domain::result::{BatchStatus, collect_results};
use conveyor_core::domain::template::PipelineTemplate;
use conveyor_core::dto::batch::{BatchReceipt, BatchStatusReport, CompensationEntry, SubmitBatch};
use conveyor_engine::{RetryClassifier, create_compensation_plan};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

use crate::repository::{batch_repository, item_repository, template_repository};

/// Service error type
#[derive(Debug)]
pub enum BatchError {
    NotFound(Uuid),
    TemplateNotFound(Uuid),
    ValidationError(String),
    NothingToRetry(Uuid),
    DatabaseError(sqlx::Error),
}

impl From<sqlx::Error> for BatchError {
    fn from(err: sqlx::Error) -> Self {
        BatchError::DatabaseError(err)
    }
}

pub type Result<T> = std::result::Result<T, BatchError>;

/// Classify a submission, build its work items and store them atomically
pub async fn submit_batch(pool: &PgPool, req: SubmitBatch) -> Result<BatchReceipt> {
    let batch_type = BatchType::parse(&req.processing_method, &req.data_source_type)
        .map_err(|e| BatchError::ValidationError(e.to_string()))?;

    let capability = req.capability.trim();
    if capability.is_empty() {
        return Err(BatchError::ValidationError(
            "Capability cannot be empty".to_string(),
        ));
    }

    template_repository::find_by_id(pool, req.template_ref)
        .await?
        .ok_or(BatchError::TemplateNotFound(req.template_ref))?;

    let receipt = store_batch(
        pool,
        batch_type,
        req.template_ref,
        capability,
        req.items,
        None,
    )
    .await?;

    tracing::info!(
        "Batch submitted: {} ({}, {} work item(s))",
        receipt.batch_id,
        batch_type,
        receipt.item_count
    );

    Ok(receipt)
}

/// Current status; per-element results are included once every item is terminal
pub async fn get_batch_status(pool: &PgPool, id: Uuid) -> Result<BatchStatusReport> {
    let batch = find_batch(pool, id).await?;
    let items = item_repository::find_by_batch(pool, id).await?;

    Ok(status_report(&batch, &items))
}

/// Resubmit the retriable error elements of a finished batch as a new batch
pub async fn retry_batch(pool: &PgPool, id: Uuid) -> Result<BatchReceipt> {
    let batch = find_batch(pool, id).await?;
    let items = item_repository::find_by_batch(pool, id).await?;

    let status = BatchStatus::derive(&items);
    if !status.is_finished() {
        return Err(BatchError::ValidationError(format!(
            "Batch {} is still {}, retry is only possible once it has finished",
            id, status
        )));
    }

    let elements = select_retry_elements(&items, &RetryClassifier::default());
    if elements.is_empty() {
        return Err(BatchError::NothingToRetry(id));
    }

    let retried = elements.len();
    let receipt = store_batch(
        pool,
        batch.batch_type,
        batch.template_ref,
        &batch.capability,
        elements,
        Some(batch.id),
    )
    .await?;

    tracing::info!(
        "Batch {} resubmitted {} retriable element(s) as batch {}",
        id,
        retried,
        receipt.batch_id
    );

    Ok(receipt)
}

/// Advisory rollback plans for error results that followed compensable steps
pub async fn get_compensation(pool: &PgPool, id: Uuid) -> Result<Vec<CompensationEntry>> {
    let batch = find_batch(pool, id).await?;
    let items = item_repository::find_by_batch(pool, id).await?;

    let template = template_repository::find_by_id(pool, batch.template_ref)
        .await?
        .ok_or(BatchError::TemplateNotFound(batch.template_ref))?;

    let entries = compensation_entries(&template, &items);
    tracing::debug!("Batch {}: {} compensation plan(s)", id, entries.len());

    Ok(entries)
}

// =============================================================================
// Helpers
// =============================================================================

async fn find_batch(pool: &PgPool, id: Uuid) -> Result<Batch> {
    batch_repository::find_by_id(pool, id)
        .await?
        .ok_or(BatchError::NotFound(id))
}

async fn store_batch(
    pool: &PgPool,
    batch_type: BatchType,
    template_ref: Uuid,
    capability: &str,
    elements: Vec<JsonValue>,
    retry_of: Option<Uuid>,
) -> Result<BatchReceipt> {
    let batch_id = Uuid::new_v4();
    let element_count = elements.len();
    let items = build_work_items(batch_id, batch_type, template_ref, capability, elements)
        .map_err(|e| BatchError::ValidationError(e.to_string()))?;

    let batch = Batch {
        id: batch_id,
        batch_type,
        template_ref,
        capability: capability.to_string(),
        element_count: i32::try_from(element_count).map_err(|_| {
            BatchError::ValidationError(format!("Batch of {} elements is too large", element_count))
        })?,
        retry_of,
        created_at: Utc::now(),
    };

    batch_repository::create(pool, &batch, &items).await?;

    Ok(BatchReceipt {
        batch_id,
        item_count: items.len(),
    })
}

fn status_report(batch: &Batch, items: &[WorkItem]) -> BatchStatusReport {
    let status = BatchStatus::derive(items);
    let per_item_results = status.is_finished().then(|| collect_results(items));

    BatchStatusReport {
        batch_id: batch.id,
        status,
        total_items: usize::try_from(batch.element_count).unwrap_or_default(),
        per_item_results,
    }
}

/// Elements exactly as they were submitted, in element order
fn raw_elements(item: &WorkItem) -> Vec<JsonValue> {
    match (&item.batch_type.processing_method, &item.payload) {
        (ProcessingMethod::Batch, JsonValue::Array(values)) => values.clone(),
        _ => vec![item.payload.clone()],
    }
}

/// Submitted elements whose results the classifier considers worth retrying
fn select_retry_elements(items: &[WorkItem], classifier: &RetryClassifier) -> Vec<JsonValue> {
    let mut ordered: Vec<&WorkItem> = items.iter().collect();
    ordered.sort_by_key(|item| item.sequence);

    ordered
        .into_iter()
        .flat_map(|item| {
            let elements = raw_elements(item);
            classifier
                .find_retriable(&item.element_results())
                .into_iter()
                .filter_map(move |index| elements.get(index).cloned())
                .collect::<Vec<_>>()
        })
        .collect()
}

fn compensation_entries(template: &PipelineTemplate, items: &[WorkItem]) -> Vec<CompensationEntry> {
    collect_results(items)
        .into_iter()
        .filter_map(|result| {
            let failed_step = result.error.as_ref()?.step?;
            let plan = create_compensation_plan(template, failed_step);
            (plan.action == CompensationAction::Rollback).then_some(CompensationEntry {
                item_id: result.item_id,
                failed_step,
                plan,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use conveyor_core::domain::item::ItemStatus;
    use conveyor_core::domain::result::{
        ErrorKind, ErrorRecord, ExecutionResult, FailureRecord, ItemResult,
    };
    use conveyor_core::domain::template::ProcessingStep;
    use serde_json::{Map, json};

    fn error(id: &str, kind: ErrorKind, step: usize, retriable: bool) -> ExecutionResult {
        ExecutionResult::error(
            id,
            Map::new(),
            ErrorRecord {
                kind,
                message: "failed".to_string(),
                step: Some(step),
                retriable,
            },
        )
    }

    fn finished(batch_type: BatchType, sequence: i32, payload: JsonValue, result: ItemResult) -> WorkItem {
        let mut item = WorkItem::pending(
            Uuid::new_v4(),
            sequence,
            batch_type,
            Uuid::new_v4(),
            "analysis",
            payload,
        );
        item.status = result.terminal_status();
        item.result = Some(result);
        item
    }

    fn template() -> PipelineTemplate {
        let mut reserve = ProcessingStep::new("inventory", "reserve");
        reserve.compensation = Some("release".to_string());
        PipelineTemplate {
            id: Uuid::new_v4(),
            name: "orders".to_string(),
            version: 1,
            steps: vec![
                reserve,
                ProcessingStep::new("billing", "charge"),
                ProcessingStep::new("mail", "notify"),
            ],
            created_at: Utc::now(),
        }
    }

    fn batch(element_count: i32) -> Batch {
        Batch {
            id: Uuid::new_v4(),
            batch_type: BatchType::INDIVIDUAL_USERS,
            template_ref: Uuid::new_v4(),
            capability: "analysis".to_string(),
            element_count,
            retry_of: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_raw_elements_unpacks_batch_payloads() {
        let single = finished(
            BatchType::INDIVIDUAL_USERS,
            0,
            json!({"id": "u1"}),
            ItemResult::from_results(vec![]),
        );
        assert_eq!(raw_elements(&single), vec![json!({"id": "u1"})]);

        let grouped = finished(
            BatchType::BATCH_USERS,
            0,
            json!([{"id": "u1"}, {"id": "u2"}]),
            ItemResult::from_results(vec![]),
        );
        assert_eq!(raw_elements(&grouped).len(), 2);
    }

    #[test]
    fn test_retry_selects_only_retriable_elements() {
        let payload = json!([{"id": "u1"}, {"id": "u2"}, {"id": "u3"}, {"id": "u4"}]);
        let item = finished(
            BatchType::BATCH_USERS,
            0,
            payload,
            ItemResult::from_results(vec![
                ExecutionResult::success("u1", Map::new()),
                error("u2", ErrorKind::Timeout, 0, true),
                error("u3", ErrorKind::ProcessingError, 1, false),
                error("u4", ErrorKind::ProcessingError, 1, true),
            ]),
        );

        let selected = select_retry_elements(&[item], &RetryClassifier::default());
        assert_eq!(selected, vec![json!({"id": "u2"}), json!({"id": "u4"})]);
    }

    #[test]
    fn test_retry_includes_crashed_items_in_sequence_order() {
        let crashed = finished(
            BatchType::INDIVIDUAL_USERS,
            1,
            json!({"id": "u2"}),
            ItemResult::from_failure(FailureRecord::worker_crash("lease expired", None)),
        );
        let rejected = finished(
            BatchType::INDIVIDUAL_USERS,
            0,
            json!({"id": "u1"}),
            ItemResult::from_results(vec![error("u1", ErrorKind::ServiceNotFound, 0, false)]),
        );

        let selected = select_retry_elements(&[crashed, rejected], &RetryClassifier::default());
        assert_eq!(selected, vec![json!({"id": "u2"})]);
    }

    #[test]
    fn test_compensation_only_for_steps_after_compensable_ones() {
        let items = vec![
            finished(
                BatchType::INDIVIDUAL_USERS,
                0,
                json!({"id": "u1"}),
                ItemResult::from_results(vec![error("u1", ErrorKind::ProcessingError, 0, false)]),
            ),
            finished(
                BatchType::INDIVIDUAL_USERS,
                1,
                json!({"id": "u2"}),
                ItemResult::from_results(vec![error("u2", ErrorKind::Timeout, 2, true)]),
            ),
            finished(
                BatchType::INDIVIDUAL_USERS,
                2,
                json!({"id": "u3"}),
                ItemResult::from_results(vec![ExecutionResult::success("u3", Map::new())]),
            ),
        ];

        let entries = compensation_entries(&template(), &items);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].item_id, "u2");
        assert_eq!(entries[0].failed_step, 2);
        assert_eq!(entries[0].plan.steps.len(), 1);
        assert_eq!(entries[0].plan.steps[0].operation, "release");
    }

    #[test]
    fn test_status_report_hides_results_until_finished() {
        let done = finished(
            BatchType::INDIVIDUAL_USERS,
            0,
            json!({"id": "u1"}),
            ItemResult::from_results(vec![ExecutionResult::success("u1", Map::new())]),
        );
        let waiting = WorkItem::pending(
            Uuid::new_v4(),
            1,
            BatchType::INDIVIDUAL_USERS,
            Uuid::new_v4(),
            "analysis",
            json!({"id": "u2"}),
        );
        assert_eq!(waiting.status, ItemStatus::Pending);

        let report = status_report(&batch(2), &[done.clone(), waiting]);
        assert_eq!(report.status, BatchStatus::Processing);
        assert_eq!(report.total_items, 2);
        assert!(report.per_item_results.is_none());

        let report = status_report(&batch(1), &[done]);
        assert_eq!(report.status, BatchStatus::Completed);
        let results = report.per_item_results.expect("results once finished");
        assert_eq!(results[0].item_id, "u1");
    }
}
