//! Batch-level error classification and compensation
//!
//! Nothing here runs automatically. Callers inspect a finished batch and
//! decide whether to resubmit retriable elements or roll back side effects.

use conveyor_core::domain::compensation::{
    CompensationAction, CompensationPlan, CompensationStep,
};
use conveyor_core::domain::result::{ErrorKind, ErrorRecord, ExecutionResult};
use conveyor_core::domain::template::PipelineTemplate;
use std::collections::HashSet;

/// Decides which failed elements are worth resubmitting
#[derive(Debug, Clone)]
pub struct RetryClassifier {
    retriable: HashSet<ErrorKind>,
}

impl Default for RetryClassifier {
    fn default() -> Self {
        Self::new([
            ErrorKind::Timeout,
            ErrorKind::ProcessingError,
            ErrorKind::WorkerCrash,
        ])
    }
}

impl RetryClassifier {
    pub fn new(kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        Self {
            retriable: kinds.into_iter().collect(),
        }
    }

    /// The kind must be configured and the error itself marked transient,
    /// so a 422 `PROCESSING_ERROR` stays out while a 503 gets in.
    pub fn is_retriable(&self, error: &ErrorRecord) -> bool {
        error.retriable && self.retriable.contains(&error.kind)
    }

    /// Indices of results to resubmit
    pub fn find_retriable(&self, results: &[ExecutionResult]) -> Vec<usize> {
        results
            .iter()
            .enumerate()
            .filter(|(_, result)| result.error.as_ref().is_some_and(|e| self.is_retriable(e)))
            .map(|(index, _)| index)
            .collect()
    }
}

/// Describes how to undo the steps that ran before `failed_step`
///
/// Only steps declaring a `compensation` operation are included, latest first.
pub fn create_compensation_plan(template: &PipelineTemplate, failed_step: usize) -> CompensationPlan {
    let completed = failed_step.min(template.steps.len());

    let steps: Vec<CompensationStep> = template.steps[..completed]
        .iter()
        .enumerate()
        .rev()
        .filter_map(|(index, step)| {
            step.compensation.as_ref().map(|operation| CompensationStep {
                step: index,
                service: step.service.clone(),
                operation: operation.clone(),
            })
        })
        .collect();

    let failed_label = template
        .steps
        .get(failed_step)
        .map(|step| step.label())
        .unwrap_or_else(|| format!("#{}", failed_step));

    if steps.is_empty() {
        return CompensationPlan {
            action: CompensationAction::None,
            steps,
            notification: format!(
                "Step '{}' of template '{}' failed; no earlier step needs rollback",
                failed_label, template.name
            ),
        };
    }

    CompensationPlan {
        action: CompensationAction::Rollback,
        notification: format!(
            "Step '{}' of template '{}' failed; roll back {} earlier step(s)",
            failed_label,
            template.name,
            steps.len()
        ),
        steps,
    }
}
