//! Compensation plan types
//!
//! Plans are advisory: they describe how an orchestrating caller could undo
//! the side effects of steps that succeeded before a later step failed.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompensationAction {
    /// Roll back the listed steps, in order
    Rollback,
    /// Nothing before the failed step has side effects
    None,
}

/// A rollback call against a previously successful step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensationStep {
    /// Index of the step being undone
    pub step: usize,
    pub service: String,
    pub operation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensationPlan {
    pub action: CompensationAction,
    pub steps: Vec<CompensationStep>,
    pub notification: String,
}
