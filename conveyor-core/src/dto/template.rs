//! Template DTOs

use serde::{Deserialize, Serialize};

use crate::domain::template::ProcessingStep;

/// Request to publish a pipeline template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTemplate {
    pub name: String,
    pub steps: Vec<ProcessingStep>,
}
