//! Step execution errors

use conveyor_core::domain::result::{ErrorKind, ErrorRecord};
use thiserror::Error;

/// Failure of a single pipeline step
///
/// Captured per element. A step error never aborts sibling elements.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    /// The step's service has no registry entry. Never retried.
    #[error("step {step} ('{label}'): service '{service}' is not registered")]
    ServiceNotFound {
        step: usize,
        label: String,
        service: String,
    },

    /// Every attempt exceeded the step timeout
    #[error("step {step} ('{label}') timed out after {attempts} attempt(s)")]
    Timeout {
        step: usize,
        label: String,
        attempts: u32,
    },

    /// The remote service answered non-2xx or could not be reached
    #[error("step {step} ('{label}') failed{}: {body}", status_suffix(.status))]
    ProcessingError {
        step: usize,
        label: String,
        status: Option<u16>,
        body: String,
    },
}

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|code| format!(" with status {}", code))
        .unwrap_or_default()
}

impl ExecutionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ServiceNotFound { .. } => ErrorKind::ServiceNotFound,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::ProcessingError { .. } => ErrorKind::ProcessingError,
        }
    }

    /// Index of the failing step
    pub fn step(&self) -> usize {
        match self {
            Self::ServiceNotFound { step, .. }
            | Self::Timeout { step, .. }
            | Self::ProcessingError { step, .. } => *step,
        }
    }

    /// Whether a batch-level resubmission may succeed
    ///
    /// Configuration errors and 4xx business rejections are permanent;
    /// timeouts, unreachable services, 429 and 5xx are transient.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::ServiceNotFound { .. } => false,
            Self::Timeout { .. } => true,
            Self::ProcessingError { status: None, .. } => true,
            Self::ProcessingError {
                status: Some(code), ..
            } => *code == 429 || *code >= 500,
        }
    }

    pub fn to_record(&self) -> ErrorRecord {
        ErrorRecord {
            kind: self.kind(),
            message: self.to_string(),
            step: Some(self.step()),
            retriable: self.is_retriable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processing(status: Option<u16>) -> ExecutionError {
        ExecutionError::ProcessingError {
            step: 1,
            label: "generation.write".to_string(),
            status,
            body: "nope".to_string(),
        }
    }

    #[test]
    fn test_taxonomy_kinds() {
        let missing = ExecutionError::ServiceNotFound {
            step: 0,
            label: "crm.sync".to_string(),
            service: "crm".to_string(),
        };
        assert_eq!(missing.kind(), ErrorKind::ServiceNotFound);
        assert!(!missing.is_retriable());

        let timeout = ExecutionError::Timeout {
            step: 2,
            label: "analysis.score".to_string(),
            attempts: 3,
        };
        assert_eq!(timeout.kind(), ErrorKind::Timeout);
        assert!(timeout.is_retriable());
        assert_eq!(timeout.step(), 2);
    }

    #[test]
    fn test_processing_error_retriability_follows_status() {
        assert!(processing(None).is_retriable());
        assert!(processing(Some(503)).is_retriable());
        assert!(processing(Some(429)).is_retriable());
        assert!(!processing(Some(422)).is_retriable());
    }

    #[test]
    fn test_message_includes_status() {
        let message = processing(Some(422)).to_string();
        assert_eq!(message, "step 1 ('generation.write') failed with status 422: nope");
        assert_eq!(
            processing(None).to_string(),
            "step 1 ('generation.write') failed: nope"
        );
    }

    #[test]
    fn test_record_carries_step_and_kind() {
        let record = processing(Some(500)).to_record();
        assert_eq!(record.kind, ErrorKind::ProcessingError);
        assert_eq!(record.step, Some(1));
        assert!(record.retriable);
    }
}
