//! Batch endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use conveyor_core::dto::batch::{BatchReceipt, BatchStatusReport, CompensationEntry, SubmitBatch};
use uuid::Uuid;

impl OrchestratorClient {
    // =============================================================================
    // Submission
    // =============================================================================

    /// Submit a batch of elements
    ///
    /// # Returns
    /// The new batch id and how many work items were created
    pub async fn submit_batch(&self, req: SubmitBatch) -> Result<BatchReceipt> {
        let url = format!("{}/batch/submit", self.base_url);
        let response = self.client.post(&url).json(&req).send().await?;

        self.handle_response(response).await
    }

    /// Resubmit the retriable failed elements of a finished batch as a new batch
    pub async fn retry_batch(&self, batch_id: Uuid) -> Result<BatchReceipt> {
        let url = format!("{}/batch/{}/retry", self.base_url, batch_id);
        let response = self.client.post(&url).send().await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Inspection
    // =============================================================================

    pub async fn get_batch_status(&self, batch_id: Uuid) -> Result<BatchStatusReport> {
        let url = format!("{}/batch/{}", self.base_url, batch_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Compensation plans for failed elements of a batch
    pub async fn get_compensation(&self, batch_id: Uuid) -> Result<Vec<CompensationEntry>> {
        let url = format!("{}/batch/{}/compensation", self.base_url, batch_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }
}
