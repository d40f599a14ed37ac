//! Remote service client
//!
//! Each pipeline step is a `POST <base_address>/<operation>` with a JSON body.
//! The trait exists so the engine can be driven by fakes in tests.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Raw answer from a remote service
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceResponse {
    pub status: u16,
    pub body: JsonValue,
}

impl ServiceResponse {
    pub fn new(status: u16, body: JsonValue) -> Self {
        Self { status, body }
    }

    pub fn ok(body: JsonValue) -> Self {
        Self::new(200, body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure below the HTTP status level
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("invalid response body: {0}")]
    InvalidBody(String),
}

#[async_trait]
pub trait ServiceClient: Send + Sync {
    /// Calls `operation` on the service at `base_address`
    ///
    /// Timeouts are enforced by the caller, implementations should not retry.
    async fn invoke(
        &self,
        base_address: &str,
        operation: &str,
        body: &JsonValue,
    ) -> Result<ServiceResponse, TransportError>;
}

/// reqwest-backed implementation of ServiceClient
#[derive(Debug, Clone)]
pub struct HttpServiceClient {
    client: Client,
}

impl HttpServiceClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Uses a preconfigured client (pool sizes, proxies, TLS)
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Default for HttpServiceClient {
    fn default() -> Self {
        Self::new()
    }
}

fn operation_url(base_address: &str, operation: &str) -> String {
    format!(
        "{}/{}",
        base_address.trim_end_matches('/'),
        operation.trim_start_matches('/')
    )
}

#[async_trait]
impl ServiceClient for HttpServiceClient {
    async fn invoke(
        &self,
        base_address: &str,
        operation: &str,
        body: &JsonValue,
    ) -> Result<ServiceResponse, TransportError> {
        let url = operation_url(base_address, operation);
        let response = self.client.post(&url).json(body).send().await?;

        let status = response.status();
        let text = response.text().await?;

        let body = if text.trim().is_empty() {
            JsonValue::Null
        } else {
            match serde_json::from_str(&text) {
                Ok(json) => json,
                Err(_) if !status.is_success() => JsonValue::String(text),
                Err(e) => {
                    return Err(TransportError::InvalidBody(format!(
                        "{} returned non-JSON body: {}",
                        url, e
                    )));
                }
            }
        };

        Ok(ServiceResponse::new(status.as_u16(), body))
    }
}
