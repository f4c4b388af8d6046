//! Outbound client for the external analysis workflow engine
//!
//! A trigger is a single JSON POST to the configured webhook carrying the
//! property URL and the callback URL the engine should report back to. No
//! automatic retries: a failed trigger surfaces to the dashboard as a 500.

use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

pub const USER_AGENT: &str = concat!("propscope/", env!("CARGO_PKG_VERSION"));

/// Workflow client errors
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Workflow webhook URL is not configured")]
    NotConfigured,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Workflow webhook returned {0}")]
    Status(u16),

    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

/// Body POSTed to the workflow webhook
#[derive(Debug, Clone, Serialize)]
pub struct TriggerPayload<'a> {
    pub property_url: &'a str,
    pub workflow_callback_url: &'a str,
}

/// Build the shared outbound HTTP client
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, WorkflowError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| WorkflowError::Client(e.to_string()))
}

/// Workflow engine client
#[derive(Clone)]
pub struct WorkflowClient {
    http_client: reqwest::Client,
    webhook_url: Option<String>,
}

impl WorkflowClient {
    pub fn new(http_client: reqwest::Client, webhook_url: Option<String>) -> Self {
        Self {
            http_client,
            webhook_url,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.webhook_url.is_some()
    }

    /// Ask the engine to analyse `property_url`.
    ///
    /// Returns the engine's response body: JSON when it parses, otherwise
    /// the raw text as a JSON string.
    pub async fn trigger(
        &self,
        property_url: &str,
        callback_url: &str,
    ) -> Result<Value, WorkflowError> {
        let webhook_url = self.webhook_url.as_deref().ok_or(WorkflowError::NotConfigured)?;
        let payload = TriggerPayload {
            property_url,
            workflow_callback_url: callback_url,
        };

        info!("Triggering workflow for {} (callback {})", property_url, callback_url);

        let response = self
            .http_client
            .post(webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!("Workflow webhook unreachable: {}", e);
                WorkflowError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            error!("Workflow webhook returned {}", status);
            return Err(WorkflowError::Status(status.as_u16()));
        }

        let text = response
            .text()
            .await
            .map_err(|e| WorkflowError::Network(e.to_string()))?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_trigger_fails_fast() {
        let client = WorkflowClient::new(build_http_client(Duration::from_secs(1)).unwrap(), None);
        assert!(!client.is_configured());
        let err = client
            .trigger("https://example.com/p/1", "http://localhost:5000/api/callback")
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotConfigured));
    }

    #[test]
    fn test_payload_shape() {
        let payload = TriggerPayload {
            property_url: "https://example.com/p/1",
            workflow_callback_url: "http://localhost:5000/api/callback",
        };
        assert_eq!(
            serde_json::to_value(payload).unwrap(),
            serde_json::json!({
                "property_url": "https://example.com/p/1",
                "workflow_callback_url": "http://localhost:5000/api/callback"
            })
        );
    }
}
