//! Spec Fetcher: download a provider's OpenAPI document

use chrono::Utc;
use routedoc_parser::{Node, RawSpec};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::http::{HttpRequest, HttpTransport};
use crate::retry::{execute_with_retry, RetryPolicy};

pub struct SpecFetcher {
    transport: Arc<dyn HttpTransport>,
    policy: RetryPolicy,
}

impl SpecFetcher {
    pub fn new(transport: Arc<dyn HttpTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Fetch the document at `url`
    ///
    /// Transient failures are retried per the policy; exhausting it gives
    /// [`PipelineError::FetchExhausted`] with the last error. A permanent 4xx
    /// gives [`PipelineError::FetchRejected`] after a single attempt.
    pub async fn fetch(&self, url: &str) -> Result<RawSpec> {
        let mut attempts = 0u32;
        let result = execute_with_retry(&self.policy, "fetch_spec", || {
            attempts += 1;
            self.fetch_once(url)
        })
        .await;
        let body = result.map_err(|e| match e {
            e if e.is_retryable() => PipelineError::FetchExhausted {
                url: url.to_string(),
                attempts,
                last: e.to_string(),
            },
            PipelineError::Http { status, .. } => PipelineError::FetchRejected {
                url: url.to_string(),
                status,
            },
            other => other,
        })?;

        let value: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| PipelineError::InvalidSpec {
                url: url.to_string(),
                reason: format!("body is not JSON: {}", e),
            })?;
        let raw = RawSpec::new(url, Node::from_value(value), Utc::now()).map_err(|e| {
            PipelineError::InvalidSpec {
                url: url.to_string(),
                reason: e.to_string(),
            }
        })?;

        let paths = raw
            .document
            .get("paths")
            .and_then(Node::as_object)
            .map_or(0, |p| p.len());
        info!(
            url = %url,
            attempts = attempts,
            paths = paths,
            "Fetched OpenAPI document"
        );
        Ok(raw)
    }

    async fn fetch_once(&self, url: &str) -> Result<String> {
        debug!(url = %url, "Requesting OpenAPI document");
        let request = HttpRequest::get(url).header("Accept", "application/json");
        let response = self.transport.send(request).await?.error_for_status()?;
        Ok(response.body)
    }
}
