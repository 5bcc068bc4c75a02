//! HTTP transport used by the fetcher, the validator and the generation client
//!
//! The transport only moves bytes: every response, whatever its status, comes
//! back as an [`HttpResponse`]. Callers decide what counts as a failure.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, Client, Method};
use routedoc_common::HttpMethod;
use serde_json::Value;
use std::time::Duration;

use crate::error::{PipelineError, Result};
use crate::retry::parse_retry_after;

/// Default timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of body characters kept in error values
const MAX_ERROR_BODY: usize = 500;

/// Outgoing request
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Response as received
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// Raw `Retry-After` header
    pub retry_after: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            retry_after: None,
            body: body.into(),
        }
    }

    pub fn with_retry_after(mut self, value: impl Into<String>) -> Self {
        self.retry_after = Some(value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Keep a successful response, turn anything else into [`PipelineError::Http`]
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        Err(PipelineError::Http {
            status: self.status,
            retry_after: self
                .retry_after
                .as_deref()
                .and_then(|value| parse_retry_after(value, Utc::now())),
            body: truncate_string(&self.body, MAX_ERROR_BODY),
        })
    }
}

/// Trait for sending HTTP requests (allows mocking in tests)
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a request; only failures without a response are errors
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Transport backed by a shared `reqwest` client
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(8)
            .user_agent(concat!("routedoc/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PipelineError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let method = Method::from_bytes(request.method.to_string().as_bytes()).map_err(|_| {
            PipelineError::Config(format!("Invalid HTTP method: {}", request.method))
        })?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        Ok(HttpResponse {
            status,
            retry_after,
            body,
        })
    }
}

/// Truncate a string to a maximum number of characters
pub fn truncate_string(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
