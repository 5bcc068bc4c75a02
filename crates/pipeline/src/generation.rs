//! Client for the external generation service
//!
//! The service is an OpenAI-compatible chat-completions endpoint. It is
//! treated as an opaque, fallible and rate-limited collaborator: calls go
//! through the same retry policy as every other outbound request.

use async_trait::async_trait;
use routedoc_common::{Credential, EndpointKey, HttpMethod};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::http::{truncate_string, HttpRequest, HttpTransport};
use crate::retry::{execute_with_retry, RetryPolicy};

/// Trait for producing candidate payloads (allows mocking in tests)
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Complete a prompt, returning the raw text of the answer
    async fn complete(&self, prompt: String) -> Result<String>;
}

/// Everything the service is told about one endpoint
#[derive(Debug, Clone)]
pub struct PromptContext<'a> {
    pub provider: &'a str,
    pub endpoint: &'a EndpointKey,
    pub summary: &'a str,
    pub description: &'a str,
    pub schema: &'a Value,
    /// Examples of the same endpoint, e.g. extracted responses
    pub siblings: Vec<&'a Value>,
    pub hints: &'a [String],
    /// Why earlier candidates were rejected
    pub feedback: &'a [String],
}

/// Render the user prompt for one candidate
pub fn build_prompt(context: &PromptContext<'_>) -> String {
    let mut prompt = format!(
        "Produce one realistic JSON request body for {} of the '{}' API.\n",
        context.endpoint, context.provider
    );
    if !context.summary.is_empty() {
        prompt.push_str(&format!("Summary: {}\n", context.summary));
    }
    if !context.description.is_empty() {
        prompt.push_str(&format!("Description: {}\n", context.description));
    }
    prompt.push_str("\nRequest body JSON schema:\n");
    prompt.push_str(&pretty(context.schema));
    prompt.push('\n');

    for (i, sibling) in context.siblings.iter().enumerate() {
        prompt.push_str(&format!("\nRelated example {}:\n{}\n", i + 1, pretty(sibling)));
    }
    if !context.hints.is_empty() {
        prompt.push_str("\nProvider conventions:\n");
        for hint in context.hints {
            prompt.push_str(&format!("- {}\n", hint));
        }
    }
    if !context.feedback.is_empty() {
        prompt.push_str("\nPrevious attempts were rejected:\n");
        for item in context.feedback {
            prompt.push_str(&format!("- {}\n", item));
        }
    }
    prompt.push_str("\nAnswer with the JSON document only.");
    prompt
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Pull the JSON payload out of a completion, tolerating code fences and prose
pub fn extract_json(text: &str) -> Result<Value> {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    if let Ok(value) = serde_json::from_str(unfenced) {
        return Ok(value);
    }

    let start = unfenced.find(|c: char| c == '{' || c == '[');
    let end = unfenced.rfind(|c: char| c == '}' || c == ']');
    if let (Some(start), Some(end)) = (start, end) {
        if start < end {
            if let Ok(value) = serde_json::from_str(&unfenced[start..=end]) {
                return Ok(value);
            }
        }
    }

    Err(PipelineError::Generation(format!(
        "completion is not JSON: {}",
        truncate_string(trimmed, 200)
    )))
}

/// Chat-completions client
pub struct HttpCompletionClient {
    transport: Arc<dyn HttpTransport>,
    url: String,
    api_key: Credential,
    model: String,
    policy: RetryPolicy,
}

impl HttpCompletionClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        url: impl Into<String>,
        api_key: Credential,
        model: impl Into<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            url: url.into(),
            api_key,
            model: model.into(),
            policy,
        }
    }

    fn request(&self, prompt: &str) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Post,
            url: self.url.clone(),
            headers: vec![
                (
                    "Authorization".to_string(),
                    format!("Bearer {}", self.api_key.expose()),
                ),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
            body: Some(json!({
                "model": self.model,
                "temperature": 0.2,
                "messages": [
                    {
                        "role": "system",
                        "content": "You write example request payloads for HTTP API documentation. \
                                    Reply with a single JSON document and nothing else."
                    },
                    {"role": "user", "content": prompt}
                ]
            })),
        }
    }
}

#[async_trait]
impl CompletionService for HttpCompletionClient {
    async fn complete(&self, prompt: String) -> Result<String> {
        debug!(
            model = %self.model,
            api_key = %self.api_key.masked(),
            prompt_chars = prompt.len(),
            "Requesting completion"
        );
        let prompt = prompt.as_str();
        let response = execute_with_retry(&self.policy, "generate_example", || async move {
            self.transport
                .send(self.request(prompt))
                .await?
                .error_for_status()
        })
        .await?;

        let body: Value = serde_json::from_str(&response.body)?;
        body.pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                PipelineError::Generation(format!(
                    "unexpected completion response: {}",
                    truncate_string(&response.body, 200)
                ))
            })
    }
}
