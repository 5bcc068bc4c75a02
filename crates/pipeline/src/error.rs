//! Error types for the pipeline stages

use routedoc_common::{Credential, DocError};
use std::time::Duration;
use thiserror::Error;

/// Errors raised by the networked and filesystem stages of a run
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Connection, TLS or timeout failure before a response arrived
    #[error("Transport error: {0}")]
    Transport(String),

    /// A response outside the success range
    #[error("HTTP {status}: {body}")]
    Http {
        status: u16,
        /// Delay requested by the server through `Retry-After`
        retry_after: Option<Duration>,
        /// Response body, truncated
        body: String,
    },

    #[error("Fetching {url} failed after {attempts} attempts: {last}")]
    FetchExhausted {
        url: String,
        attempts: u32,
        last: String,
    },

    #[error("Fetching {url} was rejected with HTTP {status}")]
    FetchRejected { url: String, status: u16 },

    #[error("Invalid OpenAPI document from {url}: {reason}")]
    InvalidSpec { url: String, reason: String },

    #[error("Generation service error: {0}")]
    Generation(String),

    #[error("Publish error: {0}")]
    Publish(String),

    #[error(transparent)]
    Doc(#[from] DocError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Check if this error is transient and the request may be retried
    ///
    /// Transport failures and HTTP 5xx, 408 and 429 are transient. Every
    /// other status is a permanent client-side failure.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Transport(_) => true,
            PipelineError::Http { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            _ => false,
        }
    }

    /// Server-requested delay before the next attempt
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            PipelineError::Http { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Mask `credential` wherever it appears in the error's text
    pub fn redacted(self, credential: Option<&Credential>) -> Self {
        let Some(credential) = credential else {
            return self;
        };
        match self {
            PipelineError::Transport(message) => {
                PipelineError::Transport(credential.redact(&message))
            }
            PipelineError::Http {
                status,
                retry_after,
                body,
            } => PipelineError::Http {
                status,
                retry_after,
                body: credential.redact(&body),
            },
            PipelineError::Generation(message) => {
                PipelineError::Generation(credential.redact(&message))
            }
            other => other,
        }
    }

    /// HTTP status, if the error came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            PipelineError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// The request URL is dropped: it may carry a credential in its path or query
impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        PipelineError::Transport(err.without_url().to_string())
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
