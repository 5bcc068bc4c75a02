//! Common types and utilities for routedoc
//!
//! This crate contains shared data structures, error types, and utilities
//! used across the parser, generator, pipeline, and CLI components.

mod endpoint;
mod example;
pub mod lookup;
mod provider;
mod secret;

pub use endpoint::{normalize_path, EndpointKey, HttpMethod};
pub use example::{Direction, Example, Provenance, ValidationState};
pub use provider::{
    AuthScheme, ProviderConfig, ProviderId, ProviderRegistry, RoutePredicate, DEFAULT_REGISTRY_YAML,
};
pub use secret::{mask_secret, Credential};

use thiserror::Error;

/// Errors that can occur while turning OpenAPI documents into documentation
#[derive(Error, Debug)]
pub enum DocError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Cyclic reference: {}", chain.join(" -> "))]
    CyclicReference { chain: Vec<String> },

    #[error("Unsupported reference '{pointer}': only document-local pointers are resolved")]
    UnsupportedReference { pointer: String },

    #[error("Reference '{pointer}' does not point to anything in the document")]
    DanglingReference { pointer: String },

    #[error("Paths not claimed by any provider: {}", paths.join(", "))]
    UnroutablePath { paths: Vec<String> },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid lookup key: {0}")]
    InvalidKey(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl DocError {
    /// Structural errors make the affected document unusable and are never retried
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            DocError::CyclicReference { .. }
                | DocError::UnsupportedReference { .. }
                | DocError::DanglingReference { .. }
                | DocError::UnroutablePath { .. }
        )
    }
}

/// Result type for documentation operations
pub type Result<T> = std::result::Result<T, DocError>;
