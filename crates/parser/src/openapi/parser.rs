//! OpenAPI document loader

use crate::node::Node;
use crate::spec::RawSpec;
use chrono::Utc;
use routedoc_common::{DocError, Result};
use std::fs;
use std::path::Path;

/// Loads OpenAPI 3.x documents that are already on disk or in memory
///
/// Network retrieval lives in the pipeline's fetcher; this is the offline
/// entry point used by `routedoc partition` and by tests.
pub struct OpenApiParser;

impl OpenApiParser {
    /// Load a document from a JSON or YAML file
    ///
    /// # Example
    /// ```rust,ignore
    /// let raw = OpenApiParser::from_file("routing-openapi.json")?;
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<RawSpec> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            DocError::Parse(format!(
                "Failed to read OpenAPI file {}: {}",
                path.display(),
                e
            ))
        })?;

        let source_url = format!("file://{}", path.display());
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        if is_yaml {
            Self::from_yaml(&source_url, &content)
        } else {
            Self::from_json(&source_url, &content)
        }
    }

    /// Parse a document from a JSON string
    pub fn from_json(source_url: &str, json: &str) -> Result<RawSpec> {
        RawSpec::from_json(source_url, json)
    }

    /// Parse a document from a YAML string
    pub fn from_yaml(source_url: &str, yaml: &str) -> Result<RawSpec> {
        let value: serde_json::Value = serde_yaml::from_str(yaml)
            .map_err(|e| DocError::Parse(format!("Failed to parse OpenAPI YAML: {}", e)))?;
        RawSpec::new(source_url, Node::from_value(value), Utc::now())
    }
}
