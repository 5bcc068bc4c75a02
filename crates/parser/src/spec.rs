//! Pipeline hand-off values: raw, resolved and provider-scoped documents

use crate::node::Node;
use crate::openapi::PathItem;
use chrono::{DateTime, Utc};
use routedoc_common::{DocError, ProviderId, Result};
use std::collections::{BTreeMap, BTreeSet};

/// A document exactly as fetched
#[derive(Debug, Clone)]
pub struct RawSpec {
    pub source_url: String,
    pub document: Node,
    pub fetched_at: DateTime<Utc>,
}

impl RawSpec {
    /// Wrap a fetched document, checking it looks like an OpenAPI document
    pub fn new(
        source_url: impl Into<String>,
        document: Node,
        fetched_at: DateTime<Utc>,
    ) -> Result<Self> {
        let source_url = source_url.into();
        if !document.is_object() {
            return Err(DocError::Parse(format!(
                "document from {} is not a JSON object",
                source_url
            )));
        }
        if !matches!(document.get("paths"), Some(Node::Object(_))) {
            return Err(DocError::Parse(format!(
                "document from {} has no 'paths' object",
                source_url
            )));
        }
        Ok(Self {
            source_url,
            document,
            fetched_at,
        })
    }

    pub fn from_json(source_url: impl Into<String>, json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| DocError::Parse(format!("Failed to parse OpenAPI JSON: {}", e)))?;
        Self::new(source_url, Node::from_value(value), Utc::now())
    }
}

/// A document with every internal reference inlined
#[derive(Debug, Clone)]
pub struct ResolvedSpec {
    pub source_url: String,
    pub document: Node,
    pub fetched_at: DateTime<Utc>,
    /// For every path, the pointers its definition reached while resolving
    pub reachable: BTreeMap<String, BTreeSet<String>>,
}

impl ResolvedSpec {
    /// Path names in document order
    pub fn path_names(&self) -> Vec<&str> {
        self.document
            .get("paths")
            .and_then(Node::as_object)
            .map(|paths| paths.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

/// The self-contained slice of a resolved document owned by one provider
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSpec {
    pub provider: ProviderId,
    pub title: String,
    pub document: Node,
}

impl ProviderSpec {
    pub fn path_names(&self) -> Vec<&str> {
        self.document
            .get("paths")
            .and_then(Node::as_object)
            .map(|paths| paths.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Typed view of every path item, in path order
    pub fn path_items(&self) -> Result<Vec<(String, PathItem)>> {
        let Some(paths) = self.document.get("paths").and_then(Node::as_object) else {
            return Ok(Vec::new());
        };
        paths
            .iter()
            .map(|(path, node)| {
                serde_json::from_value::<PathItem>(node.to_value())
                    .map(|item| (path.clone(), item))
                    .map_err(|e| {
                        DocError::Parse(format!(
                            "path '{}' of provider '{}' is not a valid path item: {}",
                            path, self.provider, e
                        ))
                    })
            })
            .collect()
    }

    pub fn to_value(&self) -> serde_json::Value {
        self.document.to_value()
    }
}
