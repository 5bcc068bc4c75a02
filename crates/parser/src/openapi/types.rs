//! OpenAPI 3.x type definitions
//!
//! Typed view over a document: only the members the generator reads are
//! modelled, and every schema or example payload is kept as a [`Node`].

use crate::node::Node;
use routedoc_common::HttpMethod;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// API information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Info {
    /// API title
    #[serde(default)]
    pub title: String,

    /// API version
    #[serde(default)]
    pub version: String,

    /// API description
    #[serde(default)]
    pub description: Option<String>,
}

/// Server information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    /// Server URL
    pub url: String,

    /// Server description
    #[serde(default)]
    pub description: Option<String>,
}

/// Top-level tag declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,
}

/// Path item (operations for a path)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(default)]
    pub summary: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub get: Option<Operation>,

    #[serde(default)]
    pub put: Option<Operation>,

    #[serde(default)]
    pub post: Option<Operation>,

    #[serde(default)]
    pub delete: Option<Operation>,

    #[serde(default)]
    pub options: Option<Operation>,

    #[serde(default)]
    pub head: Option<Operation>,

    #[serde(default)]
    pub patch: Option<Operation>,

    #[serde(default)]
    pub trace: Option<Operation>,

    /// Parameters shared by every operation on the path
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl PathItem {
    pub fn operation(&self, method: HttpMethod) -> Option<&Operation> {
        match method {
            HttpMethod::Get => self.get.as_ref(),
            HttpMethod::Put => self.put.as_ref(),
            HttpMethod::Post => self.post.as_ref(),
            HttpMethod::Delete => self.delete.as_ref(),
            HttpMethod::Options => self.options.as_ref(),
            HttpMethod::Head => self.head.as_ref(),
            HttpMethod::Patch => self.patch.as_ref(),
            HttpMethod::Trace => self.trace.as_ref(),
        }
    }

    /// Operations declared on this path, with path-level parameters merged in
    ///
    /// An operation parameter with the same `name` and `in` as a path-level one
    /// replaces it.
    pub fn operations(&self) -> Vec<(HttpMethod, Operation)> {
        HttpMethod::ALL
            .into_iter()
            .filter_map(|method| {
                self.operation(method).map(|op| {
                    let mut op = op.clone();
                    let mut merged: Vec<Parameter> = self
                        .parameters
                        .iter()
                        .filter(|shared| {
                            !op.parameters
                                .iter()
                                .any(|p| p.name == shared.name && p.location == shared.location)
                        })
                        .cloned()
                        .collect();
                    merged.append(&mut op.parameters);
                    op.parameters = merged;
                    (method, op)
                })
            })
            .collect()
    }
}

/// HTTP operation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Operation {
    #[serde(rename = "operationId")]
    #[serde(default)]
    pub operation_id: Option<String>,

    #[serde(default)]
    pub summary: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub parameters: Vec<Parameter>,

    #[serde(rename = "requestBody")]
    #[serde(default)]
    pub request_body: Option<RequestBody>,

    /// Responses keyed by status code (or `default`)
    #[serde(default)]
    pub responses: BTreeMap<String, Response>,

    /// Tags (for grouping)
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub deprecated: bool,
}

/// Parameter definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,

    /// Location: query, header, path, cookie
    #[serde(rename = "in")]
    pub location: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Node>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<Node>,
}

/// Request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestBody {
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub content: BTreeMap<String, MediaType>,

    #[serde(default)]
    pub required: bool,
}

impl RequestBody {
    /// Preferred media type: JSON if declared, otherwise the first one
    pub fn primary_content(&self) -> Option<(&str, &MediaType)> {
        primary_content(&self.content)
    }
}

/// Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub content: BTreeMap<String, MediaType>,
}

impl Response {
    pub fn primary_content(&self) -> Option<(&str, &MediaType)> {
        primary_content(&self.content)
    }
}

/// Media type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaType {
    #[serde(default)]
    pub schema: Option<Node>,

    #[serde(default)]
    pub example: Option<Node>,

    #[serde(default)]
    pub examples: BTreeMap<String, ExampleObject>,
}

impl MediaType {
    /// Literal example: `example` if present, else the first named example with an inline value
    pub fn literal_example(&self) -> Option<(&str, &Node)> {
        if let Some(example) = &self.example {
            return Some(("default", example));
        }
        self.examples
            .iter()
            .find_map(|(name, ex)| ex.value.as_ref().map(|v| (name.as_str(), v)))
    }
}

/// Named example
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExampleObject {
    #[serde(default)]
    pub summary: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub value: Option<Node>,
}

fn primary_content(content: &BTreeMap<String, MediaType>) -> Option<(&str, &MediaType)> {
    content
        .iter()
        .find(|(ct, _)| ct.as_str() == "application/json")
        .or_else(|| content.iter().find(|(ct, _)| ct.contains("json")))
        .or_else(|| content.iter().next())
        .map(|(ct, media)| (ct.as_str(), media))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_path_parameters_merged_into_operations() {
        let item: PathItem = serde_json::from_value(json!({
            "parameters": [
                {"name": "appkey", "in": "path", "required": true},
                {"name": "lang", "in": "query"}
            ],
            "get": {
                "parameters": [{"name": "lang", "in": "query", "required": true}]
            },
            "post": {}
        }))
        .unwrap();

        let ops = item.operations();
        assert_eq!(ops.len(), 2);
        let (method, get) = &ops[0];
        assert_eq!(*method, HttpMethod::Get);
        assert_eq!(get.parameters.len(), 2);
        let lang = get.parameters.iter().find(|p| p.name == "lang").unwrap();
        assert!(lang.required);
        assert_eq!(ops[1].1.parameters.len(), 2);
    }

    #[test]
    fn test_literal_example_prefers_example_member() {
        let media: MediaType = serde_json::from_value(json!({
            "example": {"a": 1},
            "examples": {"other": {"value": {"a": 2}}}
        }))
        .unwrap();
        let (name, value) = media.literal_example().unwrap();
        assert_eq!(name, "default");
        assert_eq!(value.to_value(), json!({"a": 1}));
    }

    #[test]
    fn test_literal_example_skips_entries_without_value() {
        let media: MediaType = serde_json::from_value(json!({
            "examples": {
                "a_external": {"summary": "no inline value"},
                "b_inline": {"value": [1, 2]}
            }
        }))
        .unwrap();
        let (name, value) = media.literal_example().unwrap();
        assert_eq!(name, "b_inline");
        assert_eq!(value.to_value(), json!([1, 2]));
    }

    #[test]
    fn test_primary_content_prefers_json() {
        let body: RequestBody = serde_json::from_value(json!({
            "content": {
                "application/xml": {},
                "application/vnd.omelet.v2+json": {},
                "application/json": {"schema": {"type": "object"}}
            }
        }))
        .unwrap();
        assert_eq!(body.primary_content().unwrap().0, "application/json");
    }
}
