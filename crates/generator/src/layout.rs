//! On-disk layout of the published documentation tree
//!
//! ```text
//! <root>/
//!   manifest.json
//!   basic_info.md
//!   <provider>/
//!     index.json
//!     endpoints_summary.md
//!     openapi.json
//!     overviews/<id>.json
//!     schemas/request_body/<id>.json
//!     schemas/response/<id>/<status>.json
//!     examples/request_body/<id>.json
//!     examples/response/<id>/<status>.json
//! ```
//!
//! Every path here is relative to the root and uses `/` separators.

use routedoc_common::{HttpMethod, Provenance, ValidationState};
use serde::{Deserialize, Serialize};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const BASIC_INFO_FILE: &str = "basic_info.md";
pub const INDEX_FILE: &str = "index.json";
pub const SUMMARY_FILE: &str = "endpoints_summary.md";
pub const OPENAPI_FILE: &str = "openapi.json";

pub fn index_path(provider: &str) -> String {
    format!("{}/{}", provider, INDEX_FILE)
}

pub fn summary_path(provider: &str) -> String {
    format!("{}/{}", provider, SUMMARY_FILE)
}

pub fn openapi_path(provider: &str) -> String {
    format!("{}/{}", provider, OPENAPI_FILE)
}

pub fn overview_path(provider: &str, id: &str) -> String {
    format!("{}/overviews/{}.json", provider, id)
}

pub fn request_schema_path(provider: &str, id: &str) -> String {
    format!("{}/schemas/request_body/{}.json", provider, id)
}

pub fn response_schema_path(provider: &str, id: &str, status: &str) -> String {
    format!("{}/schemas/response/{}/{}.json", provider, id, status)
}

pub fn request_example_path(provider: &str, id: &str) -> String {
    format!("{}/examples/request_body/{}.json", provider, id)
}

pub fn response_example_path(provider: &str, id: &str, status: u16) -> String {
    format!("{}/examples/response/{}/{}.json", provider, id, status)
}

/// Derive the file id of an endpoint
///
/// `POST /api/cost-matrix` with strip prefix `/api/` becomes `post_cost-matrix`.
pub fn endpoint_id(path: &str, method: HttpMethod, strip_prefix: Option<&str>) -> String {
    let stripped = strip_prefix
        .and_then(|prefix| path.strip_prefix(prefix))
        .unwrap_or(path);
    let path_id: String = stripped
        .trim_matches('/')
        .split('/')
        .filter(|seg| !seg.is_empty())
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '{' | '}') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let path_id = if path_id.is_empty() || path_id.chars().all(|c| c == '.') {
        "root".to_string()
    } else {
        path_id
    };
    format!("{}_{}", method.as_str(), path_id)
}

/// Provider entry in `manifest.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: String,
    pub title: String,
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_prefix: Option<String>,
}

/// Shared `manifest.json`: providers present in the published tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub providers: Vec<ManifestEntry>,
}

/// Example metadata recorded in the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleRecord {
    pub name: String,
    pub provenance: Provenance,
    pub validation: ValidationState,
}

/// One endpoint of a provider's `index.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub path: String,
    pub method: HttpMethod,
    #[serde(default)]
    pub summary: String,
    /// Declared response status codes
    #[serde(default)]
    pub responses: Vec<String>,
    #[serde(default)]
    pub has_request_body: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_example: Option<ExampleRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub response_examples: Vec<u16>,
}

/// A provider's `index.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointIndex {
    pub provider: String,
    pub title: String,
    pub base_url: String,
    pub endpoints: Vec<IndexEntry>,
}
