//! Shared fixtures for the pipeline integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use mockall::mock;
use routedoc_common::{AuthScheme, ProviderConfig, ProviderId, RoutePredicate};
use routedoc_generator::{ProviderDocs, StructureGenerator};
use routedoc_parser::openapi::OpenApiParser;
use routedoc_parser::{partition, resolve};
use routedoc_pipeline::{
    CompletionService, HttpRequest, HttpResponse, HttpTransport, Result, RetryPolicy,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use walkdir::WalkDir;

mock! {
    pub Transport {}

    #[async_trait]
    impl HttpTransport for Transport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
    }
}

mock! {
    pub Completion {}

    #[async_trait]
    impl CompletionService for Completion {
        async fn complete(&self, prompt: String) -> Result<String>;
    }
}

/// Policy with millisecond delays so real-time tests stay fast
pub fn fast_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy::new(
        max_retries,
        Duration::from_millis(1),
        Duration::from_millis(5),
    )
    .without_jitter()
}

pub fn routing_provider() -> ProviderConfig {
    ProviderConfig {
        id: ProviderId::new("omelet").unwrap(),
        title: "Omelet Routing Engine API".to_string(),
        docs_url: "https://routing.test/docs/json".to_string(),
        base_url: "https://routing.test".to_string(),
        route: RoutePredicate::PathPrefix("/api/".to_string()),
        strip_prefix: Some("/api/".to_string()),
        auth: AuthScheme::Header {
            name: "X-API-KEY".to_string(),
            env: "ROUTEDOC_TEST_ROUTING_KEY".to_string(),
        },
        accept: None,
        synthesize_examples: true,
        validate_extracted: false,
        generation_hints: vec!["Use coordinates in Seoul.".to_string()],
    }
}

/// Provider owning everything under `prefix`, served from its own document
pub fn simple_provider(id: &str, prefix: &str) -> ProviderConfig {
    ProviderConfig {
        id: ProviderId::new(id).unwrap(),
        title: format!("{} API", id),
        docs_url: format!("https://{}.test/docs", id),
        base_url: format!("https://{}.test", id),
        route: RoutePredicate::PathPrefix(prefix.to_string()),
        strip_prefix: None,
        auth: AuthScheme::None,
        accept: None,
        synthesize_examples: false,
        validate_extracted: false,
        generation_hints: Vec::new(),
    }
}

/// `/api/vrp` has a request schema and no request example;
/// `/api/cost-matrix` carries its own request example.
pub fn routing_document() -> Value {
    json!({
        "openapi": "3.0.0",
        "info": {"title": "Routing", "version": "2.0.0"},
        "paths": {
            "/api/vrp": {
                "post": {
                    "summary": "Vehicle routing",
                    "requestBody": {
                        "required": true,
                        "content": {"application/json": {"schema": {"$ref": "#/components/schemas/VrpRequest"}}}
                    },
                    "responses": {
                        "200": {
                            "description": "Solved",
                            "content": {"application/json": {
                                "schema": {"type": "object"},
                                "example": {"routes": [{"vehicle": "v1", "jobs": ["j1"]}]}
                            }}
                        },
                        "422": {"description": "Invalid input"}
                    }
                }
            },
            "/api/cost-matrix": {
                "post": {
                    "summary": "Cost matrix",
                    "requestBody": {
                        "content": {"application/json": {
                            "schema": {"type": "object", "required": ["locations"], "properties": {"locations": {"type": "array"}}},
                            "example": {"locations": [[127.0, 37.5], [127.1, 37.6]]}
                        }}
                    },
                    "responses": {"200": {"description": "ok"}}
                }
            }
        },
        "components": {
            "schemas": {
                "VrpRequest": {
                    "type": "object",
                    "required": ["vehicles", "jobs"],
                    "properties": {
                        "vehicles": {"type": "array", "minItems": 1, "items": {"type": "string"}},
                        "jobs": {"type": "array", "items": {"type": "string"}}
                    }
                }
            }
        }
    })
}

/// Minimal document with one GET endpoint under `prefix`
pub fn simple_document(prefix: &str, summary: &str) -> Value {
    json!({
        "openapi": "3.0.0",
        "info": {"title": "Simple", "version": "1.0.0"},
        "paths": {
            (format!("{}status", prefix)): {
                "get": {
                    "summary": summary,
                    "responses": {"200": {"description": "ok"}}
                }
            }
        }
    })
}

pub fn generate(provider: &ProviderConfig, document: &Value) -> ProviderDocs {
    let raw = OpenApiParser::from_json(&provider.docs_url, &document.to_string()).unwrap();
    let resolved = resolve(&raw).unwrap();
    let spec = partition(&resolved, &[provider]).unwrap().remove(0);
    StructureGenerator::new().unwrap().generate(&spec, provider).unwrap()
}

/// Every file under `root`, following the live link
pub fn snapshot(root: &Path) -> BTreeMap<String, Vec<u8>> {
    WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .map(|entry| entry.unwrap())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let relative = entry
                .path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/");
            (relative, std::fs::read(entry.path()).unwrap())
        })
        .collect()
}
