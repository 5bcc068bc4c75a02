//! Integration tests: load, resolve and partition OpenAPI documents

use routedoc_common::{
    AuthScheme, DocError, ProviderConfig, ProviderId, ProviderRegistry, RoutePredicate,
};
use routedoc_parser::openapi::OpenApiParser;
use routedoc_parser::{partition, resolve};
use std::collections::BTreeSet;
use std::io::Write;

fn provider(id: &str, prefix: &str) -> ProviderConfig {
    ProviderConfig {
        id: ProviderId::new(id).unwrap(),
        title: format!("Provider {}", id),
        docs_url: "mem://combined".to_string(),
        base_url: "http://localhost".to_string(),
        route: RoutePredicate::PathPrefix(prefix.to_string()),
        strip_prefix: Some(prefix.to_string()),
        auth: AuthScheme::None,
        accept: None,
        synthesize_examples: false,
        validate_extracted: false,
        generation_hints: Vec::new(),
    }
}

const TWO_PROVIDER_SPEC: &str = r##"{
    "openapi": "3.0.0",
    "info": {"title": "Combined", "version": "1.0.0"},
    "paths": {
        "/a/jobs": {
            "post": {
                "operationId": "createJob",
                "requestBody": {
                    "required": true,
                    "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Job"}}}
                },
                "responses": {"201": {"$ref": "#/components/responses/Created"}}
            }
        },
        "/a/jobs/{id}": {
            "get": {"responses": {"200": {"$ref": "#/components/responses/Created"}}}
        },
        "/b/geocode": {
            "get": {
                "parameters": [{"name": "q", "in": "query", "schema": {"type": "string"}}],
                "responses": {"200": {"description": "ok", "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Point"}}}}}
            }
        },
        "/b/reverse": {
            "get": {"responses": {"200": {"description": "ok"}}}
        }
    },
    "components": {
        "schemas": {
            "Point": {"type": "object", "properties": {"x": {"type": "number"}, "y": {"type": "number"}}},
            "Job": {"type": "object", "required": ["depot"], "properties": {"depot": {"$ref": "#/components/schemas/Point"}}}
        },
        "responses": {
            "Created": {"description": "created", "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Job"}}}}
        }
    }
}"##;

#[test]
fn test_two_providers_partition_without_path_loss() {
    let raw = OpenApiParser::from_json("mem://combined", TWO_PROVIDER_SPEC).unwrap();
    let resolved = resolve(&raw).unwrap();
    let a = provider("a", "/a/");
    let b = provider("b", "/b/");

    let specs = partition(&resolved, &[&a, &b]).unwrap();
    assert_eq!(specs.len(), 2);

    let all: BTreeSet<&str> = resolved.path_names().into_iter().collect();
    let mut union = BTreeSet::new();
    for spec in &specs {
        for path in spec.path_names() {
            assert!(union.insert(path), "path {} assigned twice", path);
        }
    }
    assert_eq!(union, all);

    assert_eq!(specs[0].path_names(), vec!["/a/jobs", "/a/jobs/{id}"]);
    assert_eq!(specs[1].path_names(), vec!["/b/geocode", "/b/reverse"]);

    // Point is reached from both providers and copied into each
    let a_doc = specs[0].to_value();
    let b_doc = specs[1].to_value();
    assert!(a_doc["components"]["schemas"]["Point"].is_object());
    assert!(b_doc["components"]["schemas"]["Point"].is_object());
    assert!(b_doc["components"]["schemas"].get("Job").is_none());
}

#[test]
fn test_typed_view_of_provider_paths() {
    let raw = OpenApiParser::from_json("mem://combined", TWO_PROVIDER_SPEC).unwrap();
    let resolved = resolve(&raw).unwrap();
    let a = provider("a", "/a/");
    let b = provider("b", "/b/");
    let specs = partition(&resolved, &[&a, &b]).unwrap();

    let items = specs[0].path_items().unwrap();
    let (path, item) = &items[0];
    assert_eq!(path, "/a/jobs");
    let ops = item.operations();
    let (_, create) = &ops[0];
    assert_eq!(create.operation_id.as_deref(), Some("createJob"));
    let body = create.request_body.as_ref().unwrap();
    let (content_type, media) = body.primary_content().unwrap();
    assert_eq!(content_type, "application/json");
    let schema = media.schema.as_ref().unwrap().to_value();
    assert_eq!(schema["properties"]["depot"]["properties"]["x"]["type"], "number");
    assert_eq!(create.responses["201"].description, "created");
}

#[test]
fn test_path_outside_every_prefix_is_unroutable() {
    let raw = OpenApiParser::from_json("mem://combined", TWO_PROVIDER_SPEC).unwrap();
    let resolved = resolve(&raw).unwrap();
    let a = provider("a", "/a/");

    let err = partition(&resolved, &[&a]).unwrap_err();
    match err {
        DocError::UnroutablePath { paths } => {
            assert_eq!(paths, vec!["/b/geocode".to_string(), "/b/reverse".to_string()]);
        }
        other => panic!("expected unroutable path error, got {}", other),
    }
}

#[test]
fn test_builtin_registry_routes_everything() {
    let registry = ProviderRegistry::builtin().unwrap();
    let raw = OpenApiParser::from_json(
        "mem://omelet",
        r#"{"openapi": "3.0.0", "info": {"title": "x", "version": "1"}, "paths": {
            "/api/vrp": {"post": {}},
            "/api/cost-matrix": {"post": {}},
            "/maps/v3.0/appkeys/{appkey}/coordinates": {"get": {}}
        }}"#,
    )
    .unwrap();
    let resolved = resolve(&raw).unwrap();
    let providers: Vec<&ProviderConfig> = registry.providers().iter().collect();
    let specs = partition(&resolved, &providers).unwrap();

    assert_eq!(specs[0].provider.as_str(), "omelet");
    assert_eq!(specs[0].path_names(), vec!["/api/cost-matrix", "/api/vrp"]);
    assert_eq!(specs[1].path_names(), vec!["/maps/v3.0/appkeys/{appkey}/coordinates"]);
}

#[test]
fn test_from_file_reads_json_and_yaml() {
    let mut json_file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    json_file.write_all(TWO_PROVIDER_SPEC.as_bytes()).unwrap();
    let raw = OpenApiParser::from_file(json_file.path()).unwrap();
    assert!(raw.source_url.starts_with("file://"));

    let mut yaml_file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    yaml_file
        .write_all(b"openapi: 3.0.0\ninfo: {title: t, version: '1'}\npaths: {}\n")
        .unwrap();
    assert!(OpenApiParser::from_file(yaml_file.path()).is_ok());

    assert!(OpenApiParser::from_file("/nonexistent/spec.json").is_err());
}
