//! Integration tests for structure generation and published-tree lookups

use routedoc_common::{
    AuthScheme, Direction, DocError, EndpointKey, Example, HttpMethod, ProviderConfig, ProviderId,
    Provenance, RoutePredicate, ValidationState,
};
use routedoc_generator::layout::{self, EndpointIndex};
use routedoc_generator::{ArtifactSet, DocsReader, StructureGenerator};
use routedoc_parser::openapi::OpenApiParser;
use routedoc_parser::{partition, resolve, ProviderSpec};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn routing_provider() -> ProviderConfig {
    ProviderConfig {
        id: ProviderId::new("omelet").unwrap(),
        title: "Omelet Routing Engine API".to_string(),
        docs_url: "mem://routing".to_string(),
        base_url: "https://routing.example".to_string(),
        route: RoutePredicate::PathPrefix("/api/".to_string()),
        strip_prefix: Some("/api/".to_string()),
        auth: AuthScheme::Header {
            name: "X-API-KEY".to_string(),
            env: "ROUTING_API_KEY".to_string(),
        },
        accept: None,
        synthesize_examples: true,
        validate_extracted: false,
        generation_hints: Vec::new(),
    }
}

fn routing_spec(value: Value) -> ProviderSpec {
    let raw = OpenApiParser::from_json("mem://routing", &value.to_string()).unwrap();
    let resolved = resolve(&raw).unwrap();
    let provider = routing_provider();
    partition(&resolved, &[&provider]).unwrap().remove(0)
}

fn sample_spec() -> ProviderSpec {
    routing_spec(json!({
        "openapi": "3.0.0",
        "info": {"title": "Routing", "version": "2.0.0"},
        "paths": {
            "/api/vrp": {
                "post": {
                    "summary": "Vehicle routing | single depot",
                    "description": "Solve a VRP.\nReturns routes.",
                    "tags": ["routing"],
                    "requestBody": {
                        "required": true,
                        "content": {"application/json": {"schema": {"$ref": "#/components/schemas/VrpRequest"}}}
                    },
                    "responses": {
                        "200": {
                            "description": "Solved",
                            "content": {"application/json": {
                                "schema": {"type": "object"},
                                "example": {"routes": []}
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
                            "examples": {"small": {"value": {"locations": [[127.0, 37.5], [127.1, 37.6]]}}}
                        }}
                    },
                    "responses": {"200": {"description": "ok"}}
                }
            },
            "/api/jobs/{id}": {
                "parameters": [{"name": "id", "in": "path", "required": true, "schema": {"type": "string"}}],
                "get": {"summary": "Job status", "responses": {"200": {"description": "ok"}}}
            }
        },
        "components": {"schemas": {"VrpRequest": {
            "type": "object",
            "required": ["depot"],
            "properties": {"depot": {"type": "object"}, "name": {"type": "string", "nullable": true}}
        }}}
    }))
}

fn write_tree(root: &Path, artifacts: &ArtifactSet) {
    for (relative, bytes) in artifacts.iter() {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, bytes).unwrap();
    }
}

#[test]
fn test_generation_is_deterministic() {
    let generator = StructureGenerator::new().unwrap();
    let provider = routing_provider();

    let first = generator.generate(&sample_spec(), &provider).unwrap();
    let second = generator.generate(&sample_spec(), &provider).unwrap();
    assert_eq!(first.structure(), second.structure());
    assert_eq!(first.endpoints, second.endpoints);
    let jobs = first
        .endpoint(&EndpointKey::new("/api/jobs/{id}", HttpMethod::Get))
        .unwrap();
    assert_eq!(jobs.path_parameters().count(), 1);

    let examples = first.extracted_examples();
    let mut reversed = examples.clone();
    reversed.reverse();
    assert_eq!(
        first.finalize(&examples).unwrap(),
        second.finalize(&reversed).unwrap()
    );
}

#[test]
fn test_structure_artifacts() {
    let generator = StructureGenerator::new().unwrap();
    let docs = generator.generate(&sample_spec(), &routing_provider()).unwrap();
    let paths: Vec<&str> = docs.structure().paths().collect();

    assert!(paths.contains(&"omelet/endpoints_summary.md"));
    assert!(paths.contains(&"omelet/openapi.json"));
    assert!(paths.contains(&"omelet/overviews/post_vrp.json"));
    assert!(paths.contains(&"omelet/overviews/get_jobs_{id}.json"));
    assert!(paths.contains(&"omelet/schemas/request_body/post_vrp.json"));
    assert!(paths.contains(&"omelet/schemas/response/post_vrp/200.json"));
    assert!(paths.contains(&"omelet/schemas/response/post_vrp/422.json"));
    assert!(!paths.contains(&"omelet/schemas/request_body/get_jobs_{id}.json"));

    let summary = String::from_utf8(
        docs.structure()
            .get("omelet/endpoints_summary.md")
            .unwrap()
            .to_vec(),
    )
    .unwrap();
    assert!(summary.starts_with("# Omelet Routing Engine API\n"));
    assert!(summary.contains(
        "| POST | /api/vrp | Vehicle routing \\| single depot | Solve a VRP. Returns routes. |"
    ));

    let schema: Value = serde_json::from_slice(
        docs.structure()
            .get("omelet/schemas/request_body/post_vrp.json")
            .unwrap(),
    )
    .unwrap();
    assert_eq!(schema["required"], json!(true));
    assert_eq!(schema["schema"]["required"], json!(["depot"]));
    assert_eq!(
        schema["_meta"],
        json!({"provider": "omelet", "path": "/api/vrp", "method": "post"})
    );

    let overview: Value = serde_json::from_slice(
        docs.structure()
            .get("omelet/overviews/get_jobs_{id}.json")
            .unwrap(),
    )
    .unwrap();
    assert_eq!(overview["method"], "GET");
    assert_eq!(overview["parameters"][0]["name"], "id");
}

#[test]
fn test_extracted_examples() {
    let generator = StructureGenerator::new().unwrap();
    let docs = generator.generate(&sample_spec(), &routing_provider()).unwrap();

    let vrp = docs.endpoint(&EndpointKey::new("/api/vrp", HttpMethod::Post)).unwrap();
    assert!(vrp.lacks_request_example());
    assert_eq!(vrp.response_examples().count(), 1);

    let matrix = docs.endpoint(&EndpointKey::new("/api/cost-matrix", HttpMethod::Post)).unwrap();
    let request = matrix.extracted_request().unwrap();
    assert_eq!(request.name, "small");
    assert_eq!(request.provenance, Provenance::Extracted);
    assert!(!matrix.lacks_request_example());
}

#[test]
fn test_duplicate_endpoints_generated_once() {
    let spec = routing_spec(json!({
        "paths": {
            "/api/vrp": {"post": {"summary": "first"}},
            "/api/vrp/": {"post": {"summary": "second"}},
            "/api//vrp": {"get": {"summary": "read"}}
        }
    }));
    let generator = StructureGenerator::new().unwrap();
    let docs = generator.generate(&spec, &routing_provider()).unwrap();

    let keys: Vec<String> = docs.endpoints.iter().map(|e| e.key.to_string()).collect();
    assert_eq!(keys, vec!["GET /api/vrp", "POST /api/vrp"]);
    assert_eq!(docs.endpoints[1].summary, "first");
    assert_eq!(
        docs.structure().paths().filter(|p| p.starts_with("omelet/overviews/")).count(),
        2
    );
}

#[test]
fn test_colliding_file_ids_rejected() {
    let spec = routing_spec(json!({
        "paths": {
            "/api/a b": {"get": {}},
            "/api/a:b": {"get": {}}
        }
    }));
    let generator = StructureGenerator::new().unwrap();
    let err = generator.generate(&spec, &routing_provider()).unwrap_err();
    assert!(matches!(err, DocError::Generation(msg) if msg.contains("get_a-b")));
}

#[test]
fn test_finalize_prefers_extracted_and_records_provenance() {
    let generator = StructureGenerator::new().unwrap();
    let docs = generator.generate(&sample_spec(), &routing_provider()).unwrap();
    let vrp = EndpointKey::new("/api/vrp", HttpMethod::Post);
    let matrix = EndpointKey::new("/api/cost-matrix", HttpMethod::Post);

    let mut examples = docs.extracted_examples();
    examples.push(
        Example::synthesized(vrp.clone(), json!({"depot": {"x": 1}}))
            .with_validation(ValidationState::Valid),
    );
    examples.push(Example::synthesized(matrix.clone(), json!({"locations": []})));

    let artifacts = docs.finalize(&examples).unwrap();
    let index: EndpointIndex =
        serde_json::from_slice(artifacts.get("omelet/index.json").unwrap()).unwrap();

    let vrp_entry = index.endpoints.iter().find(|e| e.path == "/api/vrp").unwrap();
    let record = vrp_entry.request_example.as_ref().unwrap();
    assert_eq!(record.provenance, Provenance::Synthesized);
    assert_eq!(record.validation, ValidationState::Valid);
    assert_eq!(vrp_entry.response_examples, vec![200]);
    assert_eq!(vrp_entry.responses, vec!["200", "422"]);

    let matrix_entry = index.endpoints.iter().find(|e| e.path == "/api/cost-matrix").unwrap();
    assert_eq!(matrix_entry.request_example.as_ref().unwrap().provenance, Provenance::Extracted);
    let payload: Value = serde_json::from_slice(
        artifacts
            .get("omelet/examples/request_body/post_cost-matrix.json")
            .unwrap(),
    )
    .unwrap();
    assert_eq!(payload, json!({"locations": [[127.0, 37.5], [127.1, 37.6]]}));

    let unknown = Example::extracted(
        EndpointKey::new("/api/unknown", HttpMethod::Get),
        Direction::Request,
        "x",
        json!({}),
    );
    assert!(docs.finalize(&[unknown]).is_err());
}

#[test]
fn test_reader_lookups() {
    let generator = StructureGenerator::new().unwrap();
    let provider = routing_provider();
    let docs = generator.generate(&sample_spec(), &provider).unwrap();
    let mut tree = docs.finalize(&docs.extracted_examples()).unwrap();
    tree.extend(generator.shared_artifacts(&[&provider]).unwrap()).unwrap();

    let dir = TempDir::new().unwrap();
    write_tree(dir.path(), &tree);
    let reader = DocsReader::open(dir.path()).unwrap();

    assert_eq!(reader.providers().len(), 1);
    assert_eq!(reader.provider_for_path("/api/vrp").unwrap(), "omelet");
    assert!(reader.basic_info().unwrap().contains("`X-API-KEY` request header"));
    assert!(reader.list_endpoints(None).unwrap().contains("/api/cost-matrix"));

    let overview = reader.overview("/api/vrp/", None, None).unwrap();
    assert_eq!(overview["path"], "/api/vrp");

    let example = reader
        .request_example("/api/cost-matrix", Some(HttpMethod::Post), Some("omelet"))
        .unwrap();
    assert_eq!(example["locations"][0], json!([127.0, 37.5]));

    let response = reader.response_schema("/api/vrp", None, "422", None).unwrap();
    assert_eq!(response["description"], "Invalid input");
    assert!(matches!(
        reader.response_schema("/api/vrp", None, "500", None),
        Err(DocError::NotFound(_))
    ));
    assert!(matches!(
        reader.request_example("/api/vrp", None, None),
        Err(DocError::NotFound(_))
    ));
}

#[test]
fn test_reader_rejects_traversal_keys() {
    let generator = StructureGenerator::new().unwrap();
    let provider = routing_provider();
    let docs = generator.generate(&sample_spec(), &provider).unwrap();
    let mut tree = docs.finalize(&[]).unwrap();
    tree.extend(generator.shared_artifacts(&[&provider]).unwrap()).unwrap();

    let dir = TempDir::new().unwrap();
    write_tree(dir.path(), &tree);
    let reader = DocsReader::open(dir.path()).unwrap();

    assert!(matches!(reader.index("../omelet"), Err(DocError::InvalidKey(_))));
    assert!(matches!(reader.index("inavi"), Err(DocError::NotFound(_))));
    assert!(matches!(
        reader.overview("/api/../../etc/passwd", None, Some("omelet")),
        Err(DocError::InvalidKey(_))
    ));
    assert!(matches!(
        reader.response_schema("/api/vrp", None, "../200", None),
        Err(DocError::InvalidKey(_))
    ));
    assert!(matches!(
        reader.list_endpoints(Some("omelet/..")),
        Err(DocError::InvalidKey(_))
    ));
}

#[test]
fn test_reader_on_empty_directory() {
    let dir = TempDir::new().unwrap();
    let err = DocsReader::open(dir.path()).unwrap_err();
    assert!(err.to_string().contains("update-docs"));
    assert_eq!(layout::MANIFEST_FILE, "manifest.json");
}
