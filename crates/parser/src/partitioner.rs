//! Provider partitioning
//!
//! Splits a resolved document into one self-contained document per provider.
//! Every path goes to the first provider whose route predicate matches it;
//! a path no provider claims fails the whole partition.

use crate::node::Node;
use crate::resolver::decode_pointer;
use crate::spec::{ProviderSpec, ResolvedSpec};
use routedoc_common::{DocError, HttpMethod, ProviderConfig, Result, RoutePredicate};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, info};

/// Split `resolved` between `providers`, in the given order
pub fn partition(
    resolved: &ResolvedSpec,
    providers: &[&ProviderConfig],
) -> Result<Vec<ProviderSpec>> {
    if providers.is_empty() {
        return Err(DocError::Config("no providers to partition into".to_string()));
    }
    let mut seen = HashSet::new();
    for provider in providers {
        if !seen.insert(provider.id.as_str()) {
            return Err(DocError::Config(format!(
                "provider '{}' listed twice",
                provider.id
            )));
        }
    }

    let empty = BTreeMap::new();
    let paths = resolved
        .document
        .get("paths")
        .and_then(Node::as_object)
        .unwrap_or(&empty);

    let mut owned: Vec<BTreeMap<String, Node>> = vec![BTreeMap::new(); providers.len()];
    let mut unroutable = Vec::new();
    for (path, item) in paths {
        match providers.iter().position(|p| matches(&p.route, path, item)) {
            Some(index) => {
                debug!(path = %path, provider = %providers[index].id, "Routed path");
                owned[index].insert(path.clone(), item.clone());
            }
            None => unroutable.push(path.clone()),
        }
    }
    if !unroutable.is_empty() {
        return Err(DocError::UnroutablePath { paths: unroutable });
    }

    let specs: Vec<ProviderSpec> = providers
        .iter()
        .zip(owned)
        .map(|(provider, provider_paths)| {
            build_provider_spec(resolved, provider, provider_paths)
        })
        .collect();

    for spec in &specs {
        info!(
            provider = %spec.provider,
            paths = spec.path_names().len(),
            "Partitioned provider document"
        );
    }
    Ok(specs)
}

fn matches(route: &RoutePredicate, path: &str, item: &Node) -> bool {
    match route {
        RoutePredicate::PathPrefix(prefix) => path.starts_with(prefix.as_str()),
        RoutePredicate::Tag(tag) => operation_tags(item).any(|t| t == tag),
    }
}

fn operation_tags(item: &Node) -> impl Iterator<Item = &str> {
    HttpMethod::ALL
        .into_iter()
        .filter_map(move |method| item.get(method.as_str()))
        .filter_map(|op| op.get("tags").and_then(Node::as_array))
        .flatten()
        .filter_map(Node::as_str)
}

fn build_provider_spec(
    resolved: &ResolvedSpec,
    provider: &ProviderConfig,
    paths: BTreeMap<String, Node>,
) -> ProviderSpec {
    let mut document = BTreeMap::new();
    if let Some(root) = resolved.document.as_object() {
        for (key, value) in root {
            if !matches!(key.as_str(), "paths" | "components" | "tags") {
                document.insert(key.clone(), value.clone());
            }
        }
    }

    let mut info = resolved
        .document
        .get("info")
        .and_then(Node::as_object)
        .cloned()
        .unwrap_or_default();
    info.insert("title".to_string(), Node::string(provider.title.clone()));
    document.insert("info".to_string(), Node::Object(info));

    let used_tags: BTreeSet<&str> = paths.values().flat_map(operation_tags).collect();
    if let Some(tags) = resolved.document.get("tags").and_then(Node::as_array) {
        let kept: Vec<Node> = tags
            .iter()
            .filter(|tag| {
                tag.get("name")
                    .and_then(Node::as_str)
                    .is_some_and(|name| used_tags.contains(name))
            })
            .cloned()
            .collect();
        document.insert("tags".to_string(), Node::Array(kept));
    }

    let components = reachable_components(resolved, paths.keys());
    if !components.is_empty() {
        document.insert(
            "components".to_string(),
            Node::Object(
                components
                    .into_iter()
                    .map(|(kind, entries)| (kind, Node::Object(entries)))
                    .collect(),
            ),
        );
    }

    document.insert("paths".to_string(), Node::Object(paths));

    ProviderSpec {
        provider: provider.id.clone(),
        title: provider.title.clone(),
        document: Node::Object(document),
    }
}

/// Components reached from `paths`, plus every security scheme
fn reachable_components<'a>(
    resolved: &ResolvedSpec,
    paths: impl Iterator<Item = &'a String>,
) -> BTreeMap<String, BTreeMap<String, Node>> {
    let mut out: BTreeMap<String, BTreeMap<String, Node>> = BTreeMap::new();
    let Some(components) = resolved.document.get("components") else {
        return out;
    };

    let pointers: BTreeSet<&String> = paths
        .filter_map(|path| resolved.reachable.get(path))
        .flatten()
        .collect();
    for pointer in pointers {
        let Ok(tokens) = decode_pointer(pointer) else {
            continue;
        };
        let [root, kind, name, ..] = tokens.as_slice() else {
            continue;
        };
        if root != "components" {
            continue;
        }
        if let Some(entry) = components.get(kind).and_then(|k| k.get(name)) {
            out.entry(kind.clone())
                .or_default()
                .insert(name.clone(), entry.clone());
        }
    }

    if let Some(schemes) = components.get("securitySchemes").and_then(Node::as_object) {
        if !schemes.is_empty() {
            out.insert("securitySchemes".to_string(), schemes.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::resolve;
    use crate::spec::RawSpec;
    use chrono::Utc;
    use routedoc_common::{AuthScheme, ProviderId};
    use serde_json::{json, Value};

    fn provider(id: &str, route: RoutePredicate) -> ProviderConfig {
        ProviderConfig {
            id: ProviderId::new(id).unwrap(),
            title: format!("{} API", id.to_uppercase()),
            docs_url: "mem://spec".to_string(),
            base_url: "http://localhost".to_string(),
            route,
            strip_prefix: None,
            auth: AuthScheme::None,
            accept: None,
            synthesize_examples: false,
            validate_extracted: false,
            generation_hints: Vec::new(),
        }
    }

    fn resolved(value: Value) -> ResolvedSpec {
        let raw = RawSpec::new("mem://spec", Node::from_value(value), Utc::now()).unwrap();
        resolve(&raw).unwrap()
    }

    #[test]
    fn test_first_matching_predicate_wins() {
        let spec = resolved(json!({
            "paths": {
                "/api/vrp": {"post": {"tags": ["routing"]}},
                "/maps/geocode": {"get": {"tags": ["maps"]}},
                "/maps/route": {"get": {"tags": ["routing"]}}
            }
        }));
        let routing = provider("routing", RoutePredicate::Tag("routing".into()));
        let maps = provider("maps", RoutePredicate::PathPrefix("/".into()));
        let specs = partition(&spec, &[&routing, &maps]).unwrap();

        assert_eq!(specs[0].path_names(), vec!["/api/vrp", "/maps/route"]);
        assert_eq!(specs[1].path_names(), vec!["/maps/geocode"]);
    }

    #[test]
    fn test_every_unroutable_path_reported() {
        let spec = resolved(json!({
            "paths": {"/a/x": {}, "/c/y": {}, "/d/z": {}}
        }));
        let a = provider("a", RoutePredicate::PathPrefix("/a/".into()));
        match partition(&spec, &[&a]) {
            Err(DocError::UnroutablePath { paths }) => assert_eq!(paths, vec!["/c/y", "/d/z"]),
            other => panic!("expected unroutable path error, got {:?}", other),
        }
    }

    #[test]
    fn test_provider_without_paths_still_gets_a_spec() {
        let spec = resolved(json!({"paths": {"/a/x": {}}}));
        let a = provider("a", RoutePredicate::PathPrefix("/a/".into()));
        let b = provider("b", RoutePredicate::PathPrefix("/b/".into()));
        let specs = partition(&spec, &[&a, &b]).unwrap();
        assert_eq!(specs.len(), 2);
        assert!(specs[1].path_names().is_empty());
    }

    #[test]
    fn test_shared_components_duplicated_and_unused_dropped() {
        let spec = resolved(json!({
            "openapi": "3.0.3",
            "info": {"title": "Combined", "version": "1.2.0"},
            "tags": [{"name": "routing"}, {"name": "maps"}, {"name": "unused"}],
            "paths": {
                "/a/x": {"get": {"tags": ["routing"], "responses": {"200": {"$ref": "#/components/responses/Ok"}}}},
                "/b/y": {"get": {"tags": ["maps"], "responses": {"200": {"$ref": "#/components/responses/Ok"}}}},
                "/b/z": {"post": {"requestBody": {"content": {"application/json": {"schema": {"$ref": "#/components/schemas/OnlyB"}}}}}}
            },
            "components": {
                "responses": {"Ok": {"description": "ok", "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Shared"}}}}},
                "schemas": {
                    "Shared": {"type": "object"},
                    "OnlyB": {"type": "string"},
                    "Orphan": {"type": "integer"}
                },
                "securitySchemes": {"apiKey": {"type": "apiKey", "in": "header", "name": "X-API-KEY"}}
            }
        }));
        let a = provider("a", RoutePredicate::PathPrefix("/a/".into()));
        let b = provider("b", RoutePredicate::PathPrefix("/b/".into()));
        let specs = partition(&spec, &[&a, &b]).unwrap();

        let a_doc = specs[0].to_value();
        let b_doc = specs[1].to_value();
        assert_eq!(a_doc["info"], json!({"title": "A API", "version": "1.2.0"}));
        assert_eq!(a_doc["openapi"], json!("3.0.3"));
        assert_eq!(a_doc["tags"], json!([{"name": "routing"}]));
        assert_eq!(b_doc["tags"], json!([{"name": "maps"}]));

        assert!(a_doc["components"]["schemas"]["Shared"].is_object());
        assert!(b_doc["components"]["schemas"]["Shared"].is_object());
        assert!(a_doc["components"]["schemas"].get("OnlyB").is_none());
        assert!(b_doc["components"]["schemas"]["OnlyB"].is_object());
        assert!(b_doc["components"]["schemas"].get("Orphan").is_none());
        assert!(a_doc["components"]["securitySchemes"]["apiKey"].is_object());

        assert!(!specs[0].document.contains_reference());
        assert!(!specs[1].document.contains_reference());
    }

    #[test]
    fn test_duplicate_provider_rejected() {
        let spec = resolved(json!({"paths": {}}));
        let a = provider("a", RoutePredicate::PathPrefix("/".into()));
        assert!(matches!(partition(&spec, &[&a, &a]), Err(DocError::Config(_))));
    }
}
