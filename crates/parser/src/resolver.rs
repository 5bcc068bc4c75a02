//! Reference resolution
//!
//! Inlines every document-local `$ref` into a self-contained tree. Resolved
//! targets are memoized in an arena keyed by pointer string; the pointers on
//! the current resolution stack form the visited set used to detect cycles.

use crate::node::{Node, Reference};
use crate::spec::{RawSpec, ResolvedSpec};
use routedoc_common::{DocError, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

/// Resolve every internal reference of `raw`
///
/// The raw spec is not modified. Resolving a tree without references
/// returns an identical tree.
pub fn resolve(raw: &RawSpec) -> Result<ResolvedSpec> {
    let mut resolver = Resolver::new(&raw.document);
    let mut reachable = BTreeMap::new();

    let Node::Object(root) = &raw.document else {
        return Err(DocError::Parse("document root is not an object".to_string()));
    };

    let mut resolved_root = BTreeMap::new();

    // Paths go first so cycle chains start from the pointer a path actually used.
    if let Some(node) = root.get("paths") {
        let Node::Object(paths) = node else {
            return Err(DocError::Parse("'paths' is not an object".to_string()));
        };
        let mut resolved_paths = BTreeMap::new();
        for (path, item) in paths {
            resolver.frames.push(BTreeSet::new());
            let resolved = resolver.resolve_node(item);
            let reached = resolver.frames.pop().unwrap_or_default();
            resolved_paths.insert(path.clone(), resolved?);
            reachable.insert(path.clone(), reached);
        }
        resolved_root.insert("paths".to_string(), Node::Object(resolved_paths));
    }

    for (key, node) in root.iter().filter(|(key, _)| key.as_str() != "paths") {
        resolved_root.insert(key.clone(), resolver.resolve_node(node)?);
    }

    debug!(
        source = %raw.source_url,
        pointers = resolver.arena.len(),
        "Resolved document references"
    );

    Ok(ResolvedSpec {
        source_url: raw.source_url.clone(),
        document: Node::Object(resolved_root),
        fetched_at: raw.fetched_at,
        reachable,
    })
}

struct Resolver<'a> {
    root: &'a Node,
    /// Resolved target per pointer
    arena: HashMap<String, Node>,
    /// Pointers transitively reached while resolving each arena entry
    reach: HashMap<String, BTreeSet<String>>,
    /// Pointers currently being resolved, outermost first
    stack: Vec<String>,
    /// Reach collectors for the enclosing resolutions
    frames: Vec<BTreeSet<String>>,
}

impl<'a> Resolver<'a> {
    fn new(root: &'a Node) -> Self {
        Self {
            root,
            arena: HashMap::new(),
            reach: HashMap::new(),
            stack: Vec::new(),
            frames: Vec::new(),
        }
    }

    fn resolve_node(&mut self, node: &Node) -> Result<Node> {
        match node {
            Node::Primitive(_) => Ok(node.clone()),
            Node::Array(items) => items
                .iter()
                .map(|item| self.resolve_node(item))
                .collect::<Result<Vec<_>>>()
                .map(Node::Array),
            Node::Object(map) => {
                let mut out = BTreeMap::new();
                for (key, value) in map {
                    out.insert(key.clone(), self.resolve_node(value)?);
                }
                Ok(Node::Object(out))
            }
            Node::Reference(reference) => self.resolve_reference(reference),
        }
    }

    fn resolve_reference(&mut self, reference: &Reference) -> Result<Node> {
        let target = self.resolve_pointer(&reference.pointer)?;
        if reference.siblings.is_empty() {
            return Ok(target);
        }

        match target {
            Node::Object(mut map) => {
                for (key, value) in &reference.siblings {
                    map.insert(key.clone(), self.resolve_node(value)?);
                }
                Ok(Node::Object(map))
            }
            other => {
                warn!(
                    pointer = %reference.pointer,
                    "Ignoring members next to a $ref whose target is not an object"
                );
                Ok(other)
            }
        }
    }

    fn resolve_pointer(&mut self, pointer: &str) -> Result<Node> {
        if !pointer.starts_with('#') {
            return Err(DocError::UnsupportedReference {
                pointer: pointer.to_string(),
            });
        }

        if let Some(pos) = self.stack.iter().position(|p| p == pointer) {
            let mut chain = self.stack[pos..].to_vec();
            chain.push(pointer.to_string());
            return Err(DocError::CyclicReference { chain });
        }

        if let Some(resolved) = self.arena.get(pointer) {
            let resolved = resolved.clone();
            self.record_reach(pointer);
            return Ok(resolved);
        }

        self.stack.push(pointer.to_string());
        self.frames.push(BTreeSet::new());
        let result = self
            .locate(pointer)
            .and_then(|target| self.resolve_node(&target));
        let reached = self.frames.pop().unwrap_or_default();
        self.stack.pop();

        let resolved = result?;
        self.arena.insert(pointer.to_string(), resolved.clone());
        self.reach.insert(pointer.to_string(), reached);
        self.record_reach(pointer);
        Ok(resolved)
    }

    fn record_reach(&mut self, pointer: &str) {
        let nested = self.reach.get(pointer).cloned().unwrap_or_default();
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(pointer.to_string());
            frame.extend(nested);
        }
    }

    /// Find the subtree a pointer names, following references met on the way
    ///
    /// The walk borrows the raw document; only the target is cloned. When a
    /// reference sits on the way, the rest of the walk continues inside its
    /// resolved form.
    fn locate(&mut self, pointer: &str) -> Result<Node> {
        let tokens = decode_pointer(pointer)?;
        let dangling = |depth: usize| {
            debug!(pointer, depth, "Pointer target missing");
            DocError::DanglingReference {
                pointer: pointer.to_string(),
            }
        };

        let mut current: &'a Node = self.root;
        for (depth, token) in tokens.iter().enumerate() {
            if let Node::Reference(reference) = current {
                let resolved = self.resolve_reference(reference)?;
                let mut inner = &resolved;
                for (offset, token) in tokens[depth..].iter().enumerate() {
                    inner = child(inner, token).ok_or_else(|| dangling(depth + offset))?;
                }
                return Ok(inner.clone());
            }
            current = child(current, token).ok_or_else(|| dangling(depth))?;
        }
        Ok(current.clone())
    }
}

/// Member or array item named by one pointer token
fn child<'n>(node: &'n Node, token: &str) -> Option<&'n Node> {
    match node {
        Node::Object(map) => map.get(token),
        Node::Array(items) => token.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Split a document-local pointer into unescaped reference tokens
///
/// `#/components/schemas/a~1b` yields `["components", "schemas", "a/b"]`.
pub fn decode_pointer(pointer: &str) -> Result<Vec<String>> {
    let fragment = pointer
        .strip_prefix('#')
        .ok_or_else(|| DocError::UnsupportedReference {
            pointer: pointer.to_string(),
        })?;
    let fragment = urlencoding::decode(fragment).map_err(|_| DocError::DanglingReference {
        pointer: pointer.to_string(),
    })?;
    if fragment.is_empty() {
        return Ok(Vec::new());
    }
    let Some(rest) = fragment.strip_prefix('/') else {
        return Err(DocError::DanglingReference {
            pointer: pointer.to_string(),
        });
    };
    Ok(rest
        .split('/')
        .map(|token| token.replace("~1", "/").replace("~0", "~"))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::{json, Value};

    fn raw(value: Value) -> RawSpec {
        RawSpec::new("mem://spec", Node::from_value(value), Utc::now()).unwrap()
    }

    #[test]
    fn test_decode_pointer() {
        assert_eq!(
            decode_pointer("#/components/schemas/a~1b~0c").unwrap(),
            vec!["components", "schemas", "a/b~c"]
        );
        assert_eq!(
            decode_pointer("#/paths/~1api~1vrp/post").unwrap(),
            vec!["paths", "/api/vrp", "post"]
        );
        assert_eq!(
            decode_pointer("#/components/schemas/Cost%20Matrix").unwrap(),
            vec!["components", "schemas", "Cost Matrix"]
        );
        assert!(decode_pointer("#").unwrap().is_empty());
    }

    #[test]
    fn test_inlines_references() {
        let spec = raw(json!({
            "paths": {"/a": {"get": {"responses": {"200": {"$ref": "#/components/responses/Ok"}}}}},
            "components": {
                "responses": {"Ok": {"description": "ok", "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Job"}}}}},
                "schemas": {"Job": {"type": "object", "properties": {"id": {"type": "string"}}}}
            }
        }));
        let resolved = resolve(&spec).unwrap();
        assert!(!resolved.document.contains_reference());

        let schema = resolved
            .document
            .get_path(&[
                "paths",
                "/a",
                "get",
                "responses",
                "200",
                "content",
                "application/json",
                "schema",
            ])
            .unwrap();
        assert_eq!(
            schema.to_value(),
            json!({"type": "object", "properties": {"id": {"type": "string"}}})
        );

        let reached = &resolved.reachable["/a"];
        assert!(reached.contains("#/components/responses/Ok"));
        assert!(reached.contains("#/components/schemas/Job"));
    }

    #[test]
    fn test_raw_spec_untouched() {
        let spec = raw(json!({
            "paths": {"/a": {"$ref": "#/components/pathItems/A"}},
            "components": {"pathItems": {"A": {"get": {}}}}
        }));
        let before = spec.document.clone();
        resolve(&spec).unwrap();
        assert_eq!(spec.document, before);
    }

    #[test]
    fn test_siblings_override_target_members() {
        let spec = raw(json!({
            "paths": {},
            "components": {"schemas": {
                "Base": {"type": "string", "description": "base"},
                "Derived": {"$ref": "#/components/schemas/Base", "description": "derived"}
            }}
        }));
        let resolved = resolve(&spec).unwrap();
        let derived = resolved
            .document
            .get_path(&["components", "schemas", "Derived"])
            .unwrap();
        assert_eq!(derived.to_value(), json!({"type": "string", "description": "derived"}));
    }

    #[test]
    fn test_pointer_through_reference() {
        let spec = raw(json!({
            "paths": {"/a": {"get": {"x-id": {"$ref": "#/components/schemas/Alias/properties/id"}}}},
            "components": {"schemas": {
                "Alias": {"$ref": "#/components/schemas/Job"},
                "Job": {"properties": {"id": {"type": "integer"}}}
            }}
        }));
        let resolved = resolve(&spec).unwrap();
        let id = resolved.document.get_path(&["paths", "/a", "get", "x-id"]).unwrap();
        assert_eq!(id.to_value(), json!({"type": "integer"}));
    }

    #[test]
    fn test_pointer_into_array_behind_reference() {
        let spec = raw(json!({
            "paths": {"/a": {"get": {"x-first": {"$ref": "#/components/schemas/Pair/items/0"}}}},
            "components": {"schemas": {
                "Pair": {"$ref": "#/components/schemas/Tuple"},
                "Tuple": {"items": [{"type": "number"}, {"type": "string"}]}
            }}
        }));
        let resolved = resolve(&spec).unwrap();
        let first = resolved.document.get_path(&["paths", "/a", "get", "x-first"]).unwrap();
        assert_eq!(first.to_value(), json!({"type": "number"}));

        let missing = raw(json!({
            "paths": {"/a": {"get": {"x-first": {"$ref": "#/components/schemas/Pair/items/5"}}}},
            "components": {"schemas": {
                "Pair": {"$ref": "#/components/schemas/Tuple"},
                "Tuple": {"items": [{"type": "number"}]}
            }}
        }));
        assert!(matches!(
            resolve(&missing),
            Err(DocError::DanglingReference { pointer }) if pointer == "#/components/schemas/Pair/items/5"
        ));
    }

    #[test]
    fn test_self_cycle_is_an_error() {
        let spec = raw(json!({
            "paths": {},
            "components": {"schemas": {"Node": {
                "type": "object",
                "properties": {"next": {"$ref": "#/components/schemas/Node"}}
            }}}
        }));
        match resolve(&spec) {
            Err(DocError::CyclicReference { chain }) => {
                assert_eq!(chain, vec!["#/components/schemas/Node", "#/components/schemas/Node"]);
            }
            other => panic!("expected cyclic reference error, got {:?}", other),
        }
    }

    #[test]
    fn test_indirect_cycle_names_chain() {
        let spec = raw(json!({
            "paths": {"/a": {"post": {"requestBody": {"$ref": "#/components/schemas/A"}}}},
            "components": {"schemas": {
                "A": {"$ref": "#/components/schemas/B"},
                "B": {"items": {"$ref": "#/components/schemas/A"}}
            }}
        }));
        let err = resolve(&spec).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cyclic reference: #/components/schemas/A -> #/components/schemas/B -> #/components/schemas/A"
        );
    }

    #[test]
    fn test_external_reference_unsupported() {
        let spec = raw(json!({
            "paths": {"/a": {"get": {"responses": {"200": {"$ref": "common.yaml#/responses/Ok"}}}}}
        }));
        assert!(matches!(
            resolve(&spec),
            Err(DocError::UnsupportedReference { pointer }) if pointer == "common.yaml#/responses/Ok"
        ));
    }

    #[test]
    fn test_dangling_reference() {
        let spec = raw(json!({
            "paths": {"/a": {"get": {"responses": {"200": {"$ref": "#/components/responses/Missing"}}}}}
        }));
        assert!(matches!(
            resolve(&spec),
            Err(DocError::DanglingReference { .. })
        ));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let spec = raw(json!({
            "paths": {"/a": {"get": {"responses": {"200": {"$ref": "#/components/responses/Ok"}}}}},
            "components": {"responses": {"Ok": {"description": "ok"}}}
        }));
        let once = resolve(&spec).unwrap();
        let again =
            resolve(&RawSpec::new("mem://spec", once.document.clone(), Utc::now()).unwrap())
                .unwrap();
        assert_eq!(once.document, again.document);
        assert_eq!(once.document.to_value(), again.document.to_value());
    }
}
