//! Typed document tree
//!
//! OpenAPI documents are arbitrary JSON, but the resolver and generator only
//! care about four kinds of node. Objects whose `$ref` member is a string are
//! parsed as [`Node::Reference`] so that unresolved indirections can never be
//! mistaken for ordinary objects.

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// Member name that marks a reference object
pub const REF_KEY: &str = "$ref";

/// A node of an OpenAPI document
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Object(BTreeMap<String, Node>),
    Array(Vec<Node>),
    Primitive(Primitive),
    Reference(Reference),
}

/// Scalar JSON values
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

/// An unresolved `$ref` together with any members written next to it
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub pointer: String,
    pub siblings: BTreeMap<String, Node>,
}

impl Node {
    pub fn empty_object() -> Self {
        Node::Object(BTreeMap::new())
    }

    pub fn string(s: impl Into<String>) -> Self {
        Node::Primitive(Primitive::String(s.into()))
    }

    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => Node::Primitive(Primitive::Null),
            Value::Bool(b) => Node::Primitive(Primitive::Bool(b)),
            Value::Number(n) => Node::Primitive(Primitive::Number(n)),
            Value::String(s) => Node::Primitive(Primitive::String(s)),
            Value::Array(items) => Node::Array(items.into_iter().map(Node::from_value).collect()),
            Value::Object(mut map) => match map.remove(REF_KEY) {
                Some(Value::String(pointer)) => Node::Reference(Reference {
                    pointer,
                    siblings: map
                        .into_iter()
                        .map(|(k, v)| (k, Node::from_value(v)))
                        .collect(),
                }),
                Some(other) => {
                    map.insert(REF_KEY.to_string(), other);
                    Node::Object(
                        map.into_iter()
                            .map(|(k, v)| (k, Node::from_value(v)))
                            .collect(),
                    )
                }
                None => Node::Object(
                    map.into_iter()
                        .map(|(k, v)| (k, Node::from_value(v)))
                        .collect(),
                ),
            },
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Node::Primitive(Primitive::Null) => Value::Null,
            Node::Primitive(Primitive::Bool(b)) => Value::Bool(*b),
            Node::Primitive(Primitive::Number(n)) => Value::Number(n.clone()),
            Node::Primitive(Primitive::String(s)) => Value::String(s.clone()),
            Node::Array(items) => Value::Array(items.iter().map(Node::to_value).collect()),
            Node::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect::<Map<_, _>>(),
            ),
            Node::Reference(reference) => {
                let mut map: Map<String, Value> = reference
                    .siblings
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect();
                map.insert(REF_KEY.to_string(), Value::String(reference.pointer.clone()));
                Value::Object(map)
            }
        }
    }

    /// Member of an object node
    pub fn get(&self, key: &str) -> Option<&Node> {
        match self {
            Node::Object(map) => map.get(key),
            _ => None,
        }
    }

    /// Follow a sequence of object members
    pub fn get_path(&self, keys: &[&str]) -> Option<&Node> {
        keys.iter().try_fold(self, |node, key| node.get(key))
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Node>> {
        match self {
            Node::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut BTreeMap<String, Node>> {
        match self {
            Node::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Node]> {
        match self {
            Node::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Primitive(Primitive::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Node::Object(_))
    }

    /// Whether any reference remains anywhere below this node
    pub fn contains_reference(&self) -> bool {
        match self {
            Node::Reference(_) => true,
            Node::Object(map) => map.values().any(Node::contains_reference),
            Node::Array(items) => items.iter().any(Node::contains_reference),
            Node::Primitive(_) => false,
        }
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        Node::from_value(value)
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Node::Primitive(Primitive::Null) => serializer.serialize_unit(),
            Node::Primitive(Primitive::Bool(b)) => serializer.serialize_bool(*b),
            Node::Primitive(Primitive::Number(n)) => n.serialize(serializer),
            Node::Primitive(Primitive::String(s)) => serializer.serialize_str(s),
            Node::Array(items) => items.serialize(serializer),
            Node::Object(map) => map.serialize(serializer),
            Node::Reference(reference) => {
                let mut map = serializer.serialize_map(Some(reference.siblings.len() + 1))?;
                map.serialize_entry(REF_KEY, &reference.pointer)?;
                for (k, v) in &reference.siblings {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Node::from_value)
    }
}
