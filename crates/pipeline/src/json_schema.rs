//! Structural validation of example payloads against OpenAPI schemas
//!
//! OpenAPI 3.0 schemas are a dialect of JSON Schema. They are rewritten to
//! draft 7 before compiling: `nullable: true` becomes a `null` type
//! alternative and OpenAPI-only keywords are dropped.

use jsonschema::{Draft, JSONSchema};
use serde_json::{Map, Value};

use crate::error::{PipelineError, Result};

/// Maximum number of error messages reported per payload
pub const MAX_SCHEMA_ERRORS: usize = 5;

const OPENAPI_ONLY: &[&str] = &[
    "nullable",
    "discriminator",
    "xml",
    "externalDocs",
    "example",
    "examples",
    "deprecated",
];

/// Keywords whose value is a single subschema
const SUBSCHEMA: &[&str] = &["items", "additionalProperties", "not", "additionalItems", "contains"];
/// Keywords whose value is an array of subschemas
const SUBSCHEMA_LIST: &[&str] = &["allOf", "anyOf", "oneOf"];
/// Keywords whose value maps names to subschemas
const SUBSCHEMA_MAP: &[&str] = &["properties", "patternProperties", "definitions"];

/// Rewrite an OpenAPI schema object as a draft 7 JSON Schema
pub fn to_json_schema(schema: &Value) -> Value {
    let Value::Object(object) = schema else {
        return schema.clone();
    };

    let nullable = object.get("nullable").and_then(Value::as_bool) == Some(true);
    let mut out = Map::new();

    for (key, value) in object {
        if OPENAPI_ONLY.contains(&key.as_str()) || key.starts_with("x-") {
            continue;
        }
        let converted = if SUBSCHEMA.contains(&key.as_str()) {
            to_json_schema(value)
        } else if SUBSCHEMA_LIST.contains(&key.as_str()) {
            match value {
                Value::Array(items) => Value::Array(items.iter().map(to_json_schema).collect()),
                other => other.clone(),
            }
        } else if SUBSCHEMA_MAP.contains(&key.as_str()) {
            match value {
                Value::Object(map) => Value::Object(
                    map.iter()
                        .map(|(name, sub)| (name.clone(), to_json_schema(sub)))
                        .collect(),
                ),
                other => other.clone(),
            }
        } else {
            value.clone()
        };
        out.insert(key.clone(), converted);
    }

    if nullable {
        let widened = match out.get("type") {
            Some(Value::String(ty)) => Some(Value::Array(vec![ty.as_str().into(), "null".into()])),
            Some(Value::Array(types)) if !types.iter().any(|t| t == "null") => {
                let mut types = types.clone();
                types.push("null".into());
                Some(Value::Array(types))
            }
            _ => None,
        };
        if let Some(ty) = widened {
            out.insert("type".into(), ty);
        }
        if let Some(Value::Array(values)) = out.get_mut("enum") {
            if !values.contains(&Value::Null) {
                values.push(Value::Null);
            }
        }
    }

    Value::Object(out)
}

/// A compiled request schema
pub struct SchemaCheck {
    compiled: JSONSchema,
}

impl SchemaCheck {
    /// Compile an OpenAPI schema
    pub fn compile(openapi_schema: &Value) -> Result<Self> {
        let schema = to_json_schema(openapi_schema);
        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&schema)
            .map_err(|e| {
                PipelineError::Generation(format!("request schema does not compile: {}", e))
            })?;
        Ok(Self { compiled })
    }

    /// Error messages for `instance`, empty when it conforms
    pub fn errors(&self, instance: &Value) -> Vec<String> {
        match self.compiled.validate(instance) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .take(MAX_SCHEMA_ERRORS)
                .map(|e| {
                    let path = e.instance_path.to_string();
                    if path.is_empty() {
                        e.to_string()
                    } else {
                        format!("{}: {}", path, e)
                    }
                })
                .collect(),
        }
    }
}
