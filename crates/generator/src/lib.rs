//! Documentation generation for routedoc
//!
//! This crate turns provider-scoped OpenAPI documents into the artifact set
//! published for downstream lookups: endpoint summaries, overviews, request
//! and response schemas, examples, and the endpoint index. It also provides
//! [`DocsReader`], the read-only view over a published tree.

mod artifacts;
mod docs;
pub mod layout;
mod reader;
mod templates;

pub use artifacts::{validate_relative_path, ArtifactSet};
pub use docs::{EndpointDocs, ProviderDocs, RequestBodyDocs, ResponseDocs};
pub use reader::DocsReader;

use layout::{Manifest, ManifestEntry};
use routedoc_common::{
    AuthScheme, Direction, DocError, EndpointKey, Example, ProviderConfig, Result,
};
use routedoc_parser::openapi::{Operation, Parameter};
use routedoc_parser::ProviderSpec;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use tera::Tera;
use tracing::{debug, warn};

/// Structure generator
///
/// Derives per-endpoint artifacts from a [`ProviderSpec`]. Output is a pure
/// function of the input: no timestamps, and every map is ordered, so the
/// same document always yields byte-identical artifacts.
pub struct StructureGenerator {
    tera: Tera,
}

#[derive(Serialize)]
struct SummaryRow<'a> {
    method: &'a str,
    path: &'a str,
    summary: &'a str,
    description: &'a str,
}

#[derive(Serialize)]
struct Overview<'a> {
    method: String,
    path: &'a str,
    summary: &'a str,
    description: &'a str,
    #[serde(rename = "operationId", skip_serializing_if = "Option::is_none")]
    operation_id: Option<&'a str>,
    tags: &'a [String],
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    deprecated: bool,
    parameters: &'a [Parameter],
}

#[derive(Serialize)]
struct ProviderInfo<'a> {
    id: &'a str,
    title: &'a str,
    base_url: &'a str,
    route_prefix: Option<&'a str>,
    auth: String,
}

impl StructureGenerator {
    /// Create a new generator with all templates loaded
    pub fn new() -> Result<Self> {
        let tera = templates::load_templates()?;
        Ok(Self { tera })
    }

    /// Generate the structure artifacts of one provider
    pub fn generate(&self, spec: &ProviderSpec, provider: &ProviderConfig) -> Result<ProviderDocs> {
        if spec.provider != provider.id {
            return Err(DocError::Generation(format!(
                "document for '{}' generated with profile of '{}'",
                spec.provider, provider.id
            )));
        }

        let endpoints = self.collect_endpoints(spec, provider)?;
        let id = provider.id.as_str();
        let mut structure = ArtifactSet::new();

        structure.insert_text(
            layout::summary_path(id),
            self.render_summary(provider, &endpoints)?,
        )?;

        for endpoint in &endpoints {
            let overview = Overview {
                method: endpoint.key.method.to_string(),
                path: &endpoint.key.path,
                summary: &endpoint.summary,
                description: &endpoint.description,
                operation_id: endpoint.operation_id.as_deref(),
                tags: &endpoint.tags,
                deprecated: endpoint.deprecated,
                parameters: &endpoint.parameters,
            };
            structure.insert_json(layout::overview_path(id, &endpoint.id), &overview)?;

            if let Some(body) = &endpoint.request_body {
                let record = json!({
                    "content_type": body.content_type,
                    "required": body.required,
                    "description": body.description,
                    "schema": body.schema,
                    "_meta": {
                        "provider": id,
                        "path": endpoint.key.path,
                        "method": endpoint.key.method.as_str(),
                    },
                });
                structure.insert_json(layout::request_schema_path(id, &endpoint.id), &record)?;
            }

            for response in &endpoint.responses {
                let record = json!({
                    "description": response.description,
                    "content_type": response.content_type,
                    "schema": response.schema,
                });
                structure.insert_json(
                    layout::response_schema_path(id, &endpoint.id, &response.status),
                    &record,
                )?;
            }
        }

        structure.insert_json(layout::openapi_path(id), &spec.document)?;

        debug!(
            provider = %provider.id,
            endpoints = endpoints.len(),
            artifacts = structure.len(),
            "Generated provider structure"
        );

        Ok(ProviderDocs {
            provider: provider.id.clone(),
            title: provider.title.clone(),
            base_url: provider.base_url.clone(),
            endpoints,
            structure,
        })
    }

    /// Shared top-level documents: `manifest.json` and `basic_info.md`
    pub fn shared_artifacts(&self, providers: &[&ProviderConfig]) -> Result<ArtifactSet> {
        let manifest = Manifest {
            providers: providers
                .iter()
                .map(|p| ManifestEntry {
                    id: p.id.to_string(),
                    title: p.title.clone(),
                    base_url: p.base_url.clone(),
                    route_prefix: p.path_prefix().map(str::to_string),
                })
                .collect(),
        };

        let infos: Vec<ProviderInfo> = providers
            .iter()
            .map(|p| ProviderInfo {
                id: p.id.as_str(),
                title: &p.title,
                base_url: &p.base_url,
                route_prefix: p.path_prefix(),
                auth: describe_auth(&p.auth),
            })
            .collect();
        let mut context = tera::Context::new();
        context.insert("providers", &infos);
        let basic_info = self
            .tera
            .render("basic_info.md", &context)
            .map_err(|e| DocError::Template(format!("Template error: {:?}", e)))?;

        let mut artifacts = ArtifactSet::new();
        artifacts.insert_json(layout::MANIFEST_FILE, &manifest)?;
        artifacts.insert_text(layout::BASIC_INFO_FILE, basic_info)?;
        Ok(artifacts)
    }

    fn collect_endpoints(
        &self,
        spec: &ProviderSpec,
        provider: &ProviderConfig,
    ) -> Result<Vec<EndpointDocs>> {
        let mut endpoints: BTreeMap<EndpointKey, EndpointDocs> = BTreeMap::new();
        let mut ids: BTreeMap<String, EndpointKey> = BTreeMap::new();

        for (path, item) in spec.path_items()? {
            for (method, operation) in item.operations() {
                let key = EndpointKey::new(&path, method);
                if endpoints.contains_key(&key) {
                    warn!(
                        provider = %provider.id,
                        endpoint = %key,
                        source_path = %path,
                        "Skipping duplicate endpoint"
                    );
                    continue;
                }

                let id = layout::endpoint_id(&key.path, method, provider.strip_prefix.as_deref());
                if let Some(other) = ids.get(&id) {
                    return Err(DocError::Generation(format!(
                        "endpoints {} and {} of provider '{}' both map to file id '{}'",
                        other, key, provider.id, id
                    )));
                }
                ids.insert(id.clone(), key.clone());

                let docs = endpoint_docs(
                    key.clone(),
                    id,
                    &item.summary,
                    &item.description,
                    operation,
                );
                endpoints.insert(key, docs);
            }
        }

        Ok(endpoints.into_values().collect())
    }

    fn render_summary(
        &self,
        provider: &ProviderConfig,
        endpoints: &[EndpointDocs],
    ) -> Result<String> {
        let rows: Vec<SummaryRow> = endpoints
            .iter()
            .map(|e| SummaryRow {
                method: e.key.method.as_str(),
                path: &e.key.path,
                summary: &e.summary,
                description: &e.description,
            })
            .collect();

        let mut context = tera::Context::new();
        context.insert("title", &provider.title);
        context.insert("base_url", &provider.base_url);
        context.insert("endpoints", &rows);
        self.tera
            .render("endpoints_summary.md", &context)
            .map_err(|e| DocError::Template(format!("Template error: {:?}", e)))
    }
}

fn endpoint_docs(
    key: EndpointKey,
    id: String,
    path_summary: &Option<String>,
    path_description: &Option<String>,
    operation: Operation,
) -> EndpointDocs {
    let mut extracted = Vec::new();

    let request_body = operation.request_body.as_ref().map(|body| {
        let (content_type, media) = match body.primary_content() {
            Some((ct, media)) => (ct.to_string(), Some(media)),
            None => ("application/json".to_string(), None),
        };
        if let Some((name, value)) = media.and_then(|m| m.literal_example()) {
            extracted.push(Example::extracted(
                key.clone(),
                Direction::Request,
                name,
                value.to_value(),
            ));
        }
        RequestBodyDocs {
            content_type,
            required: body.required,
            description: body.description.clone(),
            schema: media.and_then(|m| m.schema.clone()),
        }
    });

    let responses = operation
        .responses
        .iter()
        .map(|(status, response)| {
            let primary = response.primary_content();
            if let (Ok(code), Some((name, value))) = (
                status.parse::<u16>(),
                primary.and_then(|(_, media)| media.literal_example()),
            ) {
                extracted.push(Example::extracted(
                    key.clone(),
                    Direction::Response { status: code },
                    name,
                    value.to_value(),
                ));
            }
            ResponseDocs {
                status: status.clone(),
                description: response.description.clone(),
                content_type: primary.map(|(ct, _)| ct.to_string()),
                schema: primary.and_then(|(_, media)| media.schema.clone()),
            }
        })
        .collect();

    EndpointDocs {
        key,
        id,
        summary: operation
            .summary
            .or_else(|| path_summary.clone())
            .unwrap_or_default(),
        description: operation
            .description
            .or_else(|| path_description.clone())
            .unwrap_or_default(),
        operation_id: operation.operation_id,
        tags: operation.tags,
        deprecated: operation.deprecated,
        parameters: operation.parameters,
        request_body,
        responses,
        extracted,
    }
}

/// How a provider authenticates, without any credential value
fn describe_auth(auth: &AuthScheme) -> String {
    match auth {
        AuthScheme::Bearer { .. } => "`Authorization: Bearer <token>` header".to_string(),
        AuthScheme::Header { name, .. } => format!("`{}` request header", name),
        AuthScheme::Query { param, .. } => format!("`{}` query parameter", param),
        AuthScheme::PathParam { name, .. } => format!("`{{{}}}` path parameter", name),
        AuthScheme::None => "none".to_string(),
    }
}
