//! Per-provider documentation model

use crate::artifacts::ArtifactSet;
use crate::layout::{self, EndpointIndex, ExampleRecord, IndexEntry};
use routedoc_common::{
    Direction, DocError, EndpointKey, Example, ProviderId, Provenance, Result,
};
use routedoc_parser::openapi::Parameter;
use routedoc_parser::Node;
use std::collections::BTreeMap;
use tracing::debug;

/// Request body of an endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct RequestBodyDocs {
    pub content_type: String,
    pub required: bool,
    pub description: Option<String>,
    pub schema: Option<Node>,
}

/// One declared response of an endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseDocs {
    /// Status code as declared (`200`, `4XX`, `default`)
    pub status: String,
    pub description: String,
    pub content_type: Option<String>,
    pub schema: Option<Node>,
}

/// Everything generated for one (path, method)
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointDocs {
    pub key: EndpointKey,
    /// File id, unique within the provider
    pub id: String,
    pub summary: String,
    pub description: String,
    pub operation_id: Option<String>,
    pub tags: Vec<String>,
    pub deprecated: bool,
    pub parameters: Vec<Parameter>,
    pub request_body: Option<RequestBodyDocs>,
    pub responses: Vec<ResponseDocs>,
    /// Examples copied from the source document
    pub extracted: Vec<Example>,
}

impl EndpointDocs {
    pub fn request_schema(&self) -> Option<&Node> {
        self.request_body.as_ref().and_then(|body| body.schema.as_ref())
    }

    pub fn extracted_request(&self) -> Option<&Example> {
        self.extracted.iter().find(|ex| ex.is_request())
    }

    /// Has a request schema but no literal request example
    pub fn lacks_request_example(&self) -> bool {
        self.request_schema().is_some() && self.extracted_request().is_none()
    }

    pub fn path_parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(|p| p.location == "path")
    }

    /// Extracted response examples, used as context for synthesis
    pub fn response_examples(&self) -> impl Iterator<Item = &Example> {
        self.extracted.iter().filter(|ex| !ex.is_request())
    }
}

/// Structure artifacts for one provider, before examples are attached
#[derive(Debug, Clone)]
pub struct ProviderDocs {
    pub provider: ProviderId,
    pub title: String,
    pub base_url: String,
    pub endpoints: Vec<EndpointDocs>,
    pub(crate) structure: ArtifactSet,
}

impl ProviderDocs {
    /// Summary, overview, schema and document artifacts
    pub fn structure(&self) -> &ArtifactSet {
        &self.structure
    }

    pub fn endpoint(&self, key: &EndpointKey) -> Option<&EndpointDocs> {
        self.endpoints.iter().find(|e| &e.key == key)
    }

    pub fn extracted_examples(&self) -> Vec<Example> {
        self.endpoints
            .iter()
            .flat_map(|e| e.extracted.iter().cloned())
            .collect()
    }

    /// The request schema record exactly as it will be published
    pub fn request_schema_record(&self, key: &EndpointKey) -> Option<serde_json::Value> {
        let endpoint = self.endpoint(key)?;
        let path = layout::request_schema_path(self.provider.as_str(), &endpoint.id);
        self.structure
            .get(&path)
            .and_then(|bytes| serde_json::from_slice(bytes).ok())
    }

    /// Attach examples and the endpoint index
    ///
    /// At most one request example is kept per endpoint, and one response
    /// example per status; extracted examples win over synthesized ones, then
    /// names are compared, so the result does not depend on `examples` order.
    pub fn finalize(&self, examples: &[Example]) -> Result<ArtifactSet> {
        let provider = self.provider.as_str();
        let mut artifacts = self.structure.clone();

        let mut chosen: BTreeMap<(EndpointKey, Direction), &Example> = BTreeMap::new();
        for example in examples {
            if self.endpoint(&example.endpoint).is_none() {
                return Err(DocError::Generation(format!(
                    "example '{}' targets unknown endpoint {} of provider '{}'",
                    example.name, example.endpoint, provider
                )));
            }
            let slot = (example.endpoint.clone(), example.direction);
            match chosen.get(&slot) {
                Some(current) if rank(current) <= rank(example) => {
                    debug!(
                        endpoint = %example.endpoint,
                        name = %example.name,
                        "Dropping surplus example"
                    );
                }
                _ => {
                    chosen.insert(slot, example);
                }
            }
        }

        let mut entries = Vec::with_capacity(self.endpoints.len());
        for endpoint in &self.endpoints {
            let mut request_example = None;
            let mut response_examples = Vec::new();

            let first = (endpoint.key.clone(), Direction::Request);
            let last = (
                endpoint.key.clone(),
                Direction::Response { status: u16::MAX },
            );
            for ((key, direction), example) in chosen.range(first..=last) {
                debug_assert_eq!(key, &endpoint.key);
                match direction {
                    Direction::Request => {
                        artifacts.insert_json(
                            layout::request_example_path(provider, &endpoint.id),
                            &example.payload,
                        )?;
                        request_example = Some(ExampleRecord {
                            name: example.name.clone(),
                            provenance: example.provenance,
                            validation: example.validation,
                        });
                    }
                    Direction::Response { status } => {
                        artifacts.insert_json(
                            layout::response_example_path(provider, &endpoint.id, *status),
                            &example.payload,
                        )?;
                        response_examples.push(*status);
                    }
                }
            }

            entries.push(IndexEntry {
                id: endpoint.id.clone(),
                path: endpoint.key.path.clone(),
                method: endpoint.key.method,
                summary: endpoint.summary.clone(),
                responses: endpoint.responses.iter().map(|r| r.status.clone()).collect(),
                has_request_body: endpoint.request_body.is_some(),
                request_example,
                response_examples,
            });
        }

        let index = EndpointIndex {
            provider: provider.to_string(),
            title: self.title.clone(),
            base_url: self.base_url.clone(),
            endpoints: entries,
        };
        artifacts.insert_json(layout::index_path(provider), &index)?;
        Ok(artifacts)
    }
}

fn rank(example: &Example) -> (u8, &str) {
    let provenance = match example.provenance {
        Provenance::Extracted => 0,
        Provenance::Synthesized => 1,
    };
    (provenance, example.name.as_str())
}
