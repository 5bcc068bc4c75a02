//! Example Synthesizer: request examples for endpoints the document leaves bare
//!
//! Only endpoints with a request schema and no extracted request example are
//! considered, so extracted examples are never replaced. For each of them the
//! synthesizer first tries to reuse the example published by the previous run,
//! then asks the generation service for candidates until one passes the
//! validator or the attempt budget runs out.

use futures_util::stream::{self, StreamExt};
use futures_util::FutureExt;
use routedoc_common::{Direction, Example, ProviderConfig, Provenance, ValidationState};
use routedoc_generator::{DocsReader, EndpointDocs, ProviderDocs};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::generation::{build_prompt, extract_json, CompletionService, PromptContext};
use crate::report::Rejection;
use crate::validator::{ExampleValidator, RejectReason, Verdict};

/// Sibling examples handed to the service as context
const MAX_SIBLINGS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisSettings {
    /// Candidates requested per endpoint
    pub max_attempts: u32,
    /// Endpoints worked on at the same time
    pub concurrency: usize,
    /// Reuse previously published examples whose schema is unchanged
    pub carry_over: bool,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            concurrency: 4,
            carry_over: true,
        }
    }
}

/// Examples produced for one provider
#[derive(Debug, Clone, Default)]
pub struct SynthesisOutcome {
    /// Carried-over and accepted synthesized examples, ordered by endpoint
    pub examples: Vec<Example>,
    pub carried_over: usize,
    pub accepted: usize,
    pub rejections: Vec<Rejection>,
}

enum EndpointResult {
    Accepted(Example),
    Rejected(Rejection),
}

pub struct ExampleSynthesizer {
    service: Option<Arc<dyn CompletionService>>,
    settings: SynthesisSettings,
}

impl ExampleSynthesizer {
    /// Without a service only carry-over happens
    pub fn new(service: Option<Arc<dyn CompletionService>>, settings: SynthesisSettings) -> Self {
        Self { service, settings }
    }

    pub fn settings(&self) -> &SynthesisSettings {
        &self.settings
    }

    pub async fn run(
        &self,
        provider: &ProviderConfig,
        docs: &ProviderDocs,
        previous: Option<&DocsReader>,
        validator: &ExampleValidator,
    ) -> SynthesisOutcome {
        let mut outcome = SynthesisOutcome::default();
        if !provider.synthesize_examples {
            return outcome;
        }

        let mut pending = Vec::new();
        for endpoint in docs.endpoints.iter().filter(|e| e.lacks_request_example()) {
            let reused = previous
                .filter(|_| self.settings.carry_over)
                .and_then(|previous| carry_over(previous, docs, endpoint));
            match reused {
                Some(example) => {
                    debug!(
                        provider = %provider.id,
                        endpoint = %endpoint.key,
                        "Reusing published example"
                    );
                    outcome.carried_over += 1;
                    outcome.examples.push(example);
                }
                None => pending.push(endpoint),
            }
        }

        let Some(service) = &self.service else {
            if !pending.is_empty() {
                info!(
                    provider = %provider.id,
                    endpoints = pending.len(),
                    "Generation disabled, endpoints left without request example"
                );
            }
            return outcome;
        };

        let tasks: Vec<_> = pending
            .into_iter()
            .map(|endpoint| {
                self.synthesize_endpoint(service.as_ref(), provider, endpoint, validator)
                    .boxed()
            })
            .collect();
        let results: Vec<EndpointResult> = stream::iter(tasks)
            .buffer_unordered(self.settings.concurrency.max(1))
            .collect()
            .await;

        for result in results {
            match result {
                EndpointResult::Accepted(example) => {
                    outcome.accepted += 1;
                    outcome.examples.push(example);
                }
                EndpointResult::Rejected(rejection) => outcome.rejections.push(rejection),
            }
        }
        outcome.examples.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));
        outcome.rejections.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));

        info!(
            provider = %provider.id,
            carried_over = outcome.carried_over,
            accepted = outcome.accepted,
            rejected = outcome.rejections.len(),
            "Synthesis finished"
        );
        outcome
    }

    async fn synthesize_endpoint(
        &self,
        service: &dyn CompletionService,
        provider: &ProviderConfig,
        endpoint: &EndpointDocs,
        validator: &ExampleValidator,
    ) -> EndpointResult {
        let rejected = |reason: String| {
            EndpointResult::Rejected(Rejection {
                endpoint: endpoint.key.to_string(),
                reason,
            })
        };

        let schema = endpoint
            .request_schema()
            .map(|s| s.to_value())
            .unwrap_or(Value::Null);
        let siblings: Vec<&Value> = endpoint
            .response_examples()
            .take(MAX_SIBLINGS)
            .map(|ex| &ex.payload)
            .collect();
        let mut feedback: Vec<String> = Vec::new();
        let mut last_reason = String::from("no candidate produced");

        for attempt in 1..=self.settings.max_attempts {
            let prompt = build_prompt(&PromptContext {
                provider: provider.id.as_str(),
                endpoint: &endpoint.key,
                summary: &endpoint.summary,
                description: &endpoint.description,
                schema: &schema,
                siblings: siblings.clone(),
                hints: &provider.generation_hints,
                feedback: &feedback,
            });

            let text = match service.complete(prompt).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(
                        provider = %provider.id,
                        endpoint = %endpoint.key,
                        error = %e,
                        "Generation failed"
                    );
                    return rejected(format!("generation service: {}", e));
                }
            };

            let candidate = match extract_json(&text) {
                Ok(candidate) => candidate,
                Err(e) => {
                    debug!(
                        endpoint = %endpoint.key,
                        attempt = attempt,
                        error = %e,
                        "Unusable completion"
                    );
                    last_reason = e.to_string();
                    feedback.push("the answer was not a JSON document".to_string());
                    continue;
                }
            };

            match validator.validate(endpoint, &candidate).await {
                verdict @ (Verdict::Valid | Verdict::Unvalidated) => {
                    debug!(endpoint = %endpoint.key, attempt = attempt, "Candidate accepted");
                    return EndpointResult::Accepted(
                        Example::synthesized(endpoint.key.clone(), candidate)
                            .with_validation(verdict.state()),
                    );
                }
                Verdict::Rejected(reason) => {
                    last_reason = reason.to_string();
                    if !reason.allows_regeneration() {
                        break;
                    }
                    feedback.push(feedback_for(&reason));
                }
            }
        }

        rejected(last_reason)
    }
}

fn feedback_for(reason: &RejectReason) -> String {
    match reason {
        RejectReason::Schema(errors) => format!("schema errors: {}", errors.join("; ")),
        other => other.to_string(),
    }
}

/// Previously published synthesized example, if its request schema is unchanged
fn carry_over(
    previous: &DocsReader,
    docs: &ProviderDocs,
    endpoint: &EndpointDocs,
) -> Option<Example> {
    let provider = docs.provider.as_str();
    let entry = previous.endpoint_by_key(provider, &endpoint.key).ok()??;
    let current = docs.request_schema_record(&endpoint.key)?;
    let published = previous.request_schema_of(provider, &entry).ok()?;
    if published != current {
        return None;
    }
    let (record, payload) = previous.request_example_of(provider, &entry).ok()??;
    if record.provenance != Provenance::Synthesized
        || record.validation == ValidationState::Rejected
    {
        return None;
    }
    Some(Example {
        endpoint: endpoint.key.clone(),
        direction: Direction::Request,
        name: record.name,
        payload,
        provenance: record.provenance,
        validation: record.validation,
    })
}
