//! Pipeline runner: one documentation refresh from fetch to publish
//!
//! Stages hand immutable values to each other. Sources are fetched
//! concurrently; once a source is resolved and partitioned every provider
//! branch runs as its own task. A failing branch only costs that provider its
//! update: the others still publish, and the failed provider keeps its
//! previously published documentation.

use futures_util::future::join_all;
use routedoc_common::{Credential, ProviderConfig, ProviderId, ProviderRegistry};
use routedoc_generator::layout::INDEX_FILE;
use routedoc_generator::{ArtifactSet, DocsReader, StructureGenerator};
use routedoc_parser::{partition, resolve, ProviderSpec, RawSpec};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::{provider_credential, CredentialLookup, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::fetcher::SpecFetcher;
use crate::generation::{CompletionService, HttpCompletionClient};
use crate::http::{HttpTransport, ReqwestTransport};
use crate::publisher::Publisher;
use crate::report::{BranchStatus, ExampleCounts, ProviderReport, RunReport, Stage};
use crate::synthesizer::{ExampleSynthesizer, SynthesisSettings};
use crate::validator::ExampleValidator;

/// Per-run switches, usually from the command line
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Providers to refresh; all of them when empty
    pub providers: Vec<String>,
    /// Publish structurally valid synthesized examples as `unvalidated`
    pub skip_validation: bool,
    /// Do not call the generation service
    pub no_synthesis: bool,
    /// Do not reuse previously published synthesized examples
    pub regenerate: bool,
}

pub struct Pipeline {
    config: PipelineConfig,
    registry: ProviderRegistry,
    transport: Arc<dyn HttpTransport>,
    completion: Option<Arc<dyn CompletionService>>,
    credentials: BTreeMap<String, Credential>,
    generator: Arc<StructureGenerator>,
}

struct BranchContext {
    generator: Arc<StructureGenerator>,
    synthesizer: Arc<ExampleSynthesizer>,
    validator: ExampleValidator,
    previous: Option<Arc<DocsReader>>,
    concurrency: usize,
}

type BranchResult = (ProviderReport, Option<ArtifactSet>);

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        registry: ProviderRegistry,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        Ok(Self {
            config,
            registry,
            transport,
            completion: None,
            credentials: BTreeMap::new(),
            generator: Arc::new(StructureGenerator::new()?),
        })
    }

    /// Pipeline with a real HTTP transport and, when configured, generation client
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        let registry = config.registry()?;
        let transport: Arc<dyn HttpTransport> =
            Arc::new(ReqwestTransport::new(config.http_timeout)?);
        let completion = config.generation.clone().map(|generation| {
            Arc::new(HttpCompletionClient::new(
                transport.clone(),
                generation.api_url,
                generation.api_key,
                generation.model,
                config.retry.clone(),
            )) as Arc<dyn CompletionService>
        });
        let mut pipeline = Self::new(config, registry, transport)?;
        pipeline.completion = completion;
        Ok(pipeline)
    }

    pub fn with_completion(mut self, service: Arc<dyn CompletionService>) -> Self {
        self.completion = Some(service);
        self
    }

    /// Use `credential` for `provider` instead of reading the environment
    pub fn with_credential(mut self, provider: impl Into<String>, credential: Credential) -> Self {
        self.credentials.insert(provider.into(), credential);
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Refresh the documentation of the selected providers
    ///
    /// Only configuration errors fail the call itself; everything that goes
    /// wrong inside a provider branch or while publishing is in the report.
    pub async fn run(&self, options: &RunOptions) -> Result<RunReport> {
        let selected = self.registry.select(&options.providers)?;
        let is_selected = |id: &ProviderId| selected.iter().any(|p| &p.id == id);

        let previous = DocsReader::open(&self.config.docs_dir).ok().map(Arc::new);
        let synthesizer = Arc::new(self.synthesizer(options, &selected));

        let sources: Vec<(String, Vec<&ProviderConfig>)> = self
            .registry
            .sources()
            .into_iter()
            .filter(|(_, members)| members.iter().any(|m| is_selected(&m.id)))
            .collect();

        let fetcher = SpecFetcher::new(self.transport.clone(), self.config.retry.clone());
        let fetched = join_all(sources.iter().map(|(url, _)| fetcher.fetch(url))).await;

        let mut reports: Vec<ProviderReport> = Vec::new();
        let mut branches = Vec::new();

        for ((url, members), fetched) in sources.iter().zip(fetched) {
            let wanted: Vec<&ProviderConfig> = members
                .iter()
                .copied()
                .filter(|m| is_selected(&m.id))
                .collect();

            let specs = match prepare(fetched, members) {
                Ok(specs) => specs,
                Err((stage, e)) => {
                    error!(source = %url, stage = %stage, error = %e, "Source failed");
                    for provider in wanted {
                        reports.push(ProviderReport::failed(
                            provider.id.clone(),
                            stage,
                            e.to_string(),
                        ));
                    }
                    continue;
                }
            };

            for spec in specs {
                let Some(provider) = wanted.iter().find(|p| p.id == spec.provider) else {
                    continue;
                };
                let context = BranchContext {
                    generator: self.generator.clone(),
                    synthesizer: synthesizer.clone(),
                    validator: self.validator(provider, options),
                    previous: previous.clone(),
                    concurrency: self.config.concurrency,
                };
                let provider = (*provider).clone();
                let id = provider.id.clone();
                branches.push((id, tokio::spawn(run_branch(context, spec, provider))));
            }
        }

        let mut artifacts = ArtifactSet::new();
        let mut succeeded: Vec<ProviderId> = Vec::new();
        for (id, handle) in branches {
            match handle.await {
                Ok((report, Some(branch_artifacts))) => match artifacts.extend(branch_artifacts) {
                    Ok(()) => {
                        succeeded.push(id);
                        reports.push(report);
                    }
                    Err(e) => {
                        reports.push(ProviderReport::failed(id, Stage::Publish, e.to_string()))
                    }
                },
                Ok((report, None)) => reports.push(report),
                Err(e) => reports.push(ProviderReport::failed(
                    id,
                    Stage::Generate,
                    format!("branch aborted: {}", e),
                )),
            }
        }

        let order = |id: &ProviderId| self.registry.ids().position(|other| other == id);
        reports.sort_by_key(|r| order(&r.provider));
        let mut report = RunReport {
            providers: reports,
            published: false,
            publish_error: None,
        };

        if succeeded.is_empty() {
            warn!("No provider branch succeeded, published documentation left unchanged");
            return Ok(report);
        }

        // Providers not refreshed by this run keep their published directory
        let keep: Vec<ProviderId> = self
            .registry
            .providers()
            .iter()
            .filter(|p| !succeeded.contains(&p.id))
            .filter(|p| self.config.docs_dir.join(p.id.as_str()).join(INDEX_FILE).is_file())
            .map(|p| p.id.clone())
            .collect();
        let listed: Vec<&ProviderConfig> = self
            .registry
            .providers()
            .iter()
            .filter(|p| succeeded.contains(&p.id) || keep.contains(&p.id))
            .collect();

        let publish = self
            .generator
            .shared_artifacts(&listed)
            .map_err(PipelineError::from)
            .and_then(|shared| artifacts.extend(shared).map_err(PipelineError::from));
        let publish = match publish {
            Ok(()) => {
                let publisher = Publisher::new(self.config.docs_dir.clone());
                tokio::task::spawn_blocking(move || publisher.publish(&artifacts, &keep))
                    .await
                    .map_err(|e| {
                        PipelineError::Publish(format!("publish task aborted: {}", e))
                    })
                    .and_then(|result| result)
            }
            Err(e) => Err(e),
        };

        match publish {
            Ok(generation) => {
                info!(
                    docs_dir = %self.config.docs_dir.display(),
                    generation = %generation.display(),
                    updated = succeeded.len(),
                    "Documentation published"
                );
                report.published = true;
            }
            Err(e) => {
                error!(error = %e, "Publishing failed, previous documentation left in place");
                report.publish_error = Some(e.to_string());
            }
        }
        Ok(report)
    }

    fn synthesizer(
        &self,
        options: &RunOptions,
        selected: &[&ProviderConfig],
    ) -> ExampleSynthesizer {
        let service = if options.no_synthesis {
            None
        } else {
            self.completion.clone()
        };
        if service.is_none()
            && !options.no_synthesis
            && selected.iter().any(|p| p.synthesize_examples)
        {
            warn!("GENERATION_API_KEY not set, missing request examples will not be synthesized");
        }
        ExampleSynthesizer::new(
            service,
            SynthesisSettings {
                max_attempts: self.config.synth_attempts,
                concurrency: self.config.concurrency,
                carry_over: !options.regenerate,
            },
        )
    }

    fn validator(&self, provider: &ProviderConfig, options: &RunOptions) -> ExampleValidator {
        if options.skip_validation {
            return ExampleValidator::structural_only(provider.clone());
        }
        let lookup = match self.credentials.get(provider.id.as_str()) {
            Some(credential) => CredentialLookup::Found(credential.clone()),
            None => provider_credential(provider),
        };
        let credential = match lookup {
            CredentialLookup::NotRequired => None,
            CredentialLookup::Found(credential) => Some(credential),
            CredentialLookup::Missing { .. } => {
                return ExampleValidator::structural_only(provider.clone());
            }
        };
        ExampleValidator::live(
            provider.clone(),
            self.transport.clone(),
            self.config.retry.clone(),
            credential,
        )
    }
}

/// Resolve and partition a fetched source with every provider it serves
fn prepare(
    fetched: Result<RawSpec>,
    members: &[&ProviderConfig],
) -> std::result::Result<Vec<ProviderSpec>, (Stage, PipelineError)> {
    let raw = fetched.map_err(|e| (Stage::Fetch, e))?;
    let resolved = resolve(&raw).map_err(|e| (Stage::Resolve, e.into()))?;
    partition(&resolved, members).map_err(|e| (Stage::Partition, e.into()))
}

async fn run_branch(
    context: BranchContext,
    spec: ProviderSpec,
    provider: ProviderConfig,
) -> BranchResult {
    let docs = match context.generator.generate(&spec, &provider) {
        Ok(docs) => docs,
        Err(e) => {
            error!(provider = %provider.id, error = %e, "Structure generation failed");
            let report = ProviderReport::failed(provider.id, Stage::Generate, e.to_string());
            return (report, None);
        }
    };

    let extracted_endpoints = docs
        .endpoints
        .iter()
        .filter(|e| !e.extracted.is_empty())
        .count();
    let mut examples = context
        .validator
        .check_extracted(&docs, docs.extracted_examples(), context.concurrency)
        .await;

    let outcome = context
        .synthesizer
        .run(&provider, &docs, context.previous.as_deref(), &context.validator)
        .await;
    examples.extend(outcome.examples);

    let artifacts = match docs.finalize(&examples) {
        Ok(artifacts) => artifacts,
        Err(e) => {
            error!(provider = %provider.id, error = %e, "Finalizing documentation failed");
            let report = ProviderReport::failed(provider.id, Stage::Generate, e.to_string());
            return (report, None);
        }
    };

    let counts = ExampleCounts {
        extracted: extracted_endpoints,
        carried_over: outcome.carried_over,
        synthesized_accepted: outcome.accepted,
        synthesized_rejected: outcome.rejections.len(),
    };
    let status = if outcome.rejections.is_empty() {
        BranchStatus::Succeeded
    } else {
        BranchStatus::Partial
    };
    info!(
        provider = %provider.id,
        endpoints = docs.endpoints.len(),
        files = artifacts.len(),
        "Provider documentation ready"
    );

    let report = ProviderReport {
        provider: provider.id,
        status,
        endpoints: docs.endpoints.len(),
        counts,
        rejections: outcome.rejections,
    };
    (report, Some(artifacts))
}
