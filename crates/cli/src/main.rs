//! routedoc CLI
//!
//! Command-line interface for refreshing the published provider documentation
//! and for looking things up in it.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::*;
use routedoc_common::{HttpMethod, ProviderConfig, ProviderRegistry};
use routedoc_generator::DocsReader;
use routedoc_parser::openapi::OpenApiParser;
use routedoc_parser::{partition, resolve};
use routedoc_pipeline::{
    BranchStatus, Pipeline, PipelineConfig, RunOptions, RunOutcome, RunReport,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "routedoc")]
#[command(
    version,
    about = "Republish routing and maps provider OpenAPI specs as queryable documentation",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, resolve, partition and republish provider documentation
    #[command(after_help = "EXAMPLES:\n  \
        # Refresh every provider\n  \
        routedoc update-docs\n\n  \
        # Refresh the routing engine only, without calling the generation service\n  \
        routedoc update-docs --provider omelet --no-synthesis\n\n  \
        # Treat partial success as failure (exit code 2)\n  \
        routedoc update-docs --strict")]
    UpdateDocs(UpdateDocsArgs),

    /// Resolve and partition a local OpenAPI file without publishing anything
    #[command(after_help = "EXAMPLES:\n  \
        routedoc partition --spec openapi.json\n  \
        routedoc partition --spec openapi.yaml --providers-file providers.yaml")]
    Partition {
        /// Path to the OpenAPI document (JSON or YAML)
        #[arg(short, long)]
        spec: PathBuf,

        /// Provider registry file (built-in registry if not specified)
        #[arg(long)]
        providers_file: Option<PathBuf>,
    },

    /// Show the published overview: providers, base URLs and authentication
    Info {
        /// Published documentation directory
        #[arg(long)]
        docs_dir: Option<PathBuf>,
    },

    /// List published endpoints
    Endpoints {
        /// Provider id (all providers if not specified)
        #[arg(short, long)]
        provider: Option<String>,

        /// Published documentation directory
        #[arg(long)]
        docs_dir: Option<PathBuf>,
    },

    /// Show one published document of an endpoint
    #[command(after_help = "EXAMPLES:\n  \
        routedoc show overview --path /api/vrp\n  \
        routedoc show request-example --path /api/cost-matrix --method post\n  \
        routedoc show response-schema --path /maps/v3.0/appkeys/{appkey}/coordinates --status 200 --provider inavi")]
    Show {
        /// Document to show
        #[arg(value_enum)]
        kind: ShowKind,

        /// Endpoint path as documented
        #[arg(long)]
        path: String,

        /// HTTP method (required when the path has several operations)
        #[arg(short, long)]
        method: Option<String>,

        /// Provider id (detected from the path if not specified)
        #[arg(short, long)]
        provider: Option<String>,

        /// Response status code, for response-schema
        #[arg(long)]
        status: Option<String>,

        /// Published documentation directory
        #[arg(long)]
        docs_dir: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct UpdateDocsArgs {
    /// Comma-separated list of provider ids to refresh (all if not specified)
    #[arg(short, long, value_delimiter = ',')]
    provider: Vec<String>,

    /// Published documentation directory
    #[arg(long)]
    docs_dir: Option<PathBuf>,

    /// Provider registry file (built-in registry if not specified)
    #[arg(long)]
    providers_file: Option<PathBuf>,

    /// Do not send examples to the live provider APIs
    #[arg(long)]
    skip_validation: bool,

    /// Do not call the generation service for missing request examples
    #[arg(long)]
    no_synthesis: bool,

    /// Generate new examples even where the published ones are still current
    #[arg(long)]
    regenerate: bool,

    /// Exit with code 2 when only some providers were updated
    #[arg(long)]
    strict: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ShowKind {
    Overview,
    RequestSchema,
    RequestExample,
    ResponseSchema,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::UpdateDocs(args) => update_docs_command(args).await,
        Commands::Partition {
            spec,
            providers_file,
        } => {
            partition_command(&spec, providers_file.as_deref(), cli.verbose)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Info { docs_dir } => {
            let reader = open_docs(docs_dir)?;
            let info = reader
                .basic_info()
                .context("Failed to read documentation overview")?;
            println!("{}", info);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Endpoints { provider, docs_dir } => {
            let reader = open_docs(docs_dir)?;
            let summary = reader
                .list_endpoints(provider.as_deref())
                .context("Failed to list endpoints")?;
            println!("{}", summary);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Show {
            kind,
            path,
            method,
            provider,
            status,
            docs_dir,
        } => {
            let reader = open_docs(docs_dir)?;
            let method = method
                .as_deref()
                .map(str::parse::<HttpMethod>)
                .transpose()
                .context("Invalid --method")?;
            let provider = provider.as_deref();
            let document = match kind {
                ShowKind::Overview => reader.overview(&path, method, provider),
                ShowKind::RequestSchema => reader.request_schema(&path, method, provider),
                ShowKind::RequestExample => reader.request_example(&path, method, provider),
                ShowKind::ResponseSchema => {
                    let status = status.context("--status is required for response-schema")?;
                    reader.response_schema(&path, method, &status, provider)
                }
            }
            .with_context(|| format!("Failed to look up {} of {}", kind_name(kind), path))?;
            println!("{}", serde_json::to_string_pretty(&document)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "routedoc=debug,info"
    } else {
        "routedoc=info,info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn update_docs_command(args: UpdateDocsArgs) -> Result<ExitCode> {
    let mut config = PipelineConfig::from_env().context("Failed to load configuration")?;
    if let Some(docs_dir) = args.docs_dir {
        config.docs_dir = docs_dir;
    }
    if let Some(providers_file) = args.providers_file {
        config.providers_file = Some(providers_file);
    }
    let docs_dir = config.docs_dir.clone();

    let pipeline = Pipeline::from_config(config).context("Failed to set up pipeline")?;
    let options = RunOptions {
        providers: args.provider,
        skip_validation: args.skip_validation,
        no_synthesis: args.no_synthesis,
        regenerate: args.regenerate,
    };

    println!(
        "{} Refreshing documentation in {}",
        "→".cyan(),
        docs_dir.display()
    );
    if options.skip_validation {
        println!("{} Live validation disabled", "⚠".yellow());
    }

    let report = pipeline
        .run(&options)
        .await
        .context("Documentation refresh failed")?;
    print_report(&report, &docs_dir);

    Ok(ExitCode::from(exit_code(report.outcome(), args.strict)))
}

fn exit_code(outcome: RunOutcome, strict: bool) -> u8 {
    match outcome {
        RunOutcome::Success => 0,
        RunOutcome::Partial if strict => 2,
        RunOutcome::Partial => 0,
        RunOutcome::Failed => 1,
    }
}

fn print_report(report: &RunReport, docs_dir: &Path) {
    println!("\n{}", "Providers:".bold());
    for provider in &report.providers {
        let counts = &provider.counts;
        match &provider.status {
            BranchStatus::Failed { stage, cause } => {
                println!(
                    "  {} {} failed at {}: {}",
                    "✗".red(),
                    provider.provider.to_string().yellow(),
                    stage,
                    cause
                );
            }
            status => {
                let mark = if *status == BranchStatus::Succeeded {
                    "✓".green()
                } else {
                    "⚠".yellow()
                };
                println!(
                    "  {} {} {} endpoints (extracted {}, carried over {}, synthesized {}, rejected {})",
                    mark,
                    provider.provider.to_string().yellow(),
                    provider.endpoints,
                    counts.extracted,
                    counts.carried_over,
                    counts.synthesized_accepted,
                    counts.synthesized_rejected
                );
                for rejection in &provider.rejections {
                    println!(
                        "      {} {}: {}",
                        "•".dimmed(),
                        rejection.endpoint,
                        rejection.reason
                    );
                }
            }
        }
    }

    if let Some(error) = &report.publish_error {
        println!("\n{} Publishing failed: {}", "✗".red().bold(), error);
    }

    let unchanged = report.unchanged();
    match report.outcome() {
        RunOutcome::Success => {
            println!("\n{}", "✓ Documentation published!".green().bold());
            println!("  {}", docs_dir.display());
        }
        RunOutcome::Partial => {
            println!("\n{}", "⚠ Documentation partially updated".yellow().bold());
            println!(
                "  Previous documentation kept for: {}",
                unchanged
                    .iter()
                    .map(|id| id.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        RunOutcome::Failed => {
            println!("\n{}", "✗ Nothing was published".red().bold());
        }
    }
}

fn partition_command(spec_path: &Path, providers_file: Option<&Path>, verbose: bool) -> Result<()> {
    println!("{} Reading spec file: {}", "→".cyan(), spec_path.display());

    let registry = match providers_file {
        Some(path) => ProviderRegistry::load(path),
        None => ProviderRegistry::builtin(),
    }
    .context("Failed to load provider registry")?;

    let raw = OpenApiParser::from_file(spec_path).context("Failed to load OpenAPI spec")?;
    println!("{} Resolving references...", "→".cyan());
    let resolved = resolve(&raw).context("Failed to resolve references")?;
    let paths = resolved.path_names().len();

    let providers: Vec<&ProviderConfig> = registry.providers().iter().collect();
    let specs = partition(&resolved, &providers).context("Failed to partition spec")?;

    println!("\n{}", "✓ Partition successful!".green().bold());
    println!("  Paths: {}", paths);
    for spec in &specs {
        let names = spec.path_names();
        println!("  {} {} paths", spec.provider.to_string().yellow(), names.len());
        if verbose {
            for name in names {
                println!("    • {}", name.cyan());
            }
        }
    }

    Ok(())
}

fn open_docs(docs_dir: Option<PathBuf>) -> Result<DocsReader> {
    let docs_dir = match docs_dir {
        Some(dir) => dir,
        None => {
            PipelineConfig::from_env()
                .context("Failed to load configuration")?
                .docs_dir
        }
    };
    debug!(docs_dir = %docs_dir.display(), "Opening published documentation");
    DocsReader::open(&docs_dir).with_context(|| format!("Failed to open {}", docs_dir.display()))
}

fn kind_name(kind: ShowKind) -> &'static str {
    match kind {
        ShowKind::Overview => "overview",
        ShowKind::RequestSchema => "request schema",
        ShowKind::RequestExample => "request example",
        ShowKind::ResponseSchema => "response schema",
    }
}
