//! Documentation refresh pipeline for routedoc
//!
//! Fetches each provider's OpenAPI document, resolves and partitions it,
//! generates the per-endpoint artifacts, fills in missing request examples
//! through an external generation service, checks them against the live
//! provider APIs, and publishes the result as one atomic swap.
//!
//! ```text
//! fetch -> resolve -> partition -> generate -> synthesize/validate -> publish
//! ```

pub mod config;
pub mod error;
pub mod fetcher;
pub mod generation;
pub mod http;
pub mod json_schema;
pub mod publisher;
pub mod report;
pub mod retry;
pub mod runner;
pub mod synthesizer;
pub mod validator;

pub use config::{provider_credential, CredentialLookup, GenerationConfig, PipelineConfig};
pub use error::{PipelineError, Result};
pub use fetcher::SpecFetcher;
pub use generation::{CompletionService, HttpCompletionClient};
pub use http::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use publisher::Publisher;
pub use report::{
    BranchStatus, ExampleCounts, ProviderReport, Rejection, RunOutcome, RunReport, Stage,
};
pub use retry::RetryPolicy;
pub use runner::{Pipeline, RunOptions};
pub use synthesizer::{ExampleSynthesizer, SynthesisOutcome, SynthesisSettings};
pub use validator::{ExampleValidator, RejectReason, Verdict};
