//! Configuration management
//!
//! Loads process configuration from environment variables, after reading a
//! `.env` file when one is present. Credentials never come from anywhere
//! else and are kept in [`Credential`] values.

use routedoc_common::{Credential, ProviderConfig, ProviderRegistry};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::http::DEFAULT_TIMEOUT_SECS;
use crate::retry::RetryPolicy;

pub const DEFAULT_DOCS_DIR: &str = "docs";
pub const DEFAULT_GENERATION_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_GENERATION_MODEL: &str = "gpt-4o-mini";

/// Generation service settings
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub api_url: String,
    pub api_key: Credential,
    pub model: String,
}

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Live location of the published tree
    pub docs_dir: PathBuf,
    /// Provider registry file; the built-in registry when unset
    pub providers_file: Option<PathBuf>,
    /// Concurrent per-endpoint work items within a provider branch
    pub concurrency: usize,
    pub retry: RetryPolicy,
    pub http_timeout: Duration,
    /// Candidates requested per endpoint before giving up
    pub synth_attempts: u32,
    /// `None` when no API key is configured
    pub generation: Option<GenerationConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            docs_dir: PathBuf::from(DEFAULT_DOCS_DIR),
            providers_file: None,
            concurrency: 4,
            retry: RetryPolicy::default(),
            http_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            synth_attempts: 3,
            generation: None,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let concurrency: usize = parse_var(&get, "ROUTEDOC_CONCURRENCY", defaults.concurrency)?;
        if concurrency == 0 {
            return Err(PipelineError::Config(
                "ROUTEDOC_CONCURRENCY must be at least 1".to_string(),
            ));
        }

        let retry = RetryPolicy::new(
            parse_var(&get, "ROUTEDOC_MAX_RETRIES", defaults.retry.max_retries)?,
            Duration::from_millis(parse_var(
                &get,
                "ROUTEDOC_BASE_DELAY_MS",
                defaults.retry.base_delay.as_millis() as u64,
            )?),
            Duration::from_secs(parse_var(
                &get,
                "ROUTEDOC_MAX_DELAY_SECS",
                defaults.retry.max_delay.as_secs(),
            )?),
        );

        let generation = get("GENERATION_API_KEY").map(|key| GenerationConfig {
            api_url: get("GENERATION_API_URL")
                .unwrap_or_else(|| DEFAULT_GENERATION_URL.to_string()),
            api_key: Credential::new("GENERATION_API_KEY", key),
            model: get("GENERATION_MODEL")
                .unwrap_or_else(|| DEFAULT_GENERATION_MODEL.to_string()),
        });

        Ok(Self {
            docs_dir: get("ROUTEDOC_DOCS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.docs_dir),
            providers_file: get("ROUTEDOC_PROVIDERS_FILE").map(PathBuf::from),
            concurrency,
            retry,
            http_timeout: Duration::from_secs(parse_var(
                &get,
                "ROUTEDOC_HTTP_TIMEOUT_SECS",
                defaults.http_timeout.as_secs(),
            )?),
            synth_attempts: parse_var(&get, "ROUTEDOC_SYNTH_ATTEMPTS", defaults.synth_attempts)?,
            generation,
        })
    }

    /// Provider registry named by the configuration
    pub fn registry(&self) -> Result<ProviderRegistry> {
        let registry = match &self.providers_file {
            Some(path) => ProviderRegistry::load(path)?,
            None => ProviderRegistry::builtin()?,
        };
        Ok(registry)
    }
}

fn parse_var<T, G>(get: &G, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            PipelineError::Config(format!(
                "{} must be a non-negative integer, got '{}'",
                name, raw
            ))
        }),
    }
}

/// Outcome of looking up a provider's credential
#[derive(Debug, Clone)]
pub enum CredentialLookup {
    /// The provider's API is unauthenticated
    NotRequired,
    Found(Credential),
    /// The variable named by the provider's auth scheme is unset
    Missing { env: String },
}

/// Credential for a provider's live API, read from the environment
///
/// A missing credential is not an error: live validation is disabled for
/// that provider instead.
pub fn provider_credential(provider: &ProviderConfig) -> CredentialLookup {
    let Some(env) = provider.auth.env_var() else {
        return CredentialLookup::NotRequired;
    };
    match Credential::from_env(env) {
        Some(credential) => {
            debug!(provider = %provider.id, credential = %credential, "Loaded provider credential");
            CredentialLookup::Found(credential)
        }
        None => {
            warn!(
                provider = %provider.id,
                env = env,
                "Credential not set, live validation disabled for this provider"
            );
            CredentialLookup::Missing {
                env: env.to_string(),
            }
        }
    }
}
