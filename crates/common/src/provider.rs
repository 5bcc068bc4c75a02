//! Provider registry loading from YAML files
//!
//! Providers are described in a `providers.yaml` file instead of being
//! hardcoded. A built-in registry covering the routing engine and the maps
//! provider is embedded in the binary and used when no file is given.

use crate::{DocError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

/// Built-in provider registry
pub const DEFAULT_REGISTRY_YAML: &str = include_str!("../providers/default.yaml");

/// Validated provider identifier
///
/// Identifiers become directory names in the published tree, so only
/// lowercase ASCII letters, digits, `-` and `_` are accepted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProviderId(String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let valid = !id.is_empty()
            && id.len() <= 64
            && id
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
        if valid {
            Ok(Self(id))
        } else {
            Err(DocError::Config(format!("invalid provider id '{}'", id)))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProviderId {
    type Error = DocError;

    fn try_from(value: String) -> Result<Self> {
        ProviderId::new(value)
    }
}

impl From<ProviderId> for String {
    fn from(id: ProviderId) -> Self {
        id.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ProviderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Rule deciding which provider owns a path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutePredicate {
    /// Path starts with the given prefix
    PathPrefix(String),
    /// Any operation on the path carries the given tag
    Tag(String),
}

/// How requests against a provider's live API are authenticated
///
/// Every variant names the environment variable holding the credential;
/// the credential itself never appears in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthScheme {
    /// `Authorization: Bearer <credential>`
    Bearer { env: String },
    /// Custom request header
    Header { name: String, env: String },
    /// Query string parameter
    Query { param: String, env: String },
    /// Path template parameter, e.g. `{appkey}`
    PathParam { name: String, env: String },
    None,
}

impl AuthScheme {
    /// Environment variable that holds the credential, if any
    pub fn env_var(&self) -> Option<&str> {
        match self {
            AuthScheme::Bearer { env }
            | AuthScheme::Header { env, .. }
            | AuthScheme::Query { env, .. }
            | AuthScheme::PathParam { env, .. } => Some(env),
            AuthScheme::None => None,
        }
    }
}

/// One documented provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: ProviderId,
    /// Human-readable name, used as the provider document title
    pub title: String,
    /// URL of the OpenAPI document that contains this provider's paths
    pub docs_url: String,
    /// Base URL of the live API
    pub base_url: String,
    /// Written as a one-key map: `route: { path_prefix: /api/ }`
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub route: RoutePredicate,
    /// Prefix removed from paths when deriving endpoint file ids
    #[serde(default)]
    pub strip_prefix: Option<String>,
    #[serde(default = "default_auth")]
    pub auth: AuthScheme,
    /// `Accept` header sent with live validation requests
    #[serde(default)]
    pub accept: Option<String>,
    /// Whether missing request examples are synthesized
    #[serde(default)]
    pub synthesize_examples: bool,
    /// Whether extracted examples are also checked against the live API
    #[serde(default)]
    pub validate_extracted: bool,
    /// Extra guidance handed to the generation service
    #[serde(default)]
    pub generation_hints: Vec<String>,
}

fn default_auth() -> AuthScheme {
    AuthScheme::None
}

impl ProviderConfig {
    /// Path prefix claimed by this provider, if it routes by prefix
    pub fn path_prefix(&self) -> Option<&str> {
        match &self.route {
            RoutePredicate::PathPrefix(prefix) => Some(prefix),
            RoutePredicate::Tag(_) => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct RegistryFile {
    version: u32,
    providers: Vec<ProviderConfig>,
}

/// Ordered set of providers
///
/// Order matters: the partitioner assigns a path to the first provider whose
/// predicate matches.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: Vec<ProviderConfig>,
}

impl ProviderRegistry {
    /// Load the registry from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            DocError::Config(format!("Failed to read provider registry {:?}: {}", path, e))
        })?;
        Self::from_yaml(&content).map_err(|e| match e {
            DocError::Yaml(inner) => DocError::Config(format!(
                "Failed to parse provider registry {:?}: {}",
                path, inner
            )),
            other => other,
        })
    }

    /// Load the registry embedded in the binary
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(DEFAULT_REGISTRY_YAML)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let file: RegistryFile = serde_yaml::from_str(content)?;
        if file.version != 1 {
            return Err(DocError::Config(format!(
                "unsupported provider registry version {}",
                file.version
            )));
        }
        Self::new(file.providers)
    }

    pub fn new(providers: Vec<ProviderConfig>) -> Result<Self> {
        if providers.is_empty() {
            return Err(DocError::Config("provider registry is empty".to_string()));
        }
        let mut seen = HashSet::new();
        for provider in &providers {
            if !seen.insert(provider.id.clone()) {
                return Err(DocError::Config(format!(
                    "duplicate provider id '{}'",
                    provider.id
                )));
            }
        }
        Ok(Self { providers })
    }

    pub fn providers(&self) -> &[ProviderConfig] {
        &self.providers
    }

    pub fn get(&self, id: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.id.as_str() == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &ProviderId> {
        self.providers.iter().map(|p| &p.id)
    }

    /// Restrict to the named providers, preserving registry order
    pub fn select(&self, ids: &[String]) -> Result<Vec<&ProviderConfig>> {
        if ids.is_empty() {
            return Ok(self.providers.iter().collect());
        }
        for id in ids {
            if self.get(id).is_none() {
                return Err(DocError::Config(format!("unknown provider '{}'", id)));
            }
        }
        Ok(self
            .providers
            .iter()
            .filter(|p| ids.iter().any(|id| id == p.id.as_str()))
            .collect())
    }

    /// Providers that share one source document, keyed by docs URL in first-seen order
    pub fn sources(&self) -> Vec<(String, Vec<&ProviderConfig>)> {
        let mut sources: Vec<(String, Vec<&ProviderConfig>)> = Vec::new();
        for provider in &self.providers {
            match sources.iter_mut().find(|(url, _)| *url == provider.docs_url) {
                Some((_, members)) => members.push(provider),
                None => sources.push((provider.docs_url.clone(), vec![provider])),
            }
        }
        sources
    }
}
