//! Read-only lookups over a published documentation tree
//!
//! Every user-supplied key is validated before it is used: provider ids must
//! appear in `manifest.json`, endpoints must appear in the provider's
//! `index.json`, and status codes must be declared by the endpoint. File paths
//! are only ever built from those recorded values.

use crate::layout::{self, EndpointIndex, ExampleRecord, IndexEntry, Manifest, ManifestEntry};
use routedoc_common::lookup::{validate_lookup_key, validate_path_key, validate_segment};
use routedoc_common::{normalize_path, DocError, EndpointKey, HttpMethod, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Read-only view of a published tree
#[derive(Debug, Clone)]
pub struct DocsReader {
    root: PathBuf,
    manifest: Manifest,
}

impl DocsReader {
    /// Open the tree rooted at `root`
    ///
    /// Fails with `NotFound` when nothing has been published there yet.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let manifest: Manifest = read_json(&root.join(layout::MANIFEST_FILE)).map_err(|e| match e {
            DocError::NotFound(_) => DocError::NotFound(format!(
                "no documentation published at {}; run 'routedoc update-docs' first",
                root.display()
            )),
            other => other,
        })?;
        Ok(Self { root, manifest })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn providers(&self) -> &[ManifestEntry] {
        &self.manifest.providers
    }

    pub fn basic_info(&self) -> Result<String> {
        read_text(&self.root.join(layout::BASIC_INFO_FILE))
    }

    /// Endpoint summary tables, for one provider or all of them
    pub fn list_endpoints(&self, provider: Option<&str>) -> Result<String> {
        match provider {
            Some(provider) => {
                let provider = self.provider_id(provider)?;
                read_text(&self.file(&layout::summary_path(&provider)))
            }
            None => {
                let parts = self
                    .manifest
                    .providers
                    .iter()
                    .filter_map(|p| read_text(&self.file(&layout::summary_path(&p.id))).ok())
                    .collect::<Vec<_>>();
                if parts.is_empty() {
                    return Err(DocError::NotFound(
                        "no endpoint summaries published".to_string(),
                    ));
                }
                Ok(parts.join("\n---\n\n"))
            }
        }
    }

    pub fn index(&self, provider: &str) -> Result<EndpointIndex> {
        let provider = self.provider_id(provider)?;
        read_json(&self.file(&layout::index_path(&provider)))
    }

    /// Provider owning `path`, by the longest matching route prefix
    pub fn provider_for_path(&self, path: &str) -> Result<String> {
        validate_path_key(path)?;
        let path = normalize_path(path);
        self.manifest
            .providers
            .iter()
            .filter_map(|p| {
                p.route_prefix
                    .as_deref()
                    .filter(|prefix| path.starts_with(prefix) || normalize_path(prefix) == path)
                    .map(|prefix| (prefix.len(), p))
            })
            .max_by_key(|(len, _)| *len)
            .map(|(_, p)| p.id.clone())
            .ok_or_else(|| {
                DocError::NotFound(format!(
                    "no provider claims '{}'; pass the provider explicitly",
                    path
                ))
            })
    }

    /// Find an endpoint in the index of its provider
    ///
    /// Without a method, the path must have exactly one operation.
    pub fn find_endpoint(
        &self,
        path: &str,
        method: Option<HttpMethod>,
        provider: Option<&str>,
    ) -> Result<(String, IndexEntry)> {
        validate_path_key(path)?;
        let provider = match provider {
            Some(p) => self.provider_id(p)?,
            None => self.provider_for_path(path)?,
        };
        let index = self.index(&provider)?;
        let wanted = normalize_path(path);

        let mut matching: Vec<IndexEntry> = index
            .endpoints
            .into_iter()
            .filter(|e| e.path == wanted && method.map_or(true, |m| m == e.method))
            .collect();
        match matching.len() {
            0 => Err(DocError::NotFound(format!(
                "endpoint {}{} not found for provider '{}'",
                method.map(|m| format!("{} ", m)).unwrap_or_default(),
                wanted,
                provider
            ))),
            1 => {
                let entry = matching.remove(0);
                validate_segment(&entry.id)?;
                Ok((provider, entry))
            }
            _ => Err(DocError::InvalidKey(format!(
                "'{}' has several operations ({}); specify a method",
                wanted,
                matching
                    .iter()
                    .map(|e| e.method.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }

    /// Look up an endpoint by exact key, `None` when it is not published
    pub fn endpoint_by_key(&self, provider: &str, key: &EndpointKey) -> Result<Option<IndexEntry>> {
        let index = self.index(provider)?;
        let entry = index
            .endpoints
            .into_iter()
            .find(|e| e.path == key.path && e.method == key.method);
        if let Some(entry) = &entry {
            validate_segment(&entry.id)?;
        }
        Ok(entry)
    }

    pub fn overview(
        &self,
        path: &str,
        method: Option<HttpMethod>,
        provider: Option<&str>,
    ) -> Result<Value> {
        let (provider, entry) = self.find_endpoint(path, method, provider)?;
        read_json(&self.file(&layout::overview_path(&provider, &entry.id)))
    }

    pub fn request_schema(
        &self,
        path: &str,
        method: Option<HttpMethod>,
        provider: Option<&str>,
    ) -> Result<Value> {
        let (provider, entry) = self.find_endpoint(path, method, provider)?;
        self.request_schema_of(&provider, &entry)
    }

    pub fn request_example(
        &self,
        path: &str,
        method: Option<HttpMethod>,
        provider: Option<&str>,
    ) -> Result<Value> {
        let (provider, entry) = self.find_endpoint(path, method, provider)?;
        self.request_example_of(&provider, &entry)?
            .map(|(_, payload)| payload)
            .ok_or_else(|| {
                DocError::NotFound(format!(
                    "no request example published for {} {}",
                    entry.method, entry.path
                ))
            })
    }

    pub fn response_schema(
        &self,
        path: &str,
        method: Option<HttpMethod>,
        status: &str,
        provider: Option<&str>,
    ) -> Result<Value> {
        let (provider, entry) = self.find_endpoint(path, method, provider)?;
        let status = validate_lookup_key(status, &entry.responses).map_err(|e| match e {
            DocError::NotFound(_) => DocError::NotFound(format!(
                "{} {} declares no response '{}' (declared: {})",
                entry.method,
                entry.path,
                status,
                entry.responses.join(", ")
            )),
            other => other,
        })?;
        read_json(&self.file(&layout::response_schema_path(&provider, &entry.id, &status)))
    }

    /// Request schema record of an indexed endpoint
    pub fn request_schema_of(&self, provider: &str, entry: &IndexEntry) -> Result<Value> {
        if !entry.has_request_body {
            return Err(DocError::NotFound(format!(
                "{} {} has no request body",
                entry.method, entry.path
            )));
        }
        let provider = self.provider_id(provider)?;
        read_json(&self.file(&layout::request_schema_path(&provider, &entry.id)))
    }

    /// Request example of an indexed endpoint together with its recorded metadata
    pub fn request_example_of(
        &self,
        provider: &str,
        entry: &IndexEntry,
    ) -> Result<Option<(ExampleRecord, Value)>> {
        let Some(record) = &entry.request_example else {
            return Ok(None);
        };
        let provider = self.provider_id(provider)?;
        let payload = read_json(&self.file(&layout::request_example_path(&provider, &entry.id)))?;
        Ok(Some((record.clone(), payload)))
    }

    fn provider_id(&self, provider: &str) -> Result<String> {
        validate_lookup_key(provider, self.manifest.providers.iter().map(|p| &p.id))
    }

    fn file(&self, relative: &str) -> PathBuf {
        relative
            .split('/')
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => DocError::NotFound(format!("{} not found", display_name(path))),
        _ => DocError::Io(e),
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = read_text(path)?;
    serde_json::from_str(&text).map_err(|e| {
        DocError::Parse(format!("invalid JSON in {}: {}", display_name(path), e))
    })
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
