//! In-memory artifact sets

use routedoc_common::{DocError, Result};
use serde::Serialize;
use std::collections::BTreeMap;

/// Files to publish, keyed by path relative to the published root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactSet {
    files: BTreeMap<String, Vec<u8>>,
}

impl ArtifactSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_bytes(&mut self, path: impl Into<String>, bytes: Vec<u8>) -> Result<()> {
        let path = path.into();
        validate_relative_path(&path)?;
        self.files.insert(path, bytes);
        Ok(())
    }

    pub fn insert_text(&mut self, path: impl Into<String>, text: String) -> Result<()> {
        self.insert_bytes(path, text.into_bytes())
    }

    /// Pretty-printed JSON with a trailing newline
    pub fn insert_json<T: Serialize + ?Sized>(
        &mut self,
        path: impl Into<String>,
        value: &T,
    ) -> Result<()> {
        let mut bytes = serde_json::to_vec_pretty(value)?;
        bytes.push(b'\n');
        self.insert_bytes(path, bytes)
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.files.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Merge another set into this one; an existing path is an error
    pub fn extend(&mut self, other: ArtifactSet) -> Result<()> {
        for (path, bytes) in other.files {
            if self.files.contains_key(&path) {
                return Err(DocError::Generation(format!(
                    "artifact '{}' produced twice",
                    path
                )));
            }
            self.files.insert(path, bytes);
        }
        Ok(())
    }
}

/// Accept only relative `/`-separated paths that stay inside the root
pub fn validate_relative_path(path: &str) -> Result<()> {
    let invalid = path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path.contains('\0')
        || path
            .split('/')
            .any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if invalid {
        return Err(DocError::InvalidKey(format!(
            "artifact path '{}' is not a plain relative path",
            path.escape_default()
        )));
    }
    Ok(())
}
