//! Validation of user-supplied lookup keys
//!
//! Keys arriving from downstream tools (provider ids, endpoint paths, example
//! names) are checked here before they are allowed anywhere near a filesystem
//! path.

use crate::{DocError, Result};

/// Reject keys that could escape the published tree
///
/// Endpoint paths legitimately contain `/`, so they go through
/// [`validate_path_key`] instead.
pub fn validate_segment(key: &str) -> Result<&str> {
    if key.is_empty() {
        return Err(DocError::InvalidKey("empty key".to_string()));
    }
    if key.contains('/') || key.contains('\\') || key.contains('\0') || key.contains("..") {
        return Err(DocError::InvalidKey(format!(
            "'{}' contains a path separator or traversal segment",
            key.escape_default()
        )));
    }
    Ok(key)
}

/// Reject endpoint paths with traversal segments, backslashes or NUL bytes
pub fn validate_path_key(path: &str) -> Result<&str> {
    if path.contains('\\') || path.contains('\0') {
        return Err(DocError::InvalidKey(format!(
            "'{}' contains a backslash or NUL byte",
            path.escape_default()
        )));
    }
    if path.split('/').any(|seg| seg == ".." || seg == ".") {
        return Err(DocError::InvalidKey(format!(
            "'{}' contains a traversal segment",
            path
        )));
    }
    Ok(path)
}

/// Validate `key` and require it to be one of `known`
pub fn validate_lookup_key<'a, I, S>(key: &str, known: I) -> Result<String>
where
    I: IntoIterator<Item = &'a S>,
    S: AsRef<str> + 'a + ?Sized,
{
    validate_segment(key)?;
    known
        .into_iter()
        .find(|k| k.as_ref() == key)
        .map(|k| k.as_ref().to_string())
        .ok_or_else(|| DocError::NotFound(format!("'{}' is not a known key", key)))
}
