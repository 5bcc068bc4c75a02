//! Provider credentials and their masked display form

use secrecy::{ExposeSecret, SecretString};
use std::fmt;

/// Mask a secret by showing only the first 4 and last 4 characters
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}****{}", head, tail)
}

/// A credential read from process configuration
///
/// `Debug` and `Display` only ever show the masked form.
#[derive(Clone)]
pub struct Credential {
    env: String,
    value: SecretString,
}

impl Credential {
    pub fn new(env: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            env: env.into(),
            value: SecretString::new(value.into()),
        }
    }

    /// Read the credential from the environment, `None` when unset or blank
    pub fn from_env(env: &str) -> Option<Self> {
        std::env::var(env)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(|v| Self::new(env, v))
    }

    /// Name of the environment variable the credential came from
    pub fn env(&self) -> &str {
        &self.env
    }

    /// Raw value, only for building outgoing requests
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn masked(&self) -> String {
        mask_secret(self.value.expose_secret())
    }

    /// Replace every occurrence of the raw value in `text` with the masked form
    ///
    /// The percent-encoded value is replaced as well, for URLs.
    pub fn redact(&self, text: &str) -> String {
        let raw = self.value.expose_secret();
        if raw.is_empty() {
            return text.to_string();
        }
        let masked = self.masked();
        let redacted = text.replace(raw.as_str(), &masked);
        let encoded = urlencoding::encode(raw);
        if encoded == raw.as_str() {
            redacted
        } else {
            redacted.replace(&*encoded, &masked)
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("env", &self.env)
            .field("value", &self.masked())
            .finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.env, self.masked())
    }
}
