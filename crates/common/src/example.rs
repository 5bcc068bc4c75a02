//! Example payloads and their provenance

use crate::EndpointKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the exchange an example illustrates
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "direction", rename_all = "snake_case")]
pub enum Direction {
    Request,
    Response { status: u16 },
}

/// Where an example came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Copied verbatim from the source document
    Extracted,
    /// Produced by the generation service
    Synthesized,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Extracted => f.write_str("extracted"),
            Provenance::Synthesized => f.write_str("synthesized"),
        }
    }
}

/// Outcome of checking an example against the live provider API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationState {
    Unvalidated,
    Valid,
    Rejected,
}

impl fmt::Display for ValidationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationState::Unvalidated => f.write_str("unvalidated"),
            ValidationState::Valid => f.write_str("valid"),
            ValidationState::Rejected => f.write_str("rejected"),
        }
    }
}

/// An example payload attached to one endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub endpoint: EndpointKey,
    #[serde(flatten)]
    pub direction: Direction,
    pub name: String,
    pub payload: serde_json::Value,
    pub provenance: Provenance,
    pub validation: ValidationState,
}

impl Example {
    /// An example copied from the source document
    pub fn extracted(
        endpoint: EndpointKey,
        direction: Direction,
        name: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            endpoint,
            direction,
            name: name.into(),
            payload,
            provenance: Provenance::Extracted,
            validation: ValidationState::Unvalidated,
        }
    }

    /// A request example produced by the generation service
    pub fn synthesized(endpoint: EndpointKey, payload: serde_json::Value) -> Self {
        Self {
            endpoint,
            direction: Direction::Request,
            name: "synthesized".to_string(),
            payload,
            provenance: Provenance::Synthesized,
            validation: ValidationState::Unvalidated,
        }
    }

    pub fn with_validation(mut self, validation: ValidationState) -> Self {
        self.validation = validation;
        self
    }

    pub fn is_request(&self) -> bool {
        self.direction == Direction::Request
    }
}
