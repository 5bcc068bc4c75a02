//! Run report: what happened to every provider branch

use routedoc_common::ProviderId;
use serde::Serialize;
use std::fmt;

/// Pipeline stage a branch failed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Resolve,
    Partition,
    Generate,
    Publish,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Resolve => "resolve",
            Stage::Partition => "partition",
            Stage::Generate => "generate",
            Stage::Publish => "publish",
        };
        f.write_str(name)
    }
}

/// Per-endpoint example counts of one provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExampleCounts {
    /// Endpoints with at least one example taken from the source document
    pub extracted: usize,
    /// Endpoints whose previously published example was reused
    pub carried_over: usize,
    pub synthesized_accepted: usize,
    pub synthesized_rejected: usize,
}

/// A synthesized example that was not published
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub endpoint: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BranchStatus {
    Succeeded,
    /// Published, but some synthesized examples were rejected
    Partial,
    /// Nothing new published; the previous documentation is kept
    Failed { stage: Stage, cause: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderReport {
    pub provider: ProviderId,
    #[serde(flatten)]
    pub status: BranchStatus,
    pub endpoints: usize,
    pub counts: ExampleCounts,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejections: Vec<Rejection>,
}

impl ProviderReport {
    pub fn failed(provider: ProviderId, stage: Stage, cause: impl Into<String>) -> Self {
        Self {
            provider,
            status: BranchStatus::Failed {
                stage,
                cause: cause.into(),
            },
            endpoints: 0,
            counts: ExampleCounts::default(),
            rejections: Vec::new(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, BranchStatus::Failed { .. })
    }
}

/// Overall result of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Success,
    /// Some providers were updated, others kept their previous documentation
    Partial,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub providers: Vec<ProviderReport>,
    /// Whether a new tree was swapped in
    pub published: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_error: Option<String>,
}

impl RunReport {
    pub fn outcome(&self) -> RunOutcome {
        let failed = self.providers.iter().filter(|p| p.is_failed()).count();
        if self.publish_error.is_some() || failed == self.providers.len() {
            RunOutcome::Failed
        } else if failed > 0 {
            RunOutcome::Partial
        } else {
            RunOutcome::Success
        }
    }

    pub fn provider(&self, id: &str) -> Option<&ProviderReport> {
        self.providers.iter().find(|p| p.provider.as_str() == id)
    }

    /// Providers whose documentation was replaced by this run
    pub fn updated(&self) -> Vec<&ProviderId> {
        if !self.published {
            return Vec::new();
        }
        self.providers
            .iter()
            .filter(|p| !p.is_failed())
            .map(|p| &p.provider)
            .collect()
    }

    /// Providers left at their previous documentation
    pub fn unchanged(&self) -> Vec<&ProviderId> {
        self.providers
            .iter()
            .filter(|p| !self.published || p.is_failed())
            .map(|p| &p.provider)
            .collect()
    }
}
