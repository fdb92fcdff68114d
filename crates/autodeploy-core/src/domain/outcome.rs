//! Terminal deployment records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::target::ResolvedTarget;

/// Result of one provisioning invocation. Immutable; consumed by the
/// verifier and, on failure, by rollback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningResult {
    pub success: bool,

    /// Public address assigned by the provider, parsed from structured
    /// infra-tool output.
    pub public_endpoint: Option<String>,

    /// Verbatim infra-tool diagnostics. The primary operator-facing signal
    /// on failure.
    pub raw_diagnostics: String,

    /// Provider-native resource identifiers created by this apply, recorded
    /// for teardown.
    pub resource_handles: Vec<String>,
}

impl ProvisioningResult {
    pub fn failure(diagnostics: impl Into<String>, handles: Vec<String>) -> Self {
        Self {
            success: false,
            public_endpoint: None,
            raw_diagnostics: diagnostics.into(),
            resource_handles: handles,
        }
    }
}

/// Why a single attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptFailure {
    Provisioning,
    VerificationTimeout,
}

/// One entry in the attempt history: the target tried, what provisioning
/// produced, and whether teardown was confirmed clean.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub target: ResolvedTarget,
    pub provisioning: ProvisioningResult,
    pub failure: Option<AttemptFailure>,

    /// Resource handles still present after rollback. Empty on every
    /// non-final record by construction.
    pub leftover_handles: Vec<String>,
}

/// Terminal status of a deployment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Succeeded,
    FailedTerminal,
}

/// Terminal record for a whole deployment run. Written exclusively by the
/// orchestration controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentOutcome {
    pub status: DeploymentStatus,
    pub final_endpoint: Option<String>,
    pub last_error: Option<String>,
    pub attempt_history: Vec<AttemptRecord>,
    pub finished_at: DateTime<Utc>,
}

impl DeploymentOutcome {
    pub fn succeeded(endpoint: String, history: Vec<AttemptRecord>) -> Self {
        Self {
            status: DeploymentStatus::Succeeded,
            final_endpoint: Some(endpoint),
            last_error: None,
            attempt_history: history,
            finished_at: Utc::now(),
        }
    }

    pub fn failed(error: impl Into<String>, history: Vec<AttemptRecord>) -> Self {
        Self {
            status: DeploymentStatus::FailedTerminal,
            final_endpoint: None,
            last_error: Some(error.into()),
            attempt_history: history,
            finished_at: Utc::now(),
        }
    }
}
