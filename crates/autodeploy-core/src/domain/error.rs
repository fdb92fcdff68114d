//! Domain-level error taxonomy for the deployment engine.
//!
//! Expected failure modes of provisioning and verification are structured
//! return values (`ProvisioningResult`, `VerificationOutcome`), not errors.
//! Everything in `DeployError` either ends the run or ends the attempt.

/// Deployment engine errors.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Free text named no recognizable cloud provider. Provider selection is
    /// never silently defaulted; provisioning is destructive and costly.
    #[error("could not determine a cloud provider from the request: {0}")]
    AmbiguousProvider(String),

    /// No run strategy fits the repository (no Dockerfile, no recognizable
    /// language markers).
    #[error("unsupported application stack: {0}")]
    UnsupportedStack(String),

    /// Repository could not be fetched or was empty. Fatal to the whole run.
    #[error("repository retrieval failed for {url}: {reason}")]
    Retrieval { url: String, reason: String },

    /// The intent classifier returned something unusable (empty reply,
    /// non-JSON). Never propagated raw past the resolver boundary.
    #[error("intent classifier error: {0}")]
    Classifier(String),

    /// Startup configuration is incomplete for the selected provider.
    #[error("configuration error: {0}")]
    Config(String),

    /// No SSH public key available for a provider that requires one.
    #[error("no SSH public key configured; set one or place a key at ~/.ssh/id_ed25519.pub or ~/.ssh/id_rsa.pub")]
    MissingSshKey,

    /// A template produced inconsistent output. Programming error, aborts.
    #[error("artifact template error: {0}")]
    Template(String),

    /// The run was aborted by the caller. Rollback of the in-flight
    /// attempt has already run (and been confirmed) by the time this is
    /// returned.
    #[error("deployment aborted by the caller; the in-flight attempt was rolled back")]
    Aborted,

    /// Destroy did not remove every recorded resource. The engine never
    /// claims a clean rollback without confirming it.
    #[error("rollback incomplete: {remaining} resource(s) still exist; inspect and remove them manually: {handles:?}")]
    RollbackIncomplete {
        remaining: usize,
        handles: Vec<String>,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeployError {
    /// Whether this error ends the run with no possible retry. Retrying a
    /// terminal input error without new information cannot change the outcome.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DeployError::Classifier(_))
    }
}

/// Result type for deployment engine operations.
pub type Result<T> = std::result::Result<T, DeployError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DeployError::AmbiguousProvider("deploy my app somewhere".to_string());
        assert!(err.to_string().contains("cloud provider"));

        let err = DeployError::UnsupportedStack("no markers found".to_string());
        assert!(err.to_string().contains("unsupported application stack"));

        let err = DeployError::Retrieval {
            url: "https://github.com/acme/gone".to_string(),
            reason: "clone failed".to_string(),
        };
        assert!(err.to_string().contains("acme/gone"));
    }

    #[test]
    fn test_rollback_incomplete_lists_handles() {
        let err = DeployError::RollbackIncomplete {
            remaining: 2,
            handles: vec![
                "aws_instance.app".to_string(),
                "aws_security_group.app_sg".to_string(),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 resource(s)"));
        assert!(msg.contains("aws_instance.app"));
    }

    #[test]
    fn test_terminal_classification() {
        assert!(DeployError::MissingSshKey.is_terminal());
        assert!(!DeployError::Classifier("timeout".to_string()).is_terminal());
    }
}
