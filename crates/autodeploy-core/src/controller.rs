//! Deployment orchestration controller.
//!
//! Owns the run lifecycle: resolve intent, inspect the repository, then a
//! bounded attempt loop of generate, provision, verify. Every failed
//! attempt is rolled back and teardown is confirmed against the recorded
//! resource handles before the next rung is tried. Collaborators are trait
//! objects so the whole lifecycle runs under test with no cloud, git or
//! network access.

use std::sync::Arc;
use tracing::{info, warn};

use crate::artifact::{self, ArtifactBundle};
use crate::classifier::IntentClassifier;
use crate::config::EngineConfig;
use crate::domain::{
    AttemptFailure, AttemptRecord, DeployError, DeploymentOutcome, ResolvedTarget, Result,
    RunStrategy,
};
use crate::inspector::RepositoryInspector;
use crate::provision::Provisioner;
use crate::resolver;
use crate::verify::{EndpointVerifier, VerificationOutcome};

/// One user request: free-text description and the repository to deploy.
#[derive(Debug, Clone)]
pub struct DeploymentRequest {
    pub description: String,
    pub repo_url: String,
}

/// The orchestration engine. One instance serves many runs; all per-run
/// state lives on the stack of [`DeploymentEngine::deploy`].
pub struct DeploymentEngine {
    config: EngineConfig,
    classifier: Arc<dyn IntentClassifier>,
    inspector: Arc<dyn RepositoryInspector>,
    provisioner: Arc<dyn Provisioner>,
    verifier: Arc<dyn EndpointVerifier>,
}

impl DeploymentEngine {
    pub fn new(
        config: EngineConfig,
        classifier: Arc<dyn IntentClassifier>,
        inspector: Arc<dyn RepositoryInspector>,
        provisioner: Arc<dyn Provisioner>,
        verifier: Arc<dyn EndpointVerifier>,
    ) -> Self {
        Self {
            config,
            classifier,
            inspector,
            provisioner,
            verifier,
        }
    }

    /// Run one deployment end to end.
    ///
    /// `Ok` carries the terminal outcome, success or exhausted ladder.
    /// `Err` is reserved for conditions where continuing would be wrong:
    /// unresolvable inputs, invalid configuration, or a rollback that
    /// could not be confirmed complete.
    pub async fn deploy(&self, request: &DeploymentRequest) -> Result<DeploymentOutcome> {
        self.deploy_with_abort(request, std::future::pending::<()>())
            .await
    }

    /// Like [`DeploymentEngine::deploy`], but stops the run when `abort`
    /// resolves. Billable resources must never be orphaned by a caller
    /// walking away, so an abort that lands mid-provision or
    /// mid-verification still tears down the in-flight attempt and
    /// confirms the teardown before [`DeployError::Aborted`] is returned.
    pub async fn deploy_with_abort<F>(
        &self,
        request: &DeploymentRequest,
        abort: F,
    ) -> Result<DeploymentOutcome>
    where
        F: std::future::Future<Output = ()> + Send,
    {
        tokio::pin!(abort);
        let target = self.resolve_target(request).await?;
        info!(
            provider = target.provider.name(),
            strategy = target.run_strategy.name(),
            app_port = target.app_port,
            repo = %target.profile.repo_name,
            "Target resolved"
        );
        self.attempt_loop(target, abort).await
    }

    /// Turn the raw request into a fully-resolved first target, spending
    /// nothing on cloud resources. All input errors surface here.
    async fn resolve_target(&self, request: &DeploymentRequest) -> Result<ResolvedTarget> {
        let classified = self.classifier.classify(&request.description).await?;
        let intent = classified.into_intent(&request.description);
        if intent.provider == crate::domain::Provider::Unresolved {
            return Err(DeployError::AmbiguousProvider(request.description.clone()));
        }
        self.config.validate_for(intent.provider)?;

        let profile = self.inspector.inspect(&request.repo_url).await?;
        resolver::resolve_target(&intent, &profile)
    }

    async fn attempt_loop<F>(
        &self,
        mut target: ResolvedTarget,
        mut abort: std::pin::Pin<&mut F>,
    ) -> Result<DeploymentOutcome>
    where
        F: std::future::Future<Output = ()> + Send,
    {
        let mut history: Vec<AttemptRecord> = Vec::new();

        loop {
            let attempt = history.len() as u32 + 1;
            let suffix = artifact::fresh_suffix();
            info!(
                attempt,
                strategy = target.run_strategy.name(),
                suffix = %suffix,
                "Starting deployment attempt"
            );

            let bundle = artifact::generate_bundle(&target, &self.config, &suffix)?;
            artifact::write_bundle(&bundle)?;

            // An abort mid-apply drops the apply future (killing the infra
            // tool) and still tears the attempt down; resources created
            // before the kill are covered by destroy.
            let provisioning = tokio::select! {
                result = self.provisioner.apply(&bundle) => result?,
                _ = abort.as_mut() => return self.abort_attempt(&bundle).await,
            };
            let failure = if provisioning.success {
                match provisioning.public_endpoint.as_deref() {
                    Some(endpoint) => {
                        let verified = tokio::select! {
                            outcome = self.verifier.verify(endpoint) => outcome,
                            _ = abort.as_mut() => return self.abort_attempt(&bundle).await,
                        };
                        match verified {
                            VerificationOutcome::Reachable => {
                                let endpoint = endpoint.to_string();
                                history.push(AttemptRecord {
                                    attempt,
                                    target: target.clone(),
                                    provisioning,
                                    failure: None,
                                    leftover_handles: Vec::new(),
                                });
                                info!(endpoint = %endpoint, attempt, "Deployment verified reachable");
                                return Ok(DeploymentOutcome::succeeded(endpoint, history));
                            }
                            VerificationOutcome::Timeout => AttemptFailure::VerificationTimeout,
                        }
                    }
                    None => AttemptFailure::Provisioning,
                }
            } else {
                AttemptFailure::Provisioning
            };

            warn!(
                attempt,
                strategy = target.run_strategy.name(),
                ?failure,
                "Attempt failed; rolling back"
            );
            let leftover = self.roll_back(&bundle).await?;
            history.push(AttemptRecord {
                attempt,
                target: target.clone(),
                provisioning,
                failure: Some(failure),
                leftover_handles: leftover,
            });

            match target.advance_strategy() {
                Some(next) => {
                    info!(
                        from = target.run_strategy.name(),
                        to = next.run_strategy.name(),
                        "Advancing to next run strategy"
                    );
                    target = next;
                }
                None => {
                    let last = summarize_last_failure(&history, target.run_strategy);
                    return Ok(DeploymentOutcome::failed(last, history));
                }
            }
        }
    }

    /// Abort handling: tear down the in-flight attempt, confirm the
    /// teardown, then surface the abort to the caller.
    async fn abort_attempt(&self, bundle: &ArtifactBundle) -> Result<DeploymentOutcome> {
        warn!(suffix = %bundle.suffix, "Abort requested; rolling back the in-flight attempt");
        self.roll_back(bundle).await?;
        Err(DeployError::Aborted)
    }

    /// Tear down one attempt's resources and confirm nothing remains.
    /// An unconfirmed rollback escalates instead of retrying; a retry on
    /// top of half-destroyed infrastructure compounds the damage.
    async fn roll_back(&self, bundle: &ArtifactBundle) -> Result<Vec<String>> {
        self.provisioner.destroy(bundle).await?;
        let remaining = self.provisioner.remaining_handles(bundle).await?;
        if remaining.is_empty() {
            info!(suffix = %bundle.suffix, "Rollback confirmed clean");
            Ok(Vec::new())
        } else {
            Err(DeployError::RollbackIncomplete {
                remaining: remaining.len(),
                handles: remaining,
            })
        }
    }
}

fn summarize_last_failure(history: &[AttemptRecord], last_strategy: RunStrategy) -> String {
    let attempts = history.len();
    let detail = history
        .last()
        .map(|r| {
            let diag = r.provisioning.raw_diagnostics.trim();
            let head: String = diag.chars().take(200).collect();
            match r.failure {
                Some(AttemptFailure::VerificationTimeout) => {
                    "endpoint never became reachable".to_string()
                }
                _ if !head.is_empty() => head,
                _ => "provisioning failed".to_string(),
            }
        })
        .unwrap_or_else(|| "no attempt was possible".to_string());
    format!(
        "all {attempts} run strategies exhausted (last: {}): {detail}",
        last_strategy.name()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AttemptRecord;

    fn record(failure: Option<AttemptFailure>, diag: &str) -> AttemptRecord {
        AttemptRecord {
            attempt: 1,
            target: crate::artifact::test_support::flask_target(crate::domain::Provider::Gcp),
            provisioning: crate::domain::ProvisioningResult::failure(diag, Vec::new()),
            failure,
            leftover_handles: Vec::new(),
        }
    }

    #[test]
    fn test_summary_names_strategy_and_diagnostics() {
        let history = vec![record(Some(AttemptFailure::Provisioning), "quota exceeded")];
        let msg = summarize_last_failure(&history, RunStrategy::NativePython);
        assert!(msg.contains("native_python"));
        assert!(msg.contains("quota exceeded"));
        assert!(msg.contains("all 1 run strategies"));
    }

    #[test]
    fn test_summary_for_verification_timeout() {
        let history = vec![record(Some(AttemptFailure::VerificationTimeout), "")];
        let msg = summarize_last_failure(&history, RunStrategy::ContainerFromSource);
        assert!(msg.contains("never became reachable"));
    }
}
