//! Post-provisioning reachability verification.
//!
//! Polls the externally advertised port (80) until the workload responds
//! or the attempt budget is exhausted. Verification does not inspect the
//! response payload; any non-error HTTP response (2xx or 3xx) counts as
//! reachable. An error status means something is listening but the
//! workload is misdeployed, which is retried like an unreachable host.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Backoff and budget knobs for verification. The exact constants are a
/// tuning knob, not a correctness requirement.
#[derive(Debug, Clone)]
pub struct VerifyPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub total_budget: Duration,
    pub request_timeout: Duration,
}

impl Default for VerifyPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            total_budget: Duration::from_secs(300),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl VerifyPolicy {
    /// Delay before poll attempt `n` (0-based): doubling from
    /// `initial_delay`, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let doubled = self
            .initial_delay
            .checked_mul(1u32 << attempt.min(16))
            .unwrap_or(self.max_delay);
        doubled.min(self.max_delay)
    }
}

/// Outcome of one verification pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    Reachable,
    /// Attempt budget exhausted. The VM may be up but the workload
    /// misconfigured; the controller treats this as attempt failure, not
    /// infrastructure failure.
    Timeout,
}

/// Confirms external reachability of a deployed workload.
#[async_trait]
pub trait EndpointVerifier: Send + Sync {
    async fn verify(&self, public_endpoint: &str) -> VerificationOutcome;
}

/// HTTP poller against `http://<endpoint>/`.
pub struct HttpVerifier {
    policy: VerifyPolicy,
    client: reqwest::Client,
}

impl HttpVerifier {
    pub fn new(policy: VerifyPolicy) -> Self {
        let client = reqwest::Client::builder()
            .timeout(policy.request_timeout)
            .build()
            .unwrap_or_default();
        Self { policy, client }
    }
}

#[async_trait]
impl EndpointVerifier for HttpVerifier {
    async fn verify(&self, public_endpoint: &str) -> VerificationOutcome {
        let url = format!("http://{public_endpoint}/");
        let deadline = Instant::now() + self.policy.total_budget;
        let mut attempt = 0u32;

        info!(%url, budget_secs = self.policy.total_budget.as_secs(), "Verifying deployment");

        loop {
            match self.client.get(&url).send().await {
                Ok(resp)
                    if resp.status().is_success() || resp.status().is_redirection() =>
                {
                    info!(%url, status = %resp.status(), "Workload is reachable");
                    return VerificationOutcome::Reachable;
                }
                Ok(resp) => {
                    debug!(%url, status = %resp.status(), "error status, retrying");
                }
                Err(e) => {
                    debug!(%url, error = %e, "not reachable yet");
                }
            }

            let delay = self.policy.delay_for(attempt);
            attempt += 1;
            if Instant::now() + delay >= deadline {
                warn!(%url, attempts = attempt, "Verification budget exhausted");
                return VerificationOutcome::Timeout;
            }
            tokio::time::sleep(delay).await;
        }
    }
}
