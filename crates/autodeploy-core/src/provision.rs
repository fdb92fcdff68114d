//! Provisioning driver.
//!
//! Drives the infra tool as a child process over a written artifact
//! bundle. Tool failures are data, not errors: `apply` always returns a
//! [`ProvisioningResult`] so the controller can roll back and retry.
//! `Err` is reserved for the driver itself being unusable (spawn failure,
//! missing binary, unreadable directory).

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::artifact::ArtifactBundle;
use crate::domain::{ProvisioningResult, Result};

/// Creates and destroys cloud resources for one artifact bundle.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Apply the bundle. Infra-tool failure is reported inside the result.
    async fn apply(&self, bundle: &ArtifactBundle) -> Result<ProvisioningResult>;

    /// Best-effort teardown of everything the bundle created. Completion
    /// is judged by [`Provisioner::remaining_handles`], not by this call's
    /// exit status.
    async fn destroy(&self, bundle: &ArtifactBundle) -> Result<()>;

    /// Resource handles still recorded for the bundle. Empty means
    /// teardown is confirmed complete.
    async fn remaining_handles(&self, bundle: &ArtifactBundle) -> Result<Vec<String>>;
}

struct StepOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

impl StepOutput {
    fn diagnostics(&self) -> String {
        if self.stderr.trim().is_empty() {
            self.stdout.clone()
        } else {
            self.stderr.clone()
        }
    }
}

/// [`Provisioner`] backed by the Terraform CLI.
pub struct TerraformDriver {
    binary: String,
    step_timeout: Duration,
}

impl TerraformDriver {
    pub fn new(step_timeout: Duration) -> Self {
        Self {
            binary: "terraform".to_string(),
            step_timeout,
        }
    }

    #[cfg(test)]
    fn with_binary(binary: impl Into<String>, step_timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            step_timeout,
        }
    }

    async fn run_step(&self, dir: &Path, args: &[&str]) -> Result<StepOutput> {
        debug!(binary = %self.binary, ?args, dir = %dir.display(), "Running infra tool step");

        let child = Command::new(&self.binary)
            .args(args)
            .current_dir(dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        match tokio::time::timeout(self.step_timeout, child.wait_with_output()).await {
            Ok(output) => {
                let output = output?;
                Ok(StepOutput {
                    success: output.status.success(),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                })
            }
            Err(_) => Ok(StepOutput {
                success: false,
                stdout: String::new(),
                stderr: format!(
                    "step '{}' exceeded the {}s budget and was killed",
                    args.first().copied().unwrap_or("?"),
                    self.step_timeout.as_secs()
                ),
            }),
        }
    }

    async fn state_handles(&self, dir: &Path) -> Result<Vec<String>> {
        let out = self.run_step(dir, &["state", "list"]).await?;
        if !out.success {
            // No state file yet means nothing was ever created.
            if out.stderr.contains("No state file") || out.stderr.contains("no state") {
                return Ok(Vec::new());
            }
            warn!(stderr = %out.stderr.trim(), "State listing failed; assuming handles remain");
            return Ok(vec!["<state unreadable>".to_string()]);
        }
        Ok(parse_state_list(&out.stdout))
    }
}

#[async_trait]
impl Provisioner for TerraformDriver {
    async fn apply(&self, bundle: &ArtifactBundle) -> Result<ProvisioningResult> {
        let dir = bundle.output_dir.as_path();

        let init = self.run_step(dir, &["init", "-input=false"]).await?;
        if !init.success {
            return Ok(ProvisioningResult::failure(init.diagnostics(), Vec::new()));
        }

        let apply = self
            .run_step(dir, &["apply", "-auto-approve", "-input=false"])
            .await?;
        if !apply.success {
            // A failed apply can still have created resources.
            let handles = self.state_handles(dir).await?;
            return Ok(ProvisioningResult::failure(apply.diagnostics(), handles));
        }

        let handles = self.state_handles(dir).await?;
        let output = self.run_step(dir, &["output", "-json"]).await?;
        let endpoint = if output.success {
            parse_public_ip(&output.stdout)
        } else {
            None
        };

        match endpoint {
            Some(ip) => {
                info!(public_ip = %ip, suffix = %bundle.suffix, "Provisioning complete");
                Ok(ProvisioningResult {
                    success: true,
                    public_endpoint: Some(ip),
                    raw_diagnostics: apply.stdout,
                    resource_handles: handles,
                })
            }
            None => Ok(ProvisioningResult::failure(
                "apply succeeded but no public_ip output was produced",
                handles,
            )),
        }
    }

    async fn destroy(&self, bundle: &ArtifactBundle) -> Result<()> {
        let out = self
            .run_step(
                bundle.output_dir.as_path(),
                &["destroy", "-auto-approve", "-input=false"],
            )
            .await?;
        if !out.success {
            warn!(suffix = %bundle.suffix, stderr = %out.stderr.trim(), "Destroy exited nonzero");
        }
        Ok(())
    }

    async fn remaining_handles(&self, bundle: &ArtifactBundle) -> Result<Vec<String>> {
        self.state_handles(bundle.output_dir.as_path()).await
    }
}

/// Extract the `public_ip` value from `output -json`.
fn parse_public_ip(stdout: &str) -> Option<String> {
    let outputs: serde_json::Value = serde_json::from_str(stdout).ok()?;
    let ip = outputs.get("public_ip")?.get("value")?.as_str()?.trim();
    if ip.is_empty() {
        None
    } else {
        Some(ip.to_string())
    }
}

fn parse_state_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_public_ip_from_output_json() {
        let stdout = r#"{"public_ip": {"sensitive": false, "type": "string", "value": "34.61.10.2"}}"#;
        assert_eq!(parse_public_ip(stdout).as_deref(), Some("34.61.10.2"));
    }

    #[test]
    fn test_parse_public_ip_rejects_empty_and_missing() {
        assert_eq!(parse_public_ip("{}"), None);
        assert_eq!(
            parse_public_ip(r#"{"public_ip": {"value": ""}}"#),
            None
        );
        assert_eq!(parse_public_ip("not json"), None);
    }

    #[test]
    fn test_parse_state_list() {
        let stdout = "aws_instance.app\naws_security_group.app\n\n";
        assert_eq!(
            parse_state_list(stdout),
            vec!["aws_instance.app", "aws_security_group.app"]
        );
        assert!(parse_state_list("").is_empty());
    }

    #[tokio::test]
    async fn test_run_step_captures_output() {
        let dir = tempfile::tempdir().unwrap();
        let driver = TerraformDriver::with_binary("echo", Duration::from_secs(5));
        let out = driver.run_step(dir.path(), &["hello"]).await.unwrap();
        assert!(out.success);
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_run_step_kills_on_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let driver = TerraformDriver::with_binary("sleep", Duration::from_millis(100));
        let out = driver.run_step(dir.path(), &["30"]).await.unwrap();
        assert!(!out.success);
        assert!(out.stderr.contains("budget"));
    }

    #[tokio::test]
    async fn test_run_step_missing_binary_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let driver =
            TerraformDriver::with_binary("definitely-not-a-real-binary", Duration::from_secs(1));
        assert!(driver.run_step(dir.path(), &["x"]).await.is_err());
    }
}
