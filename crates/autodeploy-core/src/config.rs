//! Engine configuration.
//!
//! All provider credentials and placement settings are passed in
//! explicitly at construction and validated up front, never read from the
//! environment at point of use. The engine treats credential contents as
//! opaque; it only ever observes success or failure of authenticated
//! calls.

use std::path::PathBuf;
use std::time::Duration;

use crate::classifier::ClassifierConfig;
use crate::domain::{DeployError, Provider, Result};
use crate::verify::VerifyPolicy;

/// GCP placement and billing settings.
#[derive(Debug, Clone)]
pub struct GcpSettings {
    pub project: Option<String>,

    /// Billing account the target project must be linked to. Validated up
    /// front but not consumed by the generated declarations: the Compute
    /// API enablement they carry fails on an unlinked project, and linking
    /// is an out-of-band operator action (`gcloud billing projects link`)
    /// because tearing a billing link down with an attempt would detach
    /// billing from the whole project.
    pub billing_account_id: Option<String>,
    pub region: String,
    pub zone: String,
    pub machine_type: String,
}

impl Default for GcpSettings {
    fn default() -> Self {
        Self {
            project: None,
            billing_account_id: None,
            region: "us-central1".to_string(),
            zone: "us-central1-a".to_string(),
            machine_type: "e2-small".to_string(),
        }
    }
}

/// AWS credential and placement settings.
#[derive(Debug, Clone)]
pub struct AwsSettings {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub region: String,
    pub instance_type: String,
}

impl Default for AwsSettings {
    fn default() -> Self {
        Self {
            access_key_id: None,
            secret_access_key: None,
            region: "us-east-1".to_string(),
            instance_type: "t3.small".to_string(),
        }
    }
}

/// Azure placement settings.
#[derive(Debug, Clone)]
pub struct AzureSettings {
    pub subscription_id: Option<String>,
    pub location: String,
    pub vm_size: String,
    pub admin_username: String,
}

impl Default for AzureSettings {
    fn default() -> Self {
        Self {
            subscription_id: None,
            location: "eastus".to_string(),
            vm_size: "Standard_B2s".to_string(),
            admin_username: "azureuser".to_string(),
        }
    }
}

/// Full engine configuration, passed into the orchestration controller at
/// construction.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub classifier: ClassifierConfig,
    pub gcp: GcpSettings,
    pub aws: AwsSettings,
    pub azure: AzureSettings,

    /// SSH public key material for providers that bake one into the VM.
    pub ssh_public_key: Option<String>,

    /// Root under which per-repository artifact directories are created.
    pub work_dir: PathBuf,

    /// Global cap on one infra-tool apply/destroy invocation.
    pub apply_timeout: Duration,

    pub verify: VerifyPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            gcp: GcpSettings::default(),
            aws: AwsSettings::default(),
            azure: AzureSettings::default(),
            ssh_public_key: None,
            work_dir: PathBuf::from("."),
            apply_timeout: Duration::from_secs(1800),
            verify: VerifyPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Validate everything the selected provider will need, before any cost
    /// is incurred. Missing inputs are terminal; running on without them
    /// would only fail later, mid-provision.
    pub fn validate_for(&self, provider: Provider) -> Result<()> {
        if self.classifier.api_key.trim().is_empty() {
            return Err(DeployError::Config(
                "classifier API key is not set".to_string(),
            ));
        }

        match provider {
            Provider::Gcp => {
                if self.gcp.project.as_deref().unwrap_or("").trim().is_empty() {
                    return Err(DeployError::Config("GCP project ID is not set".to_string()));
                }
                if self
                    .gcp
                    .billing_account_id
                    .as_deref()
                    .unwrap_or("")
                    .trim()
                    .is_empty()
                {
                    return Err(DeployError::Config(
                        "GCP billing account ID is not set".to_string(),
                    ));
                }
            }
            Provider::Aws => {
                if self.aws.access_key_id.is_none() || self.aws.secret_access_key.is_none() {
                    return Err(DeployError::Config(
                        "AWS access key ID and secret access key are not set".to_string(),
                    ));
                }
                self.require_ssh_key()?;
            }
            Provider::Azure => {
                if self
                    .azure
                    .subscription_id
                    .as_deref()
                    .unwrap_or("")
                    .trim()
                    .is_empty()
                {
                    return Err(DeployError::Config(
                        "Azure subscription ID is not set".to_string(),
                    ));
                }
                self.require_ssh_key()?;
            }
            Provider::Unresolved => {
                return Err(DeployError::Config(
                    "cannot validate configuration for an unresolved provider".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn require_ssh_key(&self) -> Result<()> {
        match &self.ssh_public_key {
            Some(key) if !key.trim().is_empty() => Ok(()),
            _ => Err(DeployError::MissingSshKey),
        }
    }
}

/// Best-effort discovery of a local SSH public key, tried in the usual
/// locations. Callers decide whether absence is fatal via
/// [`EngineConfig::validate_for`].
pub fn discover_ssh_public_key() -> Option<String> {
    let home = std::env::var_os("HOME").map(PathBuf::from)?;
    for name in [".ssh/id_ed25519.pub", ".ssh/id_rsa.pub"] {
        if let Ok(key) = std::fs::read_to_string(home.join(name)) {
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Some(key);
            }
        }
    }
    None
}
