//! Autodeploy Core Library
//!
//! Re-exports the deployment orchestration engine: intent resolution,
//! repository inspection, artifact generation, provisioning and
//! verification.

pub mod artifact;
pub mod classifier;
pub mod config;
pub mod controller;
pub mod domain;
pub mod inspector;
pub mod provision;
pub mod resolver;
pub mod telemetry;
pub mod verify;

pub use domain::{
    repo_name_from_url, strategy_ladder, AppKind, AttemptFailure, AttemptRecord, DeployError,
    DeploymentIntent, DeploymentOutcome, DeploymentStatus, DetectedLanguage, Provider,
    ProvisioningResult, RepositoryProfile, ResolvedTarget, Result, RunStrategy,
};

pub use artifact::{
    fresh_suffix, generate_bundle, template_for, write_bundle, ArtifactBundle, ProviderTemplate,
    TemplateContext, BOOT_SCRIPT_FILE,
};
pub use classifier::{ChatIntentClassifier, ClassifiedIntent, ClassifierConfig, IntentClassifier};
pub use config::{discover_ssh_public_key, AwsSettings, AzureSettings, EngineConfig, GcpSettings};
pub use controller::{DeploymentEngine, DeploymentRequest};
pub use inspector::{GitRepositoryInspector, RepositoryInspector};
pub use provision::{Provisioner, TerraformDriver};
pub use resolver::{default_port, resolve_target};
pub use telemetry::init_tracing;
pub use verify::{EndpointVerifier, HttpVerifier, VerificationOutcome, VerifyPolicy};

/// Autodeploy version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
