//! Domain model for the deployment orchestration engine.

pub mod error;
pub mod intent;
pub mod outcome;
pub mod profile;
pub mod target;

pub use error::{DeployError, Result};
pub use intent::{AppKind, DeploymentIntent, Provider};
pub use outcome::{
    AttemptFailure, AttemptRecord, DeploymentOutcome, DeploymentStatus, ProvisioningResult,
};
pub use profile::{repo_name_from_url, DetectedLanguage, RepositoryProfile};
pub use target::{strategy_ladder, ResolvedTarget, RunStrategy};
