//! Infrastructure declaration and boot script generation.
//!
//! One template family per provider, each satisfying the same structural
//! contract: a compute instance, an inbound rule for port 80, an inbound
//! rule for the application port, and a boot script referenced by exactly
//! [`BOOT_SCRIPT_FILE`]. Generation is a pure function of
//! (target, config, suffix); re-rendering with the same inputs produces
//! byte-identical files.

pub mod bootscript;

mod aws;
mod azure;
mod gcp;

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::EngineConfig;
use crate::domain::{DeployError, Provider, ResolvedTarget, Result};

pub use aws::AwsTemplate;
pub use azure::AzureTemplate;
pub use gcp::GcpTemplate;

/// Filename the infra declarations reference for boot-time execution.
/// The declaration-to-script binding is a contract; renaming one side
/// breaks the deployment silently.
pub const BOOT_SCRIPT_FILE: &str = "startup.sh";

/// Inputs to one template rendering.
pub struct TemplateContext<'a> {
    pub target: &'a ResolvedTarget,
    pub config: &'a EngineConfig,
    /// Attempt-scoped resource-name suffix. Stable within one attempt (so
    /// re-applying an unchanged bundle is idempotent), fresh across
    /// attempts (so retries never collide with half-torn-down resources).
    pub suffix: &'a str,
}

/// One provider's infrastructure template family.
pub trait ProviderTemplate: Send + Sync {
    fn provider(&self) -> Provider;

    /// Render the infra declaration files (everything except the boot
    /// script) as filename -> content.
    fn render(&self, ctx: &TemplateContext<'_>) -> Result<BTreeMap<String, String>>;
}

pub fn template_for(provider: Provider) -> Result<Box<dyn ProviderTemplate>> {
    match provider {
        Provider::Aws => Ok(Box::new(AwsTemplate)),
        Provider::Gcp => Ok(Box::new(GcpTemplate)),
        Provider::Azure => Ok(Box::new(AzureTemplate)),
        Provider::Unresolved => Err(DeployError::Template(
            "no template family for an unresolved provider".to_string(),
        )),
    }
}

/// Generated infra declarations + boot script for one attempt.
/// Write-once per attempt; a new attempt regenerates the full bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactBundle {
    pub files: BTreeMap<String, String>,
    pub output_dir: PathBuf,
    pub suffix: String,
    pub bundle_digest: String,
}

/// Fresh resource-name suffix for one attempt.
pub fn fresh_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..6].to_string()
}

/// Generate the full artifact bundle for one resolved target.
///
/// The output directory is keyed by repository name under the configured
/// work dir, so independent deployment runs never share state while
/// repeated attempts for the same run reuse (overwrite) one directory.
pub fn generate_bundle(
    target: &ResolvedTarget,
    config: &EngineConfig,
    suffix: &str,
) -> Result<ArtifactBundle> {
    let template = template_for(target.provider)?;
    let ctx = TemplateContext {
        target,
        config,
        suffix,
    };

    let mut files = template.render(&ctx)?;
    files.insert(
        BOOT_SCRIPT_FILE.to_string(),
        bootscript::render_boot_script(target),
    );

    for (name, content) in &files {
        if content.trim().is_empty() {
            return Err(DeployError::Template(format!(
                "template for {} rendered empty file {name}",
                target.provider.name()
            )));
        }
    }

    let output_dir = config
        .work_dir
        .join(format!("tf_out_{}", target.profile.repo_name));
    let bundle_digest = digest_files(&files);

    Ok(ArtifactBundle {
        files,
        output_dir,
        suffix: suffix.to_string(),
        bundle_digest,
    })
}

/// Write the bundle to its output directory, overwriting any previous
/// attempt's files for the same run.
pub fn write_bundle(bundle: &ArtifactBundle) -> Result<PathBuf> {
    std::fs::create_dir_all(&bundle.output_dir)?;
    for (name, content) in &bundle.files {
        std::fs::write(bundle.output_dir.join(name), content)?;
    }
    set_executable(&bundle.output_dir.join(BOOT_SCRIPT_FILE))?;
    info!(dir = %bundle.output_dir.display(), files = bundle.files.len(), "Artifact bundle written");
    Ok(bundle.output_dir.clone())
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}

fn digest_files(files: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    for (name, content) in files {
        hasher.update(name.as_bytes());
        hasher.update(b"\0");
        hasher.update(content.as_bytes());
        hasher.update(b"\0");
    }
    hex::encode(hasher.finalize())
}
