//! Static repository classification.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Language detected from dependency manifests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectedLanguage {
    Python,
    Node,
    Other,
    Unknown,
}

/// Profile built once per deployment attempt by scanning repository
/// contents. Never mutated; superseded only if the repository is re-fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryProfile {
    /// Clone URL the profile was built from.
    pub source_url: String,

    /// Last path segment of the URL, `.git` stripped. Keys the artifact
    /// output directory.
    pub repo_name: String,

    pub detected_language: DetectedLanguage,
    pub has_dockerfile: bool,

    /// Conventional web entry point, when one was found.
    pub entry_point: Option<PathBuf>,

    /// Port declared in the Dockerfile or an env file; overrides the
    /// stack-default table downstream.
    pub declared_port: Option<u16>,

    /// Dependency manifest path (requirements.txt, package.json, ...).
    pub dependency_manifest: Option<PathBuf>,

    /// Prebuilt image reference recorded by a prior analysis pass
    /// (env_report.json `public_image`). Makes ContainerPrebuilt reachable.
    pub prebuilt_image: Option<String>,
}

/// Derive the repository name from its URL, e.g.
/// `https://github.com/acme/hello_world.git` -> `hello_world`.
pub fn repo_name_from_url(repo_url: &str) -> String {
    let path = repo_url.trim_end_matches('/');
    let name = path.rsplit('/').next().unwrap_or(path);
    name.strip_suffix(".git").unwrap_or(name).to_string()
}
