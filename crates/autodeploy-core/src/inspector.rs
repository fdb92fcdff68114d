//! Repository retrieval and static stack classification.
//!
//! Fetches a shallow, single-branch clone and classifies the application
//! stack from an ordered rule set over file presence. Classification is
//! pure over the file tree; only the fetch touches the network.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

use crate::domain::{
    repo_name_from_url, DeployError, DetectedLanguage, RepositoryProfile, Result,
};

/// Fetches and classifies one repository. Behind a trait so the
/// orchestration controller is testable without git or the network.
#[async_trait]
pub trait RepositoryInspector: Send + Sync {
    async fn inspect(&self, repo_url: &str) -> Result<RepositoryProfile>;
}

/// Production inspector: `git clone --depth 1 --single-branch` into a
/// per-run temporary directory, then classify the tree.
pub struct GitRepositoryInspector;

#[async_trait]
impl RepositoryInspector for GitRepositoryInspector {
    async fn inspect(&self, repo_url: &str) -> Result<RepositoryProfile> {
        let workdir = tempfile::tempdir()?;
        let checkout = workdir.path().join("repo");

        info!(repo_url, "Fetching repository (shallow clone)");
        let output = Command::new("git")
            .args(["clone", "--depth", "1", "--single-branch", repo_url])
            .arg(&checkout)
            .output()
            .await
            .map_err(|e| DeployError::Retrieval {
                url: repo_url.to_string(),
                reason: format!("failed to run git: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DeployError::Retrieval {
                url: repo_url.to_string(),
                reason: format!("git clone failed: {}", stderr.trim()),
            });
        }

        classify_tree(repo_url, &checkout)
    }
}

/// Build a [`RepositoryProfile`] from a checked-out file tree.
///
/// Ordered rule set: container build file first, then Python dependency
/// manifests, then the Node package manifest. An empty tree is a retrieval
/// error; nothing to build means nothing to deploy.
pub fn classify_tree(source_url: &str, root: &Path) -> Result<RepositoryProfile> {
    let entries = list_files(root)?;
    if entries.is_empty() {
        return Err(DeployError::Retrieval {
            url: source_url.to_string(),
            reason: "repository is empty".to_string(),
        });
    }

    let has = |name: &str| entries.iter().any(|p| p == Path::new(name));
    let has_dockerfile = has("Dockerfile") || has("dockerfile");

    let (detected_language, dependency_manifest) = if has("requirements.txt") {
        (DetectedLanguage::Python, Some(PathBuf::from("requirements.txt")))
    } else if has("pyproject.toml") {
        (DetectedLanguage::Python, Some(PathBuf::from("pyproject.toml")))
    } else if has("Pipfile") {
        (DetectedLanguage::Python, Some(PathBuf::from("Pipfile")))
    } else if has("package.json") {
        (DetectedLanguage::Node, Some(PathBuf::from("package.json")))
    } else {
        (DetectedLanguage::Unknown, None)
    };

    let entry_point = detect_entry_point(detected_language, &entries, root);
    let declared_port = detect_declared_port(root, has_dockerfile);
    let prebuilt_image = read_prebuilt_image(root);

    let profile = RepositoryProfile {
        source_url: source_url.to_string(),
        repo_name: repo_name_from_url(source_url),
        detected_language,
        has_dockerfile,
        entry_point,
        declared_port,
        dependency_manifest,
        prebuilt_image,
    };
    debug!(?profile, "repository classified");
    Ok(profile)
}

fn list_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            let name = entry.file_name();
            if name.to_string_lossy() == ".git" {
                continue;
            }
            if path.is_dir() {
                stack.push(path);
            } else if let Ok(rel) = path.strip_prefix(root) {
                out.push(rel.to_path_buf());
            }
        }
    }
    Ok(out)
}

/// Conventional web-entrypoint names, root-level first.
fn detect_entry_point(
    lang: DetectedLanguage,
    entries: &[PathBuf],
    _root: &Path,
) -> Option<PathBuf> {
    let candidates: &[&str] = match lang {
        DetectedLanguage::Python => &["app.py", "main.py", "server.py", "wsgi.py", "application.py"],
        DetectedLanguage::Node => &["server.js", "index.js", "app.js"],
        _ => return None,
    };
    for name in candidates {
        if entries.iter().any(|p| p == Path::new(name)) {
            return Some(PathBuf::from(name));
        }
    }
    // Fall back to the same names one level deep (src/app.py and friends).
    for name in candidates {
        if let Some(found) = entries
            .iter()
            .find(|p| p.components().count() == 2 && p.ends_with(name))
        {
            return Some(found.clone());
        }
    }
    None
}

/// Port declared in the container build file or an env file, if any.
/// Absence is fine; the resolver falls back to the stack-default table.
fn detect_declared_port(root: &Path, has_dockerfile: bool) -> Option<u16> {
    if has_dockerfile {
        for name in ["Dockerfile", "dockerfile"] {
            if let Ok(text) = std::fs::read_to_string(root.join(name)) {
                if let Some(port) = parse_expose_port(&text) {
                    return Some(port);
                }
            }
        }
    }
    for name in [".env", ".env.example"] {
        if let Ok(text) = std::fs::read_to_string(root.join(name)) {
            if let Some(port) = parse_env_port(&text) {
                return Some(port);
            }
        }
    }
    None
}

fn parse_expose_port(dockerfile: &str) -> Option<u16> {
    let re = Regex::new(r"(?mi)^\s*EXPOSE\s+(\d{2,5})").ok()?;
    re.captures(dockerfile)?.get(1)?.as_str().parse().ok()
}

fn parse_env_port(env_text: &str) -> Option<u16> {
    let re = Regex::new(r"(?m)^\s*PORT\s*=\s*(\d{2,5})\s*$").ok()?;
    re.captures(env_text)?.get(1)?.as_str().parse().ok()
}

/// Prebuilt image reference recorded by a prior analysis pass, when the
/// repository carries an `env_report.json` with a `public_image` field.
fn read_prebuilt_image(root: &Path) -> Option<String> {
    #[derive(Deserialize)]
    struct EnvReport {
        public_image: Option<String>,
    }
    let text = std::fs::read_to_string(root.join("env_report.json")).ok()?;
    let report: EnvReport = serde_json::from_str(&text).ok()?;
    report.public_image.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, name: &str, content: &str) {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    const URL: &str = "https://github.com/acme/hello_world";

    #[test]
    fn test_python_repo_without_dockerfile() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "requirements.txt", "flask==3.0\n");
        write(dir.path(), "app.py", "from flask import Flask\n");

        let profile = classify_tree(URL, dir.path()).unwrap();
        assert_eq!(profile.detected_language, DetectedLanguage::Python);
        assert!(!profile.has_dockerfile);
        assert_eq!(profile.entry_point.as_deref(), Some(Path::new("app.py")));
        assert_eq!(
            profile.dependency_manifest.as_deref(),
            Some(Path::new("requirements.txt"))
        );
        assert_eq!(profile.repo_name, "hello_world");
    }

    #[test]
    fn test_node_repo() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "package.json", r#"{"name": "api"}"#);
        write(dir.path(), "index.js", "require('express');\n");

        let profile = classify_tree(URL, dir.path()).unwrap();
        assert_eq!(profile.detected_language, DetectedLanguage::Node);
        assert_eq!(profile.entry_point.as_deref(), Some(Path::new("index.js")));
    }

    #[test]
    fn test_dockerfile_expose_beats_env_port() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "Dockerfile", "FROM python:3.11-slim\nEXPOSE 9090\n");
        write(dir.path(), ".env", "PORT=5000\n");
        write(dir.path(), "requirements.txt", "flask\n");

        let profile = classify_tree(URL, dir.path()).unwrap();
        assert!(profile.has_dockerfile);
        assert_eq!(profile.declared_port, Some(9090));
    }

    #[test]
    fn test_env_port_used_when_no_dockerfile() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".env.example", "DEBUG=1\nPORT=4100\n");
        write(dir.path(), "package.json", "{}");

        let profile = classify_tree(URL, dir.path()).unwrap();
        assert_eq!(profile.declared_port, Some(4100));
    }

    #[test]
    fn test_unrecognized_stack_is_unknown() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "README.md", "# hello\n");

        let profile = classify_tree(URL, dir.path()).unwrap();
        assert_eq!(profile.detected_language, DetectedLanguage::Unknown);
        assert!(profile.dependency_manifest.is_none());
        assert!(profile.entry_point.is_none());
    }

    #[test]
    fn test_empty_tree_is_retrieval_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = classify_tree(URL, dir.path()).unwrap_err();
        assert!(matches!(err, DeployError::Retrieval { .. }));
    }

    #[test]
    fn test_prebuilt_image_from_env_report() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "env_report.json",
            r#"{"language": "python", "public_image": "acmebot/hello_world:latest"}"#,
        );
        write(dir.path(), "requirements.txt", "flask\n");

        let profile = classify_tree(URL, dir.path()).unwrap();
        assert_eq!(
            profile.prebuilt_image.as_deref(),
            Some("acmebot/hello_world:latest")
        );
    }

    #[test]
    fn test_nested_entry_point_found_one_level_deep() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "requirements.txt", "flask\n");
        write(dir.path(), "src/app.py", "app = None\n");

        let profile = classify_tree(URL, dir.path()).unwrap();
        assert_eq!(profile.entry_point.as_deref(), Some(Path::new("src/app.py")));
    }

    #[tokio::test]
    async fn test_inspect_clones_local_repo() {
        use std::process::Command as StdCommand;

        let origin = tempfile::tempdir().unwrap();
        write(origin.path(), "requirements.txt", "flask\n");
        write(origin.path(), "app.py", "app = None\n");
        for args in [
            vec!["init"],
            vec!["config", "user.name", "test-user"],
            vec!["config", "user.email", "test@example.com"],
            vec!["add", "."],
            vec!["commit", "-m", "initial"],
        ] {
            let out = StdCommand::new("git")
                .args(&args)
                .current_dir(origin.path())
                .output()
                .unwrap();
            assert!(out.status.success(), "git {args:?} failed");
        }

        let url = format!("file://{}", origin.path().display());
        let profile = GitRepositoryInspector.inspect(&url).await.unwrap();
        assert_eq!(profile.detected_language, DetectedLanguage::Python);
    }

    #[tokio::test]
    async fn test_inspect_unreachable_repo_fails() {
        let err = GitRepositoryInspector
            .inspect("file:///nonexistent/definitely-not-a-repo")
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::Retrieval { .. }));
    }
}
