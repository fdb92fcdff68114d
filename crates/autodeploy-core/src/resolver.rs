//! Intent resolution: merge free-text intent with repository evidence into
//! a single deployable target.

use tracing::info;

use crate::domain::{
    strategy_ladder, DeployError, DeploymentIntent, DetectedLanguage, Provider,
    RepositoryProfile, ResolvedTarget, Result,
};

/// Stack-default application ports, used only when the repository declares
/// none. This table is deliberately explicit and stable: it determines the
/// firewall rules generated downstream.
///
/// Python (Flask-style) 5000, Node 3000, everything else 8000.
pub fn default_port(lang: DetectedLanguage) -> u16 {
    match lang {
        DetectedLanguage::Python => 5000,
        DetectedLanguage::Node => 3000,
        DetectedLanguage::Other | DetectedLanguage::Unknown => 8000,
    }
}

/// Merge intent and profile into a [`ResolvedTarget`].
///
/// An explicit provider in the free text always wins; an unresolved
/// provider is a terminal error, never silently defaulted. The initial run
/// strategy is the first applicable rung of the precedence ladder.
pub fn resolve_target(
    intent: &DeploymentIntent,
    profile: &RepositoryProfile,
) -> Result<ResolvedTarget> {
    if intent.provider == Provider::Unresolved {
        return Err(DeployError::AmbiguousProvider(
            intent.raw_description.clone(),
        ));
    }

    let ladder = strategy_ladder(profile);
    let run_strategy = *ladder.first().ok_or_else(|| {
        DeployError::UnsupportedStack(format!(
            "{}: no Dockerfile, no prebuilt image, and no recognizable language markers",
            profile.repo_name
        ))
    })?;

    let app_port = profile
        .declared_port
        .unwrap_or_else(|| default_port(profile.detected_language));

    info!(
        provider = intent.provider.name(),
        strategy = run_strategy.name(),
        app_port,
        "Resolved deployment target"
    );

    Ok(ResolvedTarget {
        provider: intent.provider,
        run_strategy,
        app_port,
        profile: profile.clone(),
        intent: intent.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AppKind, RunStrategy};

    fn profile(
        lang: DetectedLanguage,
        dockerfile: bool,
        prebuilt: Option<&str>,
        declared_port: Option<u16>,
    ) -> RepositoryProfile {
        RepositoryProfile {
            source_url: "https://github.com/acme/app".to_string(),
            repo_name: "app".to_string(),
            detected_language: lang,
            has_dockerfile: dockerfile,
            entry_point: None,
            declared_port,
            dependency_manifest: None,
            prebuilt_image: prebuilt.map(String::from),
        }
    }

    fn intent(provider: Provider) -> DeploymentIntent {
        DeploymentIntent::new("Deploy my app", provider, AppKind::Web)
    }

    #[test]
    fn test_python_without_dockerfile_is_native_never_container() {
        let p = profile(DetectedLanguage::Python, false, None, None);
        let t = resolve_target(&intent(Provider::Gcp), &p).unwrap();
        assert_eq!(t.run_strategy, RunStrategy::NativePython);
        assert_eq!(t.app_port, 5000);
    }

    #[test]
    fn test_dockerfile_wins_over_native() {
        let p = profile(DetectedLanguage::Python, true, None, None);
        let t = resolve_target(&intent(Provider::Aws), &p).unwrap();
        assert_eq!(t.run_strategy, RunStrategy::ContainerFromSource);
    }

    #[test]
    fn test_prebuilt_image_wins_over_dockerfile() {
        let p = profile(DetectedLanguage::Node, true, Some("acme/app:latest"), None);
        let t = resolve_target(&intent(Provider::Azure), &p).unwrap();
        assert_eq!(t.run_strategy, RunStrategy::ContainerPrebuilt);
    }

    #[test]
    fn test_unresolved_provider_is_terminal() {
        let p = profile(DetectedLanguage::Python, false, None, None);
        let err = resolve_target(&intent(Provider::Unresolved), &p).unwrap_err();
        assert!(matches!(err, DeployError::AmbiguousProvider(_)));
    }

    #[test]
    fn test_unrecognized_stack_is_terminal() {
        let p = profile(DetectedLanguage::Unknown, false, None, None);
        let err = resolve_target(&intent(Provider::Gcp), &p).unwrap_err();
        assert!(matches!(err, DeployError::UnsupportedStack(_)));
    }

    #[test]
    fn test_declared_port_beats_default_table() {
        let p = profile(DetectedLanguage::Python, true, None, Some(9090));
        let t = resolve_target(&intent(Provider::Gcp), &p).unwrap();
        assert_eq!(t.app_port, 9090);
    }

    #[test]
    fn test_default_port_table() {
        assert_eq!(default_port(DetectedLanguage::Python), 5000);
        assert_eq!(default_port(DetectedLanguage::Node), 3000);
        assert_eq!(default_port(DetectedLanguage::Other), 8000);
        assert_eq!(default_port(DetectedLanguage::Unknown), 8000);
    }
}
