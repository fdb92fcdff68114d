//! Resolved deployment target and the run-strategy precedence ladder.

use serde::{Deserialize, Serialize};

use super::intent::DeploymentIntent;
use super::profile::{DetectedLanguage, RepositoryProfile};
use crate::domain::intent::Provider;

/// Ways to get the workload running on a freshly provisioned VM, in
/// precedence order: prebuilt container, source-built container, native
/// interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStrategy {
    ContainerPrebuilt,
    ContainerFromSource,
    NativePython,
    NativeNode,
}

impl RunStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            RunStrategy::ContainerPrebuilt => "container_prebuilt",
            RunStrategy::ContainerFromSource => "container_from_source",
            RunStrategy::NativePython => "native_python",
            RunStrategy::NativeNode => "native_node",
        }
    }

    /// Whether the repository profile supports this strategy at all.
    pub fn applies_to(&self, profile: &RepositoryProfile) -> bool {
        match self {
            RunStrategy::ContainerPrebuilt => profile.prebuilt_image.is_some(),
            RunStrategy::ContainerFromSource => profile.has_dockerfile,
            RunStrategy::NativePython => profile.detected_language == DetectedLanguage::Python,
            RunStrategy::NativeNode => profile.detected_language == DetectedLanguage::Node,
        }
    }
}

/// The fixed, bounded retry sequence of strategies applicable to a profile,
/// in precedence order. The orchestration controller advances one rung per
/// failed attempt; there is no unbounded retry.
pub fn strategy_ladder(profile: &RepositoryProfile) -> Vec<RunStrategy> {
    [
        RunStrategy::ContainerPrebuilt,
        RunStrategy::ContainerFromSource,
        RunStrategy::NativePython,
        RunStrategy::NativeNode,
    ]
    .into_iter()
    .filter(|s| s.applies_to(profile))
    .collect()
}

/// The fully-disambiguated provider + run-strategy + port decision for one
/// deployment attempt. Replaced, never mutated, when the controller
/// advances the ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTarget {
    pub provider: Provider,
    pub run_strategy: RunStrategy,
    pub app_port: u16,
    pub profile: RepositoryProfile,
    pub intent: DeploymentIntent,
}

impl ResolvedTarget {
    /// Replace this target with one on the next applicable ladder rung, or
    /// `None` when the ladder is exhausted.
    pub fn advance_strategy(&self) -> Option<ResolvedTarget> {
        let ladder = strategy_ladder(&self.profile);
        let pos = ladder.iter().position(|s| *s == self.run_strategy)?;
        let next = *ladder.get(pos + 1)?;
        Some(ResolvedTarget {
            run_strategy: next,
            ..self.clone()
        })
    }
}
