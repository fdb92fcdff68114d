//! Deployment intent extracted from a free-text request.

use serde::{Deserialize, Serialize};

/// Supported cloud providers. `Unresolved` means the free text did not name
/// one; it is never a deployable value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Aws,
    Gcp,
    Azure,
    Unresolved,
}

impl Provider {
    pub fn name(&self) -> &'static str {
        match self {
            Provider::Aws => "aws",
            Provider::Gcp => "gcp",
            Provider::Azure => "azure",
            Provider::Unresolved => "unresolved",
        }
    }

    /// Normalize an untrusted provider string from the classifier against
    /// the closed enum. Anything unrecognized maps to `Unresolved`.
    pub fn normalize(raw: &str) -> Provider {
        let lower = raw.trim().to_lowercase();
        let word = |needle: &str| {
            lower
                .split(|c: char| !c.is_alphanumeric())
                .any(|w| w == needle)
        };
        if word("aws") || word("amazon") {
            Provider::Aws
        } else if word("gcp") || lower.contains("google cloud") || word("google") {
            Provider::Gcp
        } else if word("azure") || lower.contains("microsoft azure") {
            Provider::Azure
        } else {
            Provider::Unresolved
        }
    }
}

/// Coarse application kind hint from the classifier. Advisory only; the
/// repository profile always overrides it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppKind {
    Web,
    Api,
    Worker,
    Unknown,
}

/// Intent produced once from the user's free-text description.
/// Immutable after creation; provider may be `Unresolved` pending
/// repository evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentIntent {
    pub raw_description: String,
    pub provider: Provider,
    pub app_kind_hint: AppKind,
}

impl DeploymentIntent {
    pub fn new(raw_description: impl Into<String>, provider: Provider, hint: AppKind) -> Self {
        Self {
            raw_description: raw_description.into(),
            provider,
            app_kind_hint: hint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_known_providers() {
        assert_eq!(Provider::normalize("AWS"), Provider::Aws);
        assert_eq!(Provider::normalize("Amazon Web Services"), Provider::Aws);
        assert_eq!(Provider::normalize("gcp"), Provider::Gcp);
        assert_eq!(Provider::normalize("Google Cloud Platform"), Provider::Gcp);
        assert_eq!(Provider::normalize("Microsoft Azure"), Provider::Azure);
    }

    #[test]
    fn test_normalize_junk_is_unresolved() {
        assert_eq!(Provider::normalize(""), Provider::Unresolved);
        assert_eq!(Provider::normalize("heroku"), Provider::Unresolved);
        assert_eq!(Provider::normalize("my basement server"), Provider::Unresolved);
    }

    #[test]
    fn test_normalize_does_not_match_substrings() {
        // "awsome" must not resolve to AWS
        assert_eq!(Provider::normalize("awsome cloud"), Provider::Unresolved);
    }
}
