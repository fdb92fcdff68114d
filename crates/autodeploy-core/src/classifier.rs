//! Free-text intent classification boundary.
//!
//! The natural-language model is an external collaborator consumed as a
//! black-box capability `classify(text) -> {provider, app_kind_hint}`.
//! Its output is untrusted: provider strings are validated against the
//! closed [`Provider`] enum here, and its failure modes never propagate
//! past this boundary as anything but a classifier error.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::domain::{AppKind, DeployError, Provider, Result};

/// Structured fields extracted from one free-text description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedIntent {
    pub provider: Provider,
    pub app_kind_hint: AppKind,
}

/// Black-box intent classifier.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, description: &str) -> Result<ClassifiedIntent>;
}

const SYSTEM_PROMPT: &str = "You are a highly specialized assistant for a cloud deployment \
system. Extract and normalize key information from the user's request. Identify the target \
cloud provider, correcting typos and abbreviations to 'AWS', 'GCP', or 'Azure', and the \
application framework or type. Use null when a field is not mentioned. Respond with a single \
JSON object with exactly two keys, `cloud_provider` and `app_type`, and no extra text.";

/// Configuration for the chat-completions classifier endpoint.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Chat-completions URL (OpenAI/OpenRouter compatible).
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://openrouter.ai/api/v1/chat/completions".to_string(),
            model: "openai/gpt-4o-mini".to_string(),
            api_key: String::new(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Production classifier backed by a chat-completions API.
pub struct ChatIntentClassifier {
    config: ClassifierConfig,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

impl ChatIntentClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl IntentClassifier for ChatIntentClassifier {
    async fn classify(&self, description: &str) -> Result<ClassifiedIntent> {
        let payload = json!({
            "model": self.config.model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": description },
            ],
        });

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .timeout(self.config.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DeployError::Classifier(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeployError::Classifier(format!(
                "classifier endpoint returned {status}: {body}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| DeployError::Classifier(format!("malformed response envelope: {e}")))?;

        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or_default();
        debug!(content, "classifier reply");

        parse_intent_reply(content)
    }
}

/// Parse the model's JSON reply into validated intent fields.
///
/// Hallucinated providers and unknown app types degrade to `Unresolved` /
/// `Unknown`; an empty or non-JSON reply is a classifier error.
pub fn parse_intent_reply(content: &str) -> Result<ClassifiedIntent> {
    #[derive(Deserialize)]
    struct Reply {
        cloud_provider: Option<String>,
        app_type: Option<String>,
    }

    // Models sometimes wrap the object in prose or code fences.
    let start = content.find('{');
    let end = content.rfind('}');
    let (start, end) = match (start, end) {
        (Some(s), Some(e)) if e > s => (s, e),
        _ => {
            return Err(DeployError::Classifier(format!(
                "reply contained no JSON object: {content:?}"
            )))
        }
    };

    let reply: Reply = serde_json::from_str(&content[start..=end])
        .map_err(|e| DeployError::Classifier(format!("reply was not valid JSON: {e}")))?;

    let provider = reply
        .cloud_provider
        .as_deref()
        .map(Provider::normalize)
        .unwrap_or(Provider::Unresolved);

    let hint = match reply.app_type.as_deref().map(str::to_lowercase) {
        Some(t) if t.contains("worker") || t.contains("celery") => AppKind::Worker,
        Some(t) if t.contains("api") || t.contains("fastapi") => AppKind::Api,
        Some(t) if !t.is_empty() && t != "null" => AppKind::Web,
        _ => AppKind::Unknown,
    };

    Ok(ClassifiedIntent {
        provider,
        app_kind_hint: hint,
    })
}

impl ClassifiedIntent {
    pub fn into_intent(self, description: &str) -> crate::domain::DeploymentIntent {
        crate::domain::DeploymentIntent::new(description, self.provider, self.app_kind_hint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clean_reply() {
        let intent =
            parse_intent_reply(r#"{"cloud_provider": "GCP", "app_type": "Flask"}"#).unwrap();
        assert_eq!(intent.provider, Provider::Gcp);
        assert_eq!(intent.app_kind_hint, AppKind::Web);
    }

    #[test]
    fn test_parse_reply_with_code_fence() {
        let intent = parse_intent_reply(
            "```json\n{\"cloud_provider\": \"aws\", \"app_type\": \"fastapi\"}\n```",
        )
        .unwrap();
        assert_eq!(intent.provider, Provider::Aws);
        assert_eq!(intent.app_kind_hint, AppKind::Api);
    }

    #[test]
    fn test_parse_null_fields() {
        let intent =
            parse_intent_reply(r#"{"cloud_provider": null, "app_type": null}"#).unwrap();
        assert_eq!(intent.provider, Provider::Unresolved);
        assert_eq!(intent.app_kind_hint, AppKind::Unknown);
    }

    #[test]
    fn test_parse_hallucinated_provider_degrades() {
        let intent =
            parse_intent_reply(r#"{"cloud_provider": "SkyNet Cloud", "app_type": "Django"}"#)
                .unwrap();
        assert_eq!(intent.provider, Provider::Unresolved);
    }

    #[test]
    fn test_parse_empty_reply_is_error() {
        assert!(parse_intent_reply("").is_err());
        assert!(parse_intent_reply("I could not determine the provider.").is_err());
    }
}
