//! Text-generation provider abstraction.
//!
//! The generators never read provider configuration themselves. Instead a
//! [`GenerationMode`] is resolved once at startup by [`create_generation_mode`]
//! and injected into them:
//!
//! - [`GenerationMode::Fallback`]: deterministic templates, no network.
//! - [`GenerationMode::Delegated`]: one prompt per call to a
//!   [`CompletionProvider`] such as [`OpenAIProvider`].
//!
//! Provider calls are not retried. A hung provider is bounded by the HTTP
//! client timeout from `[generation].timeout_secs`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use crate::config::GenerationConfig;

/// A single prompt sent to a completion provider.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Model identifier, for logs.
    fn model_name(&self) -> &str;

    /// Returns the raw text of the first completion choice.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// How the generators produce content.
#[derive(Clone)]
pub enum GenerationMode {
    Fallback,
    Delegated(Arc<dyn CompletionProvider>),
}

impl GenerationMode {
    pub fn is_delegated(&self) -> bool {
        matches!(self, GenerationMode::Delegated(_))
    }

    pub fn describe(&self) -> String {
        match self {
            GenerationMode::Fallback => "fallback templates".to_string(),
            GenerationMode::Delegated(p) => format!("delegated ({})", p.model_name()),
        }
    }
}

impl std::fmt::Debug for GenerationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Resolve `[generation]` into a mode. Selecting a provider whose API key is
/// missing is an error rather than a silent fallback.
pub fn create_generation_mode(config: &GenerationConfig) -> Result<GenerationMode> {
    match config.provider.as_str() {
        "disabled" => Ok(GenerationMode::Fallback),
        "openai" => Ok(GenerationMode::Delegated(Arc::new(OpenAIProvider::new(
            config,
        )?))),
        other => bail!("Unknown generation provider: {}", other),
    }
}

// ============ OpenAI Provider ============

/// Chat-completions provider for the OpenAI API (or any compatible endpoint).
///
/// Sends `POST {base_url}/chat/completions` with a single user message.
pub struct OpenAIProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAIProvider {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .with_context(|| format!("{} environment variable not set", config.api_key_env))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else {
            format!("{}/chat/completions", base)
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": request.prompt }],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .context("OpenAI request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("OpenAI API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response
            .json()
            .await
            .context("OpenAI returned an unreadable response")?;
        parse_chat_response(&json)
    }
}

/// Extract `choices[0].message.content` from a chat-completions response.
fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_provider_is_fallback() {
        let mode = create_generation_mode(&GenerationConfig::default()).unwrap();
        assert!(!mode.is_delegated());
    }

    #[test]
    fn test_openai_without_key_fails() {
        let config = GenerationConfig {
            provider: "openai".into(),
            api_key_env: "PSG_TEST_UNSET_OPENAI_KEY".into(),
            ..Default::default()
        };
        let err = create_generation_mode(&config).unwrap_err();
        assert!(err.to_string().contains("PSG_TEST_UNSET_OPENAI_KEY"));
    }

    #[test]
    fn test_parse_chat_response() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "  {\"a\": 1}\n" } }]
        });
        assert_eq!(parse_chat_response(&json).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn test_parse_chat_response_missing_content() {
        let json = serde_json::json!({ "choices": [] });
        assert!(parse_chat_response(&json).is_err());
    }
}
