use crate::config::{AssistantConfig, ProviderKind};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn generate(&self, model: &str, prompt: String, system: Option<String>) -> Result<String>;
}

pub struct OllamaProvider {
    client: ollama_rs::Ollama,
}

impl OllamaProvider {
    pub fn new(client: ollama_rs::Ollama) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LLMProvider for OllamaProvider {
    async fn generate(&self, model: &str, prompt: String, system: Option<String>) -> Result<String> {
        use ollama_rs::generation::chat::{request::ChatMessageRequest, ChatMessage};

        let mut messages = Vec::new();
        if let Some(sys) = system {
            messages.push(ChatMessage::system(sys));
        }
        messages.push(ChatMessage::user(prompt));

        let res = self
            .client
            .send_chat_messages(ChatMessageRequest::new(model.to_string(), messages))
            .await?;

        Ok(res.message.content)
    }
}

/// Any endpoint speaking the `/chat/completions` protocol.
pub struct OpenAICompatibleProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    temperature: f32,
}

impl OpenAICompatibleProvider {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
            temperature: 0.2,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = Client::builder().timeout(timeout).build()?;
        Ok(self)
    }
}

#[async_trait]
impl LLMProvider for OpenAICompatibleProvider {
    async fn generate(&self, model: &str, prompt: String, system: Option<String>) -> Result<String> {
        let mut messages = Vec::new();
        if let Some(sys) = system {
            messages.push(json!({ "role": "system", "content": sys }));
        }
        messages.push(json!({ "role": "user", "content": prompt }));

        let body = json!({
            "model": model,
            "messages": messages,
            "temperature": self.temperature,
        });

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .json(&body);

        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let res = request.send().await?.error_for_status()?;
        let json: serde_json::Value = res.json().await?;

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .context("Failed to parse content from chat completion response")?;

        Ok(content.to_string())
    }
}

/// Provider for the configured backend, `None` when the assistant is disabled.
pub fn provider_from_config(config: &AssistantConfig) -> Result<Option<Arc<dyn LLMProvider>>> {
    if !config.is_enabled() {
        info!("Assistant disabled; queries use keyword extraction only");
        return Ok(None);
    }
    let provider: Arc<dyn LLMProvider> = match config.provider {
        ProviderKind::None => return Ok(None),
        ProviderKind::Ollama => Arc::new(OllamaProvider::new(ollama_rs::Ollama::default())),
        ProviderKind::OpenAi => Arc::new(
            OpenAICompatibleProvider::new(config.base_url.clone(), config.api_key.clone())
                .with_temperature(config.temperature)
                .with_timeout(Duration::from_secs(config.timeout_secs))?,
        ),
    };
    info!("Assistant enabled: {:?} ({})", config.provider, config.model);
    Ok(Some(provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_config_has_no_provider() {
        let config = AssistantConfig::default();
        assert!(provider_from_config(&config).unwrap().is_none());
    }

    #[test]
    fn test_openai_config_builds_provider() {
        let config = AssistantConfig {
            provider: ProviderKind::OpenAi,
            api_key: Some("sk-test".into()),
            ..AssistantConfig::default()
        };
        assert!(provider_from_config(&config).unwrap().is_some());
    }
}
