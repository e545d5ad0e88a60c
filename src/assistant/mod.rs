//! External assistant
//!
//! A language model consulted through [`LLMProvider`] to turn a query into
//! candidate operations. Every failure (transport, timeout, unparseable
//! text) comes back as a [`QueryError`] so the resolver can fall through.

pub mod prompt;
pub mod provider;
pub mod reply;

pub use prompt::{context_info, data_summary, AssistantPrompt};
pub use provider::{provider_from_config, LLMProvider, OllamaProvider, OpenAICompatibleProvider};
pub use reply::{extract_reply, AssistantReply, ExtractionStrategy};

use crate::config::AssistantConfig;
use crate::data::{Dataset, QueryContext};
use crate::error::QueryError;
use crate::ops::OperationCatalog;
use crate::utils::preview;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct Assistant {
    provider: Arc<dyn LLMProvider>,
    model: String,
    timeout: Duration,
}

impl Assistant {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            timeout: Duration::from_secs(20),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `Ok(None)` when the configuration disables the assistant.
    pub fn from_config(config: &AssistantConfig) -> anyhow::Result<Option<Self>> {
        Ok(provider_from_config(config)?.map(|provider| {
            Self::new(provider, config.model.clone())
                .with_timeout(Duration::from_secs(config.timeout_secs))
        }))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Ask for operations and parse the reply.
    pub async fn extract(
        &self,
        query: &str,
        dataset: &Dataset,
        context: Option<&QueryContext>,
        catalog: &OperationCatalog,
    ) -> Result<AssistantReply, QueryError> {
        let prompt = AssistantPrompt::build(query, dataset, context, catalog);
        info!("Consulting assistant ({})", self.model);

        let call = self
            .provider
            .generate(&self.model, prompt.user, Some(prompt.system));
        let text = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!("Assistant call failed: {}", e);
                return Err(QueryError::AssistantUnavailable(e.to_string()));
            }
            Err(_) => {
                warn!("Assistant timed out after {:?}", self.timeout);
                return Err(QueryError::AssistantUnavailable(format!(
                    "timed out after {}s",
                    self.timeout.as_secs()
                )));
            }
        };
        debug!("Assistant reply: {}", preview(&text, 300));

        let (reply, _) = extract_reply(&text)?;
        Ok(reply)
    }
}
