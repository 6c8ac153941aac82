//! Task-type-aware completion.

use crate::anthropic::AnthropicBackend;
use crate::backend::{LlmBackend, LlmProvider, LlmRequest};
use crate::error::LlmError;
use crate::openai::OpenAiBackend;
use crate::profile::{LlmConfig, ModelProfiles};
use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Text completion for a named kind of work.
#[async_trait]
pub trait Completion: Send + Sync {
    /// Completes `prompt` with the model profile for `task_type`.
    ///
    /// `context` entries are rendered into the system prompt.
    async fn complete(
        &self,
        task_type: &str,
        prompt: &str,
        context: Option<&Map<String, JsonValue>>,
    ) -> Result<String, LlmError>;
}

/// Routes completions to a backend chosen by model profile.
pub struct LlmClient {
    profiles: ModelProfiles,
    backends: HashMap<LlmProvider, Arc<dyn LlmBackend>>,
}

impl LlmClient {
    /// Creates a client with no backends.
    #[must_use]
    pub fn new(profiles: ModelProfiles) -> Self {
        Self {
            profiles,
            backends: HashMap::new(),
        }
    }

    /// Creates a client with a backend for every provider that has an API
    /// key configured.
    #[must_use]
    pub fn from_config(config: &LlmConfig) -> Self {
        let mut client = Self::new(config.profiles.clone());

        match config.anthropic_api_key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => {
                client = client.with_backend(Arc::new(AnthropicBackend::new(key)));
                info!("Anthropic backend initialized");
            }
            None => warn!("no Anthropic API key configured"),
        }
        match config.openai_api_key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => {
                client = client.with_backend(Arc::new(OpenAiBackend::new(key)));
                info!("OpenAI backend initialized");
            }
            None => warn!("no OpenAI API key configured"),
        }

        client
    }

    /// Registers a backend under its provider.
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn LlmBackend>) -> Self {
        self.backends.insert(backend.provider(), backend);
        self
    }

    /// Returns true if at least one backend is registered.
    #[must_use]
    pub fn has_backends(&self) -> bool {
        !self.backends.is_empty()
    }
}

fn render_context(context: &Map<String, JsonValue>) -> Option<String> {
    if context.is_empty() {
        return None;
    }
    let lines: Vec<String> = context
        .iter()
        .map(|(key, value)| match value {
            JsonValue::String(s) => format!("{key}: {s}"),
            other => format!("{key}: {other}"),
        })
        .collect();
    Some(format!("Context:\n{}", lines.join("\n")))
}

#[async_trait]
impl Completion for LlmClient {
    async fn complete(
        &self,
        task_type: &str,
        prompt: &str,
        context: Option<&Map<String, JsonValue>>,
    ) -> Result<String, LlmError> {
        let profile = self
            .profiles
            .for_task(task_type)
            .ok_or_else(|| LlmError::InvalidConfig {
                reason: format!("no model profile for '{task_type}' and no fallback profile"),
            })?;

        let backend =
            self.backends
                .get(&profile.provider)
                .ok_or_else(|| LlmError::ProviderUnavailable {
                    provider: profile.provider.to_string(),
                    reason: "no API key configured".to_string(),
                })?;

        let mut request = LlmRequest::new(prompt)
            .with_model(profile.model.clone())
            .with_temperature(profile.temperature)
            .with_max_tokens(profile.max_tokens);
        if let Some(system) = context.and_then(render_context) {
            request = request.with_system(system);
        }

        let response = backend.generate(&request).await?;
        debug!(
            task_type,
            model = %response.model,
            tokens = response.usage.total(),
            "completion finished"
        );
        Ok(response.content)
    }
}
