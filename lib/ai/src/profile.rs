//! Model selection per kind of work.
//!
//! Callers name the kind of work (`analysis`, `summarization`, ...) rather
//! than a model. A [`ModelProfiles`] table maps each name to a provider,
//! model, and sampling settings. Unknown names use the `reasoning` profile.

use crate::backend::LlmProvider;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Profile used when a task type has no entry of its own.
pub const FALLBACK_PROFILE: &str = "reasoning";

const CLAUDE_SONNET: &str = "claude-3-5-sonnet-20241022";
const CLAUDE_OPUS: &str = "claude-3-opus-20240229";
const GPT4: &str = "gpt-4-turbo-preview";

/// Provider, model, and sampling settings for one kind of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelProfile {
    /// Which backend serves this profile.
    pub provider: LlmProvider,
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
}

impl ModelProfile {
    fn new(provider: LlmProvider, model: &str, temperature: f32, max_tokens: u32) -> Self {
        Self {
            provider,
            model: model.to_string(),
            temperature,
            max_tokens,
        }
    }
}

/// Table of model profiles keyed by task type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelProfiles {
    profiles: HashMap<String, ModelProfile>,
}

impl Default for ModelProfiles {
    fn default() -> Self {
        let profiles = [
            (
                "intent_classification",
                ModelProfile::new(LlmProvider::Anthropic, CLAUDE_SONNET, 0.3, 500),
            ),
            (
                "reasoning",
                ModelProfile::new(LlmProvider::Anthropic, CLAUDE_OPUS, 0.7, 2000),
            ),
            (
                "analysis",
                ModelProfile::new(LlmProvider::Anthropic, CLAUDE_SONNET, 0.5, 1500),
            ),
            (
                "issue_analysis",
                ModelProfile::new(LlmProvider::Anthropic, CLAUDE_SONNET, 0.3, 2000),
            ),
            (
                "summarization",
                ModelProfile::new(LlmProvider::Anthropic, CLAUDE_SONNET, 0.3, 800),
            ),
            (
                "code_generation",
                ModelProfile::new(LlmProvider::OpenAi, GPT4, 0.5, 1500),
            ),
        ]
        .into_iter()
        .map(|(name, profile)| (name.to_string(), profile))
        .collect();

        Self { profiles }
    }
}

impl ModelProfiles {
    /// Returns the profile for a task type, falling back to `reasoning`.
    ///
    /// Returns `None` only if the table lacks both the task type and the
    /// fallback.
    #[must_use]
    pub fn for_task(&self, task_type: &str) -> Option<&ModelProfile> {
        self.profiles
            .get(task_type)
            .or_else(|| self.profiles.get(FALLBACK_PROFILE))
    }

    /// Adds or replaces a profile.
    pub fn insert(&mut self, task_type: impl Into<String>, profile: ModelProfile) {
        self.profiles.insert(task_type.into(), profile);
    }

    /// Providers referenced by any profile.
    #[must_use]
    pub fn providers(&self) -> Vec<LlmProvider> {
        let mut providers: Vec<_> = self.profiles.values().map(|p| p.provider).collect();
        providers.sort_by_key(LlmProvider::as_str);
        providers.dedup();
        providers
    }
}

/// LLM settings loaded from configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Anthropic API key; the Anthropic backend is disabled without it.
    #[serde(default)]
    pub anthropic_api_key: Option<String>,
    /// OpenAI API key; the OpenAI backend is disabled without it.
    #[serde(default)]
    pub openai_api_key: Option<String>,
    /// Per-task-type model profiles.
    #[serde(default)]
    pub profiles: ModelProfiles,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_task_type_uses_reasoning() {
        let profiles = ModelProfiles::default();
        let reasoning = profiles.for_task("reasoning").expect("reasoning");
        assert_eq!(profiles.for_task("poetry"), Some(reasoning));
        assert_eq!(reasoning.model, CLAUDE_OPUS);
    }

    #[test]
    fn code_generation_uses_openai() {
        let profiles = ModelProfiles::default();
        let profile = profiles.for_task("code_generation").expect("profile");
        assert_eq!(profile.provider, LlmProvider::OpenAi);
        assert_eq!(
            profiles.providers(),
            vec![LlmProvider::Anthropic, LlmProvider::OpenAi]
        );
    }

    #[test]
    fn missing_fallback_yields_none() {
        let profiles: ModelProfiles = serde_json::from_str("{}").expect("deserialize");
        assert!(profiles.for_task("analysis").is_none());
    }

    #[test]
    fn config_defaults() {
        let config: LlmConfig = serde_json::from_str("{}").expect("deserialize");
        assert!(config.anthropic_api_key.is_none());
        assert_eq!(config.profiles, ModelProfiles::default());
    }
}
