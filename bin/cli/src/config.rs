//! Centralized runner configuration.
//!
//! Loaded via the `config` crate from environment variables, with `__`
//! separating nested keys (`GITHUB__TOKEN`, `LLM__ANTHROPIC_API_KEY`,
//! `ENGINE__REGISTRY_CAPACITY`).

use pmflow_ai::LlmConfig;
use pmflow_integration::GitHubConfig;
use pmflow_workflow::EngineConfig;
use serde::Deserialize;

/// Runner configuration composed from library configs.
#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection URL. Workflows stay in memory without one.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Engine tuning.
    #[serde(default)]
    pub engine: EngineConfig,

    /// GitHub access.
    #[serde(default)]
    pub github: GitHubConfig,

    /// LLM backends and model profiles.
    #[serde(default)]
    pub llm: LlmConfig,
}

impl AppConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is present but cannot be parsed.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_environment(config::Environment::default())
    }

    fn from_environment(environment: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(environment.separator("__").try_parsing(true))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> AppConfig {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        AppConfig::from_environment(config::Environment::default().source(Some(map)))
            .expect("config")
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = load(&[]);
        assert_eq!(config.database_url, None);
        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.github.token, None);
        assert_eq!(config.github.api_base, "https://api.github.com");
        assert_eq!(config.llm.anthropic_api_key, None);
    }

    #[test]
    fn nested_keys_are_read() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/pmflow"),
            ("GITHUB__TOKEN", "ghp_test"),
            ("GITHUB__DEFAULT_REPOSITORY", "acme/shop"),
            ("ENGINE__REGISTRY_CAPACITY", "16"),
            ("LLM__OPENAI_API_KEY", "sk-test"),
        ]);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/pmflow")
        );
        assert_eq!(config.github.token.as_deref(), Some("ghp_test"));
        assert_eq!(config.github.default_repository.as_deref(), Some("acme/shop"));
        assert_eq!(config.engine.registry_capacity, 16);
        assert_eq!(config.llm.openai_api_key.as_deref(), Some("sk-test"));
    }
}
