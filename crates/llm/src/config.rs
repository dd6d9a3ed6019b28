//! LLM client configuration from environment variables.

use std::time::Duration;

use crate::anthropic::ANTHROPIC_API_KEY_ENV;
use crate::openai::OPENAI_API_KEY_ENV;
use crate::routing::{
    ModelRouting, DEFAULT_CATEGORY_MODEL, DEFAULT_CONTEXT_MODEL, DEFAULT_INTENT_MODEL,
};

/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Credentials, endpoints and model routing for the LLM client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmConfig {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub anthropic_base_url: Option<String>,
    pub request_timeout: Duration,
    pub routing: ModelRouting,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            anthropic_api_key: None,
            openai_base_url: None,
            anthropic_base_url: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            routing: ModelRouting::default(),
        }
    }
}

impl LlmConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `OPENAI_API_KEY`, `ANTHROPIC_API_KEY`: provider credentials
    /// - `ENRICHMENT_MODEL_CATEGORY`: default `gpt-4o-mini`
    /// - `ENRICHMENT_MODEL_INTENT`: default `gpt-4o`
    /// - `ENRICHMENT_MODEL_CONTEXT`: default `gpt-4o`
    /// - `OPENAI_BASE_URL`, `ANTHROPIC_BASE_URL`: endpoint overrides
    /// - `LLM_REQUEST_TIMEOUT_SECS`: default 60
    ///
    /// Empty values are treated as unset.
    pub fn from_env() -> Self {
        let request_timeout = env_var("LLM_REQUEST_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        Self {
            openai_api_key: env_var(OPENAI_API_KEY_ENV),
            anthropic_api_key: env_var(ANTHROPIC_API_KEY_ENV),
            openai_base_url: env_var("OPENAI_BASE_URL"),
            anthropic_base_url: env_var("ANTHROPIC_BASE_URL"),
            request_timeout: Duration::from_secs(request_timeout),
            routing: ModelRouting {
                category_model: env_var("ENRICHMENT_MODEL_CATEGORY")
                    .unwrap_or_else(|| DEFAULT_CATEGORY_MODEL.to_string()),
                intent_model: env_var("ENRICHMENT_MODEL_INTENT")
                    .unwrap_or_else(|| DEFAULT_INTENT_MODEL.to_string()),
                context_model: env_var("ENRICHMENT_MODEL_CONTEXT")
                    .unwrap_or_else(|| DEFAULT_CONTEXT_MODEL.to_string()),
            },
        }
    }

    /// Whether any provider credential is present.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        self.openai_api_key.is_some() || self.anthropic_api_key.is_some()
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "OPENAI_API_KEY",
        "ANTHROPIC_API_KEY",
        "OPENAI_BASE_URL",
        "ANTHROPIC_BASE_URL",
        "LLM_REQUEST_TIMEOUT_SECS",
        "ENRICHMENT_MODEL_CATEGORY",
        "ENRICHMENT_MODEL_INTENT",
        "ENRICHMENT_MODEL_CONTEXT",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_without_env() {
        clear_env();
        let config = LlmConfig::from_env();
        assert_eq!(config, LlmConfig::default());
        assert!(!config.has_credentials());
        assert_eq!(config.routing.category_model, "gpt-4o-mini");
        assert_eq!(config.request_timeout, Duration::from_secs(60));
    }

    #[test]
    #[serial]
    fn test_reads_overrides() {
        clear_env();
        std::env::set_var("ANTHROPIC_API_KEY", "sk-ant-test");
        std::env::set_var("ENRICHMENT_MODEL_INTENT", "claude-sonnet-4");
        std::env::set_var("LLM_REQUEST_TIMEOUT_SECS", "15");
        std::env::set_var("OPENAI_BASE_URL", "http://localhost:9000/v1");

        let config = LlmConfig::from_env();
        clear_env();

        assert_eq!(config.anthropic_api_key.as_deref(), Some("sk-ant-test"));
        assert!(config.openai_api_key.is_none());
        assert_eq!(config.routing.intent_model, "claude-sonnet-4");
        assert_eq!(config.routing.context_model, "gpt-4o");
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert_eq!(
            config.openai_base_url.as_deref(),
            Some("http://localhost:9000/v1")
        );
    }

    #[test]
    #[serial]
    fn test_empty_and_invalid_values_fall_back() {
        clear_env();
        std::env::set_var("OPENAI_API_KEY", "  ");
        std::env::set_var("LLM_REQUEST_TIMEOUT_SECS", "soon");

        let config = LlmConfig::from_env();
        clear_env();

        assert!(config.openai_api_key.is_none());
        assert_eq!(config.request_timeout, Duration::from_secs(60));
    }
}
