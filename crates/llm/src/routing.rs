//! Task-to-model routing with provider fallback.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::provider::ProviderKind;

/// Default model for category classification.
pub const DEFAULT_CATEGORY_MODEL: &str = "gpt-4o-mini";
/// Default model for intent analysis.
pub const DEFAULT_INTENT_MODEL: &str = "gpt-4o";
/// Default model for context extraction.
pub const DEFAULT_CONTEXT_MODEL: &str = "gpt-4o";

/// Model used when OpenAI is routed but only Anthropic is configured.
pub const ANTHROPIC_FALLBACK_MODEL: &str = "claude-sonnet-3.5";

const CATEGORY_MAX_TOKENS: u32 = 100;
const ANALYSIS_MAX_TOKENS: u32 = 500;
const TEMPERATURE: f32 = 0.3;

/// An LLM-backed analysis performed per bookmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentTask {
    /// Why the bookmark was saved.
    Intent,
    /// Author, company, topic and themes.
    Context,
    /// One of the three bookmark categories.
    Category,
}

impl EnrichmentTask {
    /// All tasks, in pipeline order.
    #[must_use]
    pub fn all() -> &'static [EnrichmentTask] {
        &[
            EnrichmentTask::Intent,
            EnrichmentTask::Context,
            EnrichmentTask::Category,
        ]
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrichmentTask::Intent => "intent",
            EnrichmentTask::Context => "context",
            EnrichmentTask::Category => "category",
        }
    }
}

impl fmt::Display for EnrichmentTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved call settings for one task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelConfig {
    pub provider: ProviderKind,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Configured model name per task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRouting {
    pub category_model: String,
    pub intent_model: String,
    pub context_model: String,
}

impl Default for ModelRouting {
    fn default() -> Self {
        Self {
            category_model: DEFAULT_CATEGORY_MODEL.to_string(),
            intent_model: DEFAULT_INTENT_MODEL.to_string(),
            context_model: DEFAULT_CONTEXT_MODEL.to_string(),
        }
    }
}

impl ModelRouting {
    /// The configured model name for a task.
    #[must_use]
    pub fn model_for(&self, task: EnrichmentTask) -> &str {
        match task {
            EnrichmentTask::Intent => &self.intent_model,
            EnrichmentTask::Context => &self.context_model,
            EnrichmentTask::Category => &self.category_model,
        }
    }

    /// Resolve the model config for `task`.
    ///
    /// The provider is derived from the configured model name. If that
    /// provider is unavailable and the other one is, the other provider's
    /// default model is used instead. Returns `None` when neither provider
    /// is available.
    pub fn resolve(
        &self,
        task: EnrichmentTask,
        is_available: impl Fn(ProviderKind) -> bool,
    ) -> Option<ModelConfig> {
        let model = self.model_for(task);
        let preferred = ProviderKind::for_model(model);

        let (provider, model) = if is_available(preferred) {
            (preferred, model.to_string())
        } else if is_available(preferred.other()) {
            let fallback = preferred.other();
            (fallback, fallback_model(fallback, task).to_string())
        } else {
            return None;
        };

        Some(ModelConfig {
            provider,
            model,
            max_tokens: max_tokens_for(task),
            temperature: TEMPERATURE,
        })
    }
}

/// Default model when routing falls back onto `provider`.
#[must_use]
pub fn fallback_model(provider: ProviderKind, task: EnrichmentTask) -> &'static str {
    match (provider, task) {
        (ProviderKind::Anthropic, _) => ANTHROPIC_FALLBACK_MODEL,
        (ProviderKind::OpenAi, EnrichmentTask::Category) => DEFAULT_CATEGORY_MODEL,
        (ProviderKind::OpenAi, _) => DEFAULT_INTENT_MODEL,
    }
}

/// Output cap per task; category answers are short.
#[must_use]
pub fn max_tokens_for(task: EnrichmentTask) -> u32 {
    match task {
        EnrichmentTask::Category => CATEGORY_MAX_TOKENS,
        EnrichmentTask::Intent | EnrichmentTask::Context => ANALYSIS_MAX_TOKENS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only(kind: ProviderKind) -> impl Fn(ProviderKind) -> bool {
        move |k| k == kind
    }

    #[test]
    fn test_default_routing() {
        let routing = ModelRouting::default();
        let config = routing
            .resolve(EnrichmentTask::Category, |_| true)
            .unwrap();
        assert_eq!(config.provider, ProviderKind::OpenAi);
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.max_tokens, 100);
        assert!((config.temperature - 0.3).abs() < f32::EPSILON);

        let config = routing.resolve(EnrichmentTask::Intent, |_| true).unwrap();
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.max_tokens, 500);
    }

    #[test]
    fn test_claude_model_routes_to_anthropic() {
        let routing = ModelRouting {
            context_model: "claude-sonnet-4".to_string(),
            ..ModelRouting::default()
        };
        let config = routing
            .resolve(EnrichmentTask::Context, |_| true)
            .unwrap();
        assert_eq!(config.provider, ProviderKind::Anthropic);
        assert_eq!(config.model, "claude-sonnet-4");
    }

    #[test]
    fn test_fallback_to_anthropic() {
        let routing = ModelRouting::default();
        for task in EnrichmentTask::all() {
            let config = routing
                .resolve(*task, only(ProviderKind::Anthropic))
                .unwrap();
            assert_eq!(config.provider, ProviderKind::Anthropic);
            assert_eq!(config.model, "claude-sonnet-3.5");
        }
    }

    #[test]
    fn test_fallback_to_openai() {
        let routing = ModelRouting {
            category_model: "claude-haiku-3.5".to_string(),
            intent_model: "claude-sonnet-4".to_string(),
            context_model: "claude-sonnet-4".to_string(),
        };
        let category = routing
            .resolve(EnrichmentTask::Category, only(ProviderKind::OpenAi))
            .unwrap();
        assert_eq!(category.model, "gpt-4o-mini");

        let intent = routing
            .resolve(EnrichmentTask::Intent, only(ProviderKind::OpenAi))
            .unwrap();
        assert_eq!(intent.provider, ProviderKind::OpenAi);
        assert_eq!(intent.model, "gpt-4o");
    }

    #[test]
    fn test_no_provider_resolves_nothing() {
        let routing = ModelRouting::default();
        assert!(routing.resolve(EnrichmentTask::Intent, |_| false).is_none());
    }

    #[test]
    fn test_task_names() {
        assert_eq!(EnrichmentTask::Category.to_string(), "category");
        assert_eq!(
            serde_json::to_string(&EnrichmentTask::Intent).unwrap(),
            "\"intent\""
        );
    }
}
