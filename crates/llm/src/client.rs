//! Routed, retrying LLM client.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use stash_cost::{price, TokenUsage};

use crate::config::LlmConfig;
use crate::error::{LlmError, LlmResult};
use crate::provider::{AIMessage, AIProvider, GenerateOptions, MessageBuilder, ProviderKind};
use crate::registry::ProviderRegistry;
use crate::retry::RetryPolicy;
use crate::routing::{EnrichmentTask, ModelConfig, ModelRouting};

const CONNECTION_TEST_PROMPT: &str = "Hello";
const CONNECTION_TEST_MAX_TOKENS: u32 = 5;

/// Uniform envelope returned for every task call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskResult<T> {
    pub data: T,
    pub usage: TokenUsage,
    /// The configured model name, not the provider's dated id.
    pub model: String,
    pub provider: ProviderKind,
    pub cost: f64,
}

impl<T> TaskResult<T> {
    /// Replace the payload, keeping usage and cost.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> TaskResult<U> {
        TaskResult {
            data: f(self.data),
            usage: self.usage,
            model: self.model,
            provider: self.provider,
            cost: self.cost,
        }
    }
}

/// Per-provider outcome of [`LlmClient::test_connection`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionTestResult {
    pub openai: bool,
    pub anthropic: bool,
    /// Failures joined as `OpenAI: <msg> | Anthropic: <msg>`.
    pub error: Option<String>,
}

/// LLM client with task routing, provider fallback and retry.
#[derive(Debug, Clone)]
pub struct LlmClient {
    registry: ProviderRegistry,
    routing: ModelRouting,
    retry: RetryPolicy,
}

impl LlmClient {
    /// Create a client over `registry`.
    ///
    /// Fails with a configuration error when no registered provider has a
    /// credential.
    pub fn new(registry: ProviderRegistry, routing: ModelRouting) -> LlmResult<Self> {
        if !registry.has_any() {
            return Err(LlmError::configuration(
                "No LLM provider is configured. Set OPENAI_API_KEY or ANTHROPIC_API_KEY",
            ));
        }

        Ok(Self {
            registry,
            routing,
            retry: RetryPolicy::default(),
        })
    }

    /// Build the HTTP backends and routing from configuration.
    pub fn from_config(config: &LlmConfig) -> LlmResult<Self> {
        Self::new(
            ProviderRegistry::from_config(config),
            config.routing.clone(),
        )
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn routing(&self) -> &ModelRouting {
        &self.routing
    }

    /// Configured providers, OpenAI first.
    pub fn available_providers(&self) -> Vec<ProviderKind> {
        self.registry.available()
    }

    /// Resolve the provider and model a task will use.
    pub fn model_config(&self, task: EnrichmentTask) -> LlmResult<ModelConfig> {
        let config = self
            .routing
            .resolve(task, |kind| self.registry.is_available(kind))
            .ok_or_else(|| LlmError::configuration("No LLM provider is available"))?;

        if config.model != self.routing.model_for(task) {
            debug!(
                task = %task,
                configured = self.routing.model_for(task),
                provider = %config.provider,
                model = %config.model,
                "Configured provider unavailable, falling back"
            );
        }
        Ok(config)
    }

    fn provider(&self, kind: ProviderKind) -> LlmResult<Arc<dyn AIProvider>> {
        self.registry
            .get(kind)
            .ok_or_else(|| LlmError::configuration(format!("{kind} provider is not registered")))
    }

    /// Run `task` with retry and hand the raw text to `parse`.
    ///
    /// `parse` sees only the final successful response and is expected to
    /// absorb malformed output itself. Cost is priced from the configured
    /// model name.
    pub async fn call_with_retry<T, P>(
        &self,
        task: EnrichmentTask,
        system_prompt: &str,
        user_prompt: &str,
        parse: P,
    ) -> LlmResult<TaskResult<T>>
    where
        P: FnOnce(&str) -> T,
    {
        let config = self.model_config(task)?;
        let provider = self.provider(config.provider)?;
        let provider: &dyn AIProvider = provider.as_ref();

        let messages = MessageBuilder::new()
            .system(system_prompt)
            .user(user_prompt)
            .build();
        let messages: &[AIMessage] = &messages;
        let options = GenerateOptions {
            temperature: Some(config.temperature),
            max_tokens: Some(config.max_tokens),
        };
        let options = &options;
        let model = config.model.as_str();

        info!(
            task = %task,
            provider = %config.provider,
            model,
            "Calling LLM"
        );

        let response = self
            .retry
            .run(task.as_str(), move |_| {
                provider.generate_text(model, messages, options)
            })
            .await?;

        let cost = price(model, &response.usage);
        debug!(
            task = %task,
            model,
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            cost,
            "LLM call complete"
        );

        Ok(TaskResult {
            data: parse(&response.text),
            usage: response.usage,
            model: config.model,
            provider: config.provider,
            cost,
        })
    }

    /// Send a minimal prompt to each configured provider, without retry.
    pub async fn test_connection(&self) -> ConnectionTestResult {
        let mut result = ConnectionTestResult::default();
        let mut errors = Vec::new();
        let options = GenerateOptions {
            temperature: None,
            max_tokens: Some(CONNECTION_TEST_MAX_TOKENS),
        };
        let messages = [AIMessage::user(CONNECTION_TEST_PROMPT)];

        for kind in self.registry.available() {
            let Some(provider) = self.registry.get(kind) else {
                continue;
            };
            let model = connection_test_model(kind);

            match provider.generate_text(model, &messages, &options).await {
                Ok(_) => match kind {
                    ProviderKind::OpenAi => result.openai = true,
                    ProviderKind::Anthropic => result.anthropic = true,
                },
                Err(e) => {
                    warn!(provider = %kind, error = %e, "Connection test failed");
                    errors.push(format!("{kind}: {e}"));
                }
            }
        }

        if !errors.is_empty() {
            result.error = Some(errors.join(" | "));
        }
        result
    }
}

fn connection_test_model(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::OpenAi => "gpt-4o-mini",
        ProviderKind::Anthropic => "claude-haiku-3.5",
    }
}
