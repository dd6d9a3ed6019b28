//! OpenAI chat completions backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use stash_cost::TokenUsage;

use crate::error::{LlmError, LlmResult};
use crate::provider::{AIMessage, AIProvider, AIResponse, GenerateOptions, ProviderKind};

/// OpenAI API base URL
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Environment variable holding the API key
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// OpenAI API request message
#[derive(Debug, Serialize)]
struct OpenAIMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// OpenAI API request
#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIChoiceMessage,
}

/// OpenAI API usage
#[derive(Debug, Deserialize)]
#[allow(clippy::struct_field_names)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// OpenAI API response
#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
    model: String,
    usage: Option<OpenAIUsage>,
}

/// OpenAI API error
#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
}

/// OpenAI API error response
#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIError,
}

/// OpenAI GPT provider.
pub struct OpenAIProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    timeout: Duration,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider with an API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_key(Some(api_key.into()))
    }

    /// Create a provider from an optional key.
    pub fn with_key(api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: OPENAI_API_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set a custom base URL (useful for Azure OpenAI or proxies).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn convert_messages(messages: &[AIMessage]) -> Vec<OpenAIMessage<'_>> {
        messages
            .iter()
            .map(|msg| OpenAIMessage {
                role: msg.role.as_str(),
                content: &msg.content,
            })
            .collect()
    }
}

#[async_trait]
impl AIProvider for OpenAIProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn api_key_env_var(&self) -> &'static str {
        OPENAI_API_KEY_ENV
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate_text(
        &self,
        model: &str,
        messages: &[AIMessage],
        options: &GenerateOptions,
    ) -> LlmResult<AIResponse> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| LlmError::configuration("OPENAI_API_KEY not set"))?;

        let request = OpenAIRequest {
            model,
            messages: Self::convert_messages(messages),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        };

        debug!(model, endpoint = %self.endpoint(), "Sending OpenAI request");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::transport(ProviderKind::OpenAi, &e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::transport(ProviderKind::OpenAi, &e))?;

        if !status.is_success() {
            let message = serde_json::from_str::<OpenAIErrorResponse>(&body)
                .map_or(body, |error_response| error_response.error.message);
            return Err(LlmError::Api {
                provider: ProviderKind::OpenAi,
                status: status.as_u16(),
                message,
            });
        }

        let api_response: OpenAIResponse =
            serde_json::from_str(&body).map_err(|e| LlmError::InvalidResponse {
                provider: ProviderKind::OpenAi,
                reason: e.to_string(),
            })?;

        // Extract text from first choice
        let text = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        let usage = api_response
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        Ok(AIResponse {
            text,
            usage,
            model: api_response.model,
            provider: ProviderKind::OpenAi,
        })
    }
}
