//! Anthropic Claude messages backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use stash_cost::TokenUsage;

use crate::error::{LlmError, LlmResult};
use crate::provider::{AIMessage, AIProvider, AIResponse, AIRole, GenerateOptions, ProviderKind};

/// Anthropic API base URL
pub const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";

/// Anthropic API version
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Environment variable holding the API key
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Used when the caller does not cap output; the API requires a value.
const DEFAULT_MAX_TOKENS: u32 = 1024;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Map a pricing-table model key to the API model identifier.
///
/// Anything that is not a canonical key is assumed to already be an API id.
pub fn api_model_id(model: &str) -> &str {
    match model {
        "claude-sonnet-3.5" => "claude-3-5-sonnet-latest",
        "claude-haiku-3.5" => "claude-3-5-haiku-latest",
        "claude-sonnet-4" => "claude-sonnet-4-20250514",
        "claude-opus-3" => "claude-3-opus-latest",
        _ => model,
    }
}

/// Anthropic API request message
#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Anthropic API request
#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Anthropic API response content
#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

/// Anthropic API usage
#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

/// Anthropic API response
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicContent>,
    model: String,
    usage: AnthropicUsage,
}

/// Anthropic API error
#[derive(Debug, Deserialize)]
struct AnthropicError {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

/// Anthropic API error response
#[derive(Debug, Deserialize)]
struct AnthropicErrorResponse {
    error: AnthropicError,
}

/// Anthropic Claude provider.
pub struct AnthropicProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    timeout: Duration,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider with an API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_key(Some(api_key.into()))
    }

    /// Create a provider from an optional key.
    pub fn with_key(api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: ANTHROPIC_API_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set a custom base URL.
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
        format!("{}/messages", self.base_url)
    }

    /// Convert messages to Anthropic format, extracting system message.
    fn convert_messages(messages: &[AIMessage]) -> (Option<&str>, Vec<AnthropicMessage<'_>>) {
        let mut system = None;
        let mut converted = Vec::new();

        for msg in messages {
            match msg.role {
                // Anthropic uses a separate system field
                AIRole::System => system = Some(msg.content.as_str()),
                AIRole::User | AIRole::Assistant => converted.push(AnthropicMessage {
                    role: msg.role.as_str(),
                    content: &msg.content,
                }),
            }
        }

        (system, converted)
    }
}

#[async_trait]
impl AIProvider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn api_key_env_var(&self) -> &'static str {
        ANTHROPIC_API_KEY_ENV
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
            .ok_or_else(|| LlmError::configuration("ANTHROPIC_API_KEY not set"))?;

        let api_model = api_model_id(model);
        let (system, converted_messages) = Self::convert_messages(messages);

        let request = AnthropicRequest {
            model: api_model,
            messages: converted_messages,
            max_tokens: options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system,
            temperature: options.temperature,
        };

        debug!(model, api_model, "Sending Anthropic request");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::transport(ProviderKind::Anthropic, &e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::transport(ProviderKind::Anthropic, &e))?;

        if !status.is_success() {
            let message = match serde_json::from_str::<AnthropicErrorResponse>(&body) {
                Ok(error_response) => format!(
                    "{} - {}",
                    error_response.error.error_type, error_response.error.message
                ),
                Err(_) => body,
            };
            return Err(LlmError::Api {
                provider: ProviderKind::Anthropic,
                status: status.as_u16(),
                message,
            });
        }

        let api_response: AnthropicResponse =
            serde_json::from_str(&body).map_err(|e| LlmError::InvalidResponse {
                provider: ProviderKind::Anthropic,
                reason: e.to_string(),
            })?;

        let text = api_response
            .content
            .into_iter()
            .find(|block| block.content_type == "text")
            .map(|block| block.text)
            .unwrap_or_default();

        Ok(AIResponse {
            text,
            usage: TokenUsage::new(
                api_response.usage.input_tokens,
                api_response.usage.output_tokens,
            ),
            model: api_response.model,
            provider: ProviderKind::Anthropic,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_name() {
        let provider = AnthropicProvider::new("sk-ant-test");
        assert_eq!(provider.name(), "anthropic");
        assert_eq!(provider.api_key_env_var(), "ANTHROPIC_API_KEY");
        assert!(provider.is_configured());
    }

    #[test]
    fn test_api_model_id() {
        assert_eq!(api_model_id("claude-sonnet-3.5"), "claude-3-5-sonnet-latest");
        assert_eq!(api_model_id("claude-haiku-3.5"), "claude-3-5-haiku-latest");
        assert_eq!(api_model_id("claude-3-opus-20240229"), "claude-3-opus-20240229");
    }

    #[test]
    fn test_message_conversion() {
        let messages = vec![
            AIMessage::system("You are a helpful assistant"),
            AIMessage::user("Hello"),
            AIMessage::assistant("Hi there!"),
            AIMessage::user("How are you?"),
        ];

        let (system, converted) = AnthropicProvider::convert_messages(&messages);

        assert_eq!(system, Some("You are a helpful assistant"));
        assert_eq!(converted.len(), 3);
        assert_eq!(converted[0].role, "user");
        assert_eq!(converted[1].role, "assistant");
        assert_eq!(converted[2].role, "user");
    }

    #[test]
    fn test_request_omits_missing_system() {
        let request = AnthropicRequest {
            model: "claude-3-5-haiku-latest",
            messages: vec![AnthropicMessage {
                role: "user",
                content: "Hello",
            }],
            max_tokens: 5,
            system: None,
            temperature: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("system").is_none());
        assert_eq!(json["max_tokens"], 5);
    }
}
