//! AI Provider trait and common types.
//!
//! Defines the single capability every backend offers: complete a
//! chat-style prompt and return text plus token usage.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use stash_cost::TokenUsage;

use crate::error::LlmResult;

/// The two supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI chat completions.
    #[serde(rename = "openai")]
    OpenAi,
    /// Anthropic messages.
    Anthropic,
}

impl ProviderKind {
    /// Get all providers, in preference order.
    #[must_use]
    pub fn all() -> &'static [ProviderKind] {
        &[ProviderKind::OpenAi, ProviderKind::Anthropic]
    }

    /// Stable lowercase identifier ("openai", "anthropic").
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
        }
    }

    /// The other backend, used for credential fallback.
    #[must_use]
    pub fn other(&self) -> ProviderKind {
        match self {
            ProviderKind::OpenAi => ProviderKind::Anthropic,
            ProviderKind::Anthropic => ProviderKind::OpenAi,
        }
    }

    /// Derive the provider from a model name.
    ///
    /// Any name containing "claude" is Anthropic; everything else is OpenAI.
    #[must_use]
    pub fn for_model(model: &str) -> ProviderKind {
        if model.contains("claude") {
            ProviderKind::Anthropic
        } else {
            ProviderKind::OpenAi
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Anthropic => "Anthropic",
        };
        write!(f, "{s}")
    }
}

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AIRole {
    /// System message (sets context/behavior)
    System,
    /// User message (input)
    User,
    /// Assistant message (AI response)
    Assistant,
}

impl AIRole {
    /// Wire name shared by both APIs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AIRole::System => "system",
            AIRole::User => "user",
            AIRole::Assistant => "assistant",
        }
    }
}

/// A message in a conversation with an AI model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AIMessage {
    /// Role of the message sender
    pub role: AIRole,
    /// Content of the message
    pub content: String,
}

impl AIMessage {
    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: AIRole::System,
            content: content.into(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: AIRole::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: AIRole::Assistant,
            content: content.into(),
        }
    }
}

/// Response from an AI model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AIResponse {
    /// Generated text content, empty if the model returned none
    pub text: String,
    /// Token usage information
    pub usage: TokenUsage,
    /// Model that generated the response, as reported by the API
    pub model: String,
    /// Provider that generated the response
    pub provider: ProviderKind,
}

/// Options for text generation.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateOptions {
    /// Temperature for sampling (0.0 to 1.0)
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
}

/// Trait for AI providers.
///
/// OpenAI and Anthropic implement this directly; routing picks an
/// implementation, it never layers behaviour on top of one.
#[async_trait]
pub trait AIProvider: Send + Sync {
    /// Which backend this is.
    fn kind(&self) -> ProviderKind;

    /// Get the provider name (e.g., "anthropic", "openai").
    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Get the environment variable name for the API key.
    fn api_key_env_var(&self) -> &'static str;

    /// Check if the provider is configured (has API key).
    fn is_configured(&self) -> bool;

    /// Generate text from messages.
    async fn generate_text(
        &self,
        model: &str,
        messages: &[AIMessage],
        options: &GenerateOptions,
    ) -> LlmResult<AIResponse>;
}

/// Strip a markdown code fence from model output, if present.
#[must_use]
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();

    let inner = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"));

    inner.map_or(text, str::trim)
}

/// Parse model output as JSON, tolerating a surrounding code fence.
///
/// This is a standalone function rather than a trait method because
/// generic methods are not dyn-compatible.
pub fn parse_json_response<T: for<'de> Deserialize<'de>>(text: &str) -> serde_json::Result<T> {
    serde_json::from_str(strip_code_fences(text))
}

/// Builder for constructing AI messages.
#[derive(Debug, Default)]
pub struct MessageBuilder {
    messages: Vec<AIMessage>,
}

impl MessageBuilder {
    /// Create a new message builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a system message.
    #[must_use]
    pub fn system(mut self, content: impl Into<String>) -> Self {
        self.messages.push(AIMessage::system(content));
        self
    }

    /// Add a user message.
    #[must_use]
    pub fn user(mut self, content: impl Into<String>) -> Self {
        self.messages.push(AIMessage::user(content));
        self
    }

    /// Build the message list.
    pub fn build(self) -> Vec<AIMessage> {
        self.messages
    }
}
