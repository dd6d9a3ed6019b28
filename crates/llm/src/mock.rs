//! Scripted provider for deterministic tests.
//!
//! Compiled for this crate's tests and behind the `mock` feature for
//! downstream test suites.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use stash_cost::TokenUsage;

use crate::error::{LlmError, LlmResult};
use crate::provider::{AIMessage, AIProvider, AIResponse, AIRole, GenerateOptions, ProviderKind};

type Responder = dyn Fn(&MockCall) -> LlmResult<String> + Send + Sync;

/// One recorded `generate_text` call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub model: String,
    pub system: String,
    pub user: String,
    pub max_tokens: Option<u32>,
}

/// Provider that replays queued results, then falls back to a responder.
pub struct MockProvider {
    kind: ProviderKind,
    configured: bool,
    usage: TokenUsage,
    script: Mutex<VecDeque<LlmResult<String>>>,
    responder: Option<Arc<Responder>>,
    default_response: String,
    calls: Mutex<Vec<MockCall>>,
}

impl MockProvider {
    /// A configured mock that answers `{}` unless scripted.
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            configured: true,
            usage: TokenUsage::new(100, 50),
            script: Mutex::new(VecDeque::new()),
            responder: None,
            default_response: "{}".to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A mock with no credential; routing treats it as absent.
    pub fn unconfigured(kind: ProviderKind) -> Self {
        Self {
            configured: false,
            ..Self::new(kind)
        }
    }

    /// Queue a successful response.
    #[must_use]
    pub fn with_response(self, text: impl Into<String>) -> Self {
        lock(&self.script).push_back(Ok(text.into()));
        self
    }

    /// Queue a failure.
    #[must_use]
    pub fn with_error(self, error: LlmError) -> Self {
        lock(&self.script).push_back(Err(error));
        self
    }

    /// Answer calls with `responder` once the queue is empty.
    #[must_use]
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&MockCall) -> LlmResult<String> + Send + Sync + 'static,
    {
        self.responder = Some(Arc::new(responder));
        self
    }

    /// Text returned when neither script nor responder applies.
    #[must_use]
    pub fn with_default_response(mut self, text: impl Into<String>) -> Self {
        self.default_response = text.into();
        self
    }

    /// Usage reported for every call.
    #[must_use]
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }

    /// All calls seen so far.
    pub fn calls(&self) -> Vec<MockCall> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn joined(messages: &[AIMessage], role: AIRole) -> String {
    messages
        .iter()
        .filter(|m| m.role == role)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl AIProvider for MockProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn api_key_env_var(&self) -> &'static str {
        match self.kind {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn generate_text(
        &self,
        model: &str,
        messages: &[AIMessage],
        options: &GenerateOptions,
    ) -> LlmResult<AIResponse> {
        let call = MockCall {
            model: model.to_string(),
            system: joined(messages, AIRole::System),
            user: joined(messages, AIRole::User),
            max_tokens: options.max_tokens,
        };
        lock(&self.calls).push(call.clone());

        let scripted = lock(&self.script).pop_front();
        let text = match (scripted, &self.responder) {
            (Some(result), _) => result?,
            (None, Some(responder)) => responder(&call)?,
            (None, None) => self.default_response.clone(),
        };

        Ok(AIResponse {
            text,
            usage: self.usage,
            model: model.to_string(),
            provider: self.kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_then_responder() {
        let provider = MockProvider::new(ProviderKind::OpenAi)
            .with_response("first")
            .with_responder(|call| Ok(format!("echo {}", call.user)));
        let messages = [AIMessage::system("sys"), AIMessage::user("hi")];
        let options = GenerateOptions::default();

        let first = provider.generate_text("gpt-4o", &messages, &options).await.unwrap();
        let second = provider.generate_text("gpt-4o", &messages, &options).await.unwrap();

        assert_eq!(first.text, "first");
        assert_eq!(second.text, "echo hi");
        assert_eq!(provider.call_count(), 2);
        assert_eq!(provider.calls()[0].system, "sys");
    }

    #[tokio::test]
    async fn test_scripted_error() {
        let provider = MockProvider::new(ProviderKind::Anthropic)
            .with_error(LlmError::Other("boom".to_string()));
        let result = provider
            .generate_text("claude-haiku-3.5", &[AIMessage::user("x")], &GenerateOptions::default())
            .await;
        assert!(result.is_err());
        assert_eq!(provider.call_count(), 1);
    }
}
