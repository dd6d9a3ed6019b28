//! HTTP backends against local wiremock servers.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use stash_llm::{
    AIMessage, AIProvider, AnthropicProvider, EnrichmentTask, GenerateOptions, LlmClient,
    LlmError, ModelRouting, OpenAIProvider, ProviderKind, ProviderRegistry, RetryPolicy,
};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn messages() -> Vec<AIMessage> {
    vec![AIMessage::system("You are terse."), AIMessage::user("Hello")]
}

fn options() -> GenerateOptions {
    GenerateOptions {
        temperature: Some(0.3),
        max_tokens: Some(100),
    }
}

#[tokio::test]
async fn test_openai_chat_completion() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "max_tokens": 100,
            "messages": [
                {"role": "system", "content": "You are terse."},
                {"role": "user", "content": "Hello"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-123",
            "model": "gpt-4o-mini-2024-07-18",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "{\"category\": \"Inspo\"}"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 42, "completion_tokens": 7, "total_tokens": 49}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAIProvider::new("sk-test").with_base_url(server.uri());
    let response = provider
        .generate_text("gpt-4o-mini", &messages(), &options())
        .await
        .unwrap();

    assert_eq!(response.text, "{\"category\": \"Inspo\"}");
    assert_eq!(response.usage.prompt_tokens, 42);
    assert_eq!(response.usage.total_tokens, 49);
    assert_eq!(response.model, "gpt-4o-mini-2024-07-18");
    assert_eq!(response.provider, ProviderKind::OpenAi);
}

#[tokio::test]
async fn test_openai_error_body_is_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"message": "Rate limit reached for gpt-4o", "type": "requests"}
        })))
        .mount(&server)
        .await;

    let provider = OpenAIProvider::new("sk-test").with_base_url(server.uri());
    let err = provider
        .generate_text("gpt-4o", &messages(), &options())
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "OpenAI API error (429): Rate limit reached for gpt-4o"
    );
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_anthropic_messages() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "sk-ant-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({
            "model": "claude-3-5-haiku-latest",
            "system": "You are terse.",
            "max_tokens": 100,
            "messages": [{"role": "user", "content": "Hello"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "model": "claude-3-5-haiku-20241022",
            "content": [{"type": "text", "text": "Hi."}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 12, "output_tokens": 3}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new("sk-ant-test").with_base_url(server.uri());
    let response = provider
        .generate_text("claude-haiku-3.5", &messages(), &options())
        .await
        .unwrap();

    assert_eq!(response.text, "Hi.");
    assert_eq!(response.usage.total_tokens, 15);
    assert_eq!(response.provider, ProviderKind::Anthropic);
}

#[tokio::test]
async fn test_anthropic_auth_error_is_not_retryable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "type": "error",
            "error": {"type": "authentication_error", "message": "invalid x-api-key"}
        })))
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new("bad-key").with_base_url(server.uri());
    let err = provider
        .generate_text("claude-sonnet-3.5", &messages(), &options())
        .await
        .unwrap_err();

    assert!(matches!(err, LlmError::Api { status: 401, .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_request_timeout_is_retryable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let provider = OpenAIProvider::new("sk-test")
        .with_base_url(server.uri())
        .with_timeout(Duration::from_millis(100));
    let err = provider
        .generate_text("gpt-4o", &messages(), &options())
        .await
        .unwrap_err();

    assert!(matches!(err, LlmError::Timeout { .. }), "got {err}");
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_client_retries_service_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "gpt-4o",
            "choices": [{"message": {"content": "{\"intent\": \"reference\", \"confidence\": 0.8}"}}],
            "usage": {"prompt_tokens": 1000, "completion_tokens": 100}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let registry = ProviderRegistry::new().with_provider(Arc::new(
        OpenAIProvider::new("sk-test").with_base_url(server.uri()),
    ));
    let client = LlmClient::new(registry, ModelRouting::default())
        .unwrap()
        .with_retry_policy(RetryPolicy {
            initial_delay: Duration::from_millis(10),
            ..RetryPolicy::default()
        });

    let result = client
        .call_with_retry(EnrichmentTask::Intent, "sys", "user", str::to_string)
        .await
        .unwrap();

    assert!(result.data.contains("reference"));
    assert_eq!(result.model, "gpt-4o");
    // 1000 * 2.50 / 1M + 100 * 10.00 / 1M
    assert!((result.cost - 0.0035).abs() < 1e-12);
}
