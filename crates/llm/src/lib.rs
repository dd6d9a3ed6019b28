//! Multi-provider LLM client for bookmark enrichment.
//!
//! - [`AIProvider`] is the one capability both backends share: complete a
//!   chat prompt and return text plus token usage.
//! - [`OpenAIProvider`] and [`AnthropicProvider`] implement it over HTTP.
//! - [`ModelRouting`] maps each [`EnrichmentTask`] to a model, derives the
//!   provider from the model name, and falls back to the other provider
//!   when a credential is missing.
//! - [`LlmClient::call_with_retry`] wraps a routed call in a
//!   [`RetryPolicy`] and prices the result with `stash-cost`.
//!
//! ```rust,no_run
//! use stash_llm::{EnrichmentTask, LlmClient, LlmConfig};
//!
//! # async fn run() -> stash_llm::LlmResult<()> {
//! let client = LlmClient::from_config(&LlmConfig::from_env())?;
//! let result = client
//!     .call_with_retry(EnrichmentTask::Intent, "You are terse.", "Say hi", str::to_string)
//!     .await?;
//! println!("{} ({})", result.data, result.model);
//! # Ok(())
//! # }
//! ```

pub mod anthropic;
pub mod client;
pub mod config;
pub mod error;
pub mod openai;
pub mod provider;
pub mod registry;
pub mod retry;
pub mod routing;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use anthropic::AnthropicProvider;
pub use client::{ConnectionTestResult, LlmClient, TaskResult};
pub use config::LlmConfig;
pub use error::{ErrorClass, LlmError, LlmResult};
pub use openai::OpenAIProvider;
pub use provider::{
    parse_json_response, strip_code_fences, AIMessage, AIProvider, AIResponse, AIRole,
    GenerateOptions, MessageBuilder, ProviderKind,
};
pub use registry::ProviderRegistry;
pub use retry::RetryPolicy;
pub use routing::{EnrichmentTask, ModelConfig, ModelRouting};
