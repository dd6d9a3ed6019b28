//! Provider Registry - holds the backends a client may route to.
//!
//! The registry is built once and handed to [`LlmClient`](crate::LlmClient);
//! there is no process-wide instance.

use std::collections::HashMap;
use std::sync::Arc;

use crate::anthropic::AnthropicProvider;
use crate::config::LlmConfig;
use crate::openai::OpenAIProvider;
use crate::provider::{AIProvider, ProviderKind};

/// Registry of AI providers, keyed by backend.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn AIProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build both HTTP backends from configuration.
    ///
    /// Backends without a key are still registered but report as
    /// unconfigured, so routing skips them.
    pub fn from_config(config: &LlmConfig) -> Self {
        let mut openai = OpenAIProvider::with_key(config.openai_api_key.clone())
            .with_timeout(config.request_timeout);
        if let Some(url) = &config.openai_base_url {
            openai = openai.with_base_url(url);
        }

        let mut anthropic = AnthropicProvider::with_key(config.anthropic_api_key.clone())
            .with_timeout(config.request_timeout);
        if let Some(url) = &config.anthropic_base_url {
            anthropic = anthropic.with_base_url(url);
        }

        Self::new()
            .with_provider(Arc::new(openai))
            .with_provider(Arc::new(anthropic))
    }

    /// Register a provider, replacing any existing one of the same kind.
    pub fn register(&mut self, provider: Arc<dyn AIProvider>) {
        self.providers.insert(provider.kind(), provider);
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn AIProvider>) -> Self {
        self.register(provider);
        self
    }

    /// Get a provider by kind, configured or not.
    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn AIProvider>> {
        self.providers.get(&kind).cloned()
    }

    /// Whether a provider of this kind is registered and has a credential.
    pub fn is_available(&self, kind: ProviderKind) -> bool {
        self.providers
            .get(&kind)
            .is_some_and(|provider| provider.is_configured())
    }

    /// Configured providers, OpenAI first.
    pub fn available(&self) -> Vec<ProviderKind> {
        ProviderKind::all()
            .iter()
            .copied()
            .filter(|kind| self.is_available(*kind))
            .collect()
    }

    /// Whether at least one provider can be called.
    pub fn has_any(&self) -> bool {
        !self.available().is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("available", &self.available())
            .finish()
    }
}
