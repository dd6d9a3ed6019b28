//! Pipeline configuration from environment variables.

use std::time::Duration;

use crate::analysis::{category, context, intent};
use crate::connections::DEFAULT_MAX_PER_BOOKMARK;

/// Version stamped on bookmarks the pipeline enriches.
pub const DEFAULT_ENRICHMENT_VERSION: &str = "1.0";

/// Pacing and output settings for a batch run.
///
/// The delays only keep sequential calls under provider rate limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub enrichment_version: String,
    pub max_connections_per_bookmark: usize,
    pub intent_delay: Duration,
    pub context_delay: Duration,
    pub category_delay: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enrichment_version: DEFAULT_ENRICHMENT_VERSION.to_string(),
            max_connections_per_bookmark: DEFAULT_MAX_PER_BOOKMARK,
            intent_delay: intent::DEFAULT_BATCH_DELAY,
            context_delay: context::DEFAULT_BATCH_DELAY,
            category_delay: category::DEFAULT_BATCH_DELAY,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `ENRICHMENT_VERSION`: default `1.0`
    /// - `ENRICHMENT_MAX_CONNECTIONS`: default 5
    /// - `ENRICHMENT_INTENT_DELAY_MS`: default 200
    /// - `ENRICHMENT_CONTEXT_DELAY_MS`: default 200
    /// - `ENRICHMENT_CATEGORY_DELAY_MS`: default 100
    ///
    /// Unparseable numbers keep the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enrichment_version: env_var("ENRICHMENT_VERSION")
                .unwrap_or(defaults.enrichment_version),
            max_connections_per_bookmark: env_parse("ENRICHMENT_MAX_CONNECTIONS")
                .unwrap_or(defaults.max_connections_per_bookmark),
            intent_delay: env_millis("ENRICHMENT_INTENT_DELAY_MS").unwrap_or(defaults.intent_delay),
            context_delay: env_millis("ENRICHMENT_CONTEXT_DELAY_MS")
                .unwrap_or(defaults.context_delay),
            category_delay: env_millis("ENRICHMENT_CATEGORY_DELAY_MS")
                .unwrap_or(defaults.category_delay),
        }
    }

    /// Same settings with every pacing delay removed. Used by tests.
    #[must_use]
    pub fn without_delays(mut self) -> Self {
        self.intent_delay = Duration::ZERO;
        self.context_delay = Duration::ZERO;
        self.category_delay = Duration::ZERO;
        self
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_var(name).and_then(|v| v.parse().ok())
}

fn env_millis(name: &str) -> Option<Duration> {
    env_parse::<u64>(name).map(Duration::from_millis)
}
