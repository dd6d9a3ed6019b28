//! Recorded call model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::usage::TokenUsage;

/// One priced LLM call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedCall {
    /// Unique ID for this call.
    pub id: String,
    /// When the call was recorded.
    pub timestamp: DateTime<Utc>,
    /// Model name as configured for the call.
    pub model: String,
    /// Enrichment task that issued the call (e.g. "intent").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    /// Provider that served the call (e.g. "openai").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Token usage reported for the call.
    pub usage: TokenUsage,
    /// Cost in USD.
    pub cost_usd: f64,
}

impl TrackedCall {
    /// Total tokens used by this call.
    #[must_use]
    pub fn total_tokens(&self) -> u64 {
        u64::from(self.usage.total_tokens)
    }
}
