//! Token usage reported by a single LLM call.

use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// Token counts for one completion.
///
/// `total_tokens` is always `prompt_tokens + completion_tokens`; build values
/// with [`TokenUsage::new`] rather than trusting a provider-reported total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens sent to the model (system + user prompt).
    pub prompt_tokens: u32,
    /// Tokens generated by the model.
    pub completion_tokens: u32,
    /// Sum of prompt and completion tokens.
    pub total_tokens: u32,
}

impl TokenUsage {
    /// Create a usage sample from prompt and completion counts.
    #[must_use]
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }

    /// Whether no tokens were consumed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_tokens == 0
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        *self = Self::new(
            self.prompt_tokens.saturating_add(rhs.prompt_tokens),
            self.completion_tokens.saturating_add(rhs.completion_tokens),
        );
    }
}
