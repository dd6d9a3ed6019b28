//! Cost tracker for recording and summarising LLM calls.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;

use super::models::TrackedCall;
use super::summary::CostSummary;
use crate::usage::TokenUsage;

/// Accumulates priced calls for a single pipeline run.
///
/// Recording takes `&self`, so a tracker can be lent to every stage of a run
/// without threading `&mut` through. It is intentionally not `Clone`.
#[derive(Debug, Default)]
pub struct CostTracker {
    calls: RwLock<Vec<TrackedCall>>,
}

impl CostTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a call by model, usage and cost.
    pub fn record(&self, model: &str, usage: &TokenUsage, cost: f64) -> TrackedCall {
        self.builder().model(model).usage(*usage).cost(cost).record()
    }

    /// Create a builder for recording a call with task/provider context.
    #[must_use]
    pub fn builder(&self) -> TrackedCallBuilder<'_> {
        TrackedCallBuilder::new(self)
    }

    fn push(&self, call: TrackedCall) {
        if let Ok(mut calls) = self.calls.write() {
            calls.push(call);
        }
    }

    /// All recorded calls, oldest first.
    #[must_use]
    pub fn all(&self) -> Vec<TrackedCall> {
        self.calls.read().map(|c| c.clone()).unwrap_or_default()
    }

    /// Total cost in USD.
    #[must_use]
    pub fn total_cost(&self) -> f64 {
        self.calls
            .read()
            .map(|calls| calls.iter().map(|c| c.cost_usd).sum())
            .unwrap_or(0.0)
    }

    /// Total tokens across all calls.
    #[must_use]
    pub fn total_tokens(&self) -> u64 {
        self.calls
            .read()
            .map(|calls| calls.iter().map(TrackedCall::total_tokens).sum())
            .unwrap_or(0)
    }

    /// Number of recorded calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.read().map(|c| c.len()).unwrap_or(0)
    }

    /// Check if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.call_count() == 0
    }

    /// Cost keyed by model name.
    #[must_use]
    pub fn cost_by_model(&self) -> HashMap<String, f64> {
        self.summary().cost_by_model
    }

    /// Aggregate everything recorded so far.
    #[must_use]
    pub fn summary(&self) -> CostSummary {
        self.calls
            .read()
            .map(|calls| CostSummary::from_calls(&calls))
            .unwrap_or_default()
    }

    /// Drop all recorded calls.
    pub fn reset(&self) {
        if let Ok(mut calls) = self.calls.write() {
            calls.clear();
        }
    }

    /// Export all calls to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.all())
    }
}

/// Builder for recording a call with optional context.
pub struct TrackedCallBuilder<'a> {
    tracker: &'a CostTracker,
    model: String,
    task: Option<String>,
    provider: Option<String>,
    usage: TokenUsage,
    cost_usd: f64,
}

impl<'a> TrackedCallBuilder<'a> {
    fn new(tracker: &'a CostTracker) -> Self {
        Self {
            tracker,
            model: String::new(),
            task: None,
            provider: None,
            usage: TokenUsage::default(),
            cost_usd: 0.0,
        }
    }

    /// Set the model name.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the enrichment task.
    #[must_use]
    pub fn task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Set the provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Set the token usage.
    #[must_use]
    pub fn usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Set the cost in USD.
    #[must_use]
    pub fn cost(mut self, cost_usd: f64) -> Self {
        self.cost_usd = cost_usd;
        self
    }

    /// Record the call and return it.
    pub fn record(self) -> TrackedCall {
        let call = TrackedCall {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            model: self.model,
            task: self.task,
            provider: self.provider,
            usage: self.usage,
            cost_usd: self.cost_usd,
        };
        self.tracker.push(call.clone());
        call
    }
}
