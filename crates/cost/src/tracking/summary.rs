//! Aggregated view over tracked calls.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::models::TrackedCall;

/// Totals and per-model breakdowns for a set of calls.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostSummary {
    /// Total cost in USD.
    pub total_cost: f64,
    /// Total tokens across all calls.
    pub total_tokens: u64,
    /// Number of recorded calls.
    pub call_count: u64,
    /// `total_cost / call_count`, or 0 with no calls.
    pub average_cost_per_call: f64,
    /// Cost keyed by model name.
    pub cost_by_model: HashMap<String, f64>,
    /// Tokens keyed by model name.
    pub tokens_by_model: HashMap<String, u64>,
    /// Cost keyed by enrichment task, for calls that carried one.
    #[serde(default)]
    pub cost_by_task: HashMap<String, f64>,
}

impl CostSummary {
    /// Aggregate a slice of calls.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // call counts stay far below 2^52
    pub fn from_calls(calls: &[TrackedCall]) -> Self {
        let mut summary = Self::default();

        for call in calls {
            summary.total_cost += call.cost_usd;
            summary.total_tokens += call.total_tokens();
            summary.call_count += 1;

            *summary
                .cost_by_model
                .entry(call.model.clone())
                .or_default() += call.cost_usd;
            *summary
                .tokens_by_model
                .entry(call.model.clone())
                .or_default() += call.total_tokens();

            if let Some(ref task) = call.task {
                *summary.cost_by_task.entry(task.clone()).or_default() += call.cost_usd;
            }
        }

        if summary.call_count > 0 {
            summary.average_cost_per_call = summary.total_cost / summary.call_count as f64;
        }

        summary
    }
}
