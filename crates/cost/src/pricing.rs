//! Static per-model token pricing.
//!
//! Prices are USD per 1M tokens. Lookups go through [`normalize_model_name`]
//! so dated or aliased model ids (`gpt-4o-2024-08-06`,
//! `claude-3-5-sonnet-20241022`) resolve to a stable table key.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::usage::TokenUsage;

const TOKENS_PER_MILLION: f64 = 1_000_000.0;

/// Input/output price for a model, in USD per 1M tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// USD per 1M prompt tokens.
    pub input: f64,
    /// USD per 1M completion tokens.
    pub output: f64,
}

impl ModelPricing {
    /// Create a pricing entry.
    #[must_use]
    pub const fn new(input: f64, output: f64) -> Self {
        Self { input, output }
    }

    /// Price a token usage sample.
    #[must_use]
    pub fn cost(&self, usage: &TokenUsage) -> f64 {
        self.cost_for(usage.prompt_tokens, usage.completion_tokens)
    }

    /// Price raw prompt/completion token counts.
    #[must_use]
    pub fn cost_for(&self, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        (f64::from(prompt_tokens) * self.input + f64::from(completion_tokens) * self.output)
            / TOKENS_PER_MILLION
    }
}

/// Blended rate applied to models missing from the table.
pub const FALLBACK_PRICING: ModelPricing = ModelPricing::new(1.0, 3.0);

const MODEL_PRICING: &[(&str, ModelPricing)] = &[
    // OpenAI
    ("gpt-4o", ModelPricing::new(2.50, 10.00)),
    ("gpt-4o-mini", ModelPricing::new(0.15, 0.60)),
    ("gpt-4-turbo", ModelPricing::new(10.00, 30.00)),
    ("gpt-3.5-turbo", ModelPricing::new(0.50, 1.50)),
    // Anthropic
    ("claude-sonnet-4", ModelPricing::new(3.00, 15.00)),
    ("claude-sonnet-3.5", ModelPricing::new(3.00, 15.00)),
    ("claude-haiku-3.5", ModelPricing::new(0.80, 4.00)),
    ("claude-opus-3", ModelPricing::new(15.00, 75.00)),
    // Embeddings
    ("text-embedding-3-small", ModelPricing::new(0.02, 0.02)),
    ("text-embedding-3-large", ModelPricing::new(0.13, 0.13)),
    ("text-embedding-ada-002", ModelPricing::new(0.10, 0.10)),
];

/// Look up pricing for an exact table key.
#[must_use]
pub fn model_pricing(model: &str) -> Option<ModelPricing> {
    MODEL_PRICING
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, pricing)| *pricing)
}

/// Pricing for a model, or [`FALLBACK_PRICING`] when unknown. Does not log.
#[must_use]
pub fn pricing_or_fallback(model: &str) -> ModelPricing {
    model_pricing(&normalize_model_name(model)).unwrap_or(FALLBACK_PRICING)
}

/// All models with a table entry.
pub fn known_models() -> impl Iterator<Item = &'static str> {
    MODEL_PRICING.iter().map(|(name, _)| *name)
}

/// Price `usage` for a model name that is already a table key.
///
/// Unknown models are priced at [`FALLBACK_PRICING`] and logged; the result
/// is never silently zero.
#[must_use]
pub fn calculate_cost(model: &str, usage: &TokenUsage) -> f64 {
    if let Some(pricing) = model_pricing(model) {
        return pricing.cost(usage);
    }

    warn!(
        model,
        input_per_million = FALLBACK_PRICING.input,
        output_per_million = FALLBACK_PRICING.output,
        "Unknown model pricing, using fallback estimate"
    );
    FALLBACK_PRICING.cost(usage)
}

/// Normalize `model` and price `usage` against the table.
#[must_use]
pub fn price(model: &str, usage: &TokenUsage) -> f64 {
    calculate_cost(&normalize_model_name(model), usage)
}

/// Map a provider model id onto a pricing table key.
///
/// Exact keys pass through. Otherwise the trailing `-` segment (a date or
/// version suffix) is dropped if that yields a key, then family aliases are
/// matched. Anything unrecognised is returned unchanged.
#[must_use]
pub fn normalize_model_name(model: &str) -> String {
    if model_pricing(model).is_some() {
        return model.to_string();
    }

    if let Some((base, _suffix)) = model.rsplit_once('-') {
        if model_pricing(base).is_some() {
            return base.to_string();
        }
    }

    if model.contains("sonnet") {
        if model.contains("3.5") || model.contains("3-5") {
            return "claude-sonnet-3.5".to_string();
        }
        return "claude-sonnet-4".to_string();
    }
    if model.contains("haiku") {
        return "claude-haiku-3.5".to_string();
    }
    if model.contains("opus") {
        return "claude-opus-3".to_string();
    }

    for family in ["gpt-4o-mini", "gpt-4o", "gpt-4-turbo", "gpt-3.5-turbo"] {
        if model.contains(family) {
            return family.to_string();
        }
    }

    model.to_string()
}

/// Rough token count for `text` (about four characters per token).
#[must_use]
pub fn estimate_tokens(text: &str) -> u32 {
    u32::try_from(text.chars().count().div_ceil(4)).unwrap_or(u32::MAX)
}

/// Format a USD amount, keeping four decimals below one cent.
#[must_use]
pub fn format_cost(cost: f64) -> String {
    if cost < 0.01 {
        format!("${cost:.4}")
    } else {
        format!("${cost:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_known_model_cost() {
        let usage = TokenUsage::new(1_000_000, 1_000_000);
        assert!(approx(calculate_cost("gpt-4o", &usage), 12.50));
        assert!(approx(calculate_cost("gpt-4o-mini", &usage), 0.75));
        assert!(approx(calculate_cost("claude-opus-3", &usage), 90.0));
    }

    #[test]
    fn test_small_usage_cost() {
        let usage = TokenUsage::new(500, 100);
        // 500 * 2.5 / 1M + 100 * 10 / 1M
        assert!(approx(calculate_cost("gpt-4o", &usage), 0.00225));
    }

    #[test]
    fn test_unknown_model_uses_fallback_rate() {
        let usage = TokenUsage::new(1000, 1000);
        let cost = calculate_cost("mystery-model", &usage);
        assert!(approx(cost, (1000.0 * 1.0 + 1000.0 * 3.0) / 1_000_000.0));
        assert!(cost > 0.0);
    }

    #[test]
    fn test_cost_is_monotonic_and_non_negative() {
        for model in known_models().chain(["unknown-model"]) {
            let mut previous = 0.0;
            for tokens in [0, 1, 10, 1_000, 250_000] {
                let by_prompt = price(model, &TokenUsage::new(tokens, 50));
                let by_completion = price(model, &TokenUsage::new(50, tokens));
                assert!(by_prompt >= 0.0 && by_completion >= 0.0);
                let current = price(model, &TokenUsage::new(tokens, tokens));
                assert!(current >= previous, "{model} not monotonic at {tokens}");
                previous = current;
            }
        }
    }

    #[test]
    fn test_normalize_exact_keys_pass_through() {
        assert_eq!(normalize_model_name("gpt-4o-mini"), "gpt-4o-mini");
        assert_eq!(normalize_model_name("gpt-4o"), "gpt-4o");
        assert_eq!(
            normalize_model_name("text-embedding-3-small"),
            "text-embedding-3-small"
        );
    }

    #[test]
    fn test_normalize_strips_version_suffix() {
        assert_eq!(normalize_model_name("gpt-4-turbo-preview"), "gpt-4-turbo");
        assert_eq!(normalize_model_name("claude-sonnet-4-20250514"), "claude-sonnet-4");
    }

    #[test]
    fn test_normalize_family_aliases() {
        assert_eq!(normalize_model_name("gpt-4o-2024-08-06"), "gpt-4o");
        assert_eq!(normalize_model_name("gpt-4o-mini-2024-07-18"), "gpt-4o-mini");
        assert_eq!(
            normalize_model_name("claude-3-5-sonnet-20241022"),
            "claude-sonnet-3.5"
        );
        assert_eq!(normalize_model_name("claude-sonnet-4-5-20250929"), "claude-sonnet-4");
        assert_eq!(normalize_model_name("claude-3-5-haiku-latest"), "claude-haiku-3.5");
        assert_eq!(normalize_model_name("claude-3-opus-20240229"), "claude-opus-3");
        assert_eq!(normalize_model_name("llama-3-70b"), "llama-3-70b");
    }

    #[test]
    fn test_model_pricing_lookup() {
        assert_eq!(
            model_pricing("claude-haiku-3.5"),
            Some(ModelPricing::new(0.80, 4.00))
        );
        assert_eq!(model_pricing("gpt-5"), None);
        assert_eq!(pricing_or_fallback("gpt-5"), FALLBACK_PRICING);
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_format_cost() {
        assert_eq!(format_cost(0.001_23), "$0.0012");
        assert_eq!(format_cost(0.0), "$0.0000");
        assert_eq!(format_cost(0.01), "$0.01");
        assert_eq!(format_cost(12.346), "$12.35");
    }
}
