#![allow(clippy::doc_markdown)] // Allow brand names like OpenAI, Anthropic without backticks

//! Token pricing and cost accounting for LLM enrichment.
//!
//! This crate is the leaf of the enrichment stack:
//!
//! - **Pricing** - a static USD-per-1M-token table for OpenAI, Anthropic and
//!   embedding models, model-name normalization, and cost formatting
//! - **Tracking** - a per-run [`CostTracker`] that records every priced call
//!   and produces a [`CostSummary`]
//!
//! ## Quick Start
//!
//! ```rust
//! use stash_cost::{format_cost, price, TokenUsage};
//!
//! let usage = TokenUsage::new(1_200, 150);
//!
//! // Dated model ids normalize onto the pricing table.
//! let cost = price("gpt-4o-2024-08-06", &usage);
//! assert_eq!(format_cost(cost), "$0.0045");
//! ```
//!
//! Unknown models are priced at [`FALLBACK_PRICING`] and emit a `tracing`
//! warning, so a typo in a model name never reads as a free call.

pub mod pricing;
pub mod tracking;
mod usage;

pub use pricing::{
    calculate_cost, estimate_tokens, format_cost, known_models, model_pricing,
    normalize_model_name, price, pricing_or_fallback, ModelPricing, FALLBACK_PRICING,
};
pub use tracking::{CostSummary, CostTracker, TrackedCall, TrackedCallBuilder};
pub use usage::TokenUsage;
