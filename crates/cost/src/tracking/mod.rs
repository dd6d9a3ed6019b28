//! Per-run cost accounting.
//!
//! A [`CostTracker`] is created for one pipeline invocation and records
//! every LLM call made during it. Nothing here is global: two runs that
//! want separate totals use two trackers.
//!
//! ## Quick Start
//!
//! ```rust
//! use stash_cost::tracking::CostTracker;
//! use stash_cost::TokenUsage;
//!
//! let tracker = CostTracker::new();
//!
//! tracker.record("gpt-4o", &TokenUsage::new(600, 80), 0.0023);
//!
//! tracker
//!     .builder()
//!     .task("category")
//!     .provider("openai")
//!     .model("gpt-4o-mini")
//!     .usage(TokenUsage::new(400, 20))
//!     .cost(0.0001)
//!     .record();
//!
//! let summary = tracker.summary();
//! assert_eq!(summary.call_count, 2);
//! assert_eq!(summary.total_tokens, 1100);
//! ```

mod models;
mod summary;
mod tracker;

pub use models::TrackedCall;
pub use summary::CostSummary;
pub use tracker::{CostTracker, TrackedCallBuilder};
