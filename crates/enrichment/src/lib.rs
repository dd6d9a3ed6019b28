//! Bookmark enrichment for saved social-media posts.
//!
//! This crate provides:
//! - Intent, context and category analysis through the `stash-llm` client
//! - Heuristic connection detection between bookmarks
//! - A batch pipeline with progress reporting and per-run cost tracking
//! - JSON-file and in-memory bookmark stores

pub mod analysis;
pub mod config;
pub mod connections;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod store;

// Re-export main types
pub use analysis::{CategoryResult, ContextResult, IntentResult};
pub use config::PipelineConfig;
pub use connections::{detect_connections, ConnectionSummary, EnrichedBookmark};
pub use error::{EnrichmentError, EnrichmentResult, StoreError, StoreResult};
pub use models::{
    Bookmark, BookmarkMetadata, BookmarkSource, Category, Connection, ConnectionType,
    EnrichmentLog, EnrichmentStep,
};
pub use pipeline::{
    BatchEnrichmentResult, BatchError, CostEstimate, EnrichmentOptions, EnrichmentPipeline,
    EnrichmentProgress,
};
pub use store::{BookmarkStore, FileStore, MemoryStore};
