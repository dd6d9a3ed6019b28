//! Storage collaborator for bookmarks, metadata, connections and run logs.

mod file;
mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;
use crate::models::{
    Bookmark, BookmarkMetadata, Connection, EnrichmentLog, EnrichmentStep, NewEnrichmentLog,
};

pub use file::FileStore;
pub use memory::{MemoryStore, StoreSnapshot};

/// Cost and token totals for one enrichment type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostByType {
    pub enrichment_type: EnrichmentStep,
    pub cost: f64,
    pub tokens_used: u64,
}

/// Record store the pipeline reads from and writes to.
///
/// Connections are keyed on the ordered pair plus type, so
/// `create_connection` replaces an existing record with the same key.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookmarkStore: Send + Sync {
    /// Get a bookmark by id.
    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Bookmark>>;

    /// Bookmarks with no enrichment version, oldest `created_at` first.
    async fn find_unenriched(&self) -> StoreResult<Vec<Bookmark>>;

    /// Insert a new bookmark. Fails with `Duplicate` if the id is taken.
    async fn insert_bookmark(&self, bookmark: Bookmark) -> StoreResult<()>;

    /// Set the enrichment version marker on a bookmark.
    async fn update_enrichment_version(&self, id: &str, version: &str) -> StoreResult<()>;

    /// Number of stored bookmarks.
    async fn count(&self) -> StoreResult<usize>;

    /// Insert or replace the metadata record for `metadata.bookmark_id`.
    async fn upsert_metadata(&self, metadata: BookmarkMetadata) -> StoreResult<()>;

    async fn find_metadata(&self, bookmark_id: &str) -> StoreResult<Option<BookmarkMetadata>>;

    async fn all_metadata(&self) -> StoreResult<Vec<BookmarkMetadata>>;

    /// Upsert a connection on (ordered pair, type).
    async fn create_connection(&self, connection: Connection) -> StoreResult<()>;

    /// Delete connections whose endpoints are both in `ids`.
    ///
    /// Returns the number of removed records.
    async fn delete_connections_within(&self, ids: &[String]) -> StoreResult<usize>;

    /// Connections with `bookmark_id` at either endpoint.
    async fn find_connections(&self, bookmark_id: &str) -> StoreResult<Vec<Connection>>;

    async fn all_connections(&self) -> StoreResult<Vec<Connection>>;

    async fn create_enrichment_log(&self, entry: NewEnrichmentLog) -> StoreResult<EnrichmentLog>;

    /// All log entries, oldest first.
    async fn enrichment_logs(&self) -> StoreResult<Vec<EnrichmentLog>>;

    /// Sum of logged cost across every run.
    async fn total_cost(&self) -> StoreResult<f64> {
        Ok(self.enrichment_logs().await?.iter().map(|l| l.cost).sum())
    }

    /// Sum of logged tokens across every run.
    async fn total_tokens(&self) -> StoreResult<u64> {
        Ok(self
            .enrichment_logs()
            .await?
            .iter()
            .map(|l| l.tokens_used)
            .sum())
    }

    /// Logged cost and tokens grouped by enrichment type, in step order.
    async fn cost_by_type(&self) -> StoreResult<Vec<CostByType>> {
        let logs = self.enrichment_logs().await?;
        let mut totals = Vec::new();
        for step in EnrichmentStep::all() {
            let matching: Vec<&EnrichmentLog> =
                logs.iter().filter(|l| l.enrichment_type == *step).collect();
            if matching.is_empty() {
                continue;
            }
            totals.push(CostByType {
                enrichment_type: *step,
                cost: matching.iter().map(|l| l.cost).sum(),
                tokens_used: matching.iter().map(|l| l.tokens_used).sum(),
            });
        }
        Ok(totals)
    }
}
