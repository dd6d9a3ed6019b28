//! In-memory store.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::BookmarkStore;
use crate::error::{StoreError, StoreResult};
use crate::models::{Bookmark, BookmarkMetadata, Connection, EnrichmentLog, NewEnrichmentLog};

/// Complete store contents, as persisted by [`super::FileStore`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub bookmarks: Vec<Bookmark>,
    #[serde(default)]
    pub metadata: Vec<BookmarkMetadata>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub enrichment_logs: Vec<EnrichmentLog>,
}

impl StoreSnapshot {
    fn bookmark_mut(&mut self, id: &str) -> StoreResult<&mut Bookmark> {
        self.bookmarks
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    pub(crate) fn insert_bookmark(&mut self, bookmark: Bookmark) -> StoreResult<()> {
        if self.bookmarks.iter().any(|b| b.id == bookmark.id) {
            return Err(StoreError::Duplicate { id: bookmark.id });
        }
        self.bookmarks.push(bookmark);
        Ok(())
    }

    pub(crate) fn update_enrichment_version(&mut self, id: &str, version: &str) -> StoreResult<()> {
        let bookmark = self.bookmark_mut(id)?;
        bookmark.enrichment_version = Some(version.to_string());
        bookmark.updated_at = Utc::now();
        Ok(())
    }

    pub(crate) fn upsert_metadata(&mut self, metadata: BookmarkMetadata) {
        match self
            .metadata
            .iter_mut()
            .find(|m| m.bookmark_id == metadata.bookmark_id)
        {
            Some(existing) => *existing = metadata,
            None => self.metadata.push(metadata),
        }
    }

    pub(crate) fn upsert_connection(&mut self, connection: Connection) {
        let connection = connection.canonical();
        match self
            .connections
            .iter_mut()
            .find(|c| c.key() == connection.key())
        {
            Some(existing) => *existing = connection,
            None => self.connections.push(connection),
        }
    }

    pub(crate) fn delete_connections_within(&mut self, ids: &[String]) -> usize {
        let before = self.connections.len();
        self.connections.retain(|c| {
            !(ids.contains(&c.bookmark_id_1) && ids.contains(&c.bookmark_id_2))
        });
        before - self.connections.len()
    }

    pub(crate) fn push_log(&mut self, entry: NewEnrichmentLog) -> EnrichmentLog {
        let log = EnrichmentLog::from_new(entry);
        self.enrichment_logs.push(log.clone());
        log
    }
}

/// Store backed by a lock-guarded [`StoreSnapshot`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreSnapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            state: RwLock::new(snapshot),
        }
    }

    /// Seed the store with bookmarks, skipping ids already present.
    pub async fn with_bookmarks(bookmarks: impl IntoIterator<Item = Bookmark>) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.write().await;
            for bookmark in bookmarks {
                let _ = state.insert_bookmark(bookmark);
            }
        }
        store
    }

    /// Copy of the current contents.
    pub async fn snapshot(&self) -> StoreSnapshot {
        self.state.read().await.clone()
    }

    /// Apply `f` to the contents under the write lock.
    pub(crate) async fn write<T>(&self, f: impl FnOnce(&mut StoreSnapshot) -> T) -> T {
        let mut state = self.state.write().await;
        f(&mut state)
    }
}

#[async_trait]
impl BookmarkStore for MemoryStore {
    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Bookmark>> {
        let state = self.state.read().await;
        Ok(state.bookmarks.iter().find(|b| b.id == id).cloned())
    }

    async fn find_unenriched(&self) -> StoreResult<Vec<Bookmark>> {
        let state = self.state.read().await;
        let mut bookmarks: Vec<Bookmark> = state
            .bookmarks
            .iter()
            .filter(|b| !b.is_enriched())
            .cloned()
            .collect();
        bookmarks.sort_by_key(|b| b.created_at);
        Ok(bookmarks)
    }

    async fn insert_bookmark(&self, bookmark: Bookmark) -> StoreResult<()> {
        self.write(|s| s.insert_bookmark(bookmark)).await
    }

    async fn update_enrichment_version(&self, id: &str, version: &str) -> StoreResult<()> {
        self.write(|s| s.update_enrichment_version(id, version))
            .await
    }

    async fn count(&self) -> StoreResult<usize> {
        Ok(self.state.read().await.bookmarks.len())
    }

    async fn upsert_metadata(&self, metadata: BookmarkMetadata) -> StoreResult<()> {
        self.write(|s| s.upsert_metadata(metadata)).await;
        Ok(())
    }

    async fn find_metadata(&self, bookmark_id: &str) -> StoreResult<Option<BookmarkMetadata>> {
        let state = self.state.read().await;
        Ok(state
            .metadata
            .iter()
            .find(|m| m.bookmark_id == bookmark_id)
            .cloned())
    }

    async fn all_metadata(&self) -> StoreResult<Vec<BookmarkMetadata>> {
        Ok(self.state.read().await.metadata.clone())
    }

    async fn create_connection(&self, connection: Connection) -> StoreResult<()> {
        self.write(|s| s.upsert_connection(connection)).await;
        Ok(())
    }

    async fn delete_connections_within(&self, ids: &[String]) -> StoreResult<usize> {
        Ok(self.write(|s| s.delete_connections_within(ids)).await)
    }

    async fn find_connections(&self, bookmark_id: &str) -> StoreResult<Vec<Connection>> {
        let state = self.state.read().await;
        Ok(state
            .connections
            .iter()
            .filter(|c| c.involves(bookmark_id))
            .cloned()
            .collect())
    }

    async fn all_connections(&self) -> StoreResult<Vec<Connection>> {
        Ok(self.state.read().await.connections.clone())
    }

    async fn create_enrichment_log(&self, entry: NewEnrichmentLog) -> StoreResult<EnrichmentLog> {
        Ok(self.write(|s| s.push_log(entry)).await)
    }

    async fn enrichment_logs(&self) -> StoreResult<Vec<EnrichmentLog>> {
        Ok(self.state.read().await.enrichment_logs.clone())
    }
}
