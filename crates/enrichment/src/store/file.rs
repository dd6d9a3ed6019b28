//! JSON snapshot store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use super::memory::{MemoryStore, StoreSnapshot};
use super::BookmarkStore;
use crate::error::{StoreError, StoreResult};
use crate::models::{Bookmark, BookmarkMetadata, Connection, EnrichmentLog, NewEnrichmentLog};

/// Store that keeps its contents in memory and rewrites a JSON file after
/// every write.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl FileStore {
    /// Open the snapshot at `path`, starting empty if it does not exist.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let snapshot = match fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => StoreSnapshot::default(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreSnapshot::default(),
            Err(e) => {
                return Err(StoreError::Read {
                    path,
                    reason: e.to_string(),
                })
            }
        };

        debug!(
            path = %path.display(),
            bookmarks = snapshot.bookmarks.len(),
            "Opened store"
        );

        Ok(Self {
            path,
            inner: MemoryStore::from_snapshot(snapshot),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self) -> StoreResult<()> {
        let snapshot = self.inner.snapshot().await;
        let content = serde_json::to_string_pretty(&snapshot)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| self.write_error(&e))?;
        }
        fs::write(&self.path, content)
            .await
            .map_err(|e| self.write_error(&e))
    }

    fn write_error(&self, e: &std::io::Error) -> StoreError {
        StoreError::Write {
            path: self.path.clone(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl BookmarkStore for FileStore {
    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Bookmark>> {
        self.inner.find_by_id(id).await
    }

    async fn find_unenriched(&self) -> StoreResult<Vec<Bookmark>> {
        self.inner.find_unenriched().await
    }

    async fn insert_bookmark(&self, bookmark: Bookmark) -> StoreResult<()> {
        self.inner.insert_bookmark(bookmark).await?;
        self.persist().await
    }

    async fn update_enrichment_version(&self, id: &str, version: &str) -> StoreResult<()> {
        self.inner.update_enrichment_version(id, version).await?;
        self.persist().await
    }

    async fn count(&self) -> StoreResult<usize> {
        self.inner.count().await
    }

    async fn upsert_metadata(&self, metadata: BookmarkMetadata) -> StoreResult<()> {
        self.inner.upsert_metadata(metadata).await?;
        self.persist().await
    }

    async fn find_metadata(&self, bookmark_id: &str) -> StoreResult<Option<BookmarkMetadata>> {
        self.inner.find_metadata(bookmark_id).await
    }

    async fn all_metadata(&self) -> StoreResult<Vec<BookmarkMetadata>> {
        self.inner.all_metadata().await
    }

    async fn create_connection(&self, connection: Connection) -> StoreResult<()> {
        self.inner.create_connection(connection).await?;
        self.persist().await
    }

    async fn delete_connections_within(&self, ids: &[String]) -> StoreResult<usize> {
        let removed = self.inner.delete_connections_within(ids).await?;
        if removed > 0 {
            self.persist().await?;
        }
        Ok(removed)
    }

    async fn find_connections(&self, bookmark_id: &str) -> StoreResult<Vec<Connection>> {
        self.inner.find_connections(bookmark_id).await
    }

    async fn all_connections(&self) -> StoreResult<Vec<Connection>> {
        self.inner.all_connections().await
    }

    async fn create_enrichment_log(&self, entry: NewEnrichmentLog) -> StoreResult<EnrichmentLog> {
        let log = self.inner.create_enrichment_log(entry).await?;
        self.persist().await?;
        Ok(log)
    }

    async fn enrichment_logs(&self) -> StoreResult<Vec<EnrichmentLog>> {
        self.inner.enrichment_logs().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookmarkSource;
    use chrono::Utc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().join("store.json")).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_writes_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = FileStore::open(&path).await.unwrap();
        store
            .insert_bookmark(Bookmark::new(
                "li-1",
                BookmarkSource::Linkedin,
                "bob",
                "Hiring a design lead",
                Utc::now(),
            ))
            .await
            .unwrap();
        store.update_enrichment_version("li-1", "1.0").await.unwrap();

        let reopened = FileStore::open(&path).await.unwrap();
        let bookmark = reopened.find_by_id("li-1").await.unwrap().unwrap();
        assert_eq!(bookmark.author, "bob");
        assert!(bookmark.is_enriched());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_serialization_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = FileStore::open(&path).await.unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }
}
