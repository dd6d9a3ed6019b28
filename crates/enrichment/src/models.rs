//! Bookmark, metadata and connection records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a bookmark was saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookmarkSource {
    Twitter,
    Linkedin,
    Eagle,
}

impl BookmarkSource {
    /// Human-readable source name used in prompts.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            BookmarkSource::Twitter => "Twitter/X",
            BookmarkSource::Linkedin => "LinkedIn",
            BookmarkSource::Eagle => "Eagle",
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            BookmarkSource::Twitter => "twitter",
            BookmarkSource::Linkedin => "linkedin",
            BookmarkSource::Eagle => "eagle",
        }
    }
}

impl fmt::Display for BookmarkSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A saved social-media post.
///
/// Only `enrichment_version` is ever changed by enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
    pub source: BookmarkSource,
    /// Identifier on the source platform.
    #[serde(default)]
    pub source_id: String,
    #[serde(default)]
    pub url: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_url: Option<String>,
    pub content: String,
    pub bookmarked_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    /// `None` until the bookmark has been enriched.
    #[serde(default)]
    pub enrichment_version: Option<String>,
}

impl Bookmark {
    /// Create an unenriched bookmark with minimal required fields.
    pub fn new(
        id: impl Into<String>,
        source: BookmarkSource,
        author: impl Into<String>,
        content: impl Into<String>,
        bookmarked_at: DateTime<Utc>,
    ) -> Self {
        let id = id.into();
        Self {
            source_id: id.clone(),
            id,
            source,
            url: String::new(),
            author: author.into(),
            author_url: None,
            content: content.into(),
            bookmarked_at,
            created_at: bookmarked_at,
            updated_at: bookmarked_at,
            enrichment_version: None,
        }
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    #[must_use]
    pub fn with_author_url(mut self, url: impl Into<String>) -> Self {
        self.author_url = Some(url.into());
        self
    }

    pub fn is_enriched(&self) -> bool {
        self.enrichment_version.is_some()
    }
}

impl AsRef<Bookmark> for Bookmark {
    fn as_ref(&self) -> &Bookmark {
        self
    }
}

/// The closed set of bookmark categories.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Category {
    /// Creative references and design inspiration.
    #[default]
    #[serde(rename = "Inspo")]
    Inspo,
    /// Prospects, clients and market signals.
    #[serde(rename = "Leads/Markets")]
    LeadsMarkets,
    /// Learning resources and how-to content.
    #[serde(rename = "Tutorials")]
    Tutorials,
}

impl Category {
    /// Get all categories.
    #[must_use]
    pub fn all() -> &'static [Category] {
        &[Category::Inspo, Category::LeadsMarkets, Category::Tutorials]
    }

    /// Parse the exact canonical name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Inspo" => Some(Category::Inspo),
            "Leads/Markets" => Some(Category::LeadsMarkets),
            "Tutorials" => Some(Category::Tutorials),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Inspo => "Inspo",
            Category::LeadsMarkets => "Leads/Markets",
            Category::Tutorials => "Tutorials",
        }
    }

    /// Get the category description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Category::Inspo => "Creative references, aesthetic signals, design inspiration",
            Category::LeadsMarkets => {
                "Potential clients, business opportunities, industry insights"
            }
            Category::Tutorials => "Learning resources, how-to content, skill-building guides",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// AI-derived fields for one bookmark. Upserted by `bookmark_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookmarkMetadata {
    pub bookmark_id: String,
    pub intent: Option<String>,
    pub author_bio: Option<String>,
    pub company: Option<String>,
    pub primary_topic: Option<String>,
    pub key_themes: Option<Vec<String>>,
    pub category: Option<Category>,
    pub category_confidence: Option<f64>,
    pub enrichment_quality_score: Option<f64>,
}

/// Heuristic relationship dimension between two bookmarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    SameAuthor,
    SharedTopic,
    SemanticSimilarity,
    TemporalProximity,
}

impl ConnectionType {
    #[must_use]
    pub fn all() -> &'static [ConnectionType] {
        &[
            ConnectionType::SameAuthor,
            ConnectionType::SharedTopic,
            ConnectionType::SemanticSimilarity,
            ConnectionType::TemporalProximity,
        ]
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionType::SameAuthor => "same_author",
            ConnectionType::SharedTopic => "shared_topic",
            ConnectionType::SemanticSimilarity => "semantic_similarity",
            ConnectionType::TemporalProximity => "temporal_proximity",
        }
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scored relationship between two bookmarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub bookmark_id_1: String,
    pub bookmark_id_2: String,
    pub connection_type: ConnectionType,
    /// Always in `[0, 1]`.
    pub strength_score: f64,
}

impl Connection {
    /// The same connection with its pair in lexicographic order.
    ///
    /// Storage keys connections on the ordered pair plus type.
    #[must_use]
    pub fn canonical(mut self) -> Self {
        if self.bookmark_id_1 > self.bookmark_id_2 {
            std::mem::swap(&mut self.bookmark_id_1, &mut self.bookmark_id_2);
        }
        self
    }

    /// Whether `bookmark_id` is either endpoint.
    pub fn involves(&self, bookmark_id: &str) -> bool {
        self.bookmark_id_1 == bookmark_id || self.bookmark_id_2 == bookmark_id
    }

    /// Storage identity: (lower id, higher id, type).
    pub fn key(&self) -> (&str, &str, ConnectionType) {
        let (a, b) = if self.bookmark_id_1 <= self.bookmark_id_2 {
            (self.bookmark_id_1.as_str(), self.bookmark_id_2.as_str())
        } else {
            (self.bookmark_id_2.as_str(), self.bookmark_id_1.as_str())
        };
        (a, b, self.connection_type)
    }
}

/// What a batch run was primarily doing, for the enrichment log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentStep {
    Intent,
    Context,
    Category,
    Connections,
}

impl EnrichmentStep {
    #[must_use]
    pub fn all() -> &'static [EnrichmentStep] {
        &[
            EnrichmentStep::Intent,
            EnrichmentStep::Context,
            EnrichmentStep::Category,
            EnrichmentStep::Connections,
        ]
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrichmentStep::Intent => "intent",
            EnrichmentStep::Context => "context",
            EnrichmentStep::Category => "category",
            EnrichmentStep::Connections => "connections",
        }
    }

    /// Share of the whole run this step represents.
    #[must_use]
    pub fn weight(&self) -> f64 {
        match self {
            EnrichmentStep::Intent | EnrichmentStep::Context => 0.35,
            EnrichmentStep::Category | EnrichmentStep::Connections => 0.15,
        }
    }
}

impl fmt::Display for EnrichmentStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A new enrichment log entry, before the store assigns identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEnrichmentLog {
    pub bookmarks_processed: usize,
    pub tokens_used: u64,
    pub cost: f64,
    pub model_used: String,
    pub enrichment_type: EnrichmentStep,
}

/// One summary row per batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentLog {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub bookmarks_processed: usize,
    pub tokens_used: u64,
    pub cost: f64,
    pub model_used: String,
    pub enrichment_type: EnrichmentStep,
}

impl EnrichmentLog {
    /// Stamp a new entry with an id and the current time.
    pub fn from_new(entry: NewEnrichmentLog) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            bookmarks_processed: entry.bookmarks_processed,
            tokens_used: entry.tokens_used,
            cost: entry.cost,
            model_used: entry.model_used,
            enrichment_type: entry.enrichment_type,
        }
    }
}
