//! Pairwise relationship detection between enriched bookmarks.
//!
//! Four independent heuristics score every unordered pair. A candidate is
//! kept per type only above that type's threshold, and each bookmark then
//! keeps its own strongest `max_per_bookmark` candidates. Selection is per
//! endpoint: a pair survives if either side ranks it in its top-K.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Bookmark, Category, Connection, ConnectionType};

/// Default number of connections kept per bookmark.
pub const DEFAULT_MAX_PER_BOOKMARK: usize = 5;

const SAME_AUTHOR_BASE: f64 = 0.8;
const SAME_SOURCE_BONUS: f64 = 0.1;

const TOPIC_MATCH_SCORE: f64 = 0.6;
const THEME_SCORE_PER_MATCH: f64 = 0.15;
const THEME_SCORE_CAP: f64 = 0.4;
const CATEGORY_MATCH_BONUS: f64 = 0.1;

const MIN_TOKEN_CHARS: usize = 3;
const THEME_OVERLAP_BOOST: f64 = 0.2;

const HOUR_MS: i64 = 60 * 60 * 1000;
const DAY_MS: i64 = 24 * HOUR_MS;
const WEEK_MS: i64 = 7 * DAY_MS;

/// The metadata fields connection scoring looks at.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionMetadata {
    pub primary_topic: Option<String>,
    pub key_themes: Option<Vec<String>>,
    pub category: Option<Category>,
}

/// A bookmark plus whatever enrichment produced for it.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedBookmark {
    pub bookmark: Bookmark,
    pub metadata: Option<ConnectionMetadata>,
}

impl EnrichedBookmark {
    pub fn new(bookmark: Bookmark, metadata: Option<ConnectionMetadata>) -> Self {
        Self { bookmark, metadata }
    }

    fn themes(&self) -> Option<&[String]> {
        self.metadata.as_ref()?.key_themes.as_deref()
    }
}

/// Minimum score, exclusive, for a candidate of each type.
#[must_use]
pub fn threshold(connection_type: ConnectionType) -> f64 {
    match connection_type {
        ConnectionType::SameAuthor => 0.0,
        ConnectionType::SharedTopic => 0.3,
        ConnectionType::SemanticSimilarity => 0.4,
        ConnectionType::TemporalProximity => 0.5,
    }
}

/// Detect connections across `bookmarks`.
///
/// Output order is deterministic: bookmarks in input order, each one's
/// selections strongest first, with a pair already emitted by an earlier
/// bookmark skipped.
#[must_use]
pub fn detect_connections(
    bookmarks: &[EnrichedBookmark],
    max_per_bookmark: usize,
) -> Vec<Connection> {
    let n = bookmarks.len();
    if n < 2 || max_per_bookmark == 0 {
        return Vec::new();
    }

    // candidates[k] holds indexes into `all` for every candidate touching k.
    let mut all: Vec<Connection> = Vec::new();
    let mut candidates: Vec<Vec<usize>> = vec![Vec::new(); n];

    for i in 0..n {
        for j in (i + 1)..n {
            for (connection_type, score) in score_pair(&bookmarks[i], &bookmarks[j]) {
                if score <= threshold(connection_type) {
                    continue;
                }
                let index = all.len();
                all.push(Connection {
                    bookmark_id_1: bookmarks[i].bookmark.id.clone(),
                    bookmark_id_2: bookmarks[j].bookmark.id.clone(),
                    connection_type,
                    strength_score: score,
                });
                candidates[i].push(index);
                candidates[j].push(index);
            }
        }
    }

    let mut emitted: HashSet<usize> = HashSet::new();
    let mut connections = Vec::new();

    for mut own in candidates {
        // Stable sort keeps pair order among equal strengths.
        own.sort_by(|a, b| all[*b].strength_score.total_cmp(&all[*a].strength_score));
        for index in own.into_iter().take(max_per_bookmark) {
            if emitted.insert(index) {
                connections.push(all[index].clone());
            }
        }
    }

    connections
}

fn score_pair(a: &EnrichedBookmark, b: &EnrichedBookmark) -> [(ConnectionType, f64); 4] {
    [
        (ConnectionType::SameAuthor, same_author_score(&a.bookmark, &b.bookmark)),
        (ConnectionType::SharedTopic, shared_topic_score(a, b)),
        (ConnectionType::SemanticSimilarity, semantic_similarity_score(a, b)),
        (
            ConnectionType::TemporalProximity,
            temporal_proximity_score(a.bookmark.bookmarked_at, b.bookmark.bookmarked_at),
        ),
    ]
}

/// 0.8 for the same author (case-insensitive), plus 0.1 on the same source.
#[must_use]
pub fn same_author_score(a: &Bookmark, b: &Bookmark) -> f64 {
    if a.author.to_lowercase() != b.author.to_lowercase() {
        return 0.0;
    }
    let mut score = SAME_AUTHOR_BASE;
    if a.source == b.source {
        score += SAME_SOURCE_BONUS;
    }
    score.min(1.0)
}

/// Topic, theme and category agreement. 0 unless both sides have metadata.
#[must_use]
pub fn shared_topic_score(a: &EnrichedBookmark, b: &EnrichedBookmark) -> f64 {
    let (Some(meta_a), Some(meta_b)) = (&a.metadata, &b.metadata) else {
        return 0.0;
    };

    let mut score = 0.0;

    if let (Some(topic_a), Some(topic_b)) = (&meta_a.primary_topic, &meta_b.primary_topic) {
        if topic_a.to_lowercase() == topic_b.to_lowercase() {
            score += TOPIC_MATCH_SCORE;
        }
    }

    if let (Some(themes_a), Some(themes_b)) = (&meta_a.key_themes, &meta_b.key_themes) {
        let shared = shared_theme_count(themes_a, themes_b);
        if shared > 0 {
            score += (shared as f64 * THEME_SCORE_PER_MATCH).min(THEME_SCORE_CAP);
        }
    }

    if let (Some(cat_a), Some(cat_b)) = (meta_a.category, meta_b.category) {
        if cat_a == cat_b {
            score += CATEGORY_MATCH_BONUS;
        }
    }

    score.min(1.0)
}

/// Jaccard similarity of content words, boosted by 0.2 on any theme overlap.
#[must_use]
pub fn semantic_similarity_score(a: &EnrichedBookmark, b: &EnrichedBookmark) -> f64 {
    let words_a = content_tokens(&a.bookmark.content);
    let words_b = content_tokens(&b.bookmark.content);
    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }

    let intersection = words_a.intersection(&words_b).count();
    let union = words_a.union(&words_b).count();
    let jaccard = intersection as f64 / union as f64;

    let boost = match (a.themes(), b.themes()) {
        (Some(themes_a), Some(themes_b)) if shared_theme_count(themes_a, themes_b) > 0 => {
            THEME_OVERLAP_BOOST
        }
        _ => 0.0,
    };

    (jaccard + boost).min(1.0)
}

/// Step function of the gap between two bookmark times.
///
/// Under an hour 0.9, under a day 0.7, under a week 0.5, then a linear decay
/// to 0 at four weeks.
#[must_use]
pub fn temporal_proximity_score(a: DateTime<Utc>, b: DateTime<Utc>) -> f64 {
    let diff_ms = (a - b).num_milliseconds().abs();

    if diff_ms < HOUR_MS {
        0.9
    } else if diff_ms < DAY_MS {
        0.7
    } else if diff_ms < WEEK_MS {
        0.5
    } else if diff_ms < 4 * WEEK_MS {
        let decay = (diff_ms - WEEK_MS) as f64 / (3 * WEEK_MS) as f64;
        (0.5 - decay * 0.5).max(0.0)
    } else {
        0.0
    }
}

/// Lower-cased whitespace-separated words longer than three characters.
fn content_tokens(content: &str) -> HashSet<String> {
    content
        .to_lowercase()
        .split_whitespace()
        .filter(|w| w.chars().count() > MIN_TOKEN_CHARS)
        .map(str::to_string)
        .collect()
}

fn shared_theme_count(a: &[String], b: &[String]) -> usize {
    let b: HashSet<String> = b.iter().map(|t| t.to_lowercase()).collect();
    a.iter()
        .map(|t| t.to_lowercase())
        .collect::<HashSet<_>>()
        .iter()
        .filter(|t| b.contains(*t))
        .count()
}

/// Aggregate statistics over a set of connections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSummary {
    pub total_connections: usize,
    /// Connections divided by the number of distinct endpoints.
    pub avg_connections_per_bookmark: f64,
    /// Every type is present, zero when absent.
    pub by_type: BTreeMap<ConnectionType, usize>,
    pub avg_strength_by_type: BTreeMap<ConnectionType, f64>,
}

#[must_use]
pub fn connection_summary(connections: &[Connection]) -> ConnectionSummary {
    let mut by_type: BTreeMap<ConnectionType, usize> =
        ConnectionType::all().iter().map(|t| (*t, 0)).collect();
    let mut strength_sum: BTreeMap<ConnectionType, f64> =
        ConnectionType::all().iter().map(|t| (*t, 0.0)).collect();
    let mut endpoints: HashSet<&str> = HashSet::new();

    for connection in connections {
        *by_type.entry(connection.connection_type).or_default() += 1;
        *strength_sum.entry(connection.connection_type).or_default() += connection.strength_score;
        endpoints.insert(&connection.bookmark_id_1);
        endpoints.insert(&connection.bookmark_id_2);
    }

    let avg_strength_by_type = strength_sum
        .into_iter()
        .map(|(kind, sum)| {
            let count = by_type.get(&kind).copied().unwrap_or(0);
            let avg = if count > 0 { sum / count as f64 } else { 0.0 };
            (kind, avg)
        })
        .collect();

    ConnectionSummary {
        total_connections: connections.len(),
        avg_connections_per_bookmark: if endpoints.is_empty() {
            0.0
        } else {
            connections.len() as f64 / endpoints.len() as f64
        },
        by_type,
        avg_strength_by_type,
    }
}

/// Connections with strength at least `min_strength`.
#[must_use]
pub fn filter_by_strength(connections: &[Connection], min_strength: f64) -> Vec<Connection> {
    connections
        .iter()
        .filter(|c| c.strength_score >= min_strength)
        .cloned()
        .collect()
}

/// One connection seen from a single bookmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookmarkConnection {
    pub connected_bookmark_id: String,
    pub connection_type: ConnectionType,
    pub strength_score: f64,
}

/// Connections touching `bookmark_id`, expressed as the other endpoint.
#[must_use]
pub fn bookmark_connections(
    bookmark_id: &str,
    connections: &[Connection],
) -> Vec<BookmarkConnection> {
    connections
        .iter()
        .filter(|c| c.involves(bookmark_id))
        .map(|c| BookmarkConnection {
            connected_bookmark_id: if c.bookmark_id_1 == bookmark_id {
                c.bookmark_id_2.clone()
            } else {
                c.bookmark_id_1.clone()
            },
            connection_type: c.connection_type,
            strength_score: c.strength_score,
        })
        .collect()
}
