//! Structured metadata extraction: author, company, topic and themes.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use stash_llm::{parse_json_response, EnrichmentTask, LlmClient, TaskResult};

use super::prompts::PromptManager;
use super::{estimate_task_cost, run_batch, BatchOutcome, BatchProgress};
use crate::error::EnrichmentResult;
use crate::models::Bookmark;

pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(200);

/// Topic used when the response carries none.
pub const UNKNOWN_TOPIC: &str = "Unknown";

/// Topic used when the response cannot be parsed at all.
pub const GENERAL_TOPIC: &str = "General";

const PROMPT_OVERHEAD_CHARS: usize = 500;
const ESTIMATED_COMPLETION_TOKENS: u32 = 150;

pub const SYSTEM_PROMPT: &str = r#"You are an expert at extracting structured metadata from social media content.

Your task is to analyze a bookmark and extract:
1. Author bio/expertise (if identifiable from content or profile)
2. Company or affiliation (if mentioned)
3. Primary topic (main subject matter)
4. Key themes (2-5 relevant tags)

Be concise and accurate. If information is not available, use null or empty values.

Format your response as JSON:
{
  "author_bio": "Brief description of author's expertise" or null,
  "company": "Company name or affiliation" or null,
  "primary_topic": "Main subject area",
  "key_themes": ["Theme 1", "Theme 2", "Theme 3"]
}"#;

/// Extracted bookmark metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextResult {
    pub author_bio: Option<String>,
    pub company: Option<String>,
    pub primary_topic: String,
    pub key_themes: Vec<String>,
}

impl ContextResult {
    /// The result used when nothing could be parsed.
    pub fn general() -> Self {
        Self {
            author_bio: None,
            company: None,
            primary_topic: GENERAL_TOPIC.to_string(),
            key_themes: Vec::new(),
        }
    }
}

#[derive(Serialize)]
struct ContextPromptData<'a> {
    source: &'static str,
    author: &'a str,
    content: &'a str,
    author_url: Option<&'a str>,
}

pub fn build_context_prompt(
    prompts: &PromptManager,
    bookmark: &Bookmark,
) -> EnrichmentResult<String> {
    prompts.render(
        "context",
        &ContextPromptData {
            source: bookmark.source.display_name(),
            author: &bookmark.author,
            content: &bookmark.content,
            author_url: bookmark.author_url.as_deref(),
        },
    )
}

fn non_empty_string(json: &Map<String, Value>, key: &str) -> Option<String> {
    json.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parse model output into a [`ContextResult`]. Never fails.
pub fn parse_context_response(text: &str) -> ContextResult {
    let json = match parse_json_response::<Map<String, Value>>(text) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "Failed to parse context JSON");
            return ContextResult::general();
        }
    };

    let key_themes = match json.get("key_themes") {
        Some(Value::Array(themes)) => themes
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };

    ContextResult {
        author_bio: non_empty_string(&json, "author_bio"),
        company: non_empty_string(&json, "company"),
        primary_topic: non_empty_string(&json, "primary_topic")
            .unwrap_or_else(|| UNKNOWN_TOPIC.to_string()),
        key_themes,
    }
}

/// Extracts context metadata for bookmarks.
pub struct ContextAnalyzer {
    client: Arc<LlmClient>,
    prompts: Arc<PromptManager>,
    batch_delay: Duration,
}

impl ContextAnalyzer {
    pub fn new(client: Arc<LlmClient>, prompts: Arc<PromptManager>) -> Self {
        Self {
            client,
            prompts,
            batch_delay: DEFAULT_BATCH_DELAY,
        }
    }

    #[must_use]
    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    pub async fn analyze(
        &self,
        bookmark: &Bookmark,
    ) -> EnrichmentResult<TaskResult<ContextResult>> {
        let prompt = build_context_prompt(&self.prompts, bookmark)?;
        Ok(self
            .client
            .call_with_retry(
                EnrichmentTask::Context,
                SYSTEM_PROMPT,
                &prompt,
                parse_context_response,
            )
            .await?)
    }

    pub async fn analyze_batch(
        &self,
        bookmarks: &[Bookmark],
        on_progress: Option<BatchProgress<'_>>,
    ) -> Vec<BatchOutcome<ContextResult>> {
        run_batch(
            EnrichmentTask::Context.as_str(),
            bookmarks,
            self.batch_delay,
            on_progress,
            |bookmark| self.analyze(bookmark),
        )
        .await
    }

    pub fn estimate_cost(&self, bookmarks: &[Bookmark]) -> f64 {
        estimate_task_cost(
            bookmarks,
            PROMPT_OVERHEAD_CHARS,
            ESTIMATED_COMPLETION_TOKENS,
            self.client.routing().model_for(EnrichmentTask::Context),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookmarkSource;
    use chrono::Utc;

    #[test]
    fn test_parse_full_response() {
        let result = parse_context_response(
            r#"{
                "author_bio": "Staff engineer at a fintech",
                "company": "Ledgerly",
                "primary_topic": "Rust async",
                "key_themes": ["tokio", "performance"]
            }"#,
        );
        assert_eq!(result.author_bio.as_deref(), Some("Staff engineer at a fintech"));
        assert_eq!(result.company.as_deref(), Some("Ledgerly"));
        assert_eq!(result.primary_topic, "Rust async");
        assert_eq!(result.key_themes, vec!["tokio", "performance"]);
    }

    #[test]
    fn test_parse_defaults_missing_fields() {
        let result = parse_context_response(
            r#"{"author_bio": "", "company": null, "key_themes": "design"}"#,
        );
        assert_eq!(result.author_bio, None);
        assert_eq!(result.company, None);
        assert_eq!(result.primary_topic, UNKNOWN_TOPIC);
        assert!(result.key_themes.is_empty());
    }

    #[test]
    fn test_parse_garbage_is_general() {
        assert_eq!(parse_context_response("Sorry, I can't help."), ContextResult::general());
        assert_eq!(parse_context_response("[1, 2]"), ContextResult::general());
    }

    #[test]
    fn test_prompt_uses_linkedin_name() {
        let prompts = PromptManager::new().unwrap();
        let bookmark = Bookmark::new(
            "li-1",
            BookmarkSource::Linkedin,
            "Priya",
            "We're hiring a head of design",
            Utc::now(),
        )
        .with_author_url("https://linkedin.com/in/priya");

        let prompt = build_context_prompt(&prompts, &bookmark).unwrap();
        assert!(prompt.starts_with("Extract metadata from this LinkedIn bookmark:"));
        assert!(prompt.contains("Author Profile: https://linkedin.com/in/priya"));
        assert!(prompt.ends_with("- Key themes (2-5 tags)"));
    }
}
