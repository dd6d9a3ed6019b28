//! Why a bookmark was saved.

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

/// Default pause between batch items.
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(200);

/// Confidence assigned when the response is not the expected JSON.
pub const FALLBACK_CONFIDENCE: f64 = 0.6;

const PROMPT_OVERHEAD_CHARS: usize = 500;
const ESTIMATED_COMPLETION_TOKENS: u32 = 100;

pub const SYSTEM_PROMPT: &str = r#"You are an expert at analyzing social media bookmarks and understanding user intent.

Your task is to analyze a bookmark and explain WHY the user likely saved it.

Consider:
- The content topic and key insights
- The author's expertise and credibility
- Potential use cases: prospecting/leads, creative inspiration, learning/skill-building
- The actionable value this bookmark provides

Output a concise 1-2 sentence explanation that captures the user's likely motivation.

Format your response as JSON:
{
  "intent": "Brief explanation of why this was bookmarked",
  "confidence": 0.85
}

The confidence score should be between 0 and 1, where:
- 0.9-1.0: Very clear intent based on content
- 0.7-0.9: Good understanding of likely intent
- 0.5-0.7: Moderate confidence
- Below 0.5: Unclear intent"#;

/// Likely motivation for saving a bookmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    pub intent: String,
    /// Always in `[0, 1]`.
    pub confidence: f64,
}

#[derive(Serialize)]
struct IntentPromptData<'a> {
    source: &'static str,
    author: &'a str,
    content: &'a str,
    url: &'a str,
    author_url: Option<&'a str>,
}

/// Render the user prompt for `bookmark`.
pub fn build_intent_prompt(
    prompts: &PromptManager,
    bookmark: &Bookmark,
) -> EnrichmentResult<String> {
    prompts.render(
        "intent",
        &IntentPromptData {
            source: bookmark.source.display_name(),
            author: &bookmark.author,
            content: &bookmark.content,
            url: &bookmark.url,
            author_url: bookmark.author_url.as_deref(),
        },
    )
}

/// Parse model output into an [`IntentResult`]. Never fails.
///
/// JSON with a non-empty `intent` and a numeric `confidence` is taken as-is
/// with the confidence clamped. Anything else becomes the trimmed raw text at
/// [`FALLBACK_CONFIDENCE`].
pub fn parse_intent_response(text: &str) -> IntentResult {
    if let Ok(json) = parse_json_response::<Map<String, Value>>(text) {
        let intent = json.get("intent").and_then(Value::as_str).filter(|s| !s.is_empty());
        let confidence = json.get("confidence").and_then(Value::as_f64);
        if let (Some(intent), Some(confidence)) = (intent, confidence) {
            return IntentResult {
                intent: intent.to_string(),
                confidence: confidence.clamp(0.0, 1.0),
            };
        }
    }

    warn!("Intent response was not the expected JSON, using raw text");
    IntentResult {
        intent: text.trim().to_string(),
        confidence: FALLBACK_CONFIDENCE,
    }
}

/// Generates the intent for bookmarks.
pub struct IntentAnalyzer {
    client: Arc<LlmClient>,
    prompts: Arc<PromptManager>,
    batch_delay: Duration,
}

impl IntentAnalyzer {
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

    /// Generate the intent for one bookmark.
    pub async fn analyze(&self, bookmark: &Bookmark) -> EnrichmentResult<TaskResult<IntentResult>> {
        let prompt = build_intent_prompt(&self.prompts, bookmark)?;
        let result = self
            .client
            .call_with_retry(
                EnrichmentTask::Intent,
                SYSTEM_PROMPT,
                &prompt,
                parse_intent_response,
            )
            .await?;
        Ok(result)
    }

    /// Generate intents sequentially. One failure does not stop the batch.
    pub async fn analyze_batch(
        &self,
        bookmarks: &[Bookmark],
        on_progress: Option<BatchProgress<'_>>,
    ) -> Vec<BatchOutcome<IntentResult>> {
        run_batch(
            EnrichmentTask::Intent.as_str(),
            bookmarks,
            self.batch_delay,
            on_progress,
            |bookmark| self.analyze(bookmark),
        )
        .await
    }

    /// Approximate cost of running intent over `bookmarks`.
    pub fn estimate_cost(&self, bookmarks: &[Bookmark]) -> f64 {
        estimate_task_cost(
            bookmarks,
            PROMPT_OVERHEAD_CHARS,
            ESTIMATED_COMPLETION_TOKENS,
            self.client.routing().model_for(EnrichmentTask::Intent),
        )
    }
}
