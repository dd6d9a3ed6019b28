//! Per-bookmark LLM analysis: intent, context and category.

pub mod category;
pub mod context;
pub mod intent;
pub mod prompts;

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tracing::error;

use stash_cost::{price, TokenUsage};
use stash_llm::TaskResult;

use crate::error::EnrichmentResult;
use crate::models::Bookmark;

pub use category::{
    category_distribution, low_confidence_bookmarks, parse_category_response, CategoryAnalyzer,
    CategoryResult,
};
pub use context::{parse_context_response, ContextAnalyzer, ContextResult};
pub use intent::{parse_intent_response, IntentAnalyzer, IntentResult};
pub use prompts::PromptManager;

/// Progress callback for batch analysis: `(current, total)`.
pub type BatchProgress<'a> = &'a (dyn Fn(usize, usize) + Send + Sync);

/// Outcome of one bookmark in a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOutcome<T> {
    pub bookmark_id: String,
    /// The task result, or the error message.
    pub outcome: Result<TaskResult<T>, String>,
}

impl<T> BatchOutcome<T> {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Run `analyze` over `items` one at a time, pausing `delay` between them.
pub(crate) async fn run_batch<'a, I, T, F, Fut>(
    task: &str,
    items: &'a [I],
    delay: Duration,
    on_progress: Option<BatchProgress<'_>>,
    mut analyze: F,
) -> Vec<BatchOutcome<T>>
where
    I: AsRef<Bookmark>,
    F: FnMut(&'a I) -> Fut,
    Fut: Future<Output = EnrichmentResult<TaskResult<T>>>,
{
    let total = items.len();
    let mut outcomes = Vec::with_capacity(total);

    for (i, item) in items.iter().enumerate() {
        let bookmark = item.as_ref();
        let outcome = analyze(item).await.map_err(|e| {
            error!(task, bookmark_id = %bookmark.id, error = %e, "Analysis failed");
            e.to_string()
        });
        outcomes.push(BatchOutcome {
            bookmark_id: bookmark.id.clone(),
            outcome,
        });

        if let Some(on_progress) = on_progress {
            on_progress(i + 1, total);
        }

        if i + 1 < total && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    outcomes
}

/// Pre-flight cost for one task over `bookmarks`.
///
/// Prompt tokens per bookmark are `ceil((avg_content_chars + overhead) / 4)`.
pub(crate) fn estimate_task_cost(
    bookmarks: &[Bookmark],
    prompt_overhead: usize,
    completion_tokens: u32,
    model: &str,
) -> f64 {
    if bookmarks.is_empty() {
        return 0.0;
    }

    let avg = average_content_length(bookmarks);
    let prompt_tokens = ((avg + prompt_overhead as f64) / 4.0).ceil() as u32;
    let per_bookmark = price(model, &TokenUsage::new(prompt_tokens, completion_tokens));
    per_bookmark * bookmarks.len() as f64
}

/// Mean content length in characters.
pub(crate) fn average_content_length(bookmarks: &[Bookmark]) -> f64 {
    if bookmarks.is_empty() {
        return 0.0;
    }
    let total: usize = bookmarks.iter().map(|b| b.content.chars().count()).sum();
    total as f64 / bookmarks.len() as f64
}
