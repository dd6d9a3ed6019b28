//! Category assignment into Inspo, Leads/Markets or Tutorials.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use stash_llm::{parse_json_response, EnrichmentTask, LlmClient, TaskResult};

use super::context::ContextResult;
use super::intent::IntentResult;
use super::prompts::PromptManager;
use super::{estimate_task_cost, run_batch, BatchOutcome, BatchProgress};
use crate::error::EnrichmentResult;
use crate::models::{Bookmark, Category};

pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(100);

/// Confidence used when the response omits one.
pub const DEFAULT_CONFIDENCE: f64 = 0.7;

/// Confidence of a keyword-scan fallback.
pub const FALLBACK_CONFIDENCE: f64 = 0.5;

/// Default cut-off for [`low_confidence_bookmarks`].
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.7;

const PROMPT_OVERHEAD_CHARS: usize = 600;
const ESTIMATED_COMPLETION_TOKENS: u32 = 50;

const LEADS_KEYWORDS: &[&str] = &["leads", "markets", "business", "client"];
const TUTORIAL_KEYWORDS: &[&str] = &["tutorial", "learning", "how-to", "guide"];

pub const SYSTEM_PROMPT: &str = r#"You are an expert at categorizing social media bookmarks into three categories:

1. **Inspo**: Creative references, aesthetic signals, design inspiration, innovative ideas
   - Examples: Design portfolios, creative campaigns, visual inspiration, artistic work

2. **Leads/Markets**: Potential clients, business opportunities, industry insights, prospects
   - Examples: Agency profiles, company posts, business leaders, market opportunities

3. **Tutorials**: Learning resources, how-to content, skill-building guides, educational material
   - Examples: Technical guides, tutorials, courses, explanatory threads, skill development

Analyze the bookmark and assign it to ONE category.

Provide a confidence score (0-1) based on how clearly the content fits the category.

Format your response as JSON:
{
  "category": "Inspo" | "Leads/Markets" | "Tutorials",
  "confidence": 0.85,
  "reasoning": "Brief explanation of why this category was chosen"
}"#;

/// Assigned category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryResult {
    pub category: Category,
    /// Always in `[0, 1]`.
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// A bookmark plus whatever earlier steps produced for it.
#[derive(Debug, Clone)]
pub struct CategoryInput {
    pub bookmark: Bookmark,
    pub intent: Option<IntentResult>,
    pub context: Option<ContextResult>,
}

impl CategoryInput {
    pub fn new(bookmark: Bookmark) -> Self {
        Self {
            bookmark,
            intent: None,
            context: None,
        }
    }
}

impl AsRef<Bookmark> for CategoryInput {
    fn as_ref(&self) -> &Bookmark {
        &self.bookmark
    }
}

#[derive(Serialize)]
struct CategoryPromptData<'a> {
    author: &'a str,
    content: &'a str,
    intent: Option<&'a str>,
    has_context: bool,
    topic: Option<&'a str>,
    themes: Option<String>,
    company: Option<&'a str>,
}

/// Render the user prompt, folding in prior intent and context.
pub fn build_category_prompt(
    prompts: &PromptManager,
    bookmark: &Bookmark,
    intent: Option<&IntentResult>,
    context: Option<&ContextResult>,
) -> EnrichmentResult<String> {
    let data = CategoryPromptData {
        author: &bookmark.author,
        content: &bookmark.content,
        intent: intent.map(|i| i.intent.as_str()),
        has_context: context.is_some(),
        topic: context.map(|c| c.primary_topic.as_str()),
        themes: context
            .filter(|c| !c.key_themes.is_empty())
            .map(|c| c.key_themes.join(", ")),
        company: context.and_then(|c| c.company.as_deref()),
    };
    prompts.render("category", &data)
}

/// Pick a category from free text by keyword.
///
/// Leads/Markets keywords win over Tutorials keywords. Everything else is
/// Inspo.
pub fn categorize_by_keywords(text: &str) -> Category {
    let text = text.to_lowercase();
    if LEADS_KEYWORDS.iter().any(|k| text.contains(k)) {
        Category::LeadsMarkets
    } else if TUTORIAL_KEYWORDS.iter().any(|k| text.contains(k)) {
        Category::Tutorials
    } else {
        Category::Inspo
    }
}

/// Parse model output into a [`CategoryResult`]. Never fails.
///
/// An unknown category becomes [`Category::Inspo`]. A missing or zero
/// confidence becomes [`DEFAULT_CONFIDENCE`]. A response that is not a JSON
/// object is scanned with [`categorize_by_keywords`].
pub fn parse_category_response(text: &str) -> CategoryResult {
    let json = match parse_json_response::<Map<String, Value>>(text) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "Failed to parse category JSON, scanning keywords");
            return CategoryResult {
                category: categorize_by_keywords(text),
                confidence: FALLBACK_CONFIDENCE,
                reasoning: None,
            };
        }
    };

    let raw_category = json.get("category").and_then(Value::as_str);
    let category = raw_category.and_then(Category::parse).unwrap_or_else(|| {
        warn!(category = ?raw_category, "Unknown category, defaulting to Inspo");
        Category::Inspo
    });

    let confidence = json
        .get("confidence")
        .and_then(Value::as_f64)
        .filter(|c| *c != 0.0 && !c.is_nan())
        .unwrap_or(DEFAULT_CONFIDENCE)
        .clamp(0.0, 1.0);

    CategoryResult {
        category,
        confidence,
        reasoning: json
            .get("reasoning")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

/// Count successful outcomes per category. Every category is present.
pub fn category_distribution(
    results: &[BatchOutcome<CategoryResult>],
) -> BTreeMap<Category, usize> {
    let mut distribution: BTreeMap<Category, usize> =
        Category::all().iter().map(|c| (*c, 0)).collect();
    for result in results {
        if let Ok(task) = &result.outcome {
            *distribution.entry(task.data.category).or_default() += 1;
        }
    }
    distribution
}

/// Ids of successful outcomes whose confidence is below `threshold`.
pub fn low_confidence_bookmarks(
    results: &[BatchOutcome<CategoryResult>],
    threshold: f64,
) -> Vec<String> {
    results
        .iter()
        .filter(|r| matches!(&r.outcome, Ok(task) if task.data.confidence < threshold))
        .map(|r| r.bookmark_id.clone())
        .collect()
}

/// Assigns categories to bookmarks.
pub struct CategoryAnalyzer {
    client: Arc<LlmClient>,
    prompts: Arc<PromptManager>,
    batch_delay: Duration,
}

impl CategoryAnalyzer {
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
        intent: Option<&IntentResult>,
        context: Option<&ContextResult>,
    ) -> EnrichmentResult<TaskResult<CategoryResult>> {
        let prompt = build_category_prompt(&self.prompts, bookmark, intent, context)?;
        Ok(self
            .client
            .call_with_retry(
                EnrichmentTask::Category,
                SYSTEM_PROMPT,
                &prompt,
                parse_category_response,
            )
            .await?)
    }

    pub async fn analyze_batch(
        &self,
        inputs: &[CategoryInput],
        on_progress: Option<BatchProgress<'_>>,
    ) -> Vec<BatchOutcome<CategoryResult>> {
        run_batch(
            EnrichmentTask::Category.as_str(),
            inputs,
            self.batch_delay,
            on_progress,
            |input| self.analyze(&input.bookmark, input.intent.as_ref(), input.context.as_ref()),
        )
        .await
    }

    pub fn estimate_cost(&self, bookmarks: &[Bookmark]) -> f64 {
        estimate_task_cost(
            bookmarks,
            PROMPT_OVERHEAD_CHARS,
            ESTIMATED_COMPLETION_TOKENS,
            self.client.routing().model_for(EnrichmentTask::Category),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookmarkSource;
    use chrono::Utc;
    use stash_cost::TokenUsage;
    use stash_llm::mock::MockProvider;
    use stash_llm::{ModelRouting, ProviderKind, ProviderRegistry};

    fn outcome(id: &str, category: Category, confidence: f64) -> BatchOutcome<CategoryResult> {
        BatchOutcome {
            bookmark_id: id.to_string(),
            outcome: Ok(TaskResult {
                data: CategoryResult {
                    category,
                    confidence,
                    reasoning: None,
                },
                usage: TokenUsage::new(10, 5),
                model: "gpt-4o-mini".to_string(),
                provider: ProviderKind::OpenAi,
                cost: 0.0,
            }),
        }
    }

    fn bookmark() -> Bookmark {
        Bookmark::new(
            "tw-9",
            BookmarkSource::Twitter,
            "rustacean",
            "A step by step guide to pinning futures",
            Utc::now(),
        )
    }

    #[test]
    fn test_parse_valid_response() {
        let result = parse_category_response(
            r#"{"category": "Tutorials", "confidence": 0.92, "reasoning": "Step-by-step guide"}"#,
        );
        assert_eq!(result.category, Category::Tutorials);
        assert!((result.confidence - 0.92).abs() < f64::EPSILON);
        assert_eq!(result.reasoning.as_deref(), Some("Step-by-step guide"));
    }

    #[test]
    fn test_parse_invalid_category_and_confidence() {
        let result = parse_category_response(r#"{"category": "Memes", "confidence": 3}"#);
        assert_eq!(result.category, Category::Inspo);
        assert!((result.confidence - 1.0).abs() < f64::EPSILON);

        let result = parse_category_response(r#"{"category": "Leads/Markets", "confidence": 0}"#);
        assert_eq!(result.category, Category::LeadsMarkets);
        assert!((result.confidence - DEFAULT_CONFIDENCE).abs() < f64::EPSILON);

        let result = parse_category_response(r#"{"category": "Inspo", "confidence": -0.4}"#);
        assert!(result.confidence.abs() < f64::EPSILON);
    }

    #[test]
    fn test_keyword_fallback_order() {
        let result = parse_category_response("This is a business guide");
        assert_eq!(result.category, Category::LeadsMarkets);
        assert!((result.confidence - FALLBACK_CONFIDENCE).abs() < f64::EPSILON);

        assert_eq!(
            parse_category_response("Looks like a How-To thread").category,
            Category::Tutorials
        );
        assert_eq!(parse_category_response("pretty colors").category, Category::Inspo);
    }

    #[test]
    fn test_parse_garbage_is_always_canonical() {
        for input in ["", "null", "[]", "{", "\u{0}\u{1}", "{\"category\": 7}", "42"] {
            let result = parse_category_response(input);
            assert!(Category::all().contains(&result.category));
            assert!((0.0..=1.0).contains(&result.confidence), "{input:?}");
        }
    }

    #[test]
    fn test_prompt_includes_prior_results() {
        let prompts = PromptManager::new().unwrap();
        let intent = IntentResult {
            intent: "Learning pinning".to_string(),
            confidence: 0.8,
        };
        let context = ContextResult {
            author_bio: None,
            company: Some("Ferrous".to_string()),
            primary_topic: "Rust".to_string(),
            key_themes: vec!["async".to_string(), "pin".to_string()],
        };

        let prompt =
            build_category_prompt(&prompts, &bookmark(), Some(&intent), Some(&context)).unwrap();
        assert!(prompt.contains("User Intent: Learning pinning"));
        assert!(prompt.contains("Topic: Rust\nThemes: async, pin\nCompany: Ferrous"));

        let bare = build_category_prompt(&prompts, &bookmark(), None, None).unwrap();
        assert!(!bare.contains("User Intent"));
        let question = "Which category does this belong to: Inspo, Leads/Markets, or Tutorials?";
        assert!(bare.ends_with(question));
    }

    #[test]
    fn test_distribution_and_low_confidence() {
        let mut results = vec![
            outcome("a", Category::Tutorials, 0.9),
            outcome("b", Category::Tutorials, 0.5),
            outcome("c", Category::Inspo, 0.69),
        ];
        results.push(BatchOutcome {
            bookmark_id: "d".to_string(),
            outcome: Err("timeout".to_string()),
        });

        let distribution = category_distribution(&results);
        assert_eq!(distribution.len(), 3);
        assert_eq!(distribution[&Category::Tutorials], 2);
        assert_eq!(distribution[&Category::Inspo], 1);
        assert_eq!(distribution[&Category::LeadsMarkets], 0);

        assert_eq!(
            low_confidence_bookmarks(&results, LOW_CONFIDENCE_THRESHOLD),
            vec!["b", "c"]
        );
    }

    #[tokio::test]
    async fn test_batch_passes_prior_results() {
        let provider = Arc::new(
            MockProvider::new(ProviderKind::OpenAi)
                .with_default_response(r#"{"category": "Tutorials", "confidence": 0.9}"#),
        );
        let client = LlmClient::new(
            ProviderRegistry::new().with_provider(provider.clone()),
            ModelRouting::default(),
        )
        .unwrap();
        let prompts = Arc::new(PromptManager::new().unwrap());
        let analyzer =
            CategoryAnalyzer::new(Arc::new(client), prompts).with_batch_delay(Duration::ZERO);

        let mut input = CategoryInput::new(bookmark());
        input.intent = Some(IntentResult {
            intent: "Study later".to_string(),
            confidence: 0.7,
        });
        let outcomes = analyzer.analyze_batch(&[input], None).await;

        assert_eq!(outcomes.len(), 1);
        let task = outcomes[0].outcome.as_ref().unwrap();
        assert_eq!(task.data.category, Category::Tutorials);
        assert_eq!(task.model, "gpt-4o-mini");
        let call = &provider.calls()[0];
        assert!(call.user.contains("User Intent: Study later"));
        assert_eq!(call.max_tokens, Some(100));
    }

    #[test]
    fn test_estimate_uses_category_model() {
        let provider = Arc::new(MockProvider::new(ProviderKind::OpenAi));
        let client =
            LlmClient::new(ProviderRegistry::new().with_provider(provider), ModelRouting::default())
                .unwrap();
        let prompts = Arc::new(PromptManager::new().unwrap());
        let analyzer = CategoryAnalyzer::new(Arc::new(client), prompts);

        let mut b = bookmark();
        b.content = "y".repeat(200);
        // ceil(800 / 4) = 200 prompt tokens, 50 completion, at gpt-4o-mini rates.
        let expected = (200.0 * 0.15 + 50.0 * 0.60) / 1_000_000.0;
        assert!((analyzer.estimate_cost(&[b]) - expected).abs() < 1e-12);
    }
}
