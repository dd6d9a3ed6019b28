//! End-to-end batch runs over the in-memory store with scripted providers.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use stash_enrich::pipeline::{EnrichmentOptions, EnrichmentPipeline};
use stash_enrich::store::{BookmarkStore, MemoryStore};
use stash_enrich::{
    Bookmark, BookmarkMetadata, BookmarkSource, Category, EnrichmentError, PipelineConfig,
};
use stash_llm::mock::{MockCall, MockProvider};
use stash_llm::{
    LlmClient, LlmError, LlmResult, ModelRouting, ProviderKind, ProviderRegistry, RetryPolicy,
};

fn bookmarks() -> Vec<Bookmark> {
    let at = Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap();
    vec![
        Bookmark::new(
            "tw-100",
            BookmarkSource::Twitter,
            "lena",
            "Brutalist landing pages worth stealing from",
            at,
        ),
        Bookmark::new(
            "tw-101",
            BookmarkSource::Twitter,
            "lena",
            "A type scale that finally clicks",
            at + Duration::minutes(20),
        ),
        Bookmark::new(
            "tw-102",
            BookmarkSource::Twitter,
            "devon",
            "Tutorial: building a design token pipeline",
            at + Duration::hours(3),
        ),
        Bookmark::new(
            "li-200",
            BookmarkSource::Linkedin,
            "Acme Studio",
            "We are looking for an agency partner for our rebrand",
            at + Duration::days(4),
        ),
        Bookmark::new(
            "ea-300",
            BookmarkSource::Eagle,
            "unknown",
            "Moodboard: warm gradients",
            at + Duration::days(30),
        ),
    ]
}

/// The bookmark text from a rendered prompt.
///
/// The category prompt names every category, so matching on the whole prompt
/// would see "Tutorials" everywhere.
fn content_line(prompt: &str) -> String {
    prompt
        .lines()
        .find_map(|line| line.strip_prefix("Content: "))
        .unwrap_or_default()
        .to_lowercase()
}

/// Fixed JSON per task, varied by bookmark content.
fn respond(call: &MockCall) -> LlmResult<String> {
    let content = content_line(&call.user);
    let (topic, themes, category) = if content.contains("tutorial") {
        ("Design Engineering", r#"["tokens", "tutorial"]"#, "Tutorials")
    } else if content.contains("agency partner") {
        ("Business", r#"["rebrand", "agency"]"#, "Leads/Markets")
    } else {
        ("Design", r#"["typography", "layout"]"#, "Inspo")
    };

    let text = if call.system.contains("user intent") {
        r#"{"intent": "Saved as a reference for client work", "confidence": 0.85}"#.to_string()
    } else if call.system.contains("structured metadata") {
        format!(r#"{{"primary_topic": "{topic}", "key_themes": {themes}}}"#)
    } else {
        format!(r#"{{"category": "{category}", "confidence": 0.9, "reasoning": "fits"}}"#)
    };
    Ok(text)
}

fn client_with(providers: Vec<Arc<MockProvider>>, retry: RetryPolicy) -> LlmResult<LlmClient> {
    let registry = providers
        .into_iter()
        .fold(ProviderRegistry::new(), |registry, provider| {
            registry.with_provider(provider)
        });
    Ok(LlmClient::new(registry, ModelRouting::default())?.with_retry_policy(retry))
}

fn pipeline(client: LlmClient, store: Arc<MemoryStore>) -> EnrichmentPipeline {
    EnrichmentPipeline::new(
        Arc::new(client),
        store,
        PipelineConfig::default().without_delays(),
    )
    .unwrap()
}

async fn sorted_metadata(store: &MemoryStore) -> Vec<BookmarkMetadata> {
    let mut metadata = store.all_metadata().await.unwrap();
    metadata.sort_by(|a, b| a.bookmark_id.cmp(&b.bookmark_id));
    metadata
}

#[tokio::test]
async fn test_five_bookmark_run() {
    let store = Arc::new(MemoryStore::with_bookmarks(bookmarks()).await);
    let provider = Arc::new(MockProvider::new(ProviderKind::OpenAi).with_responder(respond));
    let client = client_with(vec![provider.clone()], RetryPolicy::none()).unwrap();
    let pipeline = pipeline(client, store.clone());

    let result = pipeline
        .enrich_bookmark_batch(None, EnrichmentOptions::default())
        .await
        .unwrap();

    assert_eq!(result.total_bookmarks, 5);
    assert_eq!(result.successful, 5);
    assert_eq!(result.failed, 0);
    assert!(result.errors.is_empty());
    assert_eq!(result.category_distribution.values().sum::<usize>(), 5);
    assert_eq!(result.category_distribution[&Category::Inspo], 3);
    assert_eq!(result.category_distribution[&Category::Tutorials], 1);
    assert_eq!(result.category_distribution[&Category::LeadsMarkets], 1);
    assert!(result.connections_detected <= 5 * 5);
    assert!(result.total_cost > 0.0);
    assert_eq!(provider.call_count(), 15);

    let connections = store.all_connections().await.unwrap();
    assert_eq!(connections.len(), result.connections_detected);
    for connection in &connections {
        assert_ne!(connection.bookmark_id_1, connection.bookmark_id_2);
        assert!((0.0..=1.0).contains(&connection.strength_score));
    }
    // Same author and topic, twenty minutes apart.
    assert!(connections
        .iter()
        .any(|c| c.involves("tw-100") && c.involves("tw-101")));

    assert!(store.find_unenriched().await.unwrap().is_empty());
    let lead = store.find_metadata("li-200").await.unwrap().unwrap();
    assert_eq!(lead.category, Some(Category::LeadsMarkets));
    assert_eq!(lead.primary_topic.as_deref(), Some("Business"));

    let logs = store.enrichment_logs().await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].bookmarks_processed, 5);
    assert!((logs[0].cost - result.total_cost).abs() < 1e-12);
}

#[tokio::test]
async fn test_rerun_does_not_duplicate_connections() {
    let store = Arc::new(MemoryStore::with_bookmarks(bookmarks()).await);
    let provider = Arc::new(MockProvider::new(ProviderKind::OpenAi).with_responder(respond));
    let client = client_with(vec![provider], RetryPolicy::none()).unwrap();
    let pipeline = pipeline(client, store.clone());
    let ids: Vec<String> = bookmarks().into_iter().map(|b| b.id).collect();

    let first = pipeline
        .enrich_bookmark_batch(Some(&ids), EnrichmentOptions::default())
        .await
        .unwrap();
    let stored_first = store.all_connections().await.unwrap();
    let metadata_first = sorted_metadata(&store).await;

    let second = pipeline
        .enrich_bookmark_batch(Some(&ids), EnrichmentOptions::default())
        .await
        .unwrap();
    let stored_second = store.all_connections().await.unwrap();

    assert_eq!(first.successful, 5);
    assert_eq!(second.successful, 5);
    assert_eq!(first.connections_detected, second.connections_detected);
    assert_eq!(stored_first.len(), stored_second.len());

    let keys: HashSet<_> = stored_second.iter().map(|c| c.key()).collect();
    assert_eq!(keys.len(), stored_second.len());
    let metadata_second = sorted_metadata(&store).await;
    assert_eq!(metadata_second.len(), 5);
    assert_eq!(metadata_first, metadata_second);
    let tutorial = metadata_second
        .iter()
        .find(|m| m.bookmark_id == "tw-102")
        .unwrap();
    assert_eq!(tutorial.category, Some(Category::Tutorials));
    assert_eq!(tutorial.primary_topic.as_deref(), Some("Design Engineering"));
    assert_eq!(
        tutorial.intent.as_deref(),
        Some("Saved as a reference for client work")
    );
    assert_eq!(store.enrichment_logs().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_falls_back_to_anthropic() {
    let store = Arc::new(MemoryStore::with_bookmarks(bookmarks()).await);
    let openai = Arc::new(MockProvider::unconfigured(ProviderKind::OpenAi));
    let anthropic = Arc::new(MockProvider::new(ProviderKind::Anthropic).with_responder(respond));
    let client =
        client_with(vec![openai.clone(), anthropic.clone()], RetryPolicy::none()).unwrap();
    let pipeline = pipeline(client, store.clone());

    let options = EnrichmentOptions {
        skip_connections: true,
        ..EnrichmentOptions::default()
    };
    let result = pipeline.enrich_bookmark_batch(None, options).await.unwrap();

    assert_eq!(result.successful, 5);
    assert_eq!(openai.call_count(), 0);
    assert_eq!(anthropic.call_count(), 15);
    assert!(anthropic
        .calls()
        .iter()
        .all(|call| call.model == "claude-sonnet-3.5"));
    assert_eq!(result.connections_detected, 0);
    assert!(store.all_connections().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_retryable_failures_are_absorbed() {
    let store = Arc::new(MemoryStore::with_bookmarks(bookmarks().into_iter().take(1)).await);
    let provider = Arc::new(
        MockProvider::new(ProviderKind::OpenAi)
            .with_error(LlmError::Api {
                provider: ProviderKind::OpenAi,
                status: 429,
                message: "rate limit exceeded".to_string(),
            })
            .with_error(LlmError::Timeout {
                provider: ProviderKind::OpenAi,
                reason: "deadline elapsed".to_string(),
            })
            .with_responder(respond),
    );
    let client = client_with(vec![provider.clone()], RetryPolicy::default()).unwrap();
    let pipeline = pipeline(client, store);

    let options = EnrichmentOptions {
        skip_context: true,
        skip_category: true,
        skip_connections: true,
        ..EnrichmentOptions::default()
    };
    let start = tokio::time::Instant::now();
    let result = pipeline.enrich_bookmark_batch(None, options).await.unwrap();

    assert_eq!(result.successful, 1);
    assert!(result.errors.is_empty());
    assert_eq!(provider.call_count(), 3);
    assert!(start.elapsed() >= std::time::Duration::from_secs(3));
}

#[tokio::test]
async fn test_no_provider_is_a_configuration_error() {
    let unconfigured = Arc::new(MockProvider::unconfigured(ProviderKind::OpenAi));
    let Err(err) = client_with(vec![unconfigured], RetryPolicy::none()) else {
        panic!("client built without a configured provider");
    };
    assert!(matches!(err, LlmError::Configuration { .. }));
    assert!(EnrichmentError::from(err).is_fatal());
}

#[tokio::test]
async fn test_estimate_has_no_side_effects() {
    let store = Arc::new(MemoryStore::with_bookmarks(bookmarks()).await);
    let provider = Arc::new(MockProvider::new(ProviderKind::OpenAi).with_responder(respond));
    let client = client_with(vec![provider.clone()], RetryPolicy::none()).unwrap();
    let pipeline = pipeline(client, store.clone());

    let estimate = pipeline.estimate_batch_enrichment_cost(None).await.unwrap();

    assert_eq!(estimate.bookmarks_count, 5);
    assert!(estimate.estimated_cost > 0.0);
    assert!(estimate.estimated_tokens > 0);
    assert_eq!(provider.call_count(), 0);
    assert_eq!(store.find_unenriched().await.unwrap().len(), 5);
}
