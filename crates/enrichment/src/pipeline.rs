//! Batch enrichment pipeline - orchestrates intent, context, category and
//! connection detection over a set of bookmarks.
//!
//! Steps run in a fixed order and each can be skipped. Within a step
//! bookmarks are processed one at a time; a failed call is recorded against
//! its bookmark and the run moves on. Results are written to the store once
//! every step has finished.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use stash_cost::{format_cost, CostTracker};
use stash_llm::{LlmClient, TaskResult};

use crate::analysis::{
    CategoryAnalyzer, CategoryResult, ContextAnalyzer, ContextResult, IntentAnalyzer,
    IntentResult, PromptManager,
};
use crate::config::PipelineConfig;
use crate::connections::{
    connection_summary, detect_connections, ConnectionMetadata, EnrichedBookmark,
};
use crate::error::{EnrichmentResult, StoreResult};
use crate::models::{
    Bookmark, BookmarkMetadata, Category, Connection, EnrichmentStep, NewEnrichmentLog,
};
use crate::store::BookmarkStore;

/// Assumed wall time per bookmark for the remaining-time estimate.
const AVG_MS_PER_BOOKMARK: f64 = 2000.0;

/// Headroom applied to the running cost for the projected total.
const COST_ESTIMATE_BUFFER: f64 = 1.2;

/// Prompt overhead, in characters, across the three calls per bookmark.
const ESTIMATE_OVERHEAD_CHARS: f64 = 1000.0;
const CALLS_PER_BOOKMARK: f64 = 3.0;

const LOG_MODEL_NAME: &str = "multi-model";

/// Snapshot passed to the progress callback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichmentProgress {
    pub total_bookmarks: usize,
    /// Bookmarks finished within `current_step`.
    pub completed: usize,
    pub current_step: EnrichmentStep,
    /// Heuristic, from a fixed per-bookmark average.
    pub estimated_time_remaining_ms: u64,
    /// Running cost plus a 20% buffer.
    pub estimated_cost: f64,
    pub current_cost: f64,
}

/// Progress callback. Informational only.
pub type ProgressCallback = Arc<dyn Fn(&EnrichmentProgress) + Send + Sync>;

/// Which steps to run, and where to report progress.
#[derive(Clone, Default)]
pub struct EnrichmentOptions {
    pub skip_intent: bool,
    pub skip_context: bool,
    pub skip_category: bool,
    pub skip_connections: bool,
    pub on_progress: Option<ProgressCallback>,
}

impl EnrichmentOptions {
    #[must_use]
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&EnrichmentProgress) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    fn is_enabled(&self, step: EnrichmentStep) -> bool {
        match step {
            EnrichmentStep::Intent => !self.skip_intent,
            EnrichmentStep::Context => !self.skip_context,
            EnrichmentStep::Category => !self.skip_category,
            EnrichmentStep::Connections => !self.skip_connections,
        }
    }

    /// First step that will run, if any.
    pub fn first_enabled_step(&self) -> Option<EnrichmentStep> {
        EnrichmentStep::all()
            .iter()
            .copied()
            .find(|step| self.is_enabled(*step))
    }
}

impl fmt::Debug for EnrichmentOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnrichmentOptions")
            .field("skip_intent", &self.skip_intent)
            .field("skip_context", &self.skip_context)
            .field("skip_category", &self.skip_category)
            .field("skip_connections", &self.skip_connections)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

/// A failure recorded against one bookmark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchError {
    pub bookmark_id: String,
    pub error: String,
}

/// Summary of one batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchEnrichmentResult {
    pub total_bookmarks: usize,
    /// Bookmarks with at least one step done and persisted.
    pub successful: usize,
    pub failed: usize,
    pub total_cost: f64,
    pub total_tokens: u64,
    pub execution_time_ms: u64,
    pub category_distribution: BTreeMap<Category, usize>,
    pub connections_detected: usize,
    pub errors: Vec<BatchError>,
}

/// Side-effect-free cost preview.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub estimated_cost: f64,
    pub estimated_tokens: u64,
    pub bookmarks_count: usize,
}

/// Everything produced for one bookmark during a run.
#[derive(Debug, Clone, Default)]
struct BookmarkEnrichment {
    intent: Option<IntentResult>,
    context: Option<ContextResult>,
    category: Option<CategoryResult>,
    cost: f64,
    tokens: u64,
}

impl BookmarkEnrichment {
    fn add_usage<T>(&mut self, result: &TaskResult<T>) {
        self.cost += result.cost;
        self.tokens += u64::from(result.usage.total_tokens);
    }

    fn connection_metadata(&self) -> ConnectionMetadata {
        ConnectionMetadata {
            primary_topic: self.context.as_ref().map(|c| c.primary_topic.clone()),
            key_themes: self.context.as_ref().map(|c| c.key_themes.clone()),
            category: self.category.as_ref().map(|c| c.category),
        }
    }

    fn to_metadata(&self, bookmark_id: &str) -> BookmarkMetadata {
        BookmarkMetadata {
            bookmark_id: bookmark_id.to_string(),
            intent: self.intent.as_ref().map(|i| i.intent.clone()),
            author_bio: self.context.as_ref().and_then(|c| c.author_bio.clone()),
            company: self.context.as_ref().and_then(|c| c.company.clone()),
            primary_topic: self.context.as_ref().map(|c| c.primary_topic.clone()),
            key_themes: self.context.as_ref().map(|c| c.key_themes.clone()),
            category: self.category.as_ref().map(|c| c.category),
            category_confidence: self.category.as_ref().map(|c| c.confidence),
            enrichment_quality_score: None,
        }
    }
}

/// Mutable bookkeeping for one run. Dropped when the run ends.
struct RunState<'o> {
    tracker: CostTracker,
    errors: Vec<BatchError>,
    total: usize,
    on_progress: Option<&'o ProgressCallback>,
}

impl RunState<'_> {
    fn report(&self, step: EnrichmentStep, completed: usize) {
        if let Some(on_progress) = self.on_progress {
            on_progress(&progress_for(
                self.total,
                completed,
                step,
                self.tracker.total_cost(),
            ));
        }
    }

    fn fail(&mut self, bookmark_id: &str, error: impl fmt::Display) {
        self.errors.push(BatchError {
            bookmark_id: bookmark_id.to_string(),
            error: error.to_string(),
        });
    }
}

/// Build the progress snapshot for `completed` of `total` within `step`.
///
/// Earlier steps count as fully done whether they ran or were skipped.
#[must_use]
pub fn progress_for(
    total: usize,
    completed: usize,
    step: EnrichmentStep,
    current_cost: f64,
) -> EnrichmentProgress {
    let step_progress = if total == 0 {
        1.0
    } else {
        completed as f64 / total as f64
    };
    // Whole percentages keep a finished run at exactly zero remaining.
    let percent = |s: &EnrichmentStep| (s.weight() * 100.0).round();
    let before: f64 = EnrichmentStep::all()
        .iter()
        .take_while(|s| **s != step)
        .map(percent)
        .sum();
    let done_percent = (before + step_progress * percent(&step)).min(100.0);
    let remaining_ms =
        ((100.0 - done_percent) * total as f64 * AVG_MS_PER_BOOKMARK / 100.0).ceil();

    EnrichmentProgress {
        total_bookmarks: total,
        completed,
        current_step: step,
        estimated_time_remaining_ms: remaining_ms.max(0.0) as u64,
        estimated_cost: current_cost * COST_ESTIMATE_BUFFER,
        current_cost,
    }
}

/// Batch enrichment orchestrator.
///
/// Holds no per-run state: each call to
/// [`enrich_bookmark_batch`](Self::enrich_bookmark_batch) builds its own
/// cost tracker.
pub struct EnrichmentPipeline {
    store: Arc<dyn BookmarkStore>,
    intent: IntentAnalyzer,
    context: ContextAnalyzer,
    category: CategoryAnalyzer,
    config: PipelineConfig,
}

impl EnrichmentPipeline {
    /// Create a pipeline over an already-constructed client and store.
    pub fn new(
        client: Arc<LlmClient>,
        store: Arc<dyn BookmarkStore>,
        config: PipelineConfig,
    ) -> EnrichmentResult<Self> {
        let prompts = Arc::new(PromptManager::new()?);
        Ok(Self {
            store,
            intent: IntentAnalyzer::new(Arc::clone(&client), Arc::clone(&prompts))
                .with_batch_delay(config.intent_delay),
            context: ContextAnalyzer::new(Arc::clone(&client), Arc::clone(&prompts))
                .with_batch_delay(config.context_delay),
            category: CategoryAnalyzer::new(client, prompts)
                .with_batch_delay(config.category_delay),
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The given bookmarks, or every unenriched one when `ids` is empty.
    ///
    /// Unknown ids are skipped; repeated ids are loaded once.
    async fn load_bookmarks(&self, ids: Option<&[String]>) -> StoreResult<Vec<Bookmark>> {
        let Some(ids) = ids.filter(|ids| !ids.is_empty()) else {
            return self.store.find_unenriched().await;
        };

        let mut seen = HashSet::new();
        let mut bookmarks = Vec::with_capacity(ids.len());
        for id in ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            match self.store.find_by_id(id).await? {
                Some(bookmark) => bookmarks.push(bookmark),
                None => warn!(bookmark_id = %id, "Bookmark not found, skipping"),
            }
        }
        Ok(bookmarks)
    }

    /// Enrich `ids`, or all unenriched bookmarks.
    ///
    /// Per-bookmark failures, including store writes, are collected in
    /// [`BatchEnrichmentResult::errors`]. An error is returned only when the
    /// batch cannot be loaded or the LLM client has no usable provider.
    pub async fn enrich_bookmark_batch(
        &self,
        ids: Option<&[String]>,
        options: EnrichmentOptions,
    ) -> EnrichmentResult<BatchEnrichmentResult> {
        let start = Instant::now();
        let bookmarks = self.load_bookmarks(ids).await?;

        if bookmarks.is_empty() {
            info!("No bookmarks to enrich");
            return Ok(BatchEnrichmentResult {
                execution_time_ms: elapsed_ms(start),
                ..BatchEnrichmentResult::default()
            });
        }

        info!(bookmarks = bookmarks.len(), "Starting enrichment");

        let mut run = RunState {
            tracker: CostTracker::new(),
            errors: Vec::new(),
            total: bookmarks.len(),
            on_progress: options.on_progress.as_ref(),
        };
        let mut results: HashMap<String, BookmarkEnrichment> = HashMap::new();

        if options.is_enabled(EnrichmentStep::Intent) {
            let intent = &self.intent;
            let done = self
                .run_step(
                    EnrichmentStep::Intent,
                    &bookmarks,
                    self.config.intent_delay,
                    &mut run,
                    move |bookmark| intent.analyze(bookmark),
                )
                .await?;
            for (bookmark, result) in done {
                let entry = results.entry(bookmark.id.clone()).or_default();
                entry.add_usage(&result);
                entry.intent = Some(result.data);
            }
        }

        if options.is_enabled(EnrichmentStep::Context) {
            let context = &self.context;
            let done = self
                .run_step(
                    EnrichmentStep::Context,
                    &bookmarks,
                    self.config.context_delay,
                    &mut run,
                    move |bookmark| context.analyze(bookmark),
                )
                .await?;
            for (bookmark, result) in done {
                let entry = results.entry(bookmark.id.clone()).or_default();
                entry.add_usage(&result);
                entry.context = Some(result.data);
            }
        }

        if options.is_enabled(EnrichmentStep::Category) {
            let category = &self.category;
            let prior = &results;
            let done = self
                .run_step(
                    EnrichmentStep::Category,
                    &bookmarks,
                    self.config.category_delay,
                    &mut run,
                    move |bookmark| {
                        let entry = prior.get(&bookmark.id);
                        category.analyze(
                            bookmark,
                            entry.and_then(|e| e.intent.as_ref()),
                            entry.and_then(|e| e.context.as_ref()),
                        )
                    },
                )
                .await?;
            for (bookmark, result) in done {
                let entry = results.entry(bookmark.id.clone()).or_default();
                entry.add_usage(&result);
                entry.category = Some(result.data);
            }
        }

        let mut connections = Vec::new();
        let mut connected_ids = Vec::new();
        if options.is_enabled(EnrichmentStep::Connections) {
            info!("Detecting connections");
            run.report(EnrichmentStep::Connections, 0);

            let llm_steps_ran = [
                EnrichmentStep::Intent,
                EnrichmentStep::Context,
                EnrichmentStep::Category,
            ]
            .iter()
            .any(|step| options.is_enabled(*step));

            let enriched: Vec<EnrichedBookmark> = bookmarks
                .iter()
                .filter_map(|bookmark| match results.get(&bookmark.id) {
                    Some(entry) => Some(EnrichedBookmark::new(
                        bookmark.clone(),
                        Some(entry.connection_metadata()),
                    )),
                    None if !llm_steps_ran => Some(EnrichedBookmark::new(bookmark.clone(), None)),
                    None => None,
                })
                .collect();

            connections = detect_connections(&enriched, self.config.max_connections_per_bookmark);
            connected_ids = enriched.into_iter().map(|e| e.bookmark.id).collect();

            let summary = connection_summary(&connections);
            info!(
                connections = connections.len(),
                avg_per_bookmark = summary.avg_connections_per_bookmark,
                "Detected connections"
            );
            run.report(EnrichmentStep::Connections, run.total);
        }

        info!("Saving enrichment results");
        let mut successful = 0;
        for bookmark in &bookmarks {
            let Some(entry) = results.get(&bookmark.id) else {
                continue;
            };
            match self.persist_enrichment(&bookmark.id, entry).await {
                Ok(()) => successful += 1,
                Err(e) => {
                    error!(bookmark_id = %bookmark.id, error = %e, "Failed to save enrichment");
                    run.fail(&bookmark.id, e);
                }
            }
        }

        if options.is_enabled(EnrichmentStep::Connections) {
            self.persist_connections(&connected_ids, &connections, &mut run)
                .await;
        }

        let summary = run.tracker.summary();
        let log = NewEnrichmentLog {
            bookmarks_processed: successful,
            tokens_used: summary.total_tokens,
            cost: summary.total_cost,
            model_used: LOG_MODEL_NAME.to_string(),
            enrichment_type: options
                .first_enabled_step()
                .unwrap_or(EnrichmentStep::Intent),
        };
        if let Err(e) = self.store.create_enrichment_log(log).await {
            warn!(error = %e, "Failed to write enrichment log");
        }

        let result = BatchEnrichmentResult {
            total_bookmarks: bookmarks.len(),
            successful,
            failed: bookmarks.len() - successful,
            total_cost: summary.total_cost,
            total_tokens: summary.total_tokens,
            execution_time_ms: elapsed_ms(start),
            category_distribution: distribution(&results),
            connections_detected: connections.len(),
            errors: run.errors,
        };

        info!(
            successful = result.successful,
            total = result.total_bookmarks,
            cost = %format_cost(result.total_cost),
            tokens = result.total_tokens,
            elapsed_ms = result.execution_time_ms,
            "Enrichment complete"
        );

        Ok(result)
    }

    /// Run one LLM step over every bookmark, in order.
    ///
    /// Returns the successful results. Failures are recorded in `run`,
    /// except fatal ones, which end the batch.
    async fn run_step<'a, T, F, Fut>(
        &self,
        step: EnrichmentStep,
        bookmarks: &'a [Bookmark],
        delay: Duration,
        run: &mut RunState<'_>,
        mut analyze: F,
    ) -> EnrichmentResult<Vec<(&'a Bookmark, TaskResult<T>)>>
    where
        F: FnMut(&'a Bookmark) -> Fut,
        Fut: Future<Output = EnrichmentResult<TaskResult<T>>>,
    {
        info!(step = %step, bookmarks = bookmarks.len(), "Starting step");
        run.report(step, 0);

        let mut done = Vec::with_capacity(bookmarks.len());
        for (i, bookmark) in bookmarks.iter().enumerate() {
            match analyze(bookmark).await {
                Ok(result) => {
                    run.tracker
                        .builder()
                        .task(step.as_str())
                        .provider(result.provider.as_str())
                        .model(result.model.as_str())
                        .usage(result.usage)
                        .cost(result.cost)
                        .record();
                    debug!(
                        step = %step,
                        bookmark_id = %bookmark.id,
                        cost = result.cost,
                        "Step done"
                    );
                    done.push((bookmark, result));
                }
                Err(e) if e.is_fatal() => {
                    error!(
                        step = %step,
                        bookmark_id = %bookmark.id,
                        error = %e,
                        "Fatal enrichment error"
                    );
                    return Err(e);
                }
                Err(e) => {
                    error!(
                        step = %step,
                        bookmark_id = %bookmark.id,
                        error = %e,
                        "Enrichment step failed"
                    );
                    run.fail(&bookmark.id, e);
                }
            }

            run.report(step, i + 1);

            if i + 1 < bookmarks.len() && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        Ok(done)
    }

    async fn persist_enrichment(
        &self,
        bookmark_id: &str,
        entry: &BookmarkEnrichment,
    ) -> StoreResult<()> {
        self.store
            .update_enrichment_version(bookmark_id, &self.config.enrichment_version)
            .await?;
        self.store
            .upsert_metadata(entry.to_metadata(bookmark_id))
            .await?;
        debug!(
            bookmark_id,
            cost = entry.cost,
            tokens = entry.tokens,
            "Saved enrichment"
        );
        Ok(())
    }

    /// Replace the stored connections among `ids` with `connections`.
    async fn persist_connections(
        &self,
        ids: &[String],
        connections: &[Connection],
        run: &mut RunState<'_>,
    ) {
        match self.store.delete_connections_within(ids).await {
            Ok(removed) if removed > 0 => debug!(removed, "Removed stale connections"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to remove stale connections"),
        }

        for connection in connections {
            if let Err(e) = self.store.create_connection(connection.clone()).await {
                error!(
                    bookmark_id = %connection.bookmark_id_1,
                    connected_id = %connection.bookmark_id_2,
                    connection_type = %connection.connection_type,
                    error = %e,
                    "Failed to save connection"
                );
                run.fail(&connection.bookmark_id_1, e);
            }
        }
    }

    /// Preview the cost of enriching `ids`, or all unenriched bookmarks.
    ///
    /// Reads from the store only.
    pub async fn estimate_batch_enrichment_cost(
        &self,
        ids: Option<&[String]>,
    ) -> EnrichmentResult<CostEstimate> {
        let bookmarks = self.load_bookmarks(ids).await?;
        Ok(self.estimate_for(&bookmarks))
    }

    /// Cost preview for an already-loaded set of bookmarks.
    pub fn estimate_for(&self, bookmarks: &[Bookmark]) -> CostEstimate {
        let estimated_cost = self.intent.estimate_cost(bookmarks)
            + self.context.estimate_cost(bookmarks)
            + self.category.estimate_cost(bookmarks);

        let count = bookmarks.len();
        let avg_len = bookmarks
            .iter()
            .map(|b| b.content.chars().count())
            .sum::<usize>() as f64
            / count.max(1) as f64;
        let per_bookmark =
            ((avg_len + ESTIMATE_OVERHEAD_CHARS) / 4.0 * CALLS_PER_BOOKMARK).ceil() as u64;

        CostEstimate {
            estimated_cost,
            estimated_tokens: per_bookmark * count as u64,
            bookmarks_count: count,
        }
    }
}

fn distribution(results: &HashMap<String, BookmarkEnrichment>) -> BTreeMap<Category, usize> {
    let mut distribution: BTreeMap<Category, usize> =
        Category::all().iter().map(|c| (*c, 0)).collect();
    for category in results.values().filter_map(|r| r.category.as_ref()) {
        *distribution.entry(category.category).or_default() += 1;
    }
    distribution
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
