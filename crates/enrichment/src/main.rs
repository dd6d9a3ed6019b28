//! stash-enrich CLI - batch enrichment for saved bookmarks.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stash_cost::format_cost;
use stash_enrich::pipeline::{BatchEnrichmentResult, EnrichmentOptions, EnrichmentPipeline};
use stash_enrich::store::{BookmarkStore, FileStore};
use stash_enrich::{Bookmark, Category, PipelineConfig, StoreError};
use stash_llm::{LlmClient, LlmConfig};

/// Maximum per-bookmark errors printed after a run.
const MAX_PRINTED_ERRORS: usize = 10;

/// stash-enrich - AI enrichment for saved social-media bookmarks.
#[derive(Parser)]
#[command(name = "stash-enrich")]
#[command(about = "Enrich saved bookmarks with intent, context, category and connections")]
#[command(version)]
pub struct Cli {
    /// Bookmark store (JSON snapshot)
    #[arg(long, global = true, env = "STASH_STORE", default_value = "stash.json")]
    store: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load bookmarks from a JSON array into the store
    Import {
        /// JSON file containing an array of bookmarks
        file: PathBuf,
    },

    /// Preview the cost of an enrichment run
    Estimate {
        /// Bookmark ids (defaults to every unenriched bookmark)
        #[arg(long = "id")]
        ids: Vec<String>,
    },

    /// Run the enrichment pipeline
    Enrich {
        /// Bookmark ids (defaults to every unenriched bookmark)
        #[arg(long = "id")]
        ids: Vec<String>,

        /// Skip intent analysis
        #[arg(long)]
        skip_intent: bool,

        /// Skip context extraction
        #[arg(long)]
        skip_context: bool,

        /// Skip categorization
        #[arg(long)]
        skip_category: bool,

        /// Skip connection detection
        #[arg(long)]
        skip_connections: bool,
    },

    /// Check that each configured LLM provider answers
    TestConnection,

    /// Show enrichment totals from the store
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    match cli.command {
        Commands::Import { file } => run_import(&cli.store, file).await,
        Commands::Estimate { ids } => run_estimate(&cli.store, &ids).await,
        Commands::Enrich {
            ids,
            skip_intent,
            skip_context,
            skip_category,
            skip_connections,
        } => {
            let options = EnrichmentOptions {
                skip_intent,
                skip_context,
                skip_category,
                skip_connections,
                on_progress: None,
            };
            tracing::info!(
                store = %cli.store.display(),
                ids = ids.len(),
                ?options,
                "Starting enrich"
            );
            run_enrich(&cli.store, &ids, options).await
        }
        Commands::TestConnection => run_test_connection().await,
        Commands::Stats => run_stats(&cli.store).await,
    }
}

fn init_tracing(verbose: bool, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("stash_enrich=debug,stash_llm=debug,stash_cost=debug,info")
        } else {
            EnvFilter::new("stash_enrich=info,warn")
        }
    });

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

async fn open_store(path: &Path) -> Result<Arc<FileStore>> {
    let store = FileStore::open(path)
        .await
        .with_context(|| format!("Failed to open store {}", path.display()))?;
    Ok(Arc::new(store))
}

async fn build_pipeline(store: Arc<FileStore>) -> Result<EnrichmentPipeline> {
    let llm_config = LlmConfig::from_env();
    let client = LlmClient::from_config(&llm_config).context("Failed to configure LLM client")?;
    tracing::debug!(providers = ?client.available_providers(), "LLM client ready");

    let pipeline = EnrichmentPipeline::new(Arc::new(client), store, PipelineConfig::from_env())?;
    Ok(pipeline)
}

fn id_filter(ids: &[String]) -> Option<&[String]> {
    (!ids.is_empty()).then_some(ids)
}

async fn run_import(store_path: &Path, file: PathBuf) -> Result<()> {
    let raw = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let bookmarks: Vec<Bookmark> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse bookmarks from {}", file.display()))?;

    let store = open_store(store_path).await?;
    let mut imported = 0;
    let mut skipped = 0;
    for bookmark in bookmarks {
        match store.insert_bookmark(bookmark).await {
            Ok(()) => imported += 1,
            Err(StoreError::Duplicate { id }) => {
                tracing::debug!(bookmark_id = %id, "Bookmark already stored, skipping");
                skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    println!(
        "{} Imported {} bookmarks ({} already stored)",
        "✓".green().bold(),
        imported.to_string().bold(),
        skipped
    );
    println!("   Store: {} ({} total)", store_path.display(), store.count().await?);
    Ok(())
}

async fn run_estimate(store_path: &Path, ids: &[String]) -> Result<()> {
    let store = open_store(store_path).await?;
    let pipeline = build_pipeline(store).await?;
    let estimate = pipeline.estimate_batch_enrichment_cost(id_filter(ids)).await?;

    println!("{}", "Cost estimate".bold().underline());
    println!("   Bookmarks: {}", estimate.bookmarks_count);
    println!("   Tokens:    ~{}", estimate.estimated_tokens);
    println!(
        "   Cost:      {}",
        format_cost(estimate.estimated_cost).yellow()
    );
    Ok(())
}

async fn run_enrich(store_path: &Path, ids: &[String], options: EnrichmentOptions) -> Result<()> {
    let store = open_store(store_path).await?;
    let pipeline = build_pipeline(store).await?;

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} {prefix:>11.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-"),
    );

    let progress_bar = bar.clone();
    let options = options.with_progress(move |progress| {
        progress_bar.set_prefix(progress.current_step.as_str());
        progress_bar.set_length(progress.total_bookmarks as u64);
        progress_bar.set_position(progress.completed as u64);
        progress_bar.set_message(format!(
            "{} (est. {}, ~{}s left)",
            format_cost(progress.current_cost),
            format_cost(progress.estimated_cost),
            progress.estimated_time_remaining_ms.div_ceil(1000)
        ));
    });

    let result = pipeline.enrich_bookmark_batch(id_filter(ids), options).await;
    bar.finish_and_clear();

    print_summary(&result?);
    Ok(())
}

fn print_summary(result: &BatchEnrichmentResult) {
    if result.total_bookmarks == 0 {
        println!("{} No bookmarks to enrich", "ℹ".blue().bold());
        return;
    }

    println!("\n{}", "Enrichment Summary".bold().underline());
    println!("   Bookmarks:   {}", result.total_bookmarks);
    println!("   Successful:  {}", result.successful.to_string().green());
    if result.failed > 0 {
        println!("   Failed:      {}", result.failed.to_string().red());
    } else {
        println!("   Failed:      0");
    }
    println!("   Cost:        {}", format_cost(result.total_cost).yellow());
    println!("   Tokens:      {}", result.total_tokens);
    println!("   Connections: {}", result.connections_detected);
    println!(
        "   Time:        {:.1}s",
        result.execution_time_ms as f64 / 1000.0
    );

    if result.category_distribution.values().any(|n| *n > 0) {
        println!("\n{}", "Categories".bold());
        for (category, count) in &result.category_distribution {
            println!("   {:<14} {count}", category.as_str());
        }
    }

    if !result.errors.is_empty() {
        println!("\n{} ({})", "Errors".red().bold(), result.errors.len());
        for err in result.errors.iter().take(MAX_PRINTED_ERRORS) {
            eprintln!("   - {}: {}", err.bookmark_id, err.error);
        }
        if result.errors.len() > MAX_PRINTED_ERRORS {
            eprintln!("   ... and {} more", result.errors.len() - MAX_PRINTED_ERRORS);
        }
    }
}

async fn run_test_connection() -> Result<()> {
    let client = LlmClient::from_config(&LlmConfig::from_env())
        .context("Failed to configure LLM client")?;
    let result = client.test_connection().await;

    let status = |ok: bool| {
        if ok {
            "✓ connected".green().to_string()
        } else {
            "✗ unavailable".red().to_string()
        }
    };
    println!("{}", "Provider connectivity".bold().underline());
    println!("   OpenAI:    {}", status(result.openai));
    println!("   Anthropic: {}", status(result.anthropic));
    if let Some(error) = &result.error {
        eprintln!("\n{} {}", "✗".red().bold(), error);
    }

    if !result.openai && !result.anthropic {
        anyhow::bail!("No LLM provider answered the connection test");
    }
    Ok(())
}

async fn run_stats(store_path: &Path) -> Result<()> {
    let store = open_store(store_path).await?;

    let logs = store.enrichment_logs().await?;
    let metadata = store.all_metadata().await?;
    let connections = store.all_connections().await?;

    println!("{}", "Store".bold().underline());
    println!("   Bookmarks:   {}", store.count().await?);
    println!("   Enriched:    {}", metadata.len());
    println!("   Connections: {}", connections.len());

    println!("\n{}", "Enrichment runs".bold().underline());
    println!("   Runs:   {}", logs.len());
    println!("   Cost:   {}", format_cost(store.total_cost().await?).yellow());
    println!("   Tokens: {}", store.total_tokens().await?);
    for entry in store.cost_by_type().await? {
        println!(
            "   {:<12} {} ({} tokens)",
            entry.enrichment_type.as_str(),
            format_cost(entry.cost),
            entry.tokens_used
        );
    }

    println!("\n{}", "Categories".bold().underline());
    for category in Category::all() {
        let count = metadata
            .iter()
            .filter(|m| m.category == Some(*category))
            .count();
        println!("   {:<14} {count}", category.as_str());
    }
    Ok(())
}
