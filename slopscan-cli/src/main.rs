//! slopscan CLI
//!
//! On-device estimates of machine-generated prose for search results.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use serde::Serialize;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use slopscan_core::{
    EvalOptions, Evaluator, JudgmentRecord, LabeledRow, ModelSelector, ScoringModel, SearchResult,
    Thresholds,
};
use slopscan_net::ReqwestFetcher;
use slopscan_runtime::{load_settings, watch_settings, AnalysisDispatcher, RuntimeConfig};
use slopscan_store::{JsonFileStore, KeyValueStore, ResultCache};

#[derive(Parser)]
#[command(name = "slopscan")]
#[command(author, version, about = "slopscan: local machine-generated prose estimates", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (0-3)
    #[arg(short, long, default_value = "1", global = true)]
    verbose: u8,

    /// Runtime config file (TOML)
    #[arg(long, env = "SLOPSCAN_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// JSON file holding settings and cached judgments
    #[arg(long, env = "SLOPSCAN_STORE", default_value = "slopscan-store.json", global = true)]
    store: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a piece of text
    Score {
        /// Default model file (overrides config)
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Japanese model file (overrides config)
        #[arg(long)]
        model_ja: Option<PathBuf>,

        /// Read the text from a file
        #[arg(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,

        /// Text to score
        text: Option<String>,
    },

    /// Fetch, score and cache search results
    Analyze {
        /// JSONL file of {url, title, snippet} results
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Result URLs (no title or snippet)
        urls: Vec<String>,
    },

    /// Delete expired cache entries
    Sweep {
        /// TTL to sweep with (default: stored setting)
        #[arg(long)]
        ttl_hours: Option<u32>,
    },

    /// Evaluate the models against a labelled JSONL dataset
    Evaluate {
        /// JSONL file of {text, label} rows
        #[arg(short, long)]
        input: PathBuf,

        /// Default model file (overrides config)
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Japanese model file (overrides config)
        #[arg(long)]
        model_ja: Option<PathBuf>,

        /// Override human_max for the default model
        #[arg(long)]
        human_max: Option<f64>,

        /// Override ai_min for the default model
        #[arg(long)]
        ai_min: Option<f64>,

        /// Override human_max for the Japanese model
        #[arg(long)]
        ja_human_max: Option<f64>,

        /// Override ai_min for the Japanese model
        #[arg(long)]
        ja_ai_min: Option<f64>,

        /// Stop after this many rows (0 = all)
        #[arg(long, default_value = "0")]
        max_rows: usize,

        /// Write the JSON report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// One `analyze` output line
#[derive(Serialize)]
struct AnalyzedLine<'a> {
    url: &'a str,
    #[serde(flatten)]
    record: &'a JudgmentRecord,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Score {
            model,
            model_ja,
            file,
            text,
        } => {
            let text = match (file, text) {
                (Some(path), _) => fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (None, Some(text)) => text,
                (None, None) => return Err(anyhow!("Provide TEXT or --file")),
            };
            let selector = build_selector(&config, model.as_deref(), model_ja.as_deref())?;
            run_score(&selector, &text);
        }
        Commands::Analyze { input, urls } => {
            run_analyze(&config, &cli.store, input.as_deref(), urls).await?;
        }
        Commands::Sweep { ttl_hours } => {
            run_sweep(&cli.store, ttl_hours).await?;
        }
        Commands::Evaluate {
            input,
            model,
            model_ja,
            human_max,
            ai_min,
            ja_human_max,
            ja_ai_min,
            max_rows,
            output,
        } => {
            let selector = build_selector(&config, model.as_deref(), model_ja.as_deref())?;
            let default_thresholds = selector.default_model().thresholds;
            let language_thresholds = selector
                .language_model()
                .map(|m| m.thresholds)
                .unwrap_or(default_thresholds);

            let options = EvalOptions {
                thresholds: override_thresholds(default_thresholds, human_max, ai_min)?,
                language_thresholds: override_thresholds(language_thresholds, ja_human_max, ja_ai_min)?,
                max_rows,
            };
            run_evaluate(&selector, options, &input, output.as_deref())?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<RuntimeConfig> {
    match path {
        Some(path) => RuntimeConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(RuntimeConfig::default()),
    }
}

/// Models named on the command line must load; configured ones may fall back
fn build_selector(
    config: &RuntimeConfig,
    model: Option<&Path>,
    model_ja: Option<&Path>,
) -> Result<ModelSelector> {
    let configured = config.models.build_selector();
    if model.is_none() && model_ja.is_none() {
        return Ok(configured);
    }

    let load = |path: &Path| {
        ScoringModel::load(path).with_context(|| format!("Failed to load model {}", path.display()))
    };

    let default = match model {
        Some(path) => load(path)?,
        None => configured.default_model().clone(),
    };
    let japanese = match model_ja {
        Some(path) => Some(load(path)?),
        None => configured.language_model().cloned(),
    };

    let selector = ModelSelector::new(default);
    Ok(match japanese {
        Some(model) => selector.with_japanese_model(model),
        None => selector,
    })
}

/// Validated thresholds when either bound is overridden
fn override_thresholds(
    base: Thresholds,
    human_max: Option<f64>,
    ai_min: Option<f64>,
) -> Result<Option<Thresholds>> {
    if human_max.is_none() && ai_min.is_none() {
        return Ok(None);
    }
    let thresholds = Thresholds::strict(
        human_max.unwrap_or(base.human_max),
        ai_min.unwrap_or(base.ai_min),
    )?;
    Ok(Some(thresholds))
}

fn run_score(selector: &ModelSelector, text: &str) {
    let model = selector.select(text);
    let score = model.score(text);
    println!("{:.4}\t{}\t{}", score, model.classify(score), model.name);
}

/// Parse JSONL search results, skipping blank lines
fn parse_results(content: &str) -> Result<Vec<SearchResult>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("Invalid result on line {}", i + 1))
        })
        .collect()
}

async fn run_analyze(
    config: &RuntimeConfig,
    store_path: &Path,
    input: Option<&Path>,
    urls: Vec<String>,
) -> Result<()> {
    let mut results = match input {
        Some(path) => parse_results(
            &fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?,
        )?,
        None => Vec::new(),
    };
    results.extend(urls.iter().map(|url| SearchResult::new(url, "", "")));

    if results.is_empty() {
        return Err(anyhow!("No results to analyze. Pass URLs or --input"));
    }

    let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(store_path).await?);
    let settings = load_settings(store.as_ref()).await?;
    if !settings.enabled {
        println!("slopscan is disabled in settings; nothing to do.");
        return Ok(());
    }

    let fetcher = Arc::new(ReqwestFetcher::new(config.fetch.to_fetch_config())?);
    let dispatcher = AnalysisDispatcher::new(
        config.dispatcher.clone(),
        fetcher,
        store.clone(),
        config.models.build_selector(),
        settings,
    );

    let swept = dispatcher.sweep_expired().await?;
    if swept > 0 {
        info!("Swept {} expired cache entries", swept);
    }

    let watcher = watch_settings(store, dispatcher.clone());

    info!(
        "Analyzing {} results ({} at a time)",
        results.len(),
        config.dispatcher.max_concurrent
    );
    let outcomes = join_all(results.into_iter().map(|result| {
        let dispatcher = dispatcher.clone();
        async move {
            let url = result.url.clone();
            (url, dispatcher.analyze(result).await)
        }
    }))
    .await;

    watcher.abort();

    let mut failed = 0;
    for (url, outcome) in &outcomes {
        match outcome {
            Ok(record) => println!("{}", serde_json::to_string(&AnalyzedLine { url, record })?),
            Err(e) => {
                failed += 1;
                error!("Analysis failed for {}: {}", url, e);
            }
        }
    }

    let stats = dispatcher.stats();
    info!(
        "Done: {} analyzed, {} joined, {} cache hits, {} snippet fallbacks, {} failed",
        stats.analyses, stats.joined, stats.cache_hits, stats.snippet_fallbacks, failed
    );

    Ok(())
}

async fn run_sweep(store_path: &Path, ttl_hours: Option<u32>) -> Result<()> {
    let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(store_path).await?);
    let ttl = match ttl_hours {
        Some(ttl) => ttl,
        None => load_settings(store.as_ref()).await?.cache_ttl_hours,
    };

    let cache = ResultCache::new(store, ttl);
    let removed = cache.sweep_expired(cache.ttl_hours()).await?;
    println!("Removed {} expired entries (TTL {}h)", removed, cache.ttl_hours());
    Ok(())
}

fn run_evaluate(
    selector: &ModelSelector,
    options: EvalOptions,
    input: &Path,
    output: Option<&Path>,
) -> Result<()> {
    let content =
        fs::read_to_string(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let mut evaluator = Evaluator::new(selector, options);

    for (i, line) in content.lines().enumerate() {
        if evaluator.is_full() {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<LabeledRow>(line) {
            Ok(row) => {
                evaluator.push(&row);
            }
            Err(e) => warn!("Skipping line {}: {}", i + 1, e),
        }
    }

    let report = serde_json::to_string_pretty(&evaluator.report())?;
    match output {
        Some(path) => {
            fs::write(path, &report)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Report saved to: {}", path.display());
        }
        None => println!("{}", report),
    }
    Ok(())
}
