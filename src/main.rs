//! Kite-Harvest main entry point
//!
//! This is the command-line interface for the Kite-Harvest job crawler.

use anyhow::Context;
use clap::Parser;
use kite_harvest::capabilities::{
    build_http_client, Advisor, Capabilities, HeuristicClassifier, HtmlCleaner, HttpAdvisor,
    HttpBrowser, HttpSourceValidator, HttpUrlResolver, ManualSignal, RuleAdvisor, ScraperLinkTools,
    StructuredExtractor,
};
use kite_harvest::config::{load_config_with_hash, Config};
use kite_harvest::events::TracingSink;
use kite_harvest::orchestrator::{CrawlContext, Orchestrator};
use kite_harvest::storage::{RunStatus, SqliteStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Kite-Harvest: an adaptive job-posting crawler
///
/// Kite-Harvest crawls the configured job sources in cycles, extracting
/// postings into a local database. Captchas and login walls are handed to
/// the operator: clear them in the browser, then press Enter.
#[derive(Parser, Debug)]
#[command(name = "kite-harvest")]
#[command(version)]
#[command(about = "An adaptive job-posting crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show per-source statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
        Ok(())
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_crawl(config, &config_hash, cli.once).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("kite_harvest=info,warn"),
            1 => EnvFilter::new("kite_harvest=debug,info"),
            2 => EnvFilter::new("kite_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Kite-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Job cap per source: {}", config.crawler.max_jobs_per_source);
    println!("  Max retries: {}", config.crawler.max_retries);
    println!("  Max URL corrections: {}", config.crawler.max_url_corrections);
    println!("  Pagination seeds: {}", config.crawler.pagination_seeds);
    println!(
        "  Settle window: {}-{}ms",
        config.crawler.settle_min_ms, config.crawler.settle_max_ms
    );

    println!("\nScheduler:");
    println!("  Parallel sources: {}", config.scheduler.parallel_sources);
    println!("  Cycle delay: {}s", config.scheduler.cycle_delay_secs);
    println!("  Human timeout: {}s", config.scheduler.human_timeout_secs);

    println!("\nAdvisory:");
    match &config.advisory.endpoint {
        Some(endpoint) => println!("  Endpoint: {}", endpoint),
        None => println!("  Local rules"),
    }

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    let enabled = config.sources.iter().filter(|s| s.enabled).count();
    println!("\nSources ({}, {} enabled):", config.sources.len(), enabled);
    for source in &config.sources {
        println!(
            "  - {} [{}] {}{}",
            source.name,
            source.source_type,
            source.url,
            if source.enabled { "" } else { " (disabled)" }
        );
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let store = SqliteStore::open(Path::new(&config.output.database_path))
        .context("Failed to open database")?;
    let stats = store.source_stats().context("Failed to load statistics")?;

    if stats.is_empty() {
        println!("No sources recorded yet");
        return Ok(());
    }

    println!(
        "{:<24} {:>7} {:>9} {:>8} {:>8}  {}",
        "SOURCE", "JOBS", "CAPTURES", "VISITED", "BLOCKED", "LAST STATUS"
    );
    for row in &stats {
        let status = row
            .last_status
            .map(|s| s.to_db_string())
            .unwrap_or("never");
        println!(
            "{:<24} {:>7} {:>9} {:>8} {:>8}  {}{}",
            row.name,
            row.jobs,
            row.captures,
            row.visited,
            row.blocked,
            status,
            if row.enabled { "" } else { " (disabled)" }
        );
        if let Some(message) = &row.last_message {
            println!("{:<24} {}", "", message);
        }
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: &str, once: bool) -> anyhow::Result<()> {
    let store = Arc::new(
        SqliteStore::open(Path::new(&config.output.database_path))
            .context("Failed to open database")?,
    );
    let source_ids = store
        .sync_sources(&config.sources)
        .context("Failed to sync sources")?;
    tracing::info!("Synced {} sources from configuration", source_ids.len());

    let run_id = store.begin_run(config_hash).context("Failed to start run")?;

    let client = build_http_client(&config.browser.user_agent)
        .context("Failed to build HTTP client")?;
    let advisor: Arc<dyn Advisor> = match &config.advisory.endpoint {
        Some(endpoint) => {
            tracing::info!("Using advisory endpoint {}", endpoint);
            Arc::new(HttpAdvisor::new(client.clone(), endpoint.clone()))
        }
        None => Arc::new(RuleAdvisor),
    };
    let signal = Arc::new(ManualSignal::new());

    let caps = Capabilities {
        browser: Arc::new(HttpBrowser::new(client.clone())),
        cleaner: Arc::new(HtmlCleaner),
        extractor: Arc::new(StructuredExtractor),
        classifier: Arc::new(HeuristicClassifier),
        links: Arc::new(ScraperLinkTools),
        resolver: Arc::new(HttpUrlResolver::new(client.clone())),
        validator: Arc::new(HttpSourceValidator::new(client)),
        advisor,
        signal: signal.clone(),
        store: store.clone(),
        events: Arc::new(TracingSink),
    };

    let stop = CancellationToken::new();
    spawn_interrupt_handler(stop.clone());
    spawn_operator_input(signal, stop.clone());

    let ctx = CrawlContext::new(caps, &config);
    let orchestrator = Orchestrator::new(ctx, config.browser.visible);
    let outcome = orchestrator.run(&stop, once).await;

    let status = match (&outcome, stop.is_cancelled()) {
        (Err(_), _) | (Ok(_), true) => RunStatus::Interrupted,
        (Ok(_), false) => RunStatus::Completed,
    };
    if let Err(e) = store.finish_run(run_id, status) {
        tracing::warn!("Failed to record run status: {}", e);
    }

    let report = outcome.context("Crawl failed")?;
    tracing::info!(
        "Crawl finished after {} cycles: {} jobs extracted",
        report.cycles,
        report.jobs_extracted
    );
    Ok(())
}

/// Cancels the crawl on Ctrl-C
fn spawn_interrupt_handler(stop: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Interrupt received, stopping");
                stop.cancel();
            }
            Err(e) => tracing::error!("Failed to listen for Ctrl-C: {}", e),
        }
    });
}

/// Resolves the oldest pending wall each time the operator presses Enter
fn spawn_operator_input(signal: Arc<ManualSignal>, stop: CancellationToken) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = tokio::select! {
                _ = stop.cancelled() => break,
                line = lines.next_line() => line,
            };
            match line {
                Ok(Some(_)) => {
                    if !signal.resolve() {
                        tracing::info!("Nothing is waiting for a human");
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("Failed to read operator input: {}", e);
                    break;
                }
            }
        }
    });
}
