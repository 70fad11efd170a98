//! Ripple-Crawl main entry point
//!
//! This is the command-line interface for the Ripple-Crawl crawler.

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use ripple_crawl::config::{load_config_with_hash, validate, Config};
use ripple_crawl::crawler::crawl;
use ripple_crawl::output::{generate_markdown_summary, print_report, CrawlReport};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Ripple-Crawl: a bounded-concurrency web crawler
///
/// Ripple-Crawl follows links outward from a seed URL up to a fixed depth,
/// fetching every reachable page at most once while capping concurrent
/// downloads overall and per host.
#[derive(Parser, Debug)]
#[command(name = "ripple-crawl")]
#[command(version = "1.0.0")]
#[command(about = "A bounded-concurrency web crawler", long_about = None)]
struct Cli {
    /// Seed URL to start crawling from
    #[arg(value_name = "URL")]
    url: String,

    /// Maximum link depth (the seed is depth 1)
    #[arg(short, long)]
    depth: Option<u32>,

    /// Number of concurrent downloads
    #[arg(long)]
    downloaders: Option<usize>,

    /// Number of concurrent link extractions
    #[arg(long)]
    extractors: Option<usize>,

    /// Maximum concurrent downloads to one host
    #[arg(long)]
    per_host: Option<usize>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write a markdown summary to this file
    #[arg(short, long, value_name = "FILE")]
    summary: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = load_settings(&cli)?;

    tracing::info!(
        "Crawling {} to depth {} ({} downloaders, {} extractors, {} per host)",
        cli.url,
        config.crawler.max_depth,
        config.crawler.downloaders,
        config.crawler.extractors,
        config.crawler.per_host
    );

    // Ctrl-C stops the crawl and keeps what was collected so far
    let interrupted = Arc::new(AtomicBool::new(false));
    let shutdown = {
        let interrupted = Arc::clone(&interrupted);
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, stopping crawl");
                interrupted.store(true, Ordering::SeqCst);
            } else {
                // No signal handler; never cancel
                std::future::pending::<()>().await;
            }
        }
    };

    let started_at = Utc::now();
    let result = match crawl(&config, &cli.url, config.crawler.max_depth, shutdown).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            return Err(e.into());
        }
    };

    let report = CrawlReport::new(
        &cli.url,
        config.crawler.max_depth,
        &config.crawler,
        started_at,
        result,
        interrupted.load(Ordering::SeqCst),
    );

    if !cli.quiet {
        print_report(&report);
    }

    if let Some(path) = &cli.summary {
        generate_markdown_summary(&report, path)
            .with_context(|| format!("Failed to write summary to {}", path.display()))?;
        tracing::info!("Summary written to: {}", path.display());
    }

    Ok(())
}

/// Loads the config file if one was given, then applies command-line overrides
fn load_settings(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    if let Some(depth) = cli.depth {
        config.crawler.max_depth = depth;
    }
    if let Some(downloaders) = cli.downloaders {
        config.crawler.downloaders = downloaders;
    }
    if let Some(extractors) = cli.extractors {
        config.crawler.extractors = extractors;
    }
    if let Some(per_host) = cli.per_host {
        config.crawler.per_host = per_host;
    }

    validate(&config).context("Invalid configuration")?;

    Ok(config)
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("ripple_crawl=info,warn"),
            1 => EnvFilter::new("ripple_crawl=debug,info"),
            2 => EnvFilter::new("ripple_crawl=trace,debug"),
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
