//! Output module for reporting crawl results
//!
//! This module handles:
//! - Printing the crawled page count, pages and per-URL errors
//! - Generating markdown summaries of a crawl
//! - Computing summary statistics

mod markdown;
pub mod stats;

pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use stats::{print_report, CrawlStatistics};

use crate::config::CrawlerConfig;
use crate::crawler::CrawlResult;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// A finished (or cancelled) crawl with the settings it ran with
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub seed: String,
    pub max_depth: u32,
    pub downloaders: usize,
    pub extractors: usize,
    pub per_host: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// True if the crawl was interrupted and `result` is partial
    pub cancelled: bool,

    pub result: CrawlResult,
}

impl CrawlReport {
    pub fn new(
        seed: &str,
        max_depth: u32,
        config: &CrawlerConfig,
        started_at: DateTime<Utc>,
        result: CrawlResult,
        cancelled: bool,
    ) -> Self {
        Self {
            seed: seed.to_string(),
            max_depth,
            downloaders: config.downloaders,
            extractors: config.extractors,
            per_host: config.per_host,
            started_at,
            finished_at: Utc::now(),
            cancelled,
            result,
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    pub fn statistics(&self) -> CrawlStatistics {
        CrawlStatistics::from_result(&self.result)
    }
}
