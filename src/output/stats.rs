//! Statistics over a crawl result
//!
//! This module provides summary numbers for a finished crawl and the
//! console report printed by the binary.

use crate::crawler::CrawlResult;
use crate::output::CrawlReport;
use crate::url::host_key;
use crate::FetchError;
use std::collections::{BTreeMap, HashSet};

/// Crawl statistics summary
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlStatistics {
    /// Number of pages fetched
    pub total_pages: u64,

    /// Number of URLs whose fetch failed
    pub total_errors: u64,

    /// Number of distinct hosts among pages and errors
    pub unique_hosts: u64,

    /// Failure counts keyed by error kind
    pub errors_by_kind: BTreeMap<&'static str, u64>,
}

impl CrawlStatistics {
    pub fn from_result(result: &CrawlResult) -> Self {
        let mut errors_by_kind = BTreeMap::new();
        for error in result.errors.values() {
            *errors_by_kind.entry(error_kind(error)).or_insert(0) += 1;
        }

        let unique_hosts = result
            .pages
            .iter()
            .chain(result.errors.keys())
            .filter_map(|url| host_key(url).ok())
            .collect::<HashSet<_>>()
            .len() as u64;

        Self {
            total_pages: result.pages.len() as u64,
            total_errors: result.errors.len() as u64,
            unique_hosts,
            errors_by_kind,
        }
    }

    /// Percentage of attempted URLs that were fetched
    pub fn success_rate(&self) -> f64 {
        let attempted = self.total_pages + self.total_errors;
        if attempted > 0 {
            (self.total_pages as f64 / attempted as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// Short label for grouping errors
pub fn error_kind(error: &FetchError) -> &'static str {
    match error {
        FetchError::Http { status } if *status == 404 => "Dead link (404)",
        FetchError::Http { status } if *status == 429 => "Rate limited (429)",
        FetchError::Http { status } if *status >= 500 => "Server error (5xx)",
        FetchError::Http { .. } => "HTTP error",
        FetchError::Timeout => "Timeout",
        FetchError::Connect(_) => "Unreachable",
        FetchError::Network(_) => "Network error",
        FetchError::MalformedUrl { .. } => "Malformed URL",
    }
}

/// Prints a crawl report to stdout
pub fn print_report(report: &CrawlReport) {
    let stats = report.statistics();

    println!("=== Crawl Report ===\n");
    println!("Seed: {} (max depth {})", report.seed, report.max_depth);
    if report.cancelled {
        println!("Crawl was interrupted; results are partial");
    }
    println!(
        "Crawled {} pages from {} hosts in {:.2}s",
        stats.total_pages,
        stats.unique_hosts,
        report.duration_seconds()
    );
    println!();

    if !report.result.pages.is_empty() {
        println!("Pages ({}):", report.result.pages.len());
        for page in &report.result.pages {
            println!("  {}", page);
        }
        println!();
    }

    if !report.result.errors.is_empty() {
        println!("Errors ({}):", report.result.errors.len());
        let mut errors: Vec<_> = report.result.errors.iter().collect();
        errors.sort_by(|a, b| a.0.cmp(b.0));
        for (url, error) in errors {
            println!("  {}: {}", url, error);
        }
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} URLs fetched)",
        stats.success_rate(),
        stats.total_pages,
        stats.total_pages + stats.total_errors
    );
}
