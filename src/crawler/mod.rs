//! Crawler module for bounded concurrent traversal
//!
//! This module contains the core crawling logic, including:
//! - Per-host admission control with FIFO backlogs
//! - Fixed-size download and extract worker pools
//! - The completion-queue driver that collects the result
//! - The HTTP downloader and HTML document used by the binary

mod admission;
mod coordinator;
mod fetcher;
mod parser;
mod pool;
mod result;
mod task;
mod traits;

pub use admission::{Admission, HostAdmission};
pub use coordinator::Crawler;
pub use fetcher::{build_http_client, HttpDownloader};
pub use parser::{parse_links, HtmlDocument};
pub use pool::WorkerPool;
pub use result::{CrawlResult, ResultAccumulator};
pub use task::{PendingDownload, Task, TaskOutcome};
pub use traits::{Document, Downloader};

use crate::config::Config;
use crate::CrawlError;
use std::future::Future;
use std::sync::Arc;

/// Runs one complete crawl over HTTP
///
/// This is the main entry point used by the binary. It will:
/// 1. Build the HTTP downloader from the configuration
/// 2. Start the worker pools
/// 3. Traverse from `seed` up to `max_depth`, stopping early if `shutdown` resolves
/// 4. Shut the pools down
///
/// # Returns
///
/// * `Ok(CrawlResult)` - Pages and per-URL errors (partial if cancelled)
/// * `Err(CrawlError)` - The crawl could not run
pub async fn crawl<F>(
    config: &Config,
    seed: &str,
    max_depth: u32,
    shutdown: F,
) -> Result<CrawlResult, CrawlError>
where
    F: Future<Output = ()>,
{
    let downloader = HttpDownloader::new(&config.user_agent, &config.crawler)?;
    let crawler = Crawler::new(Arc::new(downloader), config.crawler.clone())?;

    let result = crawler.download_until(seed, max_depth, shutdown).await;

    // Pools close on drop either way; only wait for them after a clean run
    match result {
        Ok(result) => {
            crawler.close().await?;
            Ok(result)
        }
        Err(e) => Err(e),
    }
}
