//! Crawl result and the accumulator the driver builds it with

use crate::FetchError;
use std::collections::{HashMap, HashSet};

/// Pages fetched and errors hit during one traversal
///
/// `pages` is in completion order, which depends on scheduling and is not
/// deterministic across runs. A URL appears in at most one of `pages` and
/// `errors`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlResult {
    /// Successfully fetched URLs
    pub pages: Vec<String>,

    /// URLs whose fetch failed, with the reason
    pub errors: HashMap<String, FetchError>,
}

impl CrawlResult {
    /// Result for a seed that is not a usable URL
    pub fn malformed_seed(seed: &str, error: FetchError) -> Self {
        let mut errors = HashMap::new();
        errors.insert(seed.to_string(), error);
        Self {
            pages: Vec::new(),
            errors,
        }
    }

    /// Pages as a set, for order-insensitive comparison
    pub fn page_set(&self) -> HashSet<&str> {
        self.pages.iter().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty() && self.errors.is_empty()
    }
}

/// Builds a [`CrawlResult`] as task outcomes arrive
///
/// Owned by the traversal driver alone; workers never touch it.
#[derive(Debug, Default)]
pub struct ResultAccumulator {
    pages: Vec<String>,
    recorded: HashSet<String>,
    errors: HashMap<String, FetchError>,
}

impl ResultAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a fetched URL unless it is already a page or an error
    pub fn record_page(&mut self, url: String) {
        if self.errors.contains_key(&url) || self.recorded.contains(&url) {
            return;
        }
        self.recorded.insert(url.clone());
        self.pages.push(url);
    }

    /// Records a failed URL unless it is already a page
    pub fn record_error(&mut self, url: String, error: FetchError) {
        if self.recorded.contains(&url) {
            return;
        }
        self.errors.insert(url, error);
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn finish(self) -> CrawlResult {
        CrawlResult {
            pages: self.pages,
            errors: self.errors,
        }
    }
}
