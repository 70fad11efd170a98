//! Capabilities the crawler consumes
//!
//! The crawler never performs network I/O or HTML parsing itself. It fetches
//! through a [`Downloader`] and asks each fetched [`Document`] for its links.

use crate::{ExtractError, FetchError};
use async_trait::async_trait;

/// Fetches one URL
///
/// Implementations may be slow and may fail; the crawler bounds how many
/// fetches run at once and records failures per URL. Caching and retries
/// are the implementation's business.
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Box<dyn Document>, FetchError>;
}

/// A fetched page that can enumerate its outbound links
///
/// `extract_links` may block (it runs on a blocking thread). An error is
/// treated as a page with no links.
pub trait Document: Send + Sync {
    fn extract_links(&self) -> Result<Vec<String>, ExtractError>;
}
