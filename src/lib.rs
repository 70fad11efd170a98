//! Ripple-Crawl: a bounded-concurrency web crawler
//!
//! This crate walks the link graph reachable from a seed URL up to a fixed
//! depth, with a global cap on simultaneous downloads, a separate cap on
//! simultaneous link extractions, and a per-host cap on downloads to the
//! same origin. Every URL is fetched at most once per traversal, and both
//! fetched pages and per-URL fetch errors are collected into one result.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod url;

use thiserror::Error;

/// Traversal-fatal errors
///
/// Ordinary fetch failures never show up here; they are recorded per URL in
/// [`crawler::CrawlResult::errors`].
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Maximum depth must be at least 1, got {0}")]
    InvalidDepth(u32),

    #[error("Worker pool is closed")]
    PoolClosed,

    #[error("Admission control error: {0}")]
    Admission(#[from] AdmissionError),

    #[error("Task for {url} panicked: {message}")]
    TaskPanicked { url: String, message: String },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to fetch a single URL
///
/// These are recorded against the URL in the crawl result and never abort
/// the traversal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("HTTP {status}")]
    Http { status: u16 },

    #[error("Request timeout")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Network error: {0}")]
    Network(String),

    /// The URL could not be parsed or has no host
    #[error("Malformed URL {url}: {reason}")]
    MalformedUrl { url: String, reason: String },
}

impl From<UrlError> for FetchError {
    fn from(err: UrlError) -> Self {
        match err {
            UrlError::Parse { url, reason } => FetchError::MalformedUrl { url, reason },
            UrlError::MissingHost(url) => FetchError::MalformedUrl {
                url,
                reason: "missing host".to_string(),
            },
        }
    }
}

/// Failure to pull links out of a fetched document
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Failed to parse document {url}: {message}")]
    Parse { url: String, message: String },

    #[error("Invalid selector: {0}")]
    Selector(String),
}

/// Host admission invariant violations
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("Released host {host} with no admitted downloads")]
    NothingAdmitted { host: String },

    #[error("Host {host} has {active} active downloads, limit is {limit}")]
    LimitExceeded {
        host: String,
        active: usize,
        limit: usize,
    },

    #[error("Host {host} still has {active} active and {waiting} waiting downloads")]
    Outstanding {
        host: String,
        active: usize,
        waiting: usize,
    },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("Failed to parse URL {url}: {reason}")]
    Parse { url: String, reason: String },

    #[error("Missing host in URL {0}")]
    MissingHost(String),
}

/// Result type alias for crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlResult, Crawler, Document, Downloader};
pub use crate::url::host_key;
