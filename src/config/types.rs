use serde::Deserialize;

/// Main configuration structure for Ripple-Crawl
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
}

/// How long the visited set lives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VisitedScope {
    /// Each `download()` call starts from an empty visited set
    #[default]
    PerCall,
    /// One visited set is reused by every call on the same crawler
    Shared,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum number of concurrent fetches
    #[serde(default = "default_one")]
    pub downloaders: usize,

    /// Maximum number of concurrent link-extraction tasks
    #[serde(default = "default_one")]
    pub extractors: usize,

    /// Maximum number of concurrent fetches to the same host
    #[serde(default = "default_one")]
    pub per_host: usize,

    /// Link depth used when the caller does not pass one (the seed is depth 1)
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    #[serde(default)]
    pub visited_scope: VisitedScope,

    /// Whole-request timeout for the HTTP downloader
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            downloaders: default_one(),
            extractors: default_one(),
            per_host: default_one(),
            max_depth: default_max_depth(),
            visited_scope: VisitedScope::default(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    ///
    /// Format: `CrawlerName/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "RippleCrawl".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://example.com/ripple-crawl".to_string(),
            contact_email: "crawler@example.com".to_string(),
        }
    }
}

fn default_one() -> usize {
    1
}

fn default_max_depth() -> u32 {
    3
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}
