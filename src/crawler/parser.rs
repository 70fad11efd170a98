//! HTML document for extracting outbound links
//!
//! `HtmlDocument` is the [`Document`] produced by the HTTP downloader. Parsing
//! is deferred until links are requested, so the document stays `Send` and
//! the parse runs on an extract worker rather than a download worker.

use crate::crawler::traits::Document;
use crate::ExtractError;
use scraper::{Html, Selector};
use url::Url;

/// A fetched page whose links have not been extracted yet
#[derive(Debug, Clone)]
pub struct HtmlDocument {
    /// Final URL of the response, used to resolve relative links
    base_url: Url,

    /// Page body, `None` for non-HTML responses
    body: Option<String>,
}

impl HtmlDocument {
    pub fn new(base_url: Url, body: String) -> Self {
        Self {
            base_url,
            body: Some(body),
        }
    }

    /// A document with no outbound links (e.g. an image or a PDF)
    pub fn empty(base_url: Url) -> Self {
        Self {
            base_url,
            body: None,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

impl Document for HtmlDocument {
    fn extract_links(&self) -> Result<Vec<String>, ExtractError> {
        match &self.body {
            Some(body) => parse_links(body, &self.base_url),
            None => Ok(Vec::new()),
        }
    }
}

/// Parses HTML content and extracts absolute links
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs
/// - Fragment-only links
///
/// Fragments are stripped from the resolved URLs, so `/page#a` and `/page#b`
/// are the same link.
///
/// # Example
///
/// ```
/// use ripple_crawl::crawler::parse_links;
/// use url::Url;
///
/// let html = r#"<html><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let links = parse_links(html, &base_url).unwrap();
/// assert_eq!(links, vec!["https://example.com/page".to_string()]);
/// ```
pub fn parse_links(html: &str, base_url: &Url) -> Result<Vec<String>, ExtractError> {
    let document = Html::parse_document(html);
    let mut links = Vec::new();

    let a_selector =
        Selector::parse("a[href]").map_err(|e| ExtractError::Selector(e.to_string()))?;
    for element in document.select(&a_selector) {
        if element.value().attr("download").is_some() {
            continue;
        }

        if let Some(href) = element.value().attr("href") {
            if let Some(absolute_url) = resolve_link(href, base_url) {
                links.push(absolute_url);
            }
        }
    }

    let canonical_selector = Selector::parse("link[rel='canonical'][href]")
        .map_err(|e| ExtractError::Selector(e.to_string()))?;
    for element in document.select(&canonical_selector) {
        if let Some(href) = element.value().attr("href") {
            if let Some(absolute_url) = resolve_link(href, base_url) {
                links.push(absolute_url);
            }
        }
    }

    Ok(links)
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let mut absolute_url = base_url.join(href).ok()?;
    if absolute_url.scheme() != "http" && absolute_url.scheme() != "https" {
        return None;
    }
    absolute_url.set_fragment(None);

    Some(absolute_url.to_string())
}
