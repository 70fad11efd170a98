use crate::{UrlError, UrlResult};
use url::Url;

/// Parses a URL string, requiring it to carry a host
///
/// # Arguments
///
/// * `raw` - The URL as discovered or supplied by the caller
///
/// # Returns
///
/// * `Ok(Url)` - The parsed URL
/// * `Err(UrlError)` - The string is not a URL or has no host
pub fn parse_url(raw: &str) -> UrlResult<Url> {
    let url = Url::parse(raw).map_err(|e| UrlError::Parse {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost(raw.to_string()));
    }

    Ok(url)
}

/// Extracts the host from a parsed URL
///
/// The host is lowercased; the port is not part of it.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use ripple_crawl::url::extract_host;
///
/// let url = Url::parse("https://EXAMPLE.com:8080/path").unwrap();
/// assert_eq!(extract_host(&url), Some("example.com".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Derives the admission-control partition key for a URL string
///
/// # Examples
///
/// ```
/// use ripple_crawl::url::host_key;
///
/// assert_eq!(host_key("http://a/page").unwrap(), "a");
/// assert!(host_key("not a url").is_err());
/// ```
pub fn host_key(raw: &str) -> UrlResult<String> {
    let url = parse_url(raw)?;
    extract_host(&url).ok_or_else(|| UrlError::MissingHost(raw.to_string()))
}
