//! Integration tests for the crawler
//!
//! Most tests drive a `Crawler` with an in-memory link graph so the
//! concurrency limits can be observed directly. The last few use wiremock
//! to run the HTTP downloader end-to-end.

use async_trait::async_trait;
use ripple_crawl::config::{Config, CrawlerConfig, VisitedScope};
use ripple_crawl::crawler::{crawl, HttpDownloader};
use ripple_crawl::{host_key, CrawlError, Crawler, Document, Downloader, ExtractError, FetchError};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct FakePage {
    url: String,
    links: Vec<String>,
    broken: bool,
}

impl Document for FakePage {
    fn extract_links(&self) -> Result<Vec<String>, ExtractError> {
        if self.broken {
            return Err(ExtractError::Parse {
                url: self.url.clone(),
                message: "unreadable document".to_string(),
            });
        }
        Ok(self.links.clone())
    }
}

/// In-memory web that records what was fetched and how many fetches
/// overlapped per host
#[derive(Default)]
struct FakeWeb {
    graph: HashMap<String, Vec<String>>,
    failing: HashSet<String>,
    broken: HashSet<String>,
    hanging: HashSet<String>,
    slow: HashSet<String>,
    delay: Duration,

    fetches: Mutex<Vec<String>>,
    active: Mutex<HashMap<String, usize>>,
    peak: Mutex<HashMap<String, usize>>,
}

impl FakeWeb {
    fn new(edges: &[(&str, &[&str])]) -> Self {
        let mut web = Self::default();
        for (from, to) in edges {
            web.link(from, to.iter().map(|s| s.to_string()).collect());
        }
        web
    }

    fn link(&mut self, from: &str, to: Vec<String>) {
        self.graph.insert(from.to_string(), to);
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    fn broken(mut self, url: &str) -> Self {
        self.broken.insert(url.to_string());
        self
    }

    fn hanging(mut self, url: &str) -> Self {
        self.hanging.insert(url.to_string());
        self
    }

    fn slow(mut self, url: &str) -> Self {
        self.slow.insert(url.to_string());
        self
    }

    fn fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }

    fn fetch_count(&self, url: &str) -> usize {
        self.fetches().iter().filter(|u| *u == url).count()
    }

    fn peak(&self, host: &str) -> usize {
        self.peak.lock().unwrap().get(host).copied().unwrap_or(0)
    }

    fn peaks(&self) -> HashMap<String, usize> {
        self.peak.lock().unwrap().clone()
    }
}

#[async_trait]
impl Downloader for FakeWeb {
    async fn fetch(&self, url: &str) -> Result<Box<dyn Document>, FetchError> {
        let host = host_key(url).unwrap();

        self.fetches.lock().unwrap().push(url.to_string());
        {
            let mut active = self.active.lock().unwrap();
            let count = active.entry(host.clone()).or_insert(0);
            *count += 1;
            let mut peak = self.peak.lock().unwrap();
            let max = peak.entry(host.clone()).or_insert(0);
            *max = (*max).max(*count);
        }

        if self.hanging.contains(url) {
            std::future::pending::<()>().await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.slow.contains(url) {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        *self.active.lock().unwrap().get_mut(&host).unwrap() -= 1;

        if self.failing.contains(url) {
            return Err(FetchError::Http { status: 500 });
        }
        match self.graph.get(url) {
            Some(links) => Ok(Box::new(FakePage {
                url: url.to_string(),
                links: links.clone(),
                broken: self.broken.contains(url),
            })),
            None => Err(FetchError::Http { status: 404 }),
        }
    }
}

fn create_test_config(downloaders: usize, extractors: usize, per_host: usize) -> CrawlerConfig {
    CrawlerConfig {
        downloaders,
        extractors,
        per_host,
        ..CrawlerConfig::default()
    }
}

fn crawler_for(web: &Arc<FakeWeb>, config: CrawlerConfig) -> Crawler {
    let downloader: Arc<dyn Downloader> = web.clone();
    Crawler::new(downloader, config).unwrap()
}

const A: &str = "http://a.test/";
const B: &str = "http://b.test/";
const C: &str = "http://c.test/";
const D: &str = "http://d.test/";

fn diamond() -> FakeWeb {
    FakeWeb::new(&[(A, &[B, C]), (B, &[A, D]), (C, &[]), (D, &[])])
}

#[tokio::test]
async fn test_depth_two_fetches_seed_and_children() {
    let web = Arc::new(diamond());
    let crawler = crawler_for(&web, create_test_config(2, 2, 1));

    let result = crawler.download(A, 2).await.unwrap();

    assert_eq!(result.page_set(), HashSet::from([A, B, C]));
    assert!(result.errors.is_empty());
    assert_eq!(web.fetch_count(A), 1);
    assert_eq!(web.fetch_count(D), 0);
}

#[tokio::test]
async fn test_depth_three_reaches_grandchildren() {
    let web = Arc::new(diamond());
    let crawler = crawler_for(&web, create_test_config(2, 2, 1));

    let result = crawler.download(A, 3).await.unwrap();

    assert_eq!(result.page_set(), HashSet::from([A, B, C, D]));
    assert_eq!(result.pages.len(), 4);
    for url in [A, B, C, D] {
        assert_eq!(web.fetch_count(url), 1, "{} fetched more than once", url);
    }
}

#[tokio::test]
async fn test_depth_bound_on_a_chain() {
    let chain: Vec<String> = (0..6).map(|i| format!("http://chain.test/{}", i)).collect();
    let mut web = FakeWeb::default();
    for pair in chain.windows(2) {
        web.link(&pair[0], vec![pair[1].clone()]);
    }
    web.link(&chain[5], vec![]);
    let web = Arc::new(web);
    let crawler = crawler_for(&web, create_test_config(4, 2, 4));

    let result = crawler.download(&chain[0], 3).await.unwrap();

    assert_eq!(result.pages, chain[..3].to_vec());
    assert_eq!(web.fetches(), chain[..3].to_vec());
}

#[tokio::test]
async fn test_per_host_limit_of_one_serializes_same_host_downloads() {
    let hub = "http://hub.test/";
    let leaves: Vec<String> = (0..10).map(|i| format!("http://same.test/{}", i)).collect();

    let mut web = FakeWeb::default().with_delay(Duration::from_millis(5));
    web.link(hub, leaves.clone());
    for leaf in &leaves {
        web.link(leaf, vec![]);
    }
    let web = Arc::new(web);
    let crawler = crawler_for(&web, create_test_config(10, 2, 1));

    let result = crawler.download(hub, 2).await.unwrap();

    assert_eq!(result.pages.len(), 11);
    assert_eq!(web.peak("same.test"), 1);

    // Backlogged downloads for a host start in discovery order
    let same_host: Vec<String> = web
        .fetches()
        .into_iter()
        .filter(|u| u.starts_with("http://same.test/"))
        .collect();
    assert_eq!(same_host, leaves);
}

#[tokio::test]
async fn test_url_backlogged_twice_is_fetched_once() {
    let hub = "http://hub.test/";
    let t = |i: usize| format!("http://t.test/{}", i);

    let mut web = FakeWeb::default().slow(&t(0));
    web.link(hub, vec![t(0), t(1), t(1), t(2), t(1)]);
    for i in 0..3 {
        web.link(&t(i), vec![]);
    }
    let web = Arc::new(web);
    let crawler = crawler_for(&web, create_test_config(4, 2, 1));

    let result = crawler.download(hub, 2).await.unwrap();

    assert_eq!(result.pages.len(), 4);
    assert_eq!(web.fetches(), vec![hub.to_string(), t(0), t(1), t(2)]);
    assert_eq!(web.peak("t.test"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pages_sharing_a_backlogged_link() {
    let hub = "http://hub.test/";
    let x = "http://x.test/";
    let y = "http://y.test/";
    let z = "http://z.test/";
    let t = |i: usize| format!("http://t.test/{}", i);

    // t/0 holds the only t.test slot while x, y and z all offer t/1
    let mut web = FakeWeb::default().slow(&t(0));
    web.link(hub, vec![t(0), x.to_string(), y.to_string(), z.to_string()]);
    web.link(x, vec![t(1), t(2)]);
    web.link(y, vec![t(1), t(3)]);
    web.link(z, vec![t(3), t(1)]);
    for i in 0..4 {
        web.link(&t(i), vec![]);
    }
    let web = Arc::new(web);
    let crawler = crawler_for(&web, create_test_config(8, 3, 1));

    let result = crawler.download(hub, 3).await.unwrap();

    assert_eq!(result.pages.len(), 8);
    assert!(result.errors.is_empty());
    for i in 0..4 {
        assert_eq!(web.fetch_count(&t(i)), 1, "{} fetched more than once", t(i));
    }
    assert_eq!(web.peak("t.test"), 1);

    crawler.close().await.unwrap();
}

#[tokio::test]
async fn test_per_host_limit_two_with_many_downloaders() {
    let hub = "http://hub.test/";
    let mut leaves = Vec::new();
    for host in ["x.test", "y.test"] {
        for i in 0..8 {
            leaves.push(format!("http://{}/{}", host, i));
        }
    }

    let mut web = FakeWeb::default().with_delay(Duration::from_millis(5));
    web.link(hub, leaves.clone());
    for leaf in &leaves {
        web.link(leaf, vec![]);
    }
    let web = Arc::new(web);
    let crawler = crawler_for(&web, create_test_config(16, 3, 2));

    let result = crawler.download(hub, 2).await.unwrap();

    assert_eq!(result.pages.len(), 17);
    assert!(web.peak("x.test") <= 2);
    assert!(web.peak("y.test") <= 2);
}

#[tokio::test]
async fn test_seed_fetch_failure_is_recorded() {
    let web = Arc::new(diamond().failing(A));
    let crawler = crawler_for(&web, create_test_config(2, 2, 1));

    let result = crawler.download(A, 3).await.unwrap();

    assert!(result.pages.is_empty());
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors.get(A), Some(&FetchError::Http { status: 500 }));
    assert_eq!(web.fetches(), vec![A]);
}

#[tokio::test]
async fn test_child_failures_do_not_stop_the_crawl() {
    let web = Arc::new(diamond().failing(B));
    let crawler = crawler_for(&web, create_test_config(2, 2, 1));

    let result = crawler.download(A, 3).await.unwrap();

    assert_eq!(result.page_set(), HashSet::from([A, C]));
    assert_eq!(result.errors.get(B), Some(&FetchError::Http { status: 500 }));
    assert_eq!(web.fetch_count(D), 0);
}

#[tokio::test]
async fn test_malformed_seed_is_an_error_entry() {
    let web = Arc::new(diamond());
    let crawler = crawler_for(&web, create_test_config(2, 2, 1));

    let result = crawler.download("not a url", 2).await.unwrap();

    assert!(result.pages.is_empty());
    assert!(matches!(
        result.errors.get("not a url"),
        Some(FetchError::MalformedUrl { .. })
    ));
    assert!(web.fetches().is_empty());
}

#[tokio::test]
async fn test_zero_depth_is_rejected() {
    let web = Arc::new(diamond());
    let crawler = crawler_for(&web, create_test_config(2, 2, 1));

    assert!(matches!(
        crawler.download(A, 0).await,
        Err(CrawlError::InvalidDepth(0))
    ));
    assert!(web.fetches().is_empty());
}

// A document whose links cannot be extracted still counts as fetched; its
// links are silently dropped.
#[tokio::test]
async fn test_extraction_failure_is_swallowed() {
    let web = Arc::new(diamond().broken(A));
    let crawler = crawler_for(&web, create_test_config(2, 2, 1));

    let result = crawler.download(A, 3).await.unwrap();

    assert_eq!(result.pages, vec![A]);
    assert!(result.errors.is_empty());
}

#[tokio::test]
async fn test_repeated_calls_are_independent() {
    let web = Arc::new(diamond());
    let crawler = crawler_for(&web, create_test_config(2, 2, 1));

    let first = crawler.download(A, 3).await.unwrap();
    let second = crawler.download(A, 3).await.unwrap();

    assert_eq!(first.page_set(), second.page_set());
    assert_eq!(web.fetch_count(A), 2);

    crawler.close().await.unwrap();
}

#[tokio::test]
async fn test_shared_visited_scope_skips_known_urls() {
    let web = Arc::new(diamond());
    let config = CrawlerConfig {
        visited_scope: VisitedScope::Shared,
        ..create_test_config(2, 2, 1)
    };
    let crawler = crawler_for(&web, config);

    let first = crawler.download(A, 2).await.unwrap();
    assert_eq!(first.page_set(), HashSet::from([A, B, C]));

    // A, B and C are known; starting from B only D is new
    let second = crawler.download(B, 2).await.unwrap();
    assert_eq!(second.pages, Vec::<String>::new());

    let third = crawler.download(D, 2).await.unwrap();
    assert_eq!(third.pages, vec![D]);
    assert_eq!(web.fetch_count(A), 1);
}

#[tokio::test]
async fn test_cancellation_returns_partial_result() {
    let web = Arc::new(diamond().hanging(B));
    let crawler = crawler_for(&web, create_test_config(2, 2, 1));

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        crawler.download_until(A, 3, tokio::time::sleep(Duration::from_millis(200))),
    )
    .await
    .expect("cancelled crawl should return promptly")
    .unwrap();

    assert!(result.page_set().contains(A));
    assert!(!result.page_set().contains(B));
    assert!(!result.errors.contains_key(B));
    assert_eq!(web.fetch_count(D), 0);
}

/// Deterministic pseudo-random numbers for graph generation
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: u64) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) % bound
    }
}

fn random_web(seed: u64, nodes: usize) -> (FakeWeb, Vec<String>) {
    let mut rng = Lcg(seed);
    let urls: Vec<String> = (0..nodes)
        .map(|i| format!("http://h{}.test/{}", i % 4, i))
        .collect();

    let mut web = FakeWeb::default().with_delay(Duration::from_millis(1));
    for (i, url) in urls.iter().enumerate() {
        let out = rng.next(5) as usize;
        let links = (0..out)
            .map(|_| urls[rng.next(nodes as u64) as usize].clone())
            .collect();
        web.link(url, links);
        if i % 7 == 3 {
            web.failing.insert(url.clone());
        }
    }
    (web, urls)
}

fn reachable(web: &FakeWeb, seed: &str) -> HashSet<String> {
    let mut seen = HashSet::from([seed.to_string()]);
    let mut queue = VecDeque::from([seed.to_string()]);
    while let Some(url) = queue.pop_front() {
        if web.failing.contains(&url) {
            continue;
        }
        for link in web.graph.get(&url).into_iter().flatten() {
            if seen.insert(link.clone()) {
                queue.push_back(link.clone());
            }
        }
    }
    seen
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_random_graphs_respect_limits() {
    for seed in 1..=5 {
        let (web, urls) = random_web(seed, 40);
        let expected = reachable(&web, &urls[0]);
        let web = Arc::new(web);
        let crawler = crawler_for(&web, create_test_config(8, 3, 2));

        // Deep enough that depth never cuts a path short
        let result = crawler.download(&urls[0], 50).await.unwrap();

        let fetched = web.fetches();
        let unique: HashSet<&String> = fetched.iter().collect();
        assert_eq!(unique.len(), fetched.len(), "seed {}: duplicate fetch", seed);

        for (host, peak) in web.peaks() {
            assert!(peak <= 2, "seed {}: {} peaked at {}", seed, host, peak);
        }

        let mut covered: HashSet<String> = result.pages.iter().cloned().collect();
        for url in result.errors.keys() {
            assert!(!covered.contains(url), "seed {}: {} is page and error", seed, url);
            covered.insert(url.clone());
        }
        assert_eq!(covered, expected, "seed {}", seed);

        crawler.close().await.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_random_graphs_with_shallow_depth() {
    for seed in 6..=10 {
        let (web, urls) = random_web(seed, 30);
        let expected = reachable(&web, &urls[0]);
        let web = Arc::new(web);
        let crawler = crawler_for(&web, create_test_config(4, 2, 1));

        let result = crawler.download(&urls[0], 2).await.unwrap();

        let fetched: HashSet<String> = web.fetches().into_iter().collect();
        assert!(fetched.is_subset(&expected), "seed {}", seed);
        assert!(fetched.contains(&urls[0]));
        assert_eq!(fetched.len(), result.pages.len() + result.errors.len());
        for (host, peak) in web.peaks() {
            assert!(peak <= 1, "seed {}: {} peaked at {}", seed, host, peak);
        }
    }
}

#[tokio::test]
async fn test_http_crawl_end_to_end() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<html><body>
            <a href="/page1">Page 1</a>
            <a href="/page2">Page 2</a>
            <a href="/report.pdf">Report</a>
            </body></html>"#,
            "text/html",
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page1"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<html><body><a href="/">Home</a><a href="/page3">Deeper</a></body></html>"#,
            "text/html",
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("%PDF-1.4", "application/pdf"))
        .mount(&mock_server)
        .await;

    // /page2 and /page3 have no mock and answer 404

    let config = Config::default();
    let downloader = HttpDownloader::new(&config.user_agent, &config.crawler).unwrap();
    let crawler = Crawler::new(Arc::new(downloader), create_test_config(4, 2, 2)).unwrap();

    let seed = format!("{}/", base_url);
    let result = crawler.download(&seed, 2).await.unwrap();

    let page1 = format!("{}/page1", base_url);
    let page2 = format!("{}/page2", base_url);
    let report = format!("{}/report.pdf", base_url);
    let page3 = format!("{}/page3", base_url);

    assert_eq!(
        result.page_set(),
        HashSet::from([seed.as_str(), page1.as_str(), report.as_str()])
    );
    assert_eq!(result.errors.len(), 1);
    assert_eq!(
        result.errors.get(&page2),
        Some(&FetchError::Http { status: 404 })
    );
    assert!(!result.errors.contains_key(&page3));

    crawler.close().await.unwrap();
}

#[tokio::test]
async fn test_crawl_entry_point() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"<a href="/next">Next</a>"#, "text/html"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/next"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<p>end</p>", "text/html"))
        .mount(&mock_server)
        .await;

    let mut config = Config::default();
    config.crawler.downloaders = 2;

    let seed = format!("{}/", base_url);
    let result = crawl(&config, &seed, 3, std::future::pending())
        .await
        .unwrap();

    assert_eq!(result.pages.len(), 2);
    assert!(result.errors.is_empty());
}
