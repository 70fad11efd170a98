//! Crawler coordinator - traversal orchestration logic
//!
//! This module turns the recursive "download, extract, download" walk into
//! two bounded worker pools and a single driver loop:
//! - Download tasks fetch one URL, hand the document to an extract task when
//!   depth allows, then release their host slot (promoting a backlogged
//!   download for the same host if one is waiting)
//! - Extract tasks pull links out of a document and offer each one to host
//!   admission, which submits it now or parks it in the host's backlog
//! - The driver drains the completion queue, records pages and errors, and
//!   stops when no submitted task is left undrained
//!
//! Every task submits its continuations before it returns, and a submission
//! bumps the pending counter before it is posted. The driver only decrements
//! after a task's handle resolves, so a zero count means the walk is over.

use crate::config::{validate_crawler_config, CrawlerConfig, VisitedScope};
use crate::crawler::admission::{Admission, HostAdmission};
use crate::crawler::pool::WorkerPool;
use crate::crawler::result::{CrawlResult, ResultAccumulator};
use crate::crawler::task::{PendingDownload, Task, TaskOutcome};
use crate::crawler::traits::{Document, Downloader};
use crate::state::VisitedSet;
use crate::url::host_key;
use crate::{AdmissionError, CrawlError, FetchError};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// A submitted task paired with the URL it reports under
struct Completion {
    url: String,
    handle: JoinHandle<Option<TaskOutcome>>,
}

/// Bounded-concurrency crawler
///
/// Owns the download and extract pools for its whole lifetime; traversals
/// started with [`Crawler::download`] share them. Call [`Crawler::close`] to
/// wait for in-flight tasks; dropping the crawler closes the pools without
/// waiting.
pub struct Crawler {
    downloader: Arc<dyn Downloader>,
    config: CrawlerConfig,
    downloads: WorkerPool,
    extractions: WorkerPool,

    /// Present when the visited set outlives a single call
    shared_visited: Option<Arc<VisitedSet>>,
}

impl Crawler {
    /// Creates a new crawler
    ///
    /// # Arguments
    ///
    /// * `downloader` - Fetches pages for every traversal
    /// * `config` - Pool sizes, per-host limit and visited-set scope
    ///
    /// # Returns
    ///
    /// * `Ok(Crawler)` - Ready to crawl
    /// * `Err(CrawlError::Config)` - A limit is zero
    pub fn new(downloader: Arc<dyn Downloader>, config: CrawlerConfig) -> Result<Self, CrawlError> {
        validate_crawler_config(&config)?;

        let shared_visited = match config.visited_scope {
            VisitedScope::PerCall => None,
            VisitedScope::Shared => Some(Arc::new(VisitedSet::new())),
        };

        Ok(Self {
            downloader,
            downloads: WorkerPool::new("download", config.downloaders),
            extractions: WorkerPool::new("extract", config.extractors),
            shared_visited,
            config,
        })
    }

    /// Settings this crawler was built with
    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    /// Crawls from `seed` up to `max_depth` links away
    ///
    /// The seed is depth 1, so `max_depth == 1` fetches only the seed.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlResult)` - Fetched pages and per-URL errors. A malformed
    ///   seed yields an empty page list with the seed mapped to its error.
    /// * `Err(CrawlError)` - `max_depth` is zero, the crawler is closed, or a
    ///   task panicked or corrupted admission bookkeeping
    pub async fn download(&self, seed: &str, max_depth: u32) -> Result<CrawlResult, CrawlError> {
        self.download_until(seed, max_depth, std::future::pending())
            .await
    }

    /// Like [`Crawler::download`], but stops early when `shutdown` resolves
    ///
    /// On shutdown no further downloads are admitted or promoted, outstanding
    /// tasks are aborted, and whatever was collected so far is returned.
    pub async fn download_until<F>(
        &self,
        seed: &str,
        max_depth: u32,
        shutdown: F,
    ) -> Result<CrawlResult, CrawlError>
    where
        F: Future<Output = ()>,
    {
        if max_depth < 1 {
            return Err(CrawlError::InvalidDepth(max_depth));
        }
        if self.downloads.is_closed() || self.extractions.is_closed() {
            return Err(CrawlError::PoolClosed);
        }

        let host = match host_key(seed) {
            Ok(host) => host,
            Err(e) => {
                tracing::warn!("Malformed seed {}: {}", seed, e);
                return Ok(CrawlResult::malformed_seed(seed, FetchError::from(e)));
            }
        };

        let visited = self
            .shared_visited
            .clone()
            .unwrap_or_else(|| Arc::new(VisitedSet::new()));

        if !visited.insert(seed) {
            tracing::info!("Seed {} was already crawled by this crawler", seed);
            return Ok(CrawlResult::default());
        }

        let (traversal, queue) = Traversal::new(self, visited, max_depth);

        tracing::info!(
            "Starting traversal from {} (max depth {}, {} downloaders, {} extractors, {} per host)",
            seed,
            max_depth,
            self.config.downloaders,
            self.config.extractors,
            self.config.per_host
        );

        if !traversal.admission.try_admit(&host) {
            let active = traversal.admission.active(&host);
            return Err(AdmissionError::LimitExceeded {
                host,
                active,
                limit: self.config.per_host,
            }
            .into());
        }
        traversal.submit(Task::Download(PendingDownload {
            url: seed.to_string(),
            host,
            depth: 1,
        }))?;

        drive(traversal, queue, shutdown).await
    }

    /// Stops both pools and waits for in-flight tasks to finish
    ///
    /// Fails if the pools were already shut down.
    pub async fn close(self) -> Result<(), CrawlError> {
        let downloads = self.downloads.shutdown().await;
        let extractions = self.extractions.shutdown().await;
        downloads.and(extractions)
    }
}

impl Drop for Crawler {
    fn drop(&mut self) {
        self.downloads.close();
        self.extractions.close();
    }
}

/// State shared by the driver and every task of one traversal
struct Traversal {
    downloader: Arc<dyn Downloader>,
    admission: HostAdmission,
    visited: Arc<VisitedSet>,
    downloads: WorkerPool,
    extractions: WorkerPool,
    completions: UnboundedSender<Completion>,

    /// Tasks submitted but not yet drained by the driver
    pending: AtomicUsize,

    cancelled: AtomicBool,
    max_depth: u32,
}

impl Traversal {
    fn new(
        crawler: &Crawler,
        visited: Arc<VisitedSet>,
        max_depth: u32,
    ) -> (Arc<Self>, UnboundedReceiver<Completion>) {
        let (completions, queue) = mpsc::unbounded_channel();
        let traversal = Arc::new(Self {
            downloader: Arc::clone(&crawler.downloader),
            admission: HostAdmission::new(crawler.config.per_host),
            visited,
            downloads: crawler.downloads.clone(),
            extractions: crawler.extractions.clone(),
            completions,
            pending: AtomicUsize::new(0),
            cancelled: AtomicBool::new(false),
            max_depth,
        });
        (traversal, queue)
    }

    /// Spawns `task` on its pool and posts it to the completion queue
    fn submit(self: &Arc<Self>, task: Task) -> Result<(), CrawlError> {
        let url = task.url().to_string();
        let this = Arc::clone(self);

        let handle = match task {
            Task::Download(pending) => self.downloads.spawn(this.run_download(pending))?,
            Task::Extract {
                url,
                document,
                depth,
            } => self
                .extractions
                .spawn(this.run_extract(url, document, depth))?,
        };

        self.pending.fetch_add(1, Ordering::SeqCst);
        if let Err(rejected) = self.completions.send(Completion { url, handle }) {
            // The driver is gone; nobody will drain this task
            self.pending.fetch_sub(1, Ordering::SeqCst);
            rejected.0.handle.abort();
        }

        Ok(())
    }

    async fn run_download(self: Arc<Self>, task: PendingDownload) -> TaskOutcome {
        tracing::trace!("Fetching {} (depth {})", task.url, task.depth);

        let outcome = match self.downloader.fetch(&task.url).await {
            Ok(document) => {
                if task.depth < self.max_depth {
                    let extract = Task::Extract {
                        url: task.url.clone(),
                        document,
                        depth: task.depth,
                    };
                    if let Err(e) = self.submit(extract) {
                        tracing::warn!("Could not extract links from {}: {}", task.url, e);
                    }
                }
                TaskOutcome::Downloaded
            }
            Err(e) => {
                tracing::debug!("Fetch failed for {}: {}", task.url, e);
                TaskOutcome::DownloadFailed(e)
            }
        };

        match self.release_slot(&task.host) {
            Ok(()) => outcome,
            Err(e) => TaskOutcome::Fatal(e),
        }
    }

    async fn run_extract(
        self: Arc<Self>,
        url: String,
        document: Box<dyn Document>,
        depth: u32,
    ) -> TaskOutcome {
        let links = match tokio::task::spawn_blocking(move || document.extract_links()).await {
            Ok(Ok(links)) => links,
            Ok(Err(e)) => {
                tracing::debug!("Extraction failed for {}, treating as no links: {}", url, e);
                return TaskOutcome::Extracted;
            }
            Err(e) => {
                tracing::debug!("Extraction aborted for {}, treating as no links: {}", url, e);
                return TaskOutcome::Extracted;
            }
        };

        tracing::trace!("Extracted {} links from {}", links.len(), url);

        for link in links {
            if self.is_cancelled() {
                break;
            }
            if let Err(e) = self.offer(link, depth + 1) {
                return TaskOutcome::Fatal(e);
            }
        }

        TaskOutcome::Extracted
    }

    /// Submits a discovered link now or parks it in its host's backlog
    fn offer(self: &Arc<Self>, link: String, depth: u32) -> Result<(), AdmissionError> {
        let host = match host_key(&link) {
            Ok(host) => host,
            Err(e) => {
                tracing::debug!("Skipping link: {}", e);
                return Ok(());
            }
        };

        if self.visited.contains(&link) {
            return Ok(());
        }

        let pending = PendingDownload {
            url: link,
            host,
            depth,
        };

        match self.admission.admit_or_backlog(pending) {
            Admission::Admitted(pending) => self.launch(pending),
            Admission::Backlogged => Ok(()),
        }
    }

    /// Starts a download that holds a host slot, unless its URL is taken
    ///
    /// Another worker may have claimed the URL since it was offered; the
    /// slot is then released (and possibly handed on) right away.
    fn launch(self: &Arc<Self>, pending: PendingDownload) -> Result<(), AdmissionError> {
        if self.visited.insert(&pending.url) {
            self.start_download(pending);
            Ok(())
        } else {
            tracing::trace!("{} already visited, releasing its slot", pending.url);
            self.release_slot(&pending.host)
        }
    }

    /// Gives back a host slot, passing it on to a backlogged download if any
    ///
    /// Backlogged downloads whose URL was visited in the meantime are skipped
    /// and the slot moves on to the next one.
    fn release_slot(self: &Arc<Self>, host: &str) -> Result<(), AdmissionError> {
        loop {
            let next = match self.admission.release(host)? {
                Some(next) => next,
                None => return Ok(()),
            };

            if self.is_cancelled() {
                tracing::debug!("Traversal cancelled, dropping backlogged {}", next.url);
                return Ok(());
            }

            if self.visited.insert(&next.url) {
                self.start_download(next);
                return Ok(());
            }

            tracing::trace!("Backlogged {} already visited, skipping", next.url);
        }
    }

    fn start_download(self: &Arc<Self>, pending: PendingDownload) {
        let url = pending.url.clone();
        if let Err(e) = self.submit(Task::Download(pending)) {
            tracing::warn!("Could not schedule download of {}: {}", url, e);
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Stops admissions and aborts every task still on the queue
    ///
    /// The queue is closed before draining, so a task posted concurrently
    /// is either drained here or aborted by `submit` when its send fails.
    fn abort_outstanding(&self, queue: &mut UnboundedReceiver<Completion>) -> usize {
        self.cancelled.store(true, Ordering::SeqCst);
        queue.close();

        let mut aborted = 0;
        while let Ok(completion) = queue.try_recv() {
            completion.handle.abort();
            aborted += 1;
        }
        aborted
    }
}

/// Drains the completion queue until no submitted task is outstanding
async fn drive<F>(
    traversal: Arc<Traversal>,
    mut queue: UnboundedReceiver<Completion>,
    shutdown: F,
) -> Result<CrawlResult, CrawlError>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    let start_time = Instant::now();
    let mut result = ResultAccumulator::new();

    while traversal.pending.load(Ordering::SeqCst) > 0 {
        let next = tokio::select! {
            biased;
            _ = &mut shutdown => None,
            next = queue.recv() => next,
        };

        let Some(Completion { url, mut handle }) = next else {
            return Ok(cancelled(&traversal, &mut queue, result));
        };

        let joined = tokio::select! {
            biased;
            _ = &mut shutdown => {
                handle.abort();
                return Ok(cancelled(&traversal, &mut queue, result));
            }
            joined = &mut handle => joined,
        };

        traversal.pending.fetch_sub(1, Ordering::SeqCst);

        match joined {
            Ok(Some(TaskOutcome::Downloaded)) => {
                tracing::trace!("Downloaded {}", url);
                result.record_page(url);
            }
            Ok(Some(TaskOutcome::DownloadFailed(error))) => {
                result.record_error(url, error);
            }
            Ok(Some(TaskOutcome::Extracted)) => {}
            Ok(Some(TaskOutcome::Fatal(error))) => {
                tracing::error!("Admission bookkeeping failed at {}: {}", url, error);
                traversal.abort_outstanding(&mut queue);
                return Err(error.into());
            }
            Ok(None) => {
                tracing::debug!("Task for {} abandoned by a closed pool", url);
            }
            Err(e) if e.is_cancelled() => {}
            Err(e) => {
                traversal.abort_outstanding(&mut queue);
                return Err(CrawlError::TaskPanicked {
                    url,
                    message: e.to_string(),
                });
            }
        }
    }

    traversal.admission.check_invariant()?;
    traversal.admission.check_idle()?;

    tracing::info!(
        "Traversal complete: {} pages, {} errors in {:?}",
        result.page_count(),
        result.error_count(),
        start_time.elapsed()
    );

    Ok(result.finish())
}

fn cancelled(
    traversal: &Traversal,
    queue: &mut UnboundedReceiver<Completion>,
    result: ResultAccumulator,
) -> CrawlResult {
    let aborted = traversal.abort_outstanding(queue);
    tracing::warn!(
        "Traversal cancelled with {} pages and {} errors collected, {} tasks abandoned",
        result.page_count(),
        result.error_count(),
        aborted
    );
    result.finish()
}
