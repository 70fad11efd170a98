//! Fixed-size worker pools
//!
//! A pool is a semaphore with `size` permits. Every task is spawned onto the
//! runtime right away and holds one permit for its whole body, so at most
//! `size` task bodies of a pool run at once while the rest wait in the
//! semaphore's FIFO queue.

use crate::CrawlError;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct WorkerPool {
    name: &'static str,
    size: usize,
    permits: Arc<Semaphore>,
    closing: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Creates a pool running at most `size` tasks at once
    pub fn new(name: &'static str, size: usize) -> Self {
        Self {
            name,
            size,
            permits: Arc::new(Semaphore::new(size)),
            closing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Number of tasks currently holding a permit
    pub fn running(&self) -> usize {
        self.size.saturating_sub(self.permits.available_permits())
    }

    pub fn is_closed(&self) -> bool {
        self.closing.load(Ordering::SeqCst) || self.permits.is_closed()
    }

    /// Spawns `task` to run once a permit is available
    ///
    /// The handle resolves to `None` if the pool closed before the task got
    /// a permit.
    ///
    /// # Returns
    ///
    /// * `Ok(JoinHandle)` - The task was spawned
    /// * `Err(CrawlError::PoolClosed)` - The pool no longer accepts work
    pub fn spawn<F>(&self, task: F) -> Result<JoinHandle<Option<F::Output>>, CrawlError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        if self.is_closed() {
            return Err(CrawlError::PoolClosed);
        }

        let permits = Arc::clone(&self.permits);
        let name = self.name;
        Ok(tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    tracing::trace!("{} pool closed before task started", name);
                    return None;
                }
            };
            Some(task.await)
        }))
    }

    /// Stops accepting work and waits for running tasks to finish
    ///
    /// Tasks already queued for a permit still run before this returns.
    /// Fails if the pool was already shut down.
    pub async fn shutdown(&self) -> Result<(), CrawlError> {
        if self.closing.swap(true, Ordering::SeqCst) {
            return Err(CrawlError::PoolClosed);
        }

        let size = u32::try_from(self.size).unwrap_or(u32::MAX);
        let drained = self
            .permits
            .acquire_many(size)
            .await
            .map_err(|_| CrawlError::PoolClosed)?;
        self.permits.close();
        drop(drained);

        tracing::debug!("{} pool shut down", self.name);
        Ok(())
    }

    /// Stops accepting work without waiting
    pub fn close(&self) {
        self.closing.store(true, Ordering::SeqCst);
        self.permits.close();
    }
}
