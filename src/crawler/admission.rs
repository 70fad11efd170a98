//! Per-host admission control
//!
//! This module decides whether a download for a host may start now or must
//! wait in that host's backlog:
//! - At most `per_host` downloads per host are admitted at once
//! - Waiting downloads are promoted in FIFO order as admitted ones finish
//! - A finishing download hands its slot straight to the next waiting one
//!
//! The host map is a `DashMap`; a host's record is cloned out of it before
//! the record's own lock is taken, so operations on different hosts do not
//! serialize behind one another and no shard lock is held across a record
//! lock.

use crate::crawler::task::PendingDownload;
use crate::state::{HostState, Release};
use crate::AdmissionError;
use dashmap::DashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Result of offering a download to the admission controller
#[derive(Debug, PartialEq, Eq)]
pub enum Admission {
    /// A slot was taken; the download should be submitted now
    Admitted(PendingDownload),

    /// The host is at its limit; the download waits in the backlog
    Backlogged,
}

/// Tracks admitted and backlogged downloads for every host seen in a traversal
#[derive(Debug)]
pub struct HostAdmission {
    /// Maximum concurrent downloads per host
    limit: usize,

    /// Per-host records, created on first use
    hosts: DashMap<String, Arc<Mutex<HostState>>>,
}

impl HostAdmission {
    /// Creates an admission controller with the given per-host limit
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            hosts: DashMap::new(),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Takes a slot for `host` if it is below its limit
    pub fn try_admit(&self, host: &str) -> bool {
        let record = self.record(host);
        let admitted = lock(&record).try_admit(self.limit);
        tracing::trace!("try_admit {}: {}", host, admitted);
        admitted
    }

    /// Appends a download to its host's backlog
    ///
    /// Only meant for a download whose `try_admit` just failed. Prefer
    /// [`HostAdmission::admit_or_backlog`], which does both steps under one
    /// lock so a slot freed in between cannot be missed.
    pub fn enqueue_backlog(&self, task: PendingDownload) {
        let record = self.record(&task.host);
        lock(&record).push_backlog(task);
    }

    /// Admits the download or appends it to its host's backlog, atomically
    pub fn admit_or_backlog(&self, task: PendingDownload) -> Admission {
        let record = self.record(&task.host);
        let mut state = lock(&record);

        if state.try_admit(self.limit) {
            Admission::Admitted(task)
        } else {
            tracing::debug!(
                "Host {} at limit {}, backlogging {} ({} waiting)",
                task.host,
                self.limit,
                task.url,
                state.backlog.len() + 1
            );
            state.push_backlog(task);
            Admission::Backlogged
        }
    }

    /// Gives back the slot held by a finished download for `host`
    ///
    /// # Returns
    ///
    /// * `Ok(Some(task))` - The slot was handed to the oldest backlogged
    ///   download, which must be submitted now
    /// * `Ok(None)` - The slot is free
    /// * `Err(AdmissionError)` - Nothing was admitted for `host`
    pub fn release(&self, host: &str) -> Result<Option<PendingDownload>, AdmissionError> {
        let record = self.record(host);
        let mut state = lock(&record);

        match state.release() {
            Release::Freed => Ok(None),
            Release::HandedOff(task) => {
                tracing::debug!(
                    "Promoting backlogged {} for host {} ({} still waiting)",
                    task.url,
                    host,
                    state.backlog.len()
                );
                Ok(Some(task))
            }
            Release::NothingAdmitted => Err(AdmissionError::NothingAdmitted {
                host: host.to_string(),
            }),
        }
    }

    /// Number of downloads currently admitted for `host`
    pub fn active(&self, host: &str) -> usize {
        self.existing(host).map(|r| lock(&r).active).unwrap_or(0)
    }

    /// Number of downloads waiting for `host`
    pub fn backlog_len(&self, host: &str) -> usize {
        self.existing(host)
            .map(|r| lock(&r).backlog.len())
            .unwrap_or(0)
    }

    /// Returns true when no host has admitted or waiting downloads
    pub fn is_idle(&self) -> bool {
        self.records().iter().all(|(_, r)| lock(r).is_idle())
    }

    /// Checks every host against the limit
    pub fn check_invariant(&self) -> Result<(), AdmissionError> {
        for (host, record) in self.records() {
            let active = lock(&record).active;
            if active > self.limit {
                return Err(AdmissionError::LimitExceeded {
                    host,
                    active,
                    limit: self.limit,
                });
            }
        }

        Ok(())
    }

    /// Checks that every slot was released and every backlog drained
    ///
    /// Holds once all downloads of a completed traversal have finished.
    pub fn check_idle(&self) -> Result<(), AdmissionError> {
        for (host, record) in self.records() {
            let state = lock(&record);
            if !state.is_idle() {
                return Err(AdmissionError::Outstanding {
                    host,
                    active: state.active,
                    waiting: state.backlog.len(),
                });
            }
        }

        Ok(())
    }

    fn record(&self, host: &str) -> Arc<Mutex<HostState>> {
        self.hosts
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(HostState::new())))
            .clone()
    }

    fn existing(&self, host: &str) -> Option<Arc<Mutex<HostState>>> {
        self.hosts.get(host).map(|r| Arc::clone(r.value()))
    }

    /// Every host record, cloned out so no shard lock is held while a record is locked
    fn records(&self) -> Vec<(String, Arc<Mutex<HostState>>)> {
        self.hosts
            .iter()
            .map(|r| (r.key().clone(), Arc::clone(r.value())))
            .collect()
    }
}

fn lock(record: &Mutex<HostState>) -> MutexGuard<'_, HostState> {
    record.lock().unwrap_or_else(PoisonError::into_inner)
}
