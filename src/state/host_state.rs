use crate::crawler::PendingDownload;
use std::collections::VecDeque;

/// Outcome of releasing one admission slot
#[derive(Debug, PartialEq, Eq)]
pub enum Release {
    /// The slot is free again
    Freed,
    /// The slot was handed to the oldest backlogged download
    HandedOff(PendingDownload),
    /// Nothing was admitted for this host
    NothingAdmitted,
}

/// Tracks the admission state of one host during a traversal
///
/// `active` counts downloads that are running or scheduled to run for the
/// host. Downloads that could not be admitted wait in `backlog` until a
/// running download for the same host completes.
#[derive(Debug, Clone, Default)]
pub struct HostState {
    /// Downloads currently admitted for this host
    pub active: usize,

    /// Downloads waiting for a free slot, oldest first
    pub backlog: VecDeque<PendingDownload>,
}

impl HostState {
    /// Creates a new HostState with no admitted or waiting downloads
    pub fn new() -> Self {
        Self {
            active: 0,
            backlog: VecDeque::new(),
        }
    }

    /// Checks if another download can be admitted under `limit`
    fn can_admit(&self, limit: usize) -> bool {
        self.active < limit
    }

    /// Takes one slot if one is free
    ///
    /// # Returns
    ///
    /// * `true` - The slot was taken and `active` incremented
    /// * `false` - The host is at its limit; state is unchanged
    pub fn try_admit(&mut self, limit: usize) -> bool {
        if self.can_admit(limit) {
            self.active += 1;
            true
        } else {
            false
        }
    }

    /// Appends a download to the backlog
    pub fn push_backlog(&mut self, task: PendingDownload) {
        self.backlog.push_back(task);
    }

    /// Gives back one slot
    ///
    /// If a download is waiting, it inherits the slot and `active` is left
    /// unchanged; otherwise `active` is decremented.
    pub fn release(&mut self) -> Release {
        if self.active == 0 {
            return Release::NothingAdmitted;
        }

        match self.backlog.pop_front() {
            Some(task) => Release::HandedOff(task),
            None => {
                self.active -= 1;
                Release::Freed
            }
        }
    }

    /// Returns true when nothing is admitted or waiting
    pub fn is_idle(&self) -> bool {
        self.active == 0 && self.backlog.is_empty()
    }
}
