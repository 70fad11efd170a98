//! Units of work flowing through the download and extract pools

use crate::crawler::traits::Document;
use crate::{AdmissionError, FetchError};
use std::fmt;

/// A download that has a URL, a host and a depth but may not be running yet
///
/// `depth` is the 1-based link distance from the seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDownload {
    pub url: String,

    /// Admission-control partition key of `url`
    pub host: String,

    pub depth: u32,
}

/// A unit of work submitted to one of the worker pools
pub enum Task {
    /// Fetch one URL
    Download(PendingDownload),

    /// Pull links out of the document fetched from `url`
    Extract {
        url: String,
        document: Box<dyn Document>,
        depth: u32,
    },
}

impl Task {
    /// URL this task is reported under on the completion queue
    pub fn url(&self) -> &str {
        match self {
            Task::Download(pending) => &pending.url,
            Task::Extract { url, .. } => url,
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Download(pending) => f.debug_tuple("Download").field(pending).finish(),
            Task::Extract { url, depth, .. } => f
                .debug_struct("Extract")
                .field("url", url)
                .field("depth", depth)
                .finish_non_exhaustive(),
        }
    }
}

/// What a finished task reports to the driver
#[derive(Debug)]
pub enum TaskOutcome {
    /// The URL was fetched
    Downloaded,

    /// The fetch failed; recorded against the URL
    DownloadFailed(FetchError),

    /// Links were extracted and their downloads submitted or backlogged
    Extracted,

    /// Admission bookkeeping is corrupt; the traversal cannot continue
    Fatal(AdmissionError),
}
