//! State module for tracking traversal progress
//!
//! This module provides the bookkeeping shared between crawl workers.
//!
//! # Components
//!
//! - `HostState`: Per-host admission record (active downloads plus a FIFO backlog)
//! - `VisitedSet`: Concurrent set of URLs already admitted to downloading

mod host_state;
mod visited;

// Re-export main types
pub use host_state::{HostState, Release};
pub use visited::VisitedSet;
