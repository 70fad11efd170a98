//! URL handling module for Ripple-Crawl
//!
//! The crawler does no canonicalization beyond host extraction: URLs are
//! tracked exactly as discovered, and the host is only used as the key that
//! partitions per-host admission control.

mod domain;

pub use domain::{extract_host, host_key, parse_url};
