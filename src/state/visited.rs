use dashmap::DashSet;

/// Concurrent set of URLs admitted to downloading
///
/// Insertion is a single check-and-insert, so when several workers discover
/// the same URL exactly one of them wins.
#[derive(Debug, Default)]
pub struct VisitedSet {
    urls: DashSet<String>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `url` as visited
    ///
    /// # Returns
    ///
    /// * `true` - The URL was not present and is now recorded
    /// * `false` - Another caller already recorded it
    pub fn insert(&self, url: &str) -> bool {
        self.urls.insert(url.to_string())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}
