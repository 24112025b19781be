use std::collections::HashSet;
use url::Url;

/// Records which URLs and which page identities already entered the scan
///
/// Both sets only grow for the lifetime of a scan.
#[derive(Debug, Default)]
pub struct SeenSet {
    urls: HashSet<String>,
    pages: HashSet<String>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url_seen(&self, url: &Url) -> bool {
        self.urls.contains(url.as_str())
    }

    /// Marks a URL as seen, returning false if it already was
    pub fn mark_url(&mut self, url: &Url) -> bool {
        self.urls.insert(url.as_str().to_string())
    }

    pub fn page_seen(&self, identity: &str) -> bool {
        self.pages.contains(identity)
    }

    /// Marks a page identity as seen, returning false if it already was
    pub fn mark_page(&mut self, identity: impl Into<String>) -> bool {
        self.pages.insert(identity.into())
    }

    pub fn url_count(&self) -> usize {
        self.urls.len()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}
