use std::collections::HashMap;
use url::Url;

/// Insertion-ordered mapping of audited URL to status code
#[derive(Debug, Clone, Default)]
pub struct Sitemap {
    entries: Vec<(Url, u16)>,
    index: HashMap<String, usize>,
}

impl Sitemap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry; a URL already present keeps its first position and code
    pub fn add(&mut self, url: &Url, code: u16) -> bool {
        if self.index.contains_key(url.as_str()) {
            return false;
        }
        self.index.insert(url.as_str().to_string(), self.entries.len());
        self.entries.push((url.clone(), code));
        true
    }

    pub fn get(&self, url: &str) -> Option<u16> {
        self.index.get(url).map(|&i| self.entries[i].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Url, u16)> {
        self.entries.iter().map(|(url, code)| (url, *code))
    }
}
