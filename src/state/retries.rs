use crate::url::url_key;
use std::collections::HashMap;
use url::Url;

/// Outcome of recording a failed fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Below the attempt bound; carries the number of failed attempts so far
    Retry(u32),
    /// The attempt bound was reached and the URL joined the failure list
    GiveUp,
}

/// Per-URL failed-attempt counters and the list of abandoned URLs
#[derive(Debug)]
pub struct RetryTracker {
    max_tries: u32,
    attempts: HashMap<String, u32>,
    failures: Vec<Url>,
}

impl RetryTracker {
    /// Creates a tracker abandoning URLs after `max_tries` failed fetches
    pub fn new(max_tries: u32) -> Self {
        Self {
            max_tries: max_tries.max(1),
            attempts: HashMap::new(),
            failures: Vec::new(),
        }
    }

    pub fn max_tries(&self) -> u32 {
        self.max_tries
    }

    /// Records a fetch that elicited no response
    pub fn record_failure(&mut self, url: &Url) -> RetryDecision {
        let attempts = self.attempts.entry(url_key(url)).or_insert(0);
        *attempts += 1;

        if *attempts >= self.max_tries {
            self.failures.push(url.clone());
            RetryDecision::GiveUp
        } else {
            RetryDecision::Retry(*attempts)
        }
    }

    /// Failed attempts recorded so far for `url`
    pub fn attempts(&self, url: &Url) -> u32 {
        self.attempts.get(&url_key(url)).copied().unwrap_or(0)
    }

    /// URLs that exhausted their attempts, in the order they gave up
    pub fn failures(&self) -> &[Url] {
        &self.failures
    }
}
