//! Scan report types

use crate::state::{ScanStatus, Sitemap};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use thiserror::Error;
use url::Url;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Everything a finished (or stopped) scan has to show for itself
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub target: Url,
    pub status: ScanStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Pages that went through the audit
    pub audited_pages: u64,

    /// URLs accepted into the frontier over the scan
    pub url_queue_total: u64,

    /// Pages accepted into the page buffer over the scan
    pub page_queue_total: u64,

    /// URLs still queued when the scan stopped
    pub pending_urls: usize,

    /// Pages still buffered when the scan stopped
    pub pending_pages: usize,

    pub sitemap: Sitemap,

    /// URLs that never produced a response
    pub failures: Vec<Url>,

    pub config_hash: Option<String>,
}

impl ScanReport {
    pub fn duration_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }

    /// Sitemap entries per status code, ascending by code
    pub fn status_breakdown(&self) -> BTreeMap<u16, usize> {
        let mut breakdown = BTreeMap::new();
        for (_, code) in self.sitemap.iter() {
            *breakdown.entry(code).or_insert(0) += 1;
        }
        breakdown
    }

    /// Share of mapped pages answering with 2xx, in percent
    pub fn success_rate(&self) -> f64 {
        if self.sitemap.is_empty() {
            return 0.0;
        }
        let ok = self
            .sitemap
            .iter()
            .filter(|(_, code)| (200..300).contains(code))
            .count();
        (ok as f64 / self.sitemap.len() as f64) * 100.0
    }
}

#[cfg(test)]
pub(crate) fn sample_report() -> ScanReport {
    let mut sitemap = Sitemap::new();
    for (path, code) in [("/", 200), ("/a", 200), ("/old", 301), ("/gone", 404)] {
        sitemap.add(&Url::parse("https://t/").unwrap().join(path).unwrap(), code);
    }

    let started_at = "2024-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
    ScanReport {
        target: Url::parse("https://t/").unwrap(),
        status: ScanStatus::Done,
        started_at,
        finished_at: started_at + chrono::Duration::seconds(90),
        audited_pages: 4,
        url_queue_total: 6,
        page_queue_total: 5,
        pending_urls: 0,
        pending_pages: 0,
        sitemap,
        failures: vec![Url::parse("https://t/down").unwrap()],
        config_hash: Some("abc123".to_string()),
    }
}
