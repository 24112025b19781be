//! Scan-scoped bookkeeping
//!
//! # Components
//!
//! - `SeenSet`: URLs and page identities that already entered the scan
//! - `RetryTracker`: failed-attempt counters and the failure list
//! - `Sitemap`: audited URLs with their status codes
//! - `ScanControl`: lifecycle status, pause tokens, abort and suspend signals
//! - `ScanContext`: the above signals plus the audited-page counter and limit

mod control;
mod retries;
mod seen;
mod sitemap;

pub use control::{PauseToken, ScanControl, ScanStatus};
pub use retries::{RetryDecision, RetryTracker};
pub use seen::SeenSet;
pub use sitemap::Sitemap;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// State shared by every component of a single scan
///
/// The audited-page counter has a single writer, the audit driver; everyone
/// else only reads it.
#[derive(Debug)]
pub struct ScanContext {
    control: Arc<ScanControl>,
    audited_pages: AtomicU64,
    page_limit: Option<u64>,
}

impl ScanContext {
    pub fn new(control: Arc<ScanControl>, page_limit: Option<u64>) -> Self {
        Self {
            control,
            audited_pages: AtomicU64::new(0),
            page_limit,
        }
    }

    pub fn control(&self) -> &Arc<ScanControl> {
        &self.control
    }

    pub fn page_limit(&self) -> Option<u64> {
        self.page_limit
    }

    pub fn audited_pages(&self) -> u64 {
        self.audited_pages.load(Ordering::SeqCst)
    }

    /// Counts an audited page, returning the new total
    pub(crate) fn record_audit(&self) -> u64 {
        self.audited_pages.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn page_limit_reached(&self) -> bool {
        self.page_limit
            .is_some_and(|limit| self.audited_pages() >= limit)
    }

    pub fn accepts_more_pages(&self) -> bool {
        !self.page_limit_reached()
    }
}
