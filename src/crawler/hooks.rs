//! Audit observers
//!
//! Observers are registered on the [`ScannerBuilder`](crate::ScannerBuilder)
//! and called synchronously, in registration order, at three points of every
//! page audit.

use crate::page::Page;

/// Callbacks fired while a page is audited
///
/// All methods default to doing nothing.
pub trait AuditObserver: Send + Sync {
    /// The page passed the scope check and is about to be audited
    fn on_page_audit(&self, _page: &Page) {}

    /// Checks are about to run against the page
    fn on_effective_page_audit(&self, _page: &Page) {}

    /// All checks have run; the element cache is still available
    fn after_page_audit(&self, _page: &Page) {}
}
