//! Frontier and page buffer
//!
//! The frontier holds two FIFO queues: URLs waiting to be fetched and pages
//! waiting to be audited. Work enters through [`Frontier::push_url`] and
//! [`Frontier::push_page`], which apply scope, deduplication and capacity
//! checks unless forced. Scope is consulted again whenever an entry leaves a
//! queue because the rules may have changed in between.
//!
//! The page buffer is the one structure shared with browser workers, so it
//! lives behind a lock and is handed out through [`PageSink`].

use crate::page::Page;
use crate::scope::Scope;
use crate::state::{ScanContext, SeenSet};
use crate::url::to_absolute;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, trace};
use url::Url;

/// A URL waiting in the frontier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedUrl {
    pub url: Url,

    /// Skips scope checks when popped; carried over to the fetched page
    pub force: bool,
}

#[derive(Debug)]
struct BufferedPage {
    page: Page,

    /// Went through the push contract; unvetted entries are deduplicated on pop
    vetted: bool,
}

#[derive(Debug)]
struct BufferInner {
    queue: Mutex<VecDeque<BufferedPage>>,
    max_size: usize,
    pushed: Notify,
    total: AtomicU64,
}

/// Bounded FIFO of pages awaiting audit, shared with browser workers
#[derive(Debug, Clone)]
pub struct PageBuffer {
    inner: Arc<BufferInner>,
}

impl PageBuffer {
    pub fn new(max_size: usize) -> Self {
        Self {
            inner: Arc::new(BufferInner {
                queue: Mutex::new(VecDeque::new()),
                max_size,
                pushed: Notify::new(),
                total: AtomicU64::new(0),
            }),
        }
    }

    pub fn max_size(&self) -> usize {
        self.inner.max_size
    }

    pub fn len(&self) -> usize {
        self.inner.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.queue.lock().is_empty()
    }

    /// Room left before the configured maximum
    pub fn free_capacity(&self) -> usize {
        self.inner.max_size.saturating_sub(self.len())
    }

    /// Pages pushed over the lifetime of the scan
    pub fn total_pushed(&self) -> u64 {
        self.inner.total.load(Ordering::SeqCst)
    }

    /// Handle for producers outside the driver
    pub fn sink(&self) -> PageSink {
        PageSink {
            buffer: self.clone(),
        }
    }

    /// Waits until a page is pushed or the timeout elapses
    ///
    /// Returns true if woken by a push.
    pub async fn wait_for_push(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.inner.pushed.notified())
            .await
            .is_ok()
    }

    fn push(&self, page: Page, vetted: bool) {
        self.inner
            .queue
            .lock()
            .push_back(BufferedPage { page, vetted });
        self.inner.total.fetch_add(1, Ordering::SeqCst);
        self.inner.pushed.notify_one();
    }

    fn pop(&self) -> Option<BufferedPage> {
        self.inner.queue.lock().pop_front()
    }
}

/// Push handle given to browser workers
///
/// Pushes through a sink are never refused: discovery must not be dropped,
/// so neither capacity nor deduplication is applied until the page is popped.
#[derive(Debug, Clone)]
pub struct PageSink {
    buffer: PageBuffer,
}

impl PageSink {
    pub fn push(&self, page: Page) {
        trace!("Browser pushed {}", page.url);
        self.buffer.push(page, false);
    }
}

/// The URL frontier and page buffer with their admission rules
pub struct Frontier {
    urls: VecDeque<QueuedUrl>,
    url_capacity: Option<usize>,
    pages: PageBuffer,
    seen: SeenSet,
    scope: Arc<dyn Scope>,
    context: Arc<ScanContext>,
    /// Relative references resolve against this
    base: Url,
    url_total: u64,
}

impl Frontier {
    pub fn new(
        base: Url,
        scope: Arc<dyn Scope>,
        context: Arc<ScanContext>,
        page_queue_size: usize,
        url_queue_size: Option<usize>,
    ) -> Self {
        Self {
            urls: VecDeque::new(),
            url_capacity: url_queue_size,
            pages: PageBuffer::new(page_queue_size),
            seen: SeenSet::new(),
            scope,
            context,
            base,
            url_total: 0,
        }
    }

    /// Pushes a URL for fetching
    ///
    /// Unless forced, the push is refused when the page limit has been
    /// reached, the URL was already seen, is out of scope or redundant, or the
    /// frontier is full. A refused push changes nothing.
    pub fn push_url(&mut self, reference: &str, force: bool) -> bool {
        let Some(url) = to_absolute(reference, &self.base) else {
            trace!("Ignoring unresolvable reference: {}", reference);
            return false;
        };

        if !force {
            if self.context.page_limit_reached() {
                return false;
            }

            if self.seen.url_seen(&url) {
                return false;
            }

            if self.scope.url_out(&url) {
                debug!("Out of scope: {}", url);
                return false;
            }

            if self
                .url_capacity
                .is_some_and(|capacity| self.urls.len() >= capacity)
            {
                trace!("URL queue full, dropping {}", url);
                return false;
            }

            // Must stay the last check: strict evaluation spends redundancy budget
            if self.scope.redundant(&url, true) {
                return false;
            }
        }

        self.seen.mark_url(&url);
        self.urls.push_back(QueuedUrl { url, force });
        self.url_total += 1;
        true
    }

    /// Puts a URL back at the tail without any checks
    pub(crate) fn requeue_url(&mut self, entry: QueuedUrl) {
        trace!("Requeueing {}", entry.url);
        self.urls.push_back(entry);
    }

    /// Pops the next URL, dropping entries that went out of scope
    pub fn pop_url(&mut self) -> Option<QueuedUrl> {
        while let Some(entry) = self.urls.pop_front() {
            if !entry.force && self.scope.url_out(&entry.url) {
                debug!("Dropping out of scope URL: {}", entry.url);
                continue;
            }
            return Some(entry);
        }
        None
    }

    /// Pushes a page for auditing
    ///
    /// Unless forced, the push is refused when the page was already seen, is
    /// out of scope or redundant, or the page limit has been reached. The
    /// page's element cache is cleared on acceptance.
    pub fn push_page(&mut self, mut page: Page, force: bool) -> bool {
        let identity = page.identity();

        if !force {
            if self.context.page_limit_reached() {
                return false;
            }

            if self.seen.page_seen(&identity) {
                return false;
            }

            if self.scope.page_out(&page) {
                debug!("Out of scope page: {}", page.url);
                return false;
            }

            if self.scope.redundant(&page.url, true) {
                return false;
            }
        }

        self.seen.mark_page(identity);
        page.clear_cache();
        page.forced |= force;
        self.pages.push(page, true);
        true
    }

    /// Records a page that reached the auditor without passing the buffer
    pub(crate) fn mark_page_seen(&mut self, page: &Page) {
        self.seen.mark_page(page.identity());
    }

    /// Pushes a page straight into the buffer, deferring all checks to pop
    pub(crate) fn push_buffered(&mut self, page: Page) {
        self.pages.push(page, false);
    }

    /// Pops the next auditable page from the buffer
    ///
    /// Entries that went out of scope are dropped, as are entries that
    /// bypassed the push contract and turn out to duplicate a page already
    /// seen.
    pub fn pop_page(&mut self) -> Option<Page> {
        while let Some(BufferedPage { page, vetted }) = self.pages.pop() {
            if !page.forced && self.scope.page_out(&page) {
                debug!("Dropping out of scope page: {}", page.url);
                continue;
            }

            if !vetted {
                let identity = page.identity();
                if !page.forced && self.seen.page_seen(&identity) {
                    debug!("Dropping duplicate page: {}", page.url);
                    continue;
                }
                self.seen.mark_page(identity);
            }

            return Some(page);
        }
        None
    }

    /// Whether either queue holds anything
    pub fn has_workload(&self) -> bool {
        !self.urls.is_empty() || !self.pages.is_empty()
    }

    pub fn url_queue_len(&self) -> usize {
        self.urls.len()
    }

    pub fn page_queue_len(&self) -> usize {
        self.pages.len()
    }

    /// URLs accepted over the lifetime of the scan
    pub fn url_queue_total_size(&self) -> u64 {
        self.url_total
    }

    /// Pages buffered over the lifetime of the scan
    pub fn page_queue_total_size(&self) -> u64 {
        self.pages.total_pushed()
    }

    pub fn page_buffer(&self) -> &PageBuffer {
        &self.pages
    }

    pub fn scope(&self) -> &Arc<dyn Scope> {
        &self.scope
    }

    /// Snapshot of the queued URLs in pop order
    pub fn queued_urls(&self) -> Vec<Url> {
        self.urls.iter().map(|entry| entry.url.clone()).collect()
    }
}
