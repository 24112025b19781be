//! Audit driver - main scan orchestration logic
//!
//! The [`Scanner`] owns both queues, the fetch pipeline and the sitemap, and
//! runs the audit loop:
//! - Seeding the frontier with the target and configured paths
//! - Draining the page buffer through the checks, refilling it from the
//!   frontier as it empties
//! - Waiting on the browser cluster while it still has jobs
//! - Honouring pause, suspend and abort signals at safe points
//! - Producing the final [`ScanReport`]

use crate::browser::{BrowserCluster, BrowserPool, Renderer};
use crate::checks::{Check, CheckGroup, CheckSet, TimingAnalysis};
use crate::config::{Config, HttpConfig};
use crate::crawler::fetcher::{HttpTransport, Transport};
use crate::crawler::hooks::AuditObserver;
use crate::crawler::pipeline::FetchPipeline;
use crate::crawler::scheduler::{Frontier, PageSink};
use crate::output::ScanReport;
use crate::page::Page;
use crate::scope::{RuleScope, Scope};
use crate::session::{NoSession, SessionGuard};
use crate::state::{ScanContext, ScanControl, ScanStatus, Sitemap};
use crate::url::normalize_url;
use crate::ScanError;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Bounded wait used whenever the driver idles on the browser cluster
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Creates the browser cluster once the scan starts, given the buffer's sink
pub type BrowserFactory = Box<dyn FnOnce(PageSink) -> Arc<dyn BrowserCluster> + Send>;

enum BrowserSlot {
    Disabled,
    Pending(BrowserFactory),
    Ready(Arc<dyn BrowserCluster>),
}

/// Builder for [`Scanner`]
///
/// # Example
///
/// ```no_run
/// use wardscan::config::load_config;
/// use wardscan::ScannerBuilder;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("scan.toml"))?;
/// let mut scanner = ScannerBuilder::from_config(&config)?.build()?;
/// let report = scanner.run().await?;
/// println!("Audited {} pages", report.audited_pages);
/// # Ok(())
/// # }
/// ```
pub struct ScannerBuilder {
    target: Url,
    crawl: bool,
    page_limit: Option<u64>,
    max_tries: u32,
    page_queue_size: usize,
    url_queue_size: Option<usize>,
    extend_paths: Vec<String>,
    restrict_paths: Vec<String>,
    dom_depth_limit: Option<u32>,
    http: HttpConfig,
    scope: Option<Arc<dyn Scope>>,
    transport: Option<Arc<dyn Transport>>,
    session: Arc<dyn SessionGuard>,
    checks: CheckSet,
    timing: Option<Arc<dyn TimingAnalysis>>,
    observers: Vec<Arc<dyn AuditObserver>>,
    browser: BrowserSlot,
    control: Option<Arc<ScanControl>>,
    config_hash: Option<String>,
}

impl ScannerBuilder {
    pub fn new(target: Url) -> Self {
        Self {
            target,
            crawl: true,
            page_limit: None,
            max_tries: 5,
            page_queue_size: 50,
            url_queue_size: None,
            extend_paths: Vec::new(),
            restrict_paths: Vec::new(),
            dom_depth_limit: None,
            http: HttpConfig::default(),
            scope: None,
            transport: None,
            session: Arc::new(NoSession),
            checks: CheckSet::new(),
            timing: None,
            observers: Vec::new(),
            browser: BrowserSlot::Disabled,
            control: None,
            config_hash: None,
        }
    }

    /// Starts from a loaded configuration
    pub fn from_config(config: &Config) -> Result<Self, ScanError> {
        let target = normalize_url(&config.scan.url)?;
        let scope = RuleScope::from_config(&config.scope, &target)?;

        Ok(Self::new(target)
            .crawl(config.scan.crawl)
            .page_limit(config.scan.page_limit)
            .max_tries(config.scan.max_tries)
            .page_queue_size(config.scan.page_queue_size)
            .url_queue_size(config.scan.url_queue_size)
            .extend_paths(config.scope.extend_paths.clone())
            .restrict_paths(config.scope.restrict_paths.clone())
            .dom_depth_limit(config.scope.dom_depth_limit)
            .http(config.http.clone())
            .scope(Arc::new(scope)))
    }

    pub fn crawl(mut self, crawl: bool) -> Self {
        self.crawl = crawl;
        self
    }

    pub fn page_limit(mut self, limit: Option<u64>) -> Self {
        self.page_limit = limit;
        self
    }

    pub fn max_tries(mut self, max_tries: u32) -> Self {
        self.max_tries = max_tries;
        self
    }

    pub fn page_queue_size(mut self, size: usize) -> Self {
        self.page_queue_size = size;
        self
    }

    pub fn url_queue_size(mut self, size: Option<usize>) -> Self {
        self.url_queue_size = size;
        self
    }

    /// Extra seeds, pushed like any discovered path
    pub fn extend_paths(mut self, paths: Vec<String>) -> Self {
        self.extend_paths = paths;
        self
    }

    /// Extra seeds, pushed with force
    pub fn restrict_paths(mut self, paths: Vec<String>) -> Self {
        self.restrict_paths = paths;
        self
    }

    pub fn dom_depth_limit(mut self, limit: Option<u32>) -> Self {
        self.dom_depth_limit = limit;
        self
    }

    /// Settings for the default HTTP transport
    pub fn http(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }

    pub fn scope(mut self, scope: Arc<dyn Scope>) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn session(mut self, session: Arc<dyn SessionGuard>) -> Self {
        self.session = session;
        self
    }

    pub fn check(mut self, check: Arc<dyn Check>) -> Self {
        self.checks.add(check);
        self
    }

    pub fn timing_analysis(mut self, timing: Arc<dyn TimingAnalysis>) -> Self {
        self.timing = Some(timing);
        self
    }

    /// Registers an observer; observers fire in registration order
    pub fn observer(mut self, observer: Arc<dyn AuditObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Enables DOM exploration with a custom cluster, created when the scan starts
    pub fn browser<F>(mut self, factory: F) -> Self
    where
        F: FnOnce(PageSink) -> Arc<dyn BrowserCluster> + Send + 'static,
    {
        self.browser = BrowserSlot::Pending(Box::new(factory));
        self
    }

    /// Enables DOM exploration with a [`BrowserPool`] of `workers` workers
    pub fn renderer(self, renderer: Arc<dyn Renderer>, workers: usize) -> Self {
        self.browser(move |sink| {
            Arc::new(BrowserPool::new(workers, renderer, sink)) as Arc<dyn BrowserCluster>
        })
    }

    /// Shares an existing control block, e.g. with a signal handler
    pub fn control(mut self, control: Arc<ScanControl>) -> Self {
        self.control = Some(control);
        self
    }

    pub fn config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    pub fn build(self) -> Result<Scanner, ScanError> {
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(&self.http)?),
        };
        let scope = self
            .scope
            .unwrap_or_else(|| Arc::new(RuleScope::for_target(&self.target)));
        let control = self.control.unwrap_or_default();
        let context = Arc::new(ScanContext::new(control, self.page_limit));

        let frontier = Frontier::new(
            self.target.clone(),
            scope,
            context.clone(),
            self.page_queue_size,
            self.url_queue_size,
        );

        Ok(Scanner {
            target: self.target,
            crawl: self.crawl,
            extend_paths: self.extend_paths,
            restrict_paths: self.restrict_paths,
            dom_depth_limit: self.dom_depth_limit,
            frontier,
            pipeline: FetchPipeline::new(transport, self.max_tries),
            sitemap: Sitemap::new(),
            context,
            session: self.session,
            checks: self.checks,
            timing: self.timing,
            observers: self.observers,
            browser: self.browser,
            config_hash: self.config_hash,
        })
    }
}

/// Main scan driver
pub struct Scanner {
    target: Url,
    crawl: bool,
    extend_paths: Vec<String>,
    restrict_paths: Vec<String>,
    dom_depth_limit: Option<u32>,
    frontier: Frontier,
    pipeline: FetchPipeline,
    sitemap: Sitemap,
    context: Arc<ScanContext>,
    session: Arc<dyn SessionGuard>,
    checks: CheckSet,
    timing: Option<Arc<dyn TimingAnalysis>>,
    observers: Vec<Arc<dyn AuditObserver>>,
    browser: BrowserSlot,
    config_hash: Option<String>,
}

impl Scanner {
    /// Runs the scan until no work remains, a limit is hit or it is stopped
    ///
    /// # Scan Flow
    ///
    /// 1. Wait out any pause, bail out if already aborted
    /// 2. Seed the frontier with the target, extend paths and restrict paths
    /// 3. Initialize the browser cluster, if one was configured
    /// 4. Loop: idle on the browser cluster while it is the only source of
    ///    work, otherwise audit the queues; stop on the page limit, on
    ///    suspend or abort, or when nothing is left anywhere
    ///
    /// An authentication failure ends the scan with [`ScanError::Session`]
    /// and status `Aborted`.
    pub async fn run(&mut self) -> Result<ScanReport, ScanError> {
        let started_at = Utc::now();
        let control = self.context.control().clone();

        self.handle_signals().await;
        if control.is_aborted() {
            control.set_status(ScanStatus::Aborted);
            return Ok(self.report(started_at));
        }

        control.set_status(ScanStatus::Scanning);
        tracing::info!("Starting scan of {}", self.target);

        self.seed();
        self.browser_cluster();

        if let Err(e) = self.audit().await {
            tracing::error!("Scan stopped: {}", e);
            control.set_status(ScanStatus::Aborted);
            return Err(e);
        }

        let status = if control.is_aborted() {
            ScanStatus::Aborted
        } else if control.is_suspended() {
            ScanStatus::Suspended
        } else {
            ScanStatus::Done
        };
        control.set_status(status);

        tracing::info!(
            "Scan {}: {} pages audited, {} failures",
            status,
            self.context.audited_pages(),
            self.pipeline.failures().len()
        );

        Ok(self.report(started_at))
    }

    fn seed(&mut self) {
        let target = self.target.to_string();
        self.frontier.push_url(&target, false);

        for path in std::mem::take(&mut self.extend_paths) {
            self.frontier.push_url(&path, false);
        }
        for path in std::mem::take(&mut self.restrict_paths) {
            self.frontier.push_url(&path, true);
        }
    }

    async fn audit(&mut self) -> Result<(), ScanError> {
        let control = self.context.control().clone();

        loop {
            self.handle_signals().await;
            if control.is_aborted() || control.is_suspended() {
                break;
            }

            let mut announced = false;
            let mut last_pending = 0;

            while !self.has_audit_workload() && !control.is_aborted() {
                let Some(cluster) = self.active_browser() else {
                    break;
                };
                let pending = cluster.pending_job_count();
                if pending == 0 {
                    break;
                }

                if !announced {
                    tracing::info!(
                        "Workload exhausted, waiting for new pages from the browser cluster..."
                    );
                    announced = true;
                }

                if pending != last_pending {
                    tracing::info!("Pending jobs: {}", pending);
                    for worker in cluster.workers() {
                        tracing::debug!("{}", worker);
                    }
                }
                last_pending = pending;

                self.frontier.page_buffer().wait_for_push(IDLE_POLL).await;
            }

            self.audit_queues().await?;

            if control.is_aborted() || control.is_suspended() {
                break;
            }

            if self.wait_for_browser_cluster() {
                self.frontier.page_buffer().wait_for_push(IDLE_POLL).await;
                continue;
            }

            if self.context.page_limit_reached() {
                tracing::info!("Page limit reached");
                break;
            }

            if !self.has_audit_workload() {
                break;
            }
        }

        Ok(())
    }

    /// Audits pages one at a time until the queues run dry or a stop applies
    async fn audit_queues(&mut self) -> Result<(), ScanError> {
        if !self.has_audit_workload() || self.context.page_limit_reached() {
            return Ok(());
        }

        let control = self.context.control().clone();

        while !control.is_suspended()
            && !control.is_aborted()
            && !self.context.page_limit_reached()
        {
            self.handle_signals().await;
            if control.is_aborted() || control.is_suspended() {
                break;
            }

            let Some(page) = self.pop_page().await else {
                break;
            };

            self.session.ensure_logged_in().await?;

            self.pipeline.replenish(&mut self.frontier);

            // Batch fetches ride along with the audit's own traffic; without
            // any, harvest them explicitly.
            if !self.audit_page(page).await {
                self.pipeline.harvest(&mut self.frontier).await;
            }
        }

        Ok(())
    }

    /// Next page to audit: buffered pages first, then a blocking fetch
    pub async fn pop_page(&mut self) -> Option<Page> {
        self.pipeline.collect_completed(&mut self.frontier);

        if let Some(page) = self.frontier.pop_page() {
            return Some(page);
        }

        if self.frontier.url_queue_len() == 0 && self.pipeline.in_flight() > 0 {
            self.pipeline.harvest(&mut self.frontier).await;
            if let Some(page) = self.frontier.pop_page() {
                return Some(page);
            }
        }

        let page = self
            .pipeline
            .pop_page_from_url_queue(&mut self.frontier)
            .await?;
        self.frontier.mark_page_seen(&page);
        Some(page)
    }

    /// Audits a single page
    ///
    /// Returns whether the audit generated HTTP traffic.
    pub async fn audit_page(&mut self, mut page: Page) -> bool {
        let out_of_scope = self.frontier.scope().page_out(&page);
        if out_of_scope && !page.forced {
            tracing::info!("Ignoring page due to exclusion criteria: {}", page.url);
            return false;
        }

        let browser = self.browser_cluster();

        self.context.record_audit();
        if !out_of_scope && !page.forced {
            self.sitemap.add(&page.url, page.code);
        }

        match &page.error {
            None => tracing::info!("[HTTP: {}] {}", page.code, page.url),
            Some(e) => {
                tracing::error!("[HTTP: {}] {}", page.code, page.url);
                tracing::error!("{}", e);
            }
        }

        if !page.platforms.is_empty() {
            tracing::info!("Identified as: {}", page.platforms.join(", "));
        }

        if self.crawl {
            let paths = page.paths().to_vec();
            let pushed = paths
                .iter()
                .filter(|path| self.frontier.push_url(path.as_str(), false))
                .count();
            tracing::info!("Analysis resulted in {} usable paths.", pushed);
        }

        if browser.is_some() {
            let limit = self
                .dom_depth_limit
                .map_or_else(|| "none".to_string(), |l| l.to_string());
            tracing::info!("DOM depth: {} (Limit: {})", page.dom_depth(), limit);

            if let Some(dom) = page.dom.as_ref().filter(|d| !d.transitions.is_empty()) {
                tracing::info!("  Transitions:");
                for transition in &dom.transitions {
                    tracing::info!("    {}", transition);
                }
            }
        }

        for observer in &self.observers {
            observer.on_page_audit(&page);
        }

        let transport = self.pipeline.transport().clone();
        transport.update_cookies(&page.url, &page.cookies());

        if let Some(cluster) = &browser {
            self.perform_browser_analysis(cluster.as_ref(), &page);
        }

        let mut run_http = false;

        if !self.checks.is_empty() {
            for observer in &self.observers {
                observer.on_effective_page_audit(&page);
            }

            run_http = self
                .checks
                .run(CheckGroup::WithoutPlatforms, &page, transport.as_ref())
                .await;
            if self
                .checks
                .run(CheckGroup::WithPlatforms, &page, transport.as_ref())
                .await
            {
                run_http = true;
            }
        }

        for observer in &self.observers {
            observer.after_page_audit(&page);
        }

        // Observers and checks may rely on the parsed elements up to here
        page.clear_cache();

        if let Some(timing) = &self.timing {
            if timing.has_candidates() {
                tracing::info!("Processing timeout-analysis candidates for: {}", page.url);
                timing.run(transport.as_ref()).await;
                run_http = true;
            }
        }

        run_http
    }

    fn perform_browser_analysis(&self, cluster: &dyn BrowserCluster, page: &Page) {
        if self
            .dom_depth_limit
            .is_some_and(|limit| page.dom_depth() >= limit)
        {
            tracing::debug!("DOM depth limit reached for {}", page.url);
            return;
        }

        if let Err(e) = cluster.submit(page.clone()) {
            tracing::warn!("Could not submit {} to the browser cluster: {}", page.url, e);
        }
    }

    /// Blocks while paused, leaving in-flight work to finish on its own
    async fn handle_signals(&self) {
        let control = self.context.control();
        if !control.is_paused() || control.is_aborted() {
            return;
        }

        control.set_status(ScanStatus::Paused);
        tracing::info!("Scan paused");

        while control.is_paused() && !control.is_aborted() {
            tokio::time::sleep(IDLE_POLL).await;
        }

        if !control.is_aborted() {
            control.set_status(ScanStatus::Scanning);
            tracing::info!("Scan resumed");
        }
    }

    /// Initializes the browser cluster on first use
    fn browser_cluster(&mut self) -> Option<Arc<dyn BrowserCluster>> {
        let slot = std::mem::replace(&mut self.browser, BrowserSlot::Disabled);
        self.browser = match slot {
            BrowserSlot::Pending(factory) => {
                tracing::info!("Initializing browser cluster");
                BrowserSlot::Ready(factory(self.frontier.page_buffer().sink()))
            }
            other => other,
        };
        self.active_browser()
    }

    fn active_browser(&self) -> Option<Arc<dyn BrowserCluster>> {
        match &self.browser {
            BrowserSlot::Ready(cluster) => Some(cluster.clone()),
            _ => None,
        }
    }

    fn wait_for_browser_cluster(&self) -> bool {
        self.active_browser()
            .is_some_and(|cluster| cluster.pending_job_count() > 0)
    }

    /// Work in either queue or still on the wire
    pub fn has_audit_workload(&self) -> bool {
        self.frontier.has_workload() || self.pipeline.in_flight() > 0
    }

    /// Pushes a URL through the frontier's admission rules
    pub fn push_url(&mut self, url: &str, force: bool) -> bool {
        self.frontier.push_url(url, force)
    }

    /// Pushes a page through the buffer's admission rules
    pub fn push_page(&mut self, page: Page, force: bool) -> bool {
        self.frontier.push_page(page, force)
    }

    pub fn sitemap(&self) -> &Sitemap {
        &self.sitemap
    }

    pub fn failures(&self) -> &[Url] {
        self.pipeline.failures()
    }

    pub fn url_queue_total_size(&self) -> u64 {
        self.frontier.url_queue_total_size()
    }

    pub fn page_queue_total_size(&self) -> u64 {
        self.frontier.page_queue_total_size()
    }

    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    pub fn control(&self) -> Arc<ScanControl> {
        self.context.control().clone()
    }

    pub fn status(&self) -> ScanStatus {
        self.context.control().status()
    }

    pub fn audited_pages(&self) -> u64 {
        self.context.audited_pages()
    }

    fn report(&self, started_at: DateTime<Utc>) -> ScanReport {
        ScanReport {
            target: self.target.clone(),
            status: self.status(),
            started_at,
            finished_at: Utc::now(),
            audited_pages: self.context.audited_pages(),
            url_queue_total: self.frontier.url_queue_total_size(),
            page_queue_total: self.frontier.page_queue_total_size(),
            pending_urls: self.frontier.url_queue_len(),
            pending_pages: self.frontier.page_queue_len(),
            sitemap: self.sitemap.clone(),
            failures: self.pipeline.failures().to_vec(),
            config_hash: self.config_hash.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{BrowserError, WorkerStatus};
    use crate::checks::CheckError;
    use crate::crawler::testing::ScriptedTransport;
    use crate::page::{Dom, Transition};
    use crate::session::SessionError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use reqwest::header::{HeaderMap, HeaderValue, SET_COOKIE};

    fn target() -> Url {
        Url::parse("https://t/").unwrap()
    }

    fn builder(transport: &Arc<ScriptedTransport>) -> ScannerBuilder {
        ScannerBuilder::new(target()).transport(transport.clone())
    }

    fn sitemap_paths(sitemap: &Sitemap) -> Vec<(String, u16)> {
        sitemap
            .iter()
            .map(|(url, code)| (url.path().to_string(), code))
            .collect()
    }

    type Log = Arc<Mutex<Vec<String>>>;

    enum Signal {
        Nothing,
        Suspend(Arc<ScanControl>),
        Abort(Arc<ScanControl>),
    }

    struct Recorder {
        log: Log,
        signal: Signal,
    }

    impl Recorder {
        fn new(log: &Log) -> Self {
            Self {
                log: log.clone(),
                signal: Signal::Nothing,
            }
        }

        fn signalling(signal: Signal) -> Self {
            Self {
                log: Arc::new(Mutex::new(Vec::new())),
                signal,
            }
        }
    }

    impl AuditObserver for Recorder {
        fn on_page_audit(&self, page: &Page) {
            self.log.lock().push(format!("on_page_audit {}", page.url.path()));
            match &self.signal {
                Signal::Nothing => {}
                Signal::Suspend(control) => control.suspend(),
                Signal::Abort(control) => control.abort(),
            }
        }

        fn on_effective_page_audit(&self, page: &Page) {
            self.log
                .lock()
                .push(format!("on_effective_page_audit {}", page.url.path()));
        }

        fn after_page_audit(&self, page: &Page) {
            self.log.lock().push(format!("after_page_audit {}", page.url.path()));
        }
    }

    struct NamedCheck {
        name: &'static str,
        platforms: bool,
        log: Log,
    }

    #[async_trait]
    impl Check for NamedCheck {
        fn name(&self) -> &str {
            self.name
        }

        fn requires_platforms(&self) -> bool {
            self.platforms
        }

        async fn run(&self, page: &Page, _transport: &dyn Transport) -> Result<bool, CheckError> {
            self.log.lock().push(format!("{} {}", self.name, page.url.path()));
            Ok(true)
        }
    }

    struct Timing {
        candidates: Mutex<bool>,
        runs: Mutex<u32>,
    }

    #[async_trait]
    impl TimingAnalysis for Timing {
        fn has_candidates(&self) -> bool {
            *self.candidates.lock()
        }

        async fn run(&self, _transport: &dyn Transport) {
            *self.candidates.lock() = false;
            *self.runs.lock() += 1;
        }
    }

    struct LockedOut;

    #[async_trait]
    impl SessionGuard for LockedOut {
        async fn ensure_logged_in(&self) -> Result<(), SessionError> {
            Err(SessionError::LoginFailed("bad credentials".to_string()))
        }
    }

    /// Cluster that explores synchronously and never has pending jobs
    struct InlineCluster {
        sink: PageSink,
        submitted: Arc<Mutex<Vec<Url>>>,
        explore: fn(&Page) -> Vec<Page>,
    }

    impl BrowserCluster for InlineCluster {
        fn submit(&self, page: Page) -> Result<(), BrowserError> {
            self.submitted.lock().push(page.url.clone());
            for found in (self.explore)(&page) {
                self.sink.push(found);
            }
            Ok(())
        }

        fn pending_job_count(&self) -> usize {
            0
        }

        fn workers(&self) -> Vec<WorkerStatus> {
            Vec::new()
        }
    }

    fn inline_browser(
        builder: ScannerBuilder,
        explore: fn(&Page) -> Vec<Page>,
    ) -> (ScannerBuilder, Arc<Mutex<Vec<Url>>>) {
        let submitted = Arc::new(Mutex::new(Vec::new()));
        let recorded = submitted.clone();
        let builder = builder.browser(move |sink| {
            Arc::new(InlineCluster {
                sink,
                submitted: recorded,
                explore,
            }) as Arc<dyn BrowserCluster>
        });
        (builder, submitted)
    }

    fn clicked(page: &Page, body: &str) -> Page {
        Page::new(page.url.clone(), 200, HeaderMap::new(), body.to_string()).with_dom(Dom::new(
            vec![Transition {
                event: "click".to_string(),
                element: "<button id=\"more\">".to_string(),
            }],
        ))
    }

    #[tokio::test]
    async fn test_scope_scenario() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.html("https://t/", r#"<a href="/a">a</a><a href="/b">b</a>"#);
        let scope = Arc::new(RuleScope::for_target(&target()));
        scope.exclude("^https://t/b$").unwrap();

        let mut scanner = builder(&transport).scope(scope).build().unwrap();

        assert!(scanner.push_url("https://t/", false));
        let page = scanner.pop_page().await.unwrap();
        scanner.audit_page(page).await;

        assert_eq!(sitemap_paths(scanner.sitemap()), vec![("/".to_string(), 200)]);
        let queued: Vec<String> = scanner
            .frontier()
            .queued_urls()
            .iter()
            .map(|u| u.path().to_string())
            .collect();
        assert_eq!(queued, vec!["/a"]);
        assert!(!scanner.push_url("/b", false));
    }

    #[tokio::test]
    async fn test_full_scan_terminates() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.html("https://t/", r#"<a href="/a">a</a><a href="/b">b</a><a href="https://ext/">x</a>"#);
        transport.html("https://t/a", r#"<a href="/">home</a><a href="/c">c</a>"#);
        transport.respond("https://t/b", 500, "oops");
        transport.html("https://t/c", "");

        let mut scanner = builder(&transport).build().unwrap();
        let report = scanner.run().await.unwrap();

        assert_eq!(report.status, ScanStatus::Done);
        assert_eq!(report.audited_pages, 4);
        assert_eq!(
            sitemap_paths(&report.sitemap),
            vec![
                ("/".to_string(), 200),
                ("/a".to_string(), 200),
                ("/b".to_string(), 500),
                ("/c".to_string(), 200),
            ]
        );
        assert_eq!(transport.request_count("https://ext/"), 0);
        assert_eq!(report.url_queue_total, 4);
        assert_eq!(report.pending_urls, 0);
        assert!(!scanner.has_audit_workload());
    }

    #[tokio::test]
    async fn test_redirects_and_failures() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.redirect("https://t/", 302, "/home");
        transport.html("https://t/home", r#"<a href="/down">down</a>"#);
        transport.fail("https://t/down");

        let mut scanner = builder(&transport).max_tries(3).build().unwrap();
        let report = scanner.run().await.unwrap();

        assert_eq!(
            sitemap_paths(&report.sitemap),
            vec![("/".to_string(), 302), ("/home".to_string(), 200)]
        );
        assert_eq!(report.failures, vec![Url::parse("https://t/down").unwrap()]);
        assert_eq!(transport.request_count("https://t/down"), 3);
        assert_eq!(report.status, ScanStatus::Done);
    }

    #[tokio::test]
    async fn test_page_limit() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.html("https://t/", r#"<a href="/a">a</a><a href="/b">b</a><a href="/c">c</a>"#);

        let mut scanner = builder(&transport).page_limit(Some(2)).build().unwrap();
        let report = scanner.run().await.unwrap();

        assert_eq!(report.audited_pages, 2);
        assert_eq!(report.sitemap.len(), 2);
        assert_eq!(report.status, ScanStatus::Done);
    }

    #[tokio::test]
    async fn test_audit_order_and_traffic() {
        let transport = Arc::new(ScriptedTransport::new());
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let timing = Arc::new(Timing {
            candidates: Mutex::new(true),
            runs: Mutex::new(0),
        });

        let mut scanner = builder(&transport)
            .observer(Arc::new(Recorder::new(&log)))
            .check(Arc::new(NamedCheck {
                name: "platform",
                platforms: true,
                log: log.clone(),
            }))
            .check(Arc::new(NamedCheck {
                name: "generic",
                platforms: false,
                log: log.clone(),
            }))
            .timing_analysis(timing.clone())
            .build()
            .unwrap();

        let report = scanner.run().await.unwrap();

        assert_eq!(report.audited_pages, 1);
        assert_eq!(
            *log.lock(),
            vec![
                "on_page_audit /",
                "on_effective_page_audit /",
                "generic /",
                "platform /",
                "after_page_audit /",
            ]
        );
        assert_eq!(*timing.runs.lock(), 1);
    }

    #[tokio::test]
    async fn test_audit_page_reports_no_traffic_without_checks() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut scanner = builder(&transport).build().unwrap();

        let page = Page::new(target(), 200, HeaderMap::new(), "");
        assert!(!scanner.audit_page(page).await);
        assert_eq!(scanner.audited_pages(), 1);
    }

    #[tokio::test]
    async fn test_out_of_scope_page_not_audited() {
        let transport = Arc::new(ScriptedTransport::new());
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let mut scanner = builder(&transport)
            .observer(Arc::new(Recorder::new(&log)))
            .build()
            .unwrap();

        let outside = Page::new(
            Url::parse("https://elsewhere/").unwrap(),
            200,
            HeaderMap::new(),
            "",
        );
        assert!(!scanner.audit_page(outside).await);
        assert_eq!(scanner.audited_pages(), 0);
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn test_forced_pages_audited_but_not_mapped() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut scanner = builder(&transport)
            .restrict_paths(vec!["https://elsewhere/private".to_string()])
            .build()
            .unwrap();

        let report = scanner.run().await.unwrap();

        assert_eq!(report.audited_pages, 2);
        assert_eq!(sitemap_paths(&report.sitemap), vec![("/".to_string(), 200)]);
        assert_eq!(transport.request_count("https://elsewhere/private"), 1);
    }

    #[tokio::test]
    async fn test_extend_paths_seeded() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut scanner = builder(&transport)
            .extend_paths(vec!["/hidden".to_string(), "https://elsewhere/".to_string()])
            .build()
            .unwrap();

        let report = scanner.run().await.unwrap();

        assert_eq!(
            sitemap_paths(&report.sitemap),
            vec![("/".to_string(), 200), ("/hidden".to_string(), 200)]
        );
        assert_eq!(transport.request_count("https://elsewhere/"), 0);
    }

    #[tokio::test]
    async fn test_cookies_merged_into_transport() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut headers = HeaderMap::new();
        headers.insert(SET_COOKIE, HeaderValue::from_static("session=abc; Path=/"));
        transport.with_headers("https://t/", headers, "");

        let mut scanner = builder(&transport).build().unwrap();
        scanner.run().await.unwrap();

        assert_eq!(transport.cookies(), vec!["session=abc; Path=/"]);
    }

    #[tokio::test]
    async fn test_session_failure_aborts() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut scanner = builder(&transport)
            .session(Arc::new(LockedOut))
            .build()
            .unwrap();

        let result = scanner.run().await;

        assert!(matches!(result, Err(ScanError::Session(_))));
        assert_eq!(scanner.status(), ScanStatus::Aborted);
        assert_eq!(scanner.audited_pages(), 0);
    }

    #[tokio::test]
    async fn test_suspend_leaves_queues() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.html("https://t/", r#"<a href="/a">a</a><a href="/b">b</a>"#);
        let control = Arc::new(ScanControl::new());

        let mut scanner = builder(&transport)
            .control(control.clone())
            .observer(Arc::new(Recorder::signalling(Signal::Suspend(
                control.clone(),
            ))))
            .build()
            .unwrap();

        let report = scanner.run().await.unwrap();

        assert_eq!(report.status, ScanStatus::Suspended);
        assert_eq!(report.audited_pages, 1);
        assert_eq!(report.pending_urls, 2);
    }

    #[tokio::test]
    async fn test_abort_stops_at_next_safe_point() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.html("https://t/", r#"<a href="/a">a</a><a href="/b">b</a>"#);
        let control = Arc::new(ScanControl::new());

        let mut scanner = builder(&transport)
            .control(control.clone())
            .observer(Arc::new(Recorder::signalling(Signal::Abort(
                control.clone(),
            ))))
            .build()
            .unwrap();

        let report = scanner.run().await.unwrap();

        assert_eq!(report.status, ScanStatus::Aborted);
        assert_eq!(report.audited_pages, 1);
    }

    #[tokio::test]
    async fn test_abort_before_start() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut scanner = builder(&transport).build().unwrap();
        scanner.control().abort();

        let report = scanner.run().await.unwrap();

        assert_eq!(report.status, ScanStatus::Aborted);
        assert_eq!(transport.total_requests(), 0);
    }

    #[tokio::test]
    async fn test_pause_holds_until_resumed() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut scanner = builder(&transport).build().unwrap();

        let control = scanner.control();
        let token = control.pause();
        let resumer = control.clone();
        let observed = transport.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            assert_eq!(resumer.status(), ScanStatus::Paused);
            assert_eq!(observed.total_requests(), 0);
            resumer.resume(token)
        });

        let report = scanner.run().await.unwrap();

        assert!(handle.await.unwrap());
        assert_eq!(report.status, ScanStatus::Done);
        assert_eq!(report.audited_pages, 1);
        assert_eq!(transport.total_requests(), 1);
    }

    #[tokio::test]
    async fn test_browser_results_flow_back() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.html("https://t/", "");

        let (builder, submitted) = inline_browser(builder(&transport), |page| {
            if page.dom_depth() == 0 && page.url.path() == "/" {
                vec![clicked(page, r#"<a href="/late">late</a>"#)]
            } else {
                Vec::new()
            }
        });
        let mut scanner = builder.dom_depth_limit(Some(1)).build().unwrap();

        let report = scanner.run().await.unwrap();

        // The plain page, its clicked state, and the path found in that state
        assert_eq!(report.audited_pages, 3);
        assert_eq!(
            sitemap_paths(&report.sitemap),
            vec![("/".to_string(), 200), ("/late".to_string(), 200)]
        );

        // The clicked state is at the depth limit and is not explored again
        let explored: Vec<String> = submitted.lock().iter().map(|u| u.path().to_string()).collect();
        assert_eq!(explored, vec!["/", "/late"]);
    }

    #[tokio::test]
    async fn test_unchanged_browser_page_audited_once() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.html("https://t/", r#"<a href="/a">a</a>"#);

        let (builder, _) = inline_browser(builder(&transport), |page| vec![page.clone()]);
        let mut scanner = builder.build().unwrap();

        let report = scanner.run().await.unwrap();

        assert_eq!(report.audited_pages, 2);
        assert_eq!(report.sitemap.len(), 2);
    }

    #[tokio::test]
    async fn test_identical_pages_at_different_urls_both_audited() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.html("https://t/", r#"<a href="/x">x</a><a href="/y">y</a>"#);
        transport.html("https://t/x", "<p>same</p>");
        transport.html("https://t/y", "<p>same</p>");

        let mut scanner = builder(&transport).build().unwrap();
        let report = scanner.run().await.unwrap();

        assert_eq!(report.audited_pages, 3);
    }

    /// Explores slowly so the driver has to wait on pending jobs
    struct SlowRenderer {
        delay: Duration,
    }

    #[async_trait]
    impl Renderer for SlowRenderer {
        async fn explore(&self, page: Page) -> Result<Vec<Page>, BrowserError> {
            tokio::time::sleep(self.delay).await;
            if page.url.path() == "/" && page.dom_depth() == 0 {
                Ok(vec![clicked(&page, r#"<a href="/late">late</a>"#)])
            } else {
                Ok(Vec::new())
            }
        }
    }

    #[tokio::test]
    async fn test_waits_for_pending_browser_jobs() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.html("https://t/", "");

        let mut scanner = builder(&transport)
            .renderer(
                Arc::new(SlowRenderer {
                    delay: Duration::from_millis(50),
                }),
                2,
            )
            .dom_depth_limit(Some(1))
            .build()
            .unwrap();

        let report = scanner.run().await.unwrap();

        assert_eq!(report.status, ScanStatus::Done);
        assert_eq!(report.audited_pages, 3);
        assert!(report.sitemap.get("https://t/late").is_some());
        assert!(!scanner.wait_for_browser_cluster());
    }

    /// Records every audit that starts while the scan is paused
    struct PauseWatcher {
        control: Arc<ScanControl>,
        audited_while_paused: Mutex<Vec<String>>,
    }

    impl AuditObserver for PauseWatcher {
        fn on_page_audit(&self, page: &Page) {
            if self.control.is_paused() {
                self.audited_while_paused.lock().push(page.url.to_string());
            }
        }
    }

    #[tokio::test]
    async fn test_pause_during_browser_wait_holds_audits() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.html("https://t/", "");
        let control = Arc::new(ScanControl::new());
        let watcher = Arc::new(PauseWatcher {
            control: control.clone(),
            audited_while_paused: Mutex::new(Vec::new()),
        });

        let mut scanner = builder(&transport)
            .control(control.clone())
            .observer(watcher.clone())
            .renderer(
                Arc::new(SlowRenderer {
                    delay: Duration::from_millis(200),
                }),
                1,
            )
            .dom_depth_limit(Some(1))
            .build()
            .unwrap();

        // The pause lands while the driver waits on the first browser job
        let operator = control.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(80)).await;
            let token = operator.pause();
            tokio::time::sleep(Duration::from_millis(600)).await;
            assert_eq!(operator.status(), ScanStatus::Paused);
            operator.resume(token)
        });

        let report = scanner.run().await.unwrap();

        assert!(handle.await.unwrap());
        assert!(watcher.audited_while_paused.lock().is_empty());
        assert_eq!(report.status, ScanStatus::Done);
        assert_eq!(report.audited_pages, 3);
    }
}
