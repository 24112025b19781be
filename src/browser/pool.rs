use crate::browser::{BrowserCluster, BrowserError, WorkerStatus};
use crate::crawler::PageSink;
use crate::page::Page;
use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// DOM exploration performed by a browser worker
#[async_trait]
pub trait Renderer: Send + Sync + 'static {
    /// Explores a page, returning the pages its DOM states lead to
    async fn explore(&self, page: Page) -> Result<Vec<Page>, BrowserError>;
}

/// Fixed set of tokio workers sharing one job channel
///
/// A job counts as pending from submission until every page it produced has
/// been pushed, so a zero count means the buffer already holds all results.
pub struct BrowserPool {
    jobs: mpsc::UnboundedSender<Page>,
    pending: Arc<AtomicUsize>,
    statuses: Arc<Mutex<Vec<WorkerStatus>>>,
    handles: Vec<JoinHandle<()>>,
}

impl BrowserPool {
    /// Spawns `workers` workers onto the current runtime
    pub fn new(workers: usize, renderer: Arc<dyn Renderer>, sink: PageSink) -> Self {
        let workers = workers.max(1);
        let (jobs, receiver) = mpsc::unbounded_channel::<Page>();
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let pending = Arc::new(AtomicUsize::new(0));
        let statuses = Arc::new(Mutex::new(
            (0..workers)
                .map(|id| WorkerStatus { id, job: None })
                .collect::<Vec<_>>(),
        ));

        let handles = (0..workers)
            .map(|id| {
                let receiver = receiver.clone();
                let renderer = renderer.clone();
                let sink = sink.clone();
                let pending = pending.clone();
                let statuses = statuses.clone();

                tokio::spawn(async move {
                    loop {
                        let job = receiver.lock().await.recv().await;
                        let Some(page) = job else {
                            break;
                        };

                        statuses.lock()[id].job = Some(page.url.clone());
                        debug!("Worker {} exploring {}", id, page.url);

                        let url = page.url.clone();
                        match AssertUnwindSafe(renderer.explore(page)).catch_unwind().await {
                            Ok(Ok(found)) => {
                                debug!("Worker {} found {} pages at {}", id, found.len(), url);
                                for page in found {
                                    sink.push(page);
                                }
                            }
                            Ok(Err(e)) => warn!("{}", e),
                            Err(_) => warn!("Renderer panicked on {}", url),
                        }

                        statuses.lock()[id].job = None;
                        pending.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        Self {
            jobs,
            pending,
            statuses,
            handles,
        }
    }

    /// Stops accepting jobs and waits for the workers to drain the queue
    ///
    /// Scans never call this. Once the driver drops the pool the channel
    /// closes, and the workers exit after the queued jobs are drained.
    #[cfg(test)]
    pub(crate) async fn shutdown(self) {
        let Self { jobs, handles, .. } = self;
        drop(jobs);
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Browser worker ended abnormally: {}", e);
            }
        }
    }
}

impl BrowserCluster for BrowserPool {
    fn submit(&self, page: Page) -> Result<(), BrowserError> {
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.jobs.send(page).map_err(|_| {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            BrowserError::Closed
        })
    }

    fn pending_job_count(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    fn workers(&self) -> Vec<WorkerStatus> {
        self.statuses.lock().clone()
    }
}
