//! Browser bridge
//!
//! Pages handed to the bridge are explored in a browser by parallel workers;
//! every page discovered that way comes back through a
//! [`PageSink`](crate::crawler::PageSink) into the page buffer. The driver
//! only submits pages and watches the pending-job counter.

mod pool;

pub use pool::{BrowserPool, Renderer};

use crate::page::Page;
use std::fmt;
use thiserror::Error;
use url::Url;

/// Browser-side failures
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Browser pool is shut down")]
    Closed,

    #[error("Rendering failed for {url}: {message}")]
    Render { url: String, message: String },
}

/// What a single worker is doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerStatus {
    pub id: usize,
    /// URL of the page being explored, if any
    pub job: Option<Url>,
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.job {
            Some(url) => write!(f, "worker {}: exploring {}", self.id, url),
            None => write!(f, "worker {}: idle", self.id),
        }
    }
}

/// Browser-rendering worker pool as seen by the scheduler
pub trait BrowserCluster: Send + Sync {
    /// Queues a page for DOM exploration
    fn submit(&self, page: Page) -> Result<(), BrowserError>;

    /// Jobs submitted but not yet finished
    fn pending_job_count(&self) -> usize;

    fn workers(&self) -> Vec<WorkerStatus>;
}
