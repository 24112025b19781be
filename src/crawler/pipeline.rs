//! Fetch pipeline
//!
//! Turns frontier URLs into pages. Every fetch is a spawned task; completions
//! are processed on the driver's side only, so the frontier and the retry
//! tracker are never touched concurrently.
//!
//! Two modes share one completion path:
//!
//! - blocking ([`FetchPipeline::pop_page_from_url_queue`]): fetch one URL and
//!   wait for it, handing the page back to the caller
//! - batch ([`FetchPipeline::replenish`]): start several fetches and leave
//!   them running; a later [`FetchPipeline::harvest`] pushes their pages into
//!   the buffer

use crate::crawler::fetcher::{Response, Transport, TransportError, TransportErrorKind};
use crate::crawler::scheduler::{Frontier, QueuedUrl};
use crate::page::Page;
use crate::state::{RetryDecision, RetryTracker};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, trace, warn};
use url::Url;

/// Upper bound on URLs pulled by one replenishment
pub const REPLENISH_BATCH: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    /// Hand the page to whoever is blocking on it
    Return,
    /// Push the page into the buffer
    Buffer,
}

struct Fetched {
    entry: QueuedUrl,
    response: Response,
    delivery: Delivery,
}

/// In-flight fetches plus the retry policy applied to their outcomes
pub struct FetchPipeline {
    transport: Arc<dyn Transport>,
    in_flight: JoinSet<Fetched>,
    buffered_in_flight: usize,
    retries: RetryTracker,
}

impl FetchPipeline {
    pub fn new(transport: Arc<dyn Transport>, max_tries: u32) -> Self {
        Self {
            transport,
            in_flight: JoinSet::new(),
            buffered_in_flight: 0,
            retries: RetryTracker::new(max_tries),
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Fetches not yet harvested
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn retries(&self) -> &RetryTracker {
        &self.retries
    }

    /// URLs abandoned after exhausting their attempts
    pub fn failures(&self) -> &[Url] {
        self.retries.failures()
    }

    fn enqueue(&mut self, entry: QueuedUrl, delivery: Delivery) {
        trace!("Fetching {}", entry.url);
        if delivery == Delivery::Buffer {
            self.buffered_in_flight += 1;
        }

        let transport = self.transport.clone();
        self.in_flight.spawn(async move {
            let response = match AssertUnwindSafe(transport.get(&entry.url))
                .catch_unwind()
                .await
            {
                Ok(response) => response,
                Err(_) => Response::no_response(
                    entry.url.clone(),
                    TransportError::new(TransportErrorKind::Request, "transport panicked"),
                ),
            };
            Fetched {
                entry,
                response,
                delivery,
            }
        });
    }

    /// Fetches the next frontier URL and waits for its outcome
    ///
    /// Returns `None` when the frontier is empty or the fetch got no response;
    /// in the latter case the URL has been requeued or abandoned. Batch
    /// fetches still in flight are harvested along the way.
    pub async fn pop_page_from_url_queue(&mut self, frontier: &mut Frontier) -> Option<Page> {
        let entry = frontier.pop_url()?;
        self.enqueue(entry, Delivery::Return);
        self.harvest(frontier).await
    }

    /// Starts batch fetches when the page buffer has run dry
    ///
    /// Pulls at most [`REPLENISH_BATCH`] URLs, fewer if the buffer has less
    /// room. Their pages go straight into the buffer with deduplication
    /// deferred to pop time. Returns whether URLs remain in the frontier.
    pub fn replenish(&mut self, frontier: &mut Frontier) -> bool {
        if frontier.page_buffer().is_empty() {
            let free = frontier
                .page_buffer()
                .free_capacity()
                .saturating_sub(self.buffered_in_flight);

            for _ in 0..REPLENISH_BATCH.min(free) {
                let Some(entry) = frontier.pop_url() else {
                    break;
                };
                self.enqueue(entry, Delivery::Buffer);
            }
        }

        frontier.url_queue_len() > 0
    }

    /// Waits for every in-flight fetch and processes the outcomes
    ///
    /// Returns the page of a blocking fetch, if one was pending and got a
    /// response.
    pub async fn harvest(&mut self, frontier: &mut Frontier) -> Option<Page> {
        let mut grabbed = None;

        while let Some(joined) = self.in_flight.join_next().await {
            match joined {
                Ok(fetched) => {
                    if let Some(page) = self.complete(fetched, frontier) {
                        grabbed = Some(page);
                    }
                }
                Err(e) => error!("Fetch task failed: {}", e),
            }
        }

        grabbed
    }

    /// Processes fetches that already finished without waiting for the rest
    pub fn collect_completed(&mut self, frontier: &mut Frontier) {
        while let Some(joined) = self.in_flight.try_join_next() {
            match joined {
                Ok(fetched) => {
                    // Only batch fetches can still be running here
                    if let Some(page) = self.complete(fetched, frontier) {
                        frontier.push_buffered(page);
                    }
                }
                Err(e) => error!("Fetch task failed: {}", e),
            }
        }
    }

    fn complete(&mut self, fetched: Fetched, frontier: &mut Frontier) -> Option<Page> {
        let Fetched {
            entry,
            response,
            delivery,
        } = fetched;

        if delivery == Delivery::Buffer {
            self.buffered_in_flight = self.buffered_in_flight.saturating_sub(1);
        }

        // Redirect targets are scheduled whatever happens to the origin
        for target in response.locations() {
            info!(
                "Scheduled {} redirection: {} => {}",
                response.code, response.url, target
            );
            frontier.push_url(target.as_str(), false);
        }

        if response.has_response() {
            let page = Page::from_response(response).forced(entry.force);
            return match delivery {
                Delivery::Return => Some(page),
                Delivery::Buffer => {
                    frontier.push_buffered(page);
                    None
                }
            };
        }

        let reason = response
            .error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no response".to_string());

        match self.retries.record_failure(&entry.url) {
            RetryDecision::Retry(attempts) => {
                warn!(
                    "Retrying for: {} ({}/{}) {}",
                    entry.url,
                    attempts,
                    self.retries.max_tries(),
                    reason
                );
                frontier.requeue_url(entry);
            }
            RetryDecision::GiveUp => {
                error!("Giving up trying to audit: {}", entry.url);
                error!(
                    "Couldn't get a response after {} tries: {}",
                    self.retries.max_tries(),
                    reason
                );
            }
        }

        None
    }
}
