//! Crawler module for fetching and auditing pages
//!
//! This module contains the core scheduling logic, including:
//! - HTTP transport with redirect reporting and cookie sharing
//! - The URL frontier and the bounded page buffer
//! - Batch and blocking fetches with bounded retries
//! - The audit driver tying queues, checks and the browser cluster together

mod coordinator;
mod fetcher;
mod hooks;
mod pipeline;
mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

pub use coordinator::{BrowserFactory, Scanner, ScannerBuilder};
pub use fetcher::{
    build_http_client, HttpTransport, Response, Transport, TransportError, TransportErrorKind,
};
pub use hooks::AuditObserver;
pub use pipeline::{FetchPipeline, REPLENISH_BATCH};
pub use scheduler::{Frontier, PageBuffer, PageSink, QueuedUrl};
