//! Check collaborator interface
//!
//! Checks find vulnerabilities; the scheduler only runs them and records
//! whether they generated HTTP traffic. Checks that do not depend on platform
//! fingerprinting run first so the traffic they generate can refine the
//! fingerprint before platform-specific checks run.

use crate::crawler::Transport;
use crate::page::Page;
use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Failure inside a single check
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("Check '{check}' failed: {message}")]
    Failed { check: String, message: String },

    #[error("Check '{0}' panicked")]
    Panicked(String),
}

/// A vulnerability check run against every audited page
#[async_trait]
pub trait Check: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the check benefits from knowing the remote platforms
    fn requires_platforms(&self) -> bool {
        false
    }

    /// Audits a page, returning whether HTTP requests were made
    async fn run(&self, page: &Page, transport: &dyn Transport) -> Result<bool, CheckError>;
}

/// Deferred timing-based verification
///
/// Timing checks flag candidates during the regular pass and verify them
/// later in one batch.
#[async_trait]
pub trait TimingAnalysis: Send + Sync {
    fn has_candidates(&self) -> bool;

    async fn run(&self, transport: &dyn Transport);
}

/// Which checks to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckGroup {
    WithoutPlatforms,
    WithPlatforms,
}

impl CheckGroup {
    fn includes(&self, check: &dyn Check) -> bool {
        match self {
            CheckGroup::WithoutPlatforms => !check.requires_platforms(),
            CheckGroup::WithPlatforms => check.requires_platforms(),
        }
    }
}

/// The registered checks
#[derive(Default, Clone)]
pub struct CheckSet {
    checks: Vec<Arc<dyn Check>>,
}

impl CheckSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, check: Arc<dyn Check>) {
        self.checks.push(check);
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn names(&self) -> Vec<&str> {
        self.checks.iter().map(|c| c.name()).collect()
    }

    /// Runs one group against a page, returning whether any check made requests
    ///
    /// A check that errors or panics is logged and counted as having made no
    /// requests; the remaining checks still run.
    pub async fn run(&self, group: CheckGroup, page: &Page, transport: &dyn Transport) -> bool {
        let mut generated_traffic = false;

        for check in self.checks.iter().filter(|c| group.includes(c.as_ref())) {
            debug!("Running {} against {}", check.name(), page.url);

            let outcome = AssertUnwindSafe(check.run(page, transport))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(CheckError::Panicked(check.name().to_string())));

            match outcome {
                Ok(ran_http) => generated_traffic |= ran_http,
                Err(e) => warn!("{} on {}", e, page.url),
            }
        }

        generated_traffic
    }
}
