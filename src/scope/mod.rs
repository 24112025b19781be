//! Scope filtering
//!
//! The scheduler consults a [`Scope`] every time work enters or leaves a
//! queue. Decisions are never cached: rules may change while a scan runs.

mod rules;

pub use rules::{RedundantRule, RuleScope, ScopeRules};

use crate::page::Page;
use url::Url;

/// Decides which URLs and pages are in bounds for the current scan
pub trait Scope: Send + Sync {
    /// Returns true if the URL must not be fetched or audited
    fn url_out(&self, url: &Url) -> bool;

    /// Returns true if the page must not be audited
    fn page_out(&self, page: &Page) -> bool {
        self.url_out(&page.url)
    }

    /// Returns true if the URL matches a redundancy rule whose budget is spent
    ///
    /// With `strict` set, a match also consumes one unit of that budget.
    fn redundant(&self, _url: &Url, _strict: bool) -> bool {
        false
    }
}
