//! Materialized pages
//!
//! A [`Page`] is a fetched or browser-rendered document: its final URL, status
//! code, headers, body, an optional DOM snapshot and a lazily built cache of
//! parsed elements.

mod fingerprint;
mod parser;

pub use fingerprint::identify as identify_platforms;
pub use parser::{parse, Elements, Form};

use crate::crawler::{Response, TransportError};
use reqwest::header::{HeaderMap, CONTENT_TYPE, SET_COOKIE};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::OnceLock;
use url::Url;

/// A DOM state transition recorded by the browser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Event that was triggered, e.g. `click` or `load`
    pub event: String,
    /// Element (or URL, for loads) the event was triggered on
    pub element: String,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.event, self.element)
    }
}

/// DOM snapshot, present only for browser-rendered or browser-processed pages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dom {
    /// Number of transitions needed to reach this state from a plain load
    pub depth: u32,
    pub transitions: Vec<Transition>,
}

impl Dom {
    pub fn new(transitions: Vec<Transition>) -> Self {
        Self {
            depth: transitions.len() as u32,
            transitions,
        }
    }
}

/// A fetched or rendered document awaiting audit
#[derive(Debug, Clone)]
pub struct Page {
    pub url: Url,

    /// HTTP status code; 0 means no response was received
    pub code: u16,

    pub headers: HeaderMap,

    pub body: String,

    /// Transport-level failure, if any
    pub error: Option<TransportError>,

    pub dom: Option<Dom>,

    /// Platforms identified from the response
    pub platforms: Vec<String>,

    /// Entered the system through a forced push
    pub forced: bool,

    cache: OnceLock<Elements>,
}

impl Page {
    /// Creates a page from its parts
    pub fn new(url: Url, code: u16, headers: HeaderMap, body: impl Into<String>) -> Self {
        let platforms = identify_platforms(&headers);
        Self {
            url,
            code,
            headers,
            body: body.into(),
            error: None,
            dom: None,
            platforms,
            forced: false,
            cache: OnceLock::new(),
        }
    }

    /// Materializes a page from a transport response
    pub fn from_response(response: Response) -> Self {
        let mut page = Self::new(response.url, response.code, response.headers, response.body);
        page.error = response.error;
        page
    }

    /// Attaches a DOM snapshot
    pub fn with_dom(mut self, dom: Dom) -> Self {
        self.dom = Some(dom);
        self
    }

    /// Marks the page as forced
    pub fn forced(mut self, forced: bool) -> Self {
        self.forced = forced;
        self
    }

    /// Whether the transport delivered the response without error
    pub fn response_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn dom_depth(&self) -> u32 {
        self.dom.as_ref().map_or(0, |dom| dom.depth)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Raw `Set-Cookie` header values
    pub fn cookies(&self) -> Vec<String> {
        self.headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect()
    }

    /// Parsed elements, built on first access
    pub fn elements(&self) -> &Elements {
        self.cache.get_or_init(|| parse(&self.body, &self.url))
    }

    pub fn paths(&self) -> &[Url] {
        &self.elements().paths
    }

    pub fn forms(&self) -> &[Form] {
        &self.elements().forms
    }

    pub fn is_cached(&self) -> bool {
        self.cache.get().is_some()
    }

    /// Drops the parsed element cache
    ///
    /// Nothing may rely on the cache afterwards; accessing elements again
    /// re-parses the body.
    pub fn clear_cache(&mut self) {
        self.cache = OnceLock::new();
    }

    /// Identity used for page deduplication
    ///
    /// Derived from the URL, the DOM transitions and the element structure, so
    /// two URLs serving the same document with different DOM states are
    /// distinct pages while byte-for-byte irrelevant differences (text, input
    /// order) are not.
    pub fn identity(&self) -> String {
        let elements = self.elements();

        let mut paths: Vec<&str> = elements.paths.iter().map(Url::as_str).collect();
        paths.sort_unstable();

        let mut forms: Vec<String> = elements.forms.iter().map(Form::signature).collect();
        forms.sort_unstable();

        let mut hasher = Sha256::new();
        hasher.update(self.url.as_str().as_bytes());
        if let Some(dom) = &self.dom {
            for transition in &dom.transitions {
                hasher.update(b"\x00t");
                hasher.update(transition.to_string().as_bytes());
            }
        }
        for path in paths {
            hasher.update(b"\x00p");
            hasher.update(path.as_bytes());
        }
        for form in forms {
            hasher.update(b"\x00f");
            hasher.update(form.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}
