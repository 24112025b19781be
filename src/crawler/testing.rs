//! Scripted transport for unit tests

use crate::crawler::fetcher::{Response, Transport, TransportError, TransportErrorKind};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, LOCATION};
use std::collections::{HashMap, VecDeque};
use url::Url;

#[derive(Debug, Clone)]
enum Scripted {
    Respond {
        code: u16,
        headers: HeaderMap,
        body: String,
    },
    Fail {
        location: Option<String>,
    },
}

/// Answers from a per-URL script; unscripted URLs get an empty 200
#[derive(Debug, Default)]
pub(crate) struct ScriptedTransport {
    once: Mutex<HashMap<String, VecDeque<Scripted>>>,
    always: Mutex<HashMap<String, Scripted>>,
    requests: Mutex<Vec<Url>>,
    cookies: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(&self, url: &str, code: u16, body: &str) {
        self.set(url, Scripted::Respond {
            code,
            headers: HeaderMap::new(),
            body: body.to_string(),
        });
    }

    pub(crate) fn html(&self, url: &str, body: &str) {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/html"));
        self.set(url, Scripted::Respond {
            code: 200,
            headers,
            body: body.to_string(),
        });
    }

    pub(crate) fn with_headers(&self, url: &str, headers: HeaderMap, body: &str) {
        self.set(url, Scripted::Respond {
            code: 200,
            headers,
            body: body.to_string(),
        });
    }

    pub(crate) fn redirect(&self, url: &str, code: u16, location: &str) {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(location) {
            headers.insert(LOCATION, value);
        }
        self.set(url, Scripted::Respond {
            code,
            headers,
            body: String::new(),
        });
    }

    /// Never answers
    pub(crate) fn fail(&self, url: &str) {
        self.set(url, Scripted::Fail { location: None });
    }

    /// Fails with a `Location` header but no status
    pub(crate) fn fail_with_location(&self, url: &str, location: &str) {
        self.set(url, Scripted::Fail {
            location: Some(location.to_string()),
        });
    }

    /// Fails the next `times` requests, then falls back to the standing script
    pub(crate) fn fail_times(&self, url: &str, times: usize) {
        let mut once = self.once.lock();
        let queue = once.entry(url.to_string()).or_default();
        for _ in 0..times {
            queue.push_back(Scripted::Fail { location: None });
        }
    }

    pub(crate) fn request_count(&self, url: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|u| u.as_str() == url)
            .count()
    }

    pub(crate) fn total_requests(&self) -> usize {
        self.requests.lock().len()
    }

    pub(crate) fn cookies(&self) -> Vec<String> {
        self.cookies.lock().clone()
    }

    fn set(&self, url: &str, scripted: Scripted) {
        self.always.lock().insert(url.to_string(), scripted);
    }

    fn next(&self, url: &Url) -> Option<Scripted> {
        if let Some(scripted) = self
            .once
            .lock()
            .get_mut(url.as_str())
            .and_then(VecDeque::pop_front)
        {
            return Some(scripted);
        }
        self.always.lock().get(url.as_str()).cloned()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &Url) -> Response {
        self.requests.lock().push(url.clone());

        match self.next(url) {
            Some(Scripted::Respond {
                code,
                headers,
                body,
            }) => Response {
                url: url.clone(),
                code,
                headers,
                body,
                error: None,
            },
            Some(Scripted::Fail { location }) => {
                let mut response = Response::no_response(
                    url.clone(),
                    TransportError::new(TransportErrorKind::Connect, "connection refused"),
                );
                if let Some(value) = location.and_then(|l| HeaderValue::from_str(&l).ok()) {
                    response.headers.insert(LOCATION, value);
                }
                response
            }
            None => Response {
                url: url.clone(),
                code: 200,
                headers: HeaderMap::new(),
                body: String::new(),
                error: None,
            },
        }
    }

    fn update_cookies(&self, _url: &Url, cookies: &[String]) {
        self.cookies.lock().extend_from_slice(cookies);
    }
}
