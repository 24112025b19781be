//! HTTP transport
//!
//! The scheduler only needs one operation from the network: GET a URL and
//! hand back whatever came back, including "nothing". Redirects are never
//! followed here; their targets are fed back into the frontier instead.

use crate::config::HttpConfig;
use crate::url::to_absolute;
use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, LOCATION};
use reqwest::{redirect::Policy, Client};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Why a request produced no usable response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    /// Status line arrived but the body could not be read
    Body,
    Request,
}

impl TransportErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Body => "body",
            TransportErrorKind::Request => "request",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport failure attached to a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            TransportErrorKind::Timeout
        } else if e.is_connect() {
            TransportErrorKind::Connect
        } else if e.is_body() || e.is_decode() {
            TransportErrorKind::Body
        } else {
            TransportErrorKind::Request
        };
        Self::new(kind, e.to_string())
    }
}

/// Outcome of a single GET
#[derive(Debug, Clone)]
pub struct Response {
    pub url: Url,

    /// HTTP status code; 0 when no response was received
    pub code: u16,

    pub headers: HeaderMap,

    pub body: String,

    pub error: Option<TransportError>,
}

impl Response {
    /// A response that never arrived
    pub fn no_response(url: Url, error: TransportError) -> Self {
        Self {
            url,
            code: 0,
            headers: HeaderMap::new(),
            body: String::new(),
            error: Some(error),
        }
    }

    /// Whether the server answered at all, whatever the status
    pub fn has_response(&self) -> bool {
        self.code != 0
    }

    /// Every `Location` target, resolved against the request URL
    pub fn locations(&self) -> Vec<Url> {
        self.headers
            .get_all(LOCATION)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|target| to_absolute(target, &self.url))
            .collect()
    }
}

/// Asynchronous HTTP transport
///
/// Implementations never fail: a request that produced nothing comes back as
/// a [`Response`] with code 0 and an error attached.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url) -> Response;

    /// Merges cookies set by an audited page into the shared session
    fn update_cookies(&self, _url: &Url, _cookies: &[String]) {}
}

/// reqwest-backed transport with a shared cookie jar
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    jar: Arc<Jar>,
}

impl HttpTransport {
    /// Builds a transport from the HTTP configuration
    ///
    /// # Example
    ///
    /// ```no_run
    /// use wardscan::config::HttpConfig;
    /// use wardscan::crawler::HttpTransport;
    ///
    /// let transport = HttpTransport::new(&HttpConfig::default()).unwrap();
    /// ```
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        let jar = Arc::new(Jar::default());
        let client = build_http_client(config, jar.clone())?;
        Ok(Self { client, jar })
    }
}

/// Builds the HTTP client used for all scan traffic
pub fn build_http_client(config: &HttpConfig, jar: Arc<Jar>) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.timeout))
        .connect_timeout(Duration::from_secs(config.connect_timeout))
        .redirect(Policy::none()) // Targets go back through the frontier
        .cookie_provider(jar)
        .gzip(true)
        .brotli(true)
        .build()
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url) -> Response {
        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => return Response::no_response(url.clone(), e.into()),
        };

        let code = response.status().as_u16();
        let headers = response.headers().clone();

        match response.text().await {
            Ok(body) => Response {
                url: url.clone(),
                code,
                headers,
                body,
                error: None,
            },
            Err(e) => Response {
                url: url.clone(),
                code,
                headers,
                body: String::new(),
                error: Some(e.into()),
            },
        }
    }

    fn update_cookies(&self, url: &Url, cookies: &[String]) {
        for cookie in cookies {
            self.jar.add_cookie_str(cookie, url);
        }
    }
}
