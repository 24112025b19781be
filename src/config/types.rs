use serde::Deserialize;

/// Main configuration structure for a scan
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub scan: ScanConfig,
    #[serde(default)]
    pub scope: ScopeConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Scan target and scheduler limits
#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    /// Target URL; always the first seed
    pub url: String,

    /// Extract and follow paths from audited pages
    #[serde(default = "default_crawl")]
    pub crawl: bool,

    /// Soft cap on the number of audited pages
    #[serde(rename = "page-limit", default)]
    pub page_limit: Option<u64>,

    /// Fetch attempts before a URL is abandoned
    #[serde(rename = "max-tries", default = "default_max_tries")]
    pub max_tries: u32,

    /// Capacity of the page buffer
    #[serde(rename = "page-queue-size", default = "default_page_queue_size")]
    pub page_queue_size: usize,

    /// Capacity of the URL frontier; unbounded when absent
    #[serde(rename = "url-queue-size", default)]
    pub url_queue_size: Option<usize>,
}

/// Scope rules
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Domain patterns (e.g., "example.com" or "*.example.com")
    pub domains: Vec<String>,

    /// URL regexes; when non-empty a URL must match one of them
    pub include: Vec<String>,

    /// URL regexes that put a URL out of scope
    pub exclude: Vec<String>,

    /// Body regexes that put a page out of scope
    #[serde(rename = "exclude-content")]
    pub exclude_content: Vec<String>,

    /// Additional seed paths, pushed normally
    #[serde(rename = "extend-paths")]
    pub extend_paths: Vec<String>,

    /// Seed paths pushed with force
    #[serde(rename = "restrict-paths")]
    pub restrict_paths: Vec<String>,

    /// Pages deeper than this are not sent for DOM exploration
    #[serde(rename = "dom-depth-limit")]
    pub dom_depth_limit: Option<u32>,

    pub redundant: Vec<RedundantConfig>,
}

/// A URL pattern allowed through a limited number of times
#[derive(Debug, Clone, Deserialize)]
pub struct RedundantConfig {
    pub pattern: String,
    pub count: u32,
}

/// HTTP transport configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    pub timeout: u64,

    /// Connect timeout in seconds
    #[serde(rename = "connect-timeout")]
    pub connect_timeout: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("wardscan/{}", env!("CARGO_PKG_VERSION")),
            timeout: 30,
            connect_timeout: 10,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path to the markdown summary file
    #[serde(rename = "summary-path")]
    pub summary_path: Option<String>,
}

fn default_crawl() -> bool {
    true
}

fn default_max_tries() -> u32 {
    5
}

fn default_page_queue_size() -> usize {
    50
}
