//! Wardscan: crawl-and-audit scheduling engine
//!
//! This crate drives discovery and audit of a target web application. It keeps
//! two frontiers of work (unvisited URLs and fetched-but-unaudited pages),
//! feeds pages to a browser-rendering worker pool, enforces scope and
//! deduplication, retries unresponsive URLs a bounded number of times and runs
//! the registered checks against every page until no work remains.

pub mod browser;
pub mod checks;
pub mod config;
pub mod crawler;
pub mod output;
pub mod page;
pub mod scope;
pub mod session;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for scan operations
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Session error: {0}")]
    Session(#[from] session::SessionError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for scan operations
pub type Result<T> = std::result::Result<T, ScanError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Scanner, ScannerBuilder};
pub use page::Page;
pub use state::{ScanControl, ScanStatus};
pub use url::{normalize_url, to_absolute};
