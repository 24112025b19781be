//! Configuration module
//!
//! Loads, parses and validates the TOML scan configuration.
//!
//! # Example
//!
//! ```no_run
//! use wardscan::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("scan.toml")).unwrap();
//! println!("Scanning {}", config.scan.url);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{Config, HttpConfig, OutputConfig, RedundantConfig, ScanConfig, ScopeConfig};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
