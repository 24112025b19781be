//! Output module for scan reports
//!
//! This module handles:
//! - The report produced when a scan stops
//! - Printing it to the console
//! - Writing a markdown summary

mod markdown;
mod report;
pub mod stats;

pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use report::{OutputError, OutputResult, ScanReport};
pub use stats::{format_report, print_report};
