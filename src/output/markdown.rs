//! Markdown summary generation
//!
//! Writes a human-readable summary of a scan: run metadata, counters, the
//! sitemap and the URLs that never answered.

use crate::output::report::{OutputResult, ScanReport};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Sitemap rows shown before the table is truncated
const SITEMAP_ROWS: usize = 200;

/// Generates a markdown summary and writes it to `output_path`
pub fn generate_markdown_summary(report: &ScanReport, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(report);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a scan report as markdown
pub fn format_markdown_summary(report: &ScanReport) -> String {
    let mut md = String::new();

    md.push_str("# Wardscan Scan Summary\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Target**: {}\n", report.target));
    md.push_str(&format!("- **Started**: {}\n", report.started_at.to_rfc3339()));
    md.push_str(&format!("- **Finished**: {}\n", report.finished_at.to_rfc3339()));
    md.push_str(&format!(
        "- **Duration**: {} seconds\n",
        report.duration_seconds()
    ));
    md.push_str(&format!("- **Status**: {}\n", report.status));
    if let Some(hash) = &report.config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    md.push('\n');

    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Audited Pages**: {}\n", report.audited_pages));
    md.push_str(&format!("- **URLs Queued**: {}\n", report.url_queue_total));
    md.push_str(&format!("- **Pages Buffered**: {}\n", report.page_queue_total));
    md.push_str(&format!("- **Failures**: {}\n", report.failures.len()));
    md.push_str(&format!(
        "- **Success Rate**: {:.2}%\n",
        report.success_rate()
    ));
    if report.pending_urls > 0 || report.pending_pages > 0 {
        md.push_str(&format!(
            "- **Left in Queues**: {} URLs, {} pages\n",
            report.pending_urls, report.pending_pages
        ));
    }
    md.push('\n');

    let breakdown = report.status_breakdown();
    if !breakdown.is_empty() {
        md.push_str("## Status Breakdown\n\n");
        md.push_str("| Status | Pages |\n");
        md.push_str("|--------|-------|\n");
        for (code, count) in breakdown {
            md.push_str(&format!("| {} | {} |\n", code, count));
        }
        md.push('\n');
    }

    if !report.sitemap.is_empty() {
        md.push_str("## Sitemap\n\n");
        md.push_str("| URL | Status |\n");
        md.push_str("|-----|--------|\n");
        for (url, code) in report.sitemap.iter().take(SITEMAP_ROWS) {
            md.push_str(&format!("| {} | {} |\n", url, code));
        }
        if report.sitemap.len() > SITEMAP_ROWS {
            md.push_str(&format!(
                "\n... and {} more\n",
                report.sitemap.len() - SITEMAP_ROWS
            ));
        }
        md.push('\n');
    }

    if !report.failures.is_empty() {
        md.push_str("## Failures\n\n");
        md.push_str("No response after all attempts:\n\n");
        for url in &report.failures {
            md.push_str(&format!("- {}\n", url));
        }
        md.push('\n');
    }

    md
}
