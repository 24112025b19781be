//! Console rendering of a scan report

use crate::output::report::ScanReport;

/// Prints the report to stdout
pub fn print_report(report: &ScanReport) {
    print!("{}", format_report(report));
}

/// Formats the report the way [`print_report`] shows it
pub fn format_report(report: &ScanReport) -> String {
    let mut out = String::new();

    out.push_str("=== Scan Report ===\n\n");

    out.push_str("Overview:\n");
    out.push_str(&format!("  Target: {}\n", report.target));
    out.push_str(&format!("  Status: {}\n", report.status));
    out.push_str(&format!("  Duration: {}s\n", report.duration_seconds()));
    out.push_str(&format!("  Audited pages: {}\n", report.audited_pages));
    out.push_str(&format!(
        "  URLs queued: {} (pending: {})\n",
        report.url_queue_total, report.pending_urls
    ));
    out.push_str(&format!(
        "  Pages buffered: {} (pending: {})\n",
        report.page_queue_total, report.pending_pages
    ));
    out.push('\n');

    let breakdown = report.status_breakdown();
    if !breakdown.is_empty() {
        out.push_str("Sitemap by Status:\n");
        let mut counts: Vec<_> = breakdown.into_iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        for (code, count) in counts {
            let percentage = (count as f64 / report.sitemap.len() as f64) * 100.0;
            out.push_str(&format!("  {}: {} ({:.1}%)\n", code, count, percentage));
        }
        out.push('\n');
    }

    if !report.failures.is_empty() {
        out.push_str(&format!(
            "Failures ({}), no response after all attempts:\n",
            report.failures.len()
        ));
        for url in &report.failures {
            out.push_str(&format!("  - {}\n", url));
        }
        out.push('\n');
    }

    out.push_str(&format!(
        "Success Rate: {:.1}% ({} pages mapped)\n",
        report.success_rate(),
        report.sitemap.len()
    ));

    out
}
