//! End-of-run reports

use crate::crawler::{CrawlSummary, LivenessReport};
use std::fmt::Write;

/// Formats a harvest run's counters
pub fn format_summary(summary: &CrawlSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Harvest Summary ===\n");

    let _ = writeln!(out, "Sources:");
    let _ = writeln!(out, "  Configured: {}", summary.sources);
    let _ = writeln!(out, "  Abandoned: {}", summary.sources_abandoned);

    let _ = writeln!(out, "\nListing Pages:");
    let _ = writeln!(out, "  Visited: {}", summary.pages_visited);
    let _ = writeln!(out, "  Failed: {}", summary.page_failures);
    let _ = writeln!(out, "  Blocked: {}", summary.blocked_pages);

    let _ = writeln!(out, "\nItems:");
    let _ = writeln!(out, "  Seen: {}", summary.stubs_seen);
    let _ = writeln!(out, "  Skipped (already complete): {}", summary.skipped);
    let _ = writeln!(
        out,
        "  Deep-scraped: {} ({} fetched, {} failed, {} blocked)",
        summary.deep_scraped,
        summary.details_fetched(),
        summary.detail_failures,
        summary.detail_blocked
    );
    let _ = writeln!(out, "  Upserted: {}", summary.upserted);
    if summary.upsert_failures > 0 {
        let _ = writeln!(out, "  Upsert failures: {}", summary.upsert_failures);
    }

    out
}

pub fn print_summary(summary: &CrawlSummary) {
    print!("{}", format_summary(summary));
}

/// Formats the outcome of a liveness sweep
pub fn format_liveness(report: &LivenessReport) -> String {
    format!(
        "=== Link Check ===\n\n  Checked: {}\n  Deactivated: {}\n  Errors: {}\n",
        report.checked, report.deactivated, report.errors
    )
}

pub fn print_liveness(report: &LivenessReport) {
    print!("{}", format_liveness(report));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_summary() {
        let summary = CrawlSummary {
            sources: 2,
            pages_visited: 6,
            stubs_seen: 60,
            skipped: 40,
            deep_scraped: 20,
            detail_failures: 2,
            upserted: 60,
            ..CrawlSummary::default()
        };

        let report = format_summary(&summary);
        assert!(report.contains("Visited: 6"));
        assert!(report.contains("Deep-scraped: 20 (18 fetched, 2 failed, 0 blocked)"));
        assert!(!report.contains("Upsert failures"));
    }

    #[test]
    fn test_format_liveness() {
        let report = format_liveness(&LivenessReport {
            checked: 10,
            deactivated: 2,
            errors: 1,
        });
        assert!(report.contains("Deactivated: 2"));
    }
}
