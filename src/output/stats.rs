//! Statistics over stored records
//!
//! This module formats the aggregate counts a store reports for `--stats`.

use crate::storage::StoreStats;
use std::fmt::Write;

fn percentage(part: u64, total: u64) -> f64 {
    if total > 0 {
        (part as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

/// Formats store statistics as a plain-text report
pub fn format_statistics(stats: &StoreStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Catalog Statistics ===\n");

    let _ = writeln!(out, "Overview:");
    let _ = writeln!(out, "  Total records: {}", stats.total);
    let _ = writeln!(
        out,
        "  Active: {} ({:.1}%)",
        stats.active,
        percentage(stats.active, stats.total)
    );
    let _ = writeln!(
        out,
        "  With duration: {} ({:.1}%)",
        stats.with_duration,
        percentage(stats.with_duration, stats.total)
    );

    if !stats.by_source.is_empty() {
        let _ = writeln!(out, "\nRecords by Source:");
        // Largest sources first
        let mut sources: Vec<_> = stats.by_source.iter().collect();
        sources.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (tag, count) in sources {
            let _ = writeln!(out, "  {}: {}", tag, count);
        }
    }

    out
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &StoreStats) {
    print!("{}", format_statistics(stats));
}
